//! Executors decide which thread runs a continuation.
//!
//! A promise is bound to an executor when its future is retrieved
//! (see [`Promise::get_future`](crate::Promise::get_future)). Every
//! continuation attached to that future, and to futures derived from it, is
//! handed to the executor as a [`Job`].
//!
//! Provided executors:
//!
//! - [`InlineExecutor`]: runs the job on whichever thread submits it
//! - [`SingleThreadExecutor`]: one dedicated thread, strict FIFO order
//! - [`ThreadPool`]: a fixed set of workers fed by a work-stealing injector
//! - [`EventLoop::executor`](crate::EventLoop::executor): the caller's own
//!   thread, pumped by `block_on`
//!
//! Dropping a job without running it drops whatever promise it captured, so
//! the corresponding future resolves to
//! [`Error::BrokenPromise`](crate::Error::BrokenPromise) instead of hanging.

mod builder;
mod pool;
mod single;

pub use builder::{BuildError, ThreadPoolBuilder};
pub use pool::ThreadPool;
pub use single::SingleThreadExecutor;

use std::sync::Arc;

/// A unit of work submitted to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to any executor.
pub type ExecutorRef = Arc<dyn Executor>;

/// Policy object that selects the thread a job runs on.
pub trait Executor: Send + Sync + 'static {
    /// Submits a job. Apart from [`InlineExecutor`], implementations return
    /// without waiting for the job to run.
    fn execute(&self, job: Job);
}

/// Synchronous executor: the job runs immediately on the calling thread.
///
/// For a continuation this is the thread that settled the promise, or the
/// thread calling `then` if the promise was already settled.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Returns a shared [`InlineExecutor`].
pub fn inline() -> ExecutorRef {
    Arc::new(InlineExecutor)
}
