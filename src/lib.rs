//! Promise/future based asynchronous APIs with pluggable continuation executors.
//!
//! A library operation hands back a [`CancellableFuture`] instead of calling
//! into a listener interface. The caller decides, by choosing an
//! [`Executor`], which thread its continuations run on.
//!
//! # Architecture
//!
//! - **Promise**: write-once slot settled by the producer
//! - **CancellableFuture**: read side; chain with `then`, cancel, await or wait
//! - **Executor**: policy selecting the thread a continuation runs on
//!   (inline, single thread, thread pool, or an [`EventLoop`])
//! - **EventLoop**: runs jobs and tasks on the thread calling `block_on`
//! - **Courier**: a message-sending service built on all of the above
//!
//! # Example
//! ```ignore
//! use pledge::courier::{Courier, Message};
//! use pledge::executor::ThreadPoolBuilder;
//!
//! let pool = ThreadPoolBuilder::new().worker_threads(2).build()?;
//! let courier = Courier::builder()
//!     .callback_executor(pool.executor())
//!     .build(|_: &Message| Ok(200))?;
//!
//! let future = courier.send_message(Message::new("ops", "disk almost full"));
//! let status = future.map(|receipt| receipt.status).wait()?;
//! ```

pub mod courier;
mod error;
pub mod executor;
mod promise;
pub mod runtime;
mod task;

pub use error::{Error, Result};
pub use executor::{Executor, ExecutorRef, InlineExecutor, SingleThreadExecutor, ThreadPool};
pub use promise::{CancelHandle, CancellableFuture, Promise, failed, ready, when_all, when_any};
pub use runtime::EventLoop;

/// Drives any future to completion on the current thread.
///
/// Unlike [`EventLoop::block_on`], no event loop context is installed, so
/// [`runtime::spawn`] is unavailable inside.
pub fn block_on<F: std::future::Future>(future: F) -> F::Output {
    futures::executor::block_on(future)
}
