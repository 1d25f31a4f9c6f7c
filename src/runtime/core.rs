//! Event loop that runs jobs and tasks on the thread calling `block_on`.
//!
//! This is the executor for code that must stay on a thread the application
//! already owns (a UI thread, or a main loop). Continuations bound to
//! [`EventLoop::executor`] are queued and only run while the owning thread is
//! inside [`EventLoop::block_on`] or [`EventLoop::run_pending`].

use crate::executor::{ExecutorRef, Job};
use crate::promise::CancellableFuture;
use crate::runtime::{TaskQueue, enter_context, main_waker};
use crate::task::Task;

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, warn};

/// Single-threaded executor pumped by its owner.
///
/// # Example
/// ```ignore
/// let mut event_loop = EventLoop::new();
/// let promise = Promise::new();
/// let future = promise.get_future(event_loop.executor())?;
///
/// std::thread::spawn(move || promise.resolve(7));
///
/// let value = event_loop.block_on(future.map(|v| v + 1))?;
/// assert_eq!(value, 8);
/// ```
pub struct EventLoop {
    queue: Arc<TaskQueue>,
}

impl EventLoop {
    /// Creates an event loop with an empty queue.
    pub fn new() -> Self {
        Self {
            queue: Arc::new(TaskQueue::new()),
        }
    }

    /// Returns an executor that queues jobs onto this loop.
    ///
    /// The handle may be used from any thread.
    pub fn executor(&self) -> ExecutorRef {
        self.queue.clone()
    }

    /// Spawns a task onto this loop.
    ///
    /// Wraps the future in a task and queues its first poll. The task first
    /// runs during the next `block_on` or `run_pending`. Cancelling the
    /// returned handle drops the future at its next poll.
    ///
    /// # Arguments
    /// * `future` - The future to run as a task on the loop's thread
    ///
    /// # Returns
    /// A [`CancellableFuture`] resolving with the task's output, or with
    /// [`Error::Panicked`](crate::Error::Panicked) if the task panics
    ///
    /// # Example
    /// ```ignore
    /// let handle = event_loop.spawn(async { 6 * 7 });
    /// assert_eq!(event_loop.block_on(handle)?, 42);
    /// ```
    pub fn spawn<F>(&self, future: F) -> CancellableFuture<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        Task::spawn_on(&self.queue, future)
    }

    /// Runs the jobs queued at the time of the call.
    ///
    /// Jobs queued while these run are left for the next call, so an
    /// application can interleave the loop with its own work without
    /// blocking.
    ///
    /// # Returns
    /// The number of jobs that ran
    ///
    /// # Example
    /// ```ignore
    /// loop {
    ///     handle_input();
    ///     event_loop.run_pending();
    /// }
    /// ```
    pub fn run_pending(&mut self) -> usize {
        enter_context(self.queue.clone(), || self.run_batch())
    }

    /// Blocks until `fut` completes, running queued jobs and tasks meanwhile.
    ///
    /// Jobs still queued when `fut` completes are run before returning.
    /// Blocking calls such as [`CancellableFuture::wait`] must not be made from
    /// inside the loop for futures bound to the loop itself.
    ///
    /// # Arguments
    /// * `fut` - The future to drive on the current thread
    ///
    /// # Returns
    /// The output of the completed future
    pub fn block_on<F: Future>(&mut self, fut: F) -> F::Output {
        enter_context(self.queue.clone(), || {
            let mut fut = pin!(fut);
            let waker = main_waker(self.queue.clone());
            let mut cx = Context::from_waker(&waker);

            loop {
                if let Poll::Ready(value) = fut.as_mut().poll(&mut cx) {
                    self.drain();
                    return value;
                }

                loop {
                    self.run_batch();

                    if self.queue.take_notified() {
                        break;
                    }

                    if self.queue.is_empty() {
                        self.queue.wait();
                    }
                }
            }
        })
    }

    // Runs jobs until the queue stays empty.
    fn drain(&self) {
        while self.run_batch() > 0 {}
    }

    fn run_batch(&self) -> usize {
        let batch = self.queue.len();
        let mut ran = 0;

        while ran < batch {
            let Some(job) = self.queue.pop() else {
                break;
            };
            run_job(job);
            ran += 1;
        }

        ran
    }
}

fn run_job(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        warn!("event loop job panicked");
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        let dropped = self.queue.close();
        debug!(dropped, "event loop closed");
    }
}
