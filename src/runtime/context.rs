//! Thread-local event loop context.
//!
//! `block_on` and `run_pending` install the loop's queue for the current
//! thread, which lets [`spawn`] and [`current_executor`] work without an
//! explicit loop reference. The previous context is restored on exit, even if
//! the closure panics.

use crate::executor::ExecutorRef;
use crate::promise::CancellableFuture;
use crate::runtime::TaskQueue;
use crate::task::Task;

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

thread_local! {
    /// Queue of the event loop currently running on this thread.
    pub(crate) static CURRENT_QUEUE: RefCell<Option<Arc<TaskQueue>>> = const { RefCell::new(None) };
}

struct ContextGuard {
    previous: Option<Arc<TaskQueue>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_QUEUE.with(|current| *current.borrow_mut() = previous);
    }
}

/// Runs `function` with `queue` installed as the current event loop.
pub(crate) fn enter_context<F, R>(queue: Arc<TaskQueue>, function: F) -> R
where
    F: FnOnce() -> R,
{
    let previous = CURRENT_QUEUE.with(|current| current.borrow_mut().replace(queue));
    let _guard = ContextGuard { previous };

    function()
}

/// Returns the executor of the event loop running on this thread, if any.
pub fn current_executor() -> Option<ExecutorRef> {
    CURRENT_QUEUE.with(|current| {
        current
            .borrow()
            .as_ref()
            .map(|queue| queue.clone() as ExecutorRef)
    })
}

/// Spawns a task on the event loop running on this thread.
///
/// # Panics
/// Panics if called outside of [`EventLoop::block_on`](crate::EventLoop::block_on)
/// or a task it runs.
///
/// # Example
/// ```ignore
/// event_loop.block_on(async {
///     let handle = pledge::runtime::spawn(async { 42 });
///     assert_eq!(handle.await?, 42);
/// });
/// ```
pub fn spawn<F>(future: F) -> CancellableFuture<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let queue = CURRENT_QUEUE.with(|current| {
        current
            .borrow()
            .as_ref()
            .cloned()
            .expect("spawn() called outside of an event loop")
    });

    Task::spawn_on(&queue, future)
}
