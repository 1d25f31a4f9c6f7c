//! Tasks: futures driven by an event loop.
//!
//! A spawned future is wrapped in a [`Task`] and its result is delivered
//! through a promise, so the handle returned by `spawn` is an ordinary
//! [`CancellableFuture`]. It can be awaited, chained with `then`, or
//! cancelled.
//!
//! # How tasks run
//!
//! 1. The future is boxed into a task and its first poll is queued as a job
//! 2. The loop runs the job, polling the future with the task's waker
//! 3. On `Poll::Pending` the future is put back and the task goes idle
//! 4. Waking the task queues another poll job (at most one at a time)
//! 5. On completion, panic or cancellation the promise is settled and the
//!    future is dropped

use crate::error::Error;
use crate::executor::ExecutorRef;
use crate::promise::{CancellableFuture, Promise};
use crate::runtime::{TaskQueue, make_waker};

use futures::future::BoxFuture;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};
use tracing::trace;

/// A spawned future plus what it needs to be re-scheduled.
pub(crate) struct Task {
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    queue: Arc<TaskQueue>,
    scheduled: AtomicBool,
}

impl Task {
    /// Spawns `future` on `queue` and returns a handle to its output.
    pub(crate) fn spawn_on<F>(queue: &Arc<TaskQueue>, future: F) -> CancellableFuture<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let executor: ExecutorRef = queue.clone();
        let (promise, handle) = Promise::pair(executor);

        let task = Arc::new(Task {
            future: Mutex::new(None),
            queue: queue.clone(),
            scheduled: AtomicBool::new(false),
        });

        // Cancellation re-schedules the task so the future is dropped promptly.
        let weak: Weak<Task> = Arc::downgrade(&task);
        promise.on_cancel(move || {
            if let Some(task) = weak.upgrade() {
                task.schedule();
            }
        });

        let supervised = Supervised {
            future: Box::pin(future),
            promise: Some(promise),
        };
        *task.future.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::pin(supervised));

        task.schedule();
        handle
    }

    /// Queues a poll of this task unless one is already queued.
    pub(crate) fn schedule(self: &Arc<Self>) {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let task = self.clone();
        self.queue.push(Box::new(move || task.poll()));
    }

    /// Polls the task's future once.
    fn poll(self: Arc<Self>) {
        self.scheduled.store(false, Ordering::Release);

        let waker = make_waker(self.clone());
        let mut context = Context::from_waker(&waker);

        let mut future_slot = self.future.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(mut future) = future_slot.take()
            && future.as_mut().poll(&mut context).is_pending()
        {
            *future_slot = Some(future);
        }
    }
}

/// Drives the user's future and settles the task's promise.
struct Supervised<F: Future>
where
    F::Output: Send + 'static,
{
    future: Pin<Box<F>>,
    promise: Option<Promise<F::Output>>,
}

impl<F> Future for Supervised<F>
where
    F: Future,
    F::Output: Send + 'static,
{
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = &mut *self;

        let Some(promise) = this.promise.as_ref() else {
            return Poll::Ready(());
        };

        if promise.is_cancelled() {
            trace!("task cancelled, dropping its future");
            this.promise = None;
            return Poll::Ready(());
        }

        let polled = panic::catch_unwind(AssertUnwindSafe(|| this.future.as_mut().poll(cx)));

        let outcome = match polled {
            Ok(Poll::Pending) => return Poll::Pending,
            Ok(Poll::Ready(value)) => Ok(value),
            Err(payload) => Err(Error::from_panic(payload)),
        };

        if let Some(promise) = this.promise.take() {
            let _ = promise.settle(outcome);
        }

        Poll::Ready(())
    }
}
