//! The write-once slot shared by a promise and its future.
//!
//! All transitions happen under one mutex, so settlement and cancellation race
//! safely: whichever reaches `Pending` first wins and later attempts are no-ops.
//! Continuations, wakers and cancel hooks are always invoked after the lock is
//! released.

use crate::error::{Error, Result};
use crate::executor::ExecutorRef;

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Instant;
use tracing::trace;

pub(crate) type Continuation<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;
type Hook = Box<dyn FnOnce() + Send + 'static>;

enum Slot<T> {
    Pending,
    Ready(Result<T>),
    Taken,
}

struct Inner<T> {
    slot: Slot<T>,
    cancelled: bool,
    executor: Option<ExecutorRef>,
    continuation: Option<Continuation<T>>,
    waker: Option<Waker>,
    cancel_hooks: Vec<Hook>,
}

pub(crate) struct Shared<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

/// Anything whose pending result can be cancelled. Lets a cancel handle walk a
/// chain of futures with different output types.
pub(crate) trait Cancel: Send + Sync {
    fn cancel(&self) -> bool;
}

// Work decided under the lock and performed after it is released.
enum Deferred<T> {
    Dispatch(ExecutorRef, Continuation<T>, Result<T>),
    Wake(Option<Waker>),
}

impl<T: Send + 'static> Shared<T> {
    pub(crate) fn new(executor: Option<ExecutorRef>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slot: Slot::Pending,
                cancelled: false,
                executor,
                continuation: None,
                waker: None,
                cancel_hooks: Vec::new(),
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds the executor. Returns `false` if one was already bound.
    pub(crate) fn bind(&self, executor: ExecutorRef) -> bool {
        let mut inner = self.lock();
        if inner.executor.is_some() {
            return false;
        }
        inner.executor = Some(executor);
        true
    }

    pub(crate) fn executor(&self) -> Option<ExecutorRef> {
        self.lock().executor.clone()
    }

    /// Settles the slot. Returns `false` if it was already settled or cancelled.
    pub(crate) fn complete(&self, outcome: Result<T>) -> bool {
        let (deferred, hooks) = {
            let mut inner = self.lock();
            if !matches!(inner.slot, Slot::Pending) {
                return false;
            }
            let hooks = std::mem::take(&mut inner.cancel_hooks);
            (self.settle_locked(&mut inner, outcome), hooks)
        };

        // Hooks are for cancellation only; a settled promise discards them.
        drop(hooks);
        self.run_deferred(deferred);
        true
    }

    /// Cancels the slot if it is still pending.
    pub(crate) fn cancel_pending(&self) -> bool {
        let (deferred, hooks) = {
            let mut inner = self.lock();
            if !matches!(inner.slot, Slot::Pending) {
                return false;
            }
            inner.cancelled = true;
            let hooks = std::mem::take(&mut inner.cancel_hooks);
            (self.settle_locked(&mut inner, Err(Error::Cancelled)), hooks)
        };

        trace!(hooks = hooks.len(), "promise cancelled");
        for hook in hooks {
            hook();
        }
        self.run_deferred(deferred);
        true
    }

    fn settle_locked(&self, inner: &mut Inner<T>, outcome: Result<T>) -> Deferred<T> {
        if let Some(continuation) = inner.continuation.take() {
            inner.slot = Slot::Taken;
            // A continuation is only attached through a bound future.
            let executor = inner
                .executor
                .clone()
                .unwrap_or_else(crate::executor::inline);
            return Deferred::Dispatch(executor, continuation, outcome);
        }

        inner.slot = Slot::Ready(outcome);
        self.ready.notify_all();
        Deferred::Wake(inner.waker.take())
    }

    fn run_deferred(&self, deferred: Deferred<T>) {
        match deferred {
            Deferred::Dispatch(executor, continuation, outcome) => {
                executor.execute(Box::new(move || continuation(outcome)));
            }
            Deferred::Wake(Some(waker)) => waker.wake(),
            Deferred::Wake(None) => {}
        }
    }

    /// Attaches the single continuation. If the slot is already settled the
    /// continuation is dispatched immediately.
    pub(crate) fn attach(&self, continuation: Continuation<T>) {
        let deferred = {
            let mut inner = self.lock();
            let executor = inner
                .executor
                .clone()
                .unwrap_or_else(crate::executor::inline);

            match std::mem::replace(&mut inner.slot, Slot::Taken) {
                Slot::Pending => {
                    inner.slot = Slot::Pending;
                    inner.waker = None;
                    inner.continuation = Some(continuation);
                    return;
                }
                Slot::Ready(outcome) => Deferred::Dispatch(executor, continuation, outcome),
                Slot::Taken => Deferred::Dispatch(executor, continuation, Err(Error::BrokenPromise)),
            }
        };

        self.run_deferred(deferred);
    }

    pub(crate) fn poll(&self, cx: &mut Context<'_>) -> Poll<Result<T>> {
        let mut inner = self.lock();
        match std::mem::replace(&mut inner.slot, Slot::Taken) {
            Slot::Pending => {
                inner.slot = Slot::Pending;
                let stale = inner
                    .waker
                    .as_ref()
                    .is_none_or(|waker| !waker.will_wake(cx.waker()));
                if stale {
                    inner.waker = Some(cx.waker().clone());
                }
                Poll::Pending
            }
            Slot::Ready(outcome) => Poll::Ready(outcome),
            Slot::Taken => Poll::Ready(Err(Error::BrokenPromise)),
        }
    }

    pub(crate) fn try_take(&self) -> Option<Result<T>> {
        let mut inner = self.lock();
        match std::mem::replace(&mut inner.slot, Slot::Taken) {
            Slot::Pending => {
                inner.slot = Slot::Pending;
                None
            }
            Slot::Ready(outcome) => Some(outcome),
            Slot::Taken => Some(Err(Error::BrokenPromise)),
        }
    }

    /// Blocks until the slot is settled or `deadline` passes. Returns `None` on
    /// timeout.
    pub(crate) fn wait(&self, deadline: Option<Instant>) -> Option<Result<T>> {
        let mut inner = self.lock();

        while matches!(inner.slot, Slot::Pending) {
            match deadline {
                None => {
                    inner = self
                        .ready
                        .wait(inner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    inner = self
                        .ready
                        .wait_timeout(inner, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }

        match std::mem::replace(&mut inner.slot, Slot::Taken) {
            Slot::Ready(outcome) => Some(outcome),
            _ => Some(Err(Error::BrokenPromise)),
        }
    }

    /// Registers a cancellation hook. Runs it now if already cancelled, drops
    /// it if already settled.
    pub(crate) fn on_cancel(&self, hook: Hook) {
        let run_now = {
            let mut inner = self.lock();
            if inner.cancelled {
                true
            } else if matches!(inner.slot, Slot::Pending) {
                inner.cancel_hooks.push(hook);
                return;
            } else {
                false
            }
        };

        if run_now {
            hook();
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub(crate) fn is_ready(&self) -> bool {
        matches!(self.lock().slot, Slot::Ready(_))
    }
}

impl<T: Send + 'static> Cancel for Shared<T> {
    fn cancel(&self) -> bool {
        self.cancel_pending()
    }
}
