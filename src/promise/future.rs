//! Read side of a promise.

use crate::error::{Error, Result};
use crate::executor::{self, ExecutorRef};
use crate::promise::Promise;
use crate::promise::shared::{Cancel, Shared};

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tracing::trace;

/// Handle to a promise's eventual result, supporting chaining and cancellation.
///
/// Obtained from [`Promise::get_future`], from an API returning one (such as
/// [`Courier::send_message`](crate::courier::Courier::send_message)), or from
/// chaining another future.
///
/// Dropping a `CancellableFuture` does **not** cancel the operation; call
/// [`cancel`](Self::cancel) or keep a [`CancelHandle`] for that.
///
/// # Example
/// ```ignore
/// let receipt = courier
///     .send_message(message)
///     .then(|result| match result {
///         Ok(receipt) => println!("sent with status {}", receipt.status),
///         Err(e) => println!("not sent: {e}"),
///     });
/// ```
pub struct CancellableFuture<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    handle: CancelHandle,
}

impl<T: Send + 'static> CancellableFuture<T> {
    pub(crate) fn from_shared(shared: Arc<Shared<T>>, upstream: Vec<CancelHandle>) -> Self {
        let target: Arc<dyn Cancel> = shared.clone();

        Self {
            shared,
            handle: CancelHandle::new(target, upstream),
        }
    }

    /// Chains a continuation that receives the outcome, success or failure.
    ///
    /// The continuation runs on this future's executor and the returned
    /// future is bound to the same executor. If this future is already
    /// settled, the continuation is submitted immediately. A panic inside the
    /// continuation resolves the returned future to [`Error::Panicked`].
    pub fn then<U, F>(self, continuation: F) -> CancellableFuture<U>
    where
        U: Send + 'static,
        F: FnOnce(Result<T>) -> U + Send + 'static,
    {
        let executor = self.bound_executor();
        self.chain_on(executor, move |outcome| Ok(continuation(outcome)))
    }

    /// Chains a continuation on success only; errors pass through untouched.
    pub fn map<U, F>(self, f: F) -> CancellableFuture<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let executor = self.bound_executor();
        self.chain_on(executor, move |outcome| outcome.map(f))
    }

    /// Chains a fallible step on success.
    pub fn and_then<U, F>(self, f: F) -> CancellableFuture<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let executor = self.bound_executor();
        self.chain_on(executor, move |outcome| outcome.and_then(f))
    }

    /// Moves the rest of the chain onto another executor.
    pub fn via(self, executor: ExecutorRef) -> CancellableFuture<T> {
        self.chain_on(executor, |outcome| outcome)
    }

    fn chain_on<U, F>(self, executor: ExecutorRef, step: F) -> CancellableFuture<U>
    where
        U: Send + 'static,
        F: FnOnce(Result<T>) -> Result<U> + Send + 'static,
    {
        let shared = Arc::new(Shared::new(Some(executor)));
        let derived = CancellableFuture::from_shared(shared.clone(), vec![self.handle.clone()]);
        let link: Weak<CancelNode> = Arc::downgrade(&derived.handle.node);
        let promise = Promise {
            shared: Some(shared),
        };

        self.shared.attach(Box::new(move |outcome| {
            // The antecedent has settled, so there is nothing left upstream to cancel.
            if let Some(node) = link.upgrade() {
                drop(node.take_upstream());
            }

            // A cancelled derived future never sees its continuation run.
            if promise.is_cancelled() {
                trace!("skipping continuation of cancelled future");
                return;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(move || step(outcome)))
                .unwrap_or_else(|payload| Err(Error::from_panic(payload)));

            let _ = promise.settle(result);
        }));

        derived
    }

    /// Cancels the operation and every future this one was chained from.
    ///
    /// Returns `true` only for the call that actually moved this future from
    /// pending to cancelled. Calling it again, or after the future settled,
    /// is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    /// Returns a handle that can cancel this future from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    /// Reports whether an outcome is available and not yet taken.
    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Takes the outcome if it is available, without blocking.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        self.shared.try_take()
    }

    /// Blocks the current thread until the outcome is available.
    pub fn wait(self) -> Result<T> {
        self.shared
            .wait(None)
            .unwrap_or(Err(Error::BrokenPromise))
    }

    /// Blocks for at most `timeout`.
    ///
    /// On expiry returns [`Error::TimedOut`] and leaves the future pending, so
    /// it can be waited on again or cancelled.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<T> {
        // A deadline past the end of time means waiting without one.
        let deadline = Instant::now().checked_add(timeout);

        self.shared
            .wait(deadline)
            .unwrap_or(Err(Error::TimedOut(timeout)))
    }

    /// Returns the executor continuations are dispatched to.
    pub fn executor(&self) -> ExecutorRef {
        self.bound_executor()
    }

    fn bound_executor(&self) -> ExecutorRef {
        self.shared.executor().unwrap_or_else(executor::inline)
    }

    // Makes cancelling this future also cancel `upstream`. Used by combinators
    // whose inputs do not form a linear chain.
    pub(crate) fn with_upstream(mut self, upstream: Vec<CancelHandle>) -> Self {
        let target = self.handle.node.target.clone();
        self.handle = CancelHandle::new(target, upstream);
        self
    }

    pub(crate) fn attach(self, continuation: impl FnOnce(Result<T>) + Send + 'static) {
        self.shared.attach(Box::new(continuation));
    }
}

impl<T: Send + 'static> Future for CancellableFuture<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.shared.poll(cx)
    }
}

impl<T: Send + 'static> fmt::Debug for CancellableFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellableFuture")
            .field("ready", &self.is_ready())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

struct CancelNode {
    target: Arc<dyn Cancel>,
    upstream: Mutex<Vec<CancelHandle>>,
}

impl CancelNode {
    fn upstream(&self) -> Vec<CancelHandle> {
        self.upstream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_upstream(&self) -> Vec<CancelHandle> {
        std::mem::take(&mut *self.upstream.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Drop for CancelNode {
    // Unlinks the chain iteratively so long chains never recurse.
    fn drop(&mut self) {
        let mut stack = std::mem::take(
            self.upstream
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );

        while let Some(handle) = stack.pop() {
            if let Some(mut node) = Arc::into_inner(handle.node) {
                stack.append(
                    node.upstream
                        .get_mut()
                        .unwrap_or_else(PoisonError::into_inner),
                );
            }
        }
    }
}

/// Cloneable, thread-safe handle that cancels a future and its antecedents.
#[derive(Clone)]
pub struct CancelHandle {
    node: Arc<CancelNode>,
}

impl CancelHandle {
    fn new(target: Arc<dyn Cancel>, upstream: Vec<CancelHandle>) -> Self {
        Self {
            node: Arc::new(CancelNode {
                target,
                upstream: Mutex::new(upstream),
            }),
        }
    }

    /// Cancels the target future, then walks the chain it was derived from.
    ///
    /// Returns whether the target itself transitioned to cancelled.
    pub fn cancel(&self) -> bool {
        let cancelled = self.node.target.cancel();

        // Iterative walk; chains built by repeated `then` can be long.
        let mut stack = self.node.upstream();
        while let Some(handle) = stack.pop() {
            handle.node.target.cancel();
            stack.extend(handle.node.upstream());
        }

        cancelled
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("upstream", &self.node.upstream().len())
            .finish()
    }
}
