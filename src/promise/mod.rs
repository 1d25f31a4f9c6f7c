//! Promises, cancellable futures and the combinators built on them.
//!
//! A [`Promise`] is the write side of a one-shot result. Its
//! [`CancellableFuture`] is the read side: it can be chained with
//! [`then`](CancellableFuture::then), cancelled, awaited, or waited on.
//!
//! ```ignore
//! use pledge::{Promise, executor};
//!
//! let promise = Promise::new();
//! let future = promise.get_future(executor::inline())?;
//!
//! let doubled = future.map(|v: i32| v * 2);
//! promise.resolve(21)?;
//!
//! assert_eq!(doubled.wait()?, 42);
//! ```

mod combinators;
mod future;
mod shared;

pub use combinators::{failed, ready, when_all, when_any};
pub use future::{CancelHandle, CancellableFuture};

use crate::error::{Error, Result};
use crate::executor::ExecutorRef;
use shared::Shared;

use std::fmt;
use std::sync::Arc;

/// Write-once slot for an asynchronous result.
///
/// Settling consumes the promise, so a value can be written at most once.
/// Dropping a promise without settling it resolves its future to
/// [`Error::BrokenPromise`].
pub struct Promise<T: Send + 'static> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T: Send + 'static> Promise<T> {
    /// Creates an unsettled promise with no executor bound yet.
    pub fn new() -> Self {
        Self {
            shared: Some(Arc::new(Shared::new(None))),
        }
    }

    /// Creates a promise and retrieves its future in one step.
    pub fn pair(executor: ExecutorRef) -> (Self, CancellableFuture<T>) {
        let shared = Arc::new(Shared::new(Some(executor)));
        let future = CancellableFuture::from_shared(shared.clone(), Vec::new());

        (
            Self {
                shared: Some(shared),
            },
            future,
        )
    }

    /// Returns the future for this promise, bound to `executor`.
    ///
    /// Every continuation chained on the returned future runs on `executor`.
    /// Only one future can be retrieved; later calls fail with
    /// [`Error::FutureAlreadyRetrieved`].
    pub fn get_future(&self, executor: ExecutorRef) -> Result<CancellableFuture<T>> {
        let shared = self.shared()?;

        if !shared.bind(executor) {
            return Err(Error::FutureAlreadyRetrieved);
        }

        Ok(CancellableFuture::from_shared(shared.clone(), Vec::new()))
    }

    /// Fulfils the promise with a value.
    ///
    /// Fails with [`Error::Cancelled`] if the consumer cancelled first; the
    /// value is dropped in that case.
    pub fn resolve(self, value: T) -> Result<()> {
        self.settle(Ok(value))
    }

    /// Fails the promise.
    pub fn reject(self, error: Error) -> Result<()> {
        self.settle(Err(error))
    }

    /// Settles the promise with either outcome.
    pub fn settle(mut self, outcome: Result<T>) -> Result<()> {
        let shared = self.shared.take().ok_or(Error::BrokenPromise)?;

        if shared.complete(outcome) {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }

    /// Reports whether the consumer has cancelled.
    ///
    /// Long-running producers should check this between steps.
    pub fn is_cancelled(&self) -> bool {
        self.shared
            .as_ref()
            .is_some_and(|shared| shared.is_cancelled())
    }

    /// Registers `hook` to run when the future is cancelled.
    ///
    /// The hook runs on the cancelling thread. If the future is already
    /// cancelled it runs immediately; if the promise is settled first it is
    /// dropped without running.
    pub fn on_cancel<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(shared) = &self.shared {
            shared.on_cancel(Box::new(hook));
        }
    }

    fn shared(&self) -> Result<&Arc<Shared<T>>> {
        self.shared.as_ref().ok_or(Error::BrokenPromise)
    }
}

impl<T: Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.complete(Err(Error::BrokenPromise));
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
