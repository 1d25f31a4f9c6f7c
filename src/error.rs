//! Error type shared by promises, futures, executors and the courier.

use std::sync::Arc;
use std::time::Duration;

/// Outcome of every asynchronous operation in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a [`CancellableFuture`](crate::CancellableFuture) did not produce a value.
///
/// The enum is `Clone` so a single failure can be handed to every observer of
/// a combinator without re-creating it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The future, or a future it was chained from, was cancelled.
    #[error("operation was cancelled")]
    Cancelled,

    /// The producing side went away without settling the promise.
    #[error("promise dropped without a result")]
    BrokenPromise,

    /// `get_future` was called more than once on the same promise.
    #[error("future already retrieved from this promise")]
    FutureAlreadyRetrieved,

    /// A continuation or spawned task panicked.
    #[error("continuation panicked: {0}")]
    Panicked(String),

    /// A blocking wait gave up. The future itself is left untouched.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The producer rejected the promise with its own error.
    #[error(transparent)]
    Failed(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps a producer error.
    pub fn failed<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Failed(Arc::new(error))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns the producer error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Failed(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    // Turns a caught panic payload into a readable message.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };

        Error::Panicked(message)
    }
}
