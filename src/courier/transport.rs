use crate::courier::Message;

/// Failure reported by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("delivery failed: {reason}")]
pub struct TransportError {
    /// Whether the courier may try again.
    pub retryable: bool,
    pub reason: String,
}

impl TransportError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self {
            retryable: true,
            reason: reason.into(),
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self {
            retryable: false,
            reason: reason.into(),
        }
    }
}

/// Moves a message to its recipient.
///
/// Called on the courier's delivery thread; blocking is expected. Returns the
/// status code reported by the remote side.
pub trait Transport: Send + Sync + 'static {
    fn deliver(&self, message: &Message) -> Result<u16, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&Message) -> Result<u16, TransportError> + Send + Sync + 'static,
{
    fn deliver(&self, message: &Message) -> Result<u16, TransportError> {
        self(message)
    }
}
