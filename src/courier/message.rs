use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonically assigned message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    fn next() -> Self {
        MessageId(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// An outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    recipient: String,
    body: Vec<u8>,
}

impl Message {
    /// Creates a message with a fresh id.
    pub fn new(recipient: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: MessageId::next(),
            recipient: recipient.into(),
            body: body.into(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Result of a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub message_id: MessageId,
    /// Status code reported by the transport.
    pub status: u16,
    /// Number of delivery attempts, including the successful one.
    pub attempts: u32,
}

impl Receipt {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let first = Message::new("a", "x");
        let second = Message::new("b", "y");

        assert!(second.id() > first.id());
        assert_eq!(first.id().to_string(), format!("msg-{}", first.id().get()));
    }

    #[test]
    fn receipt_success_range() {
        let id = Message::new("a", "").id();
        let ok = Receipt {
            message_id: id,
            status: 204,
            attempts: 1,
        };
        let rejected = Receipt { status: 451, ..ok };

        assert!(ok.is_success());
        assert!(!rejected.is_success());
    }
}
