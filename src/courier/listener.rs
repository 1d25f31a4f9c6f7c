//! Listener-style callbacks layered over the future API.

use crate::courier::{MessageId, Receipt};
use crate::error::Error;
use crate::promise::{CancelHandle, CancellableFuture};

use std::sync::Arc;

/// Classical per-outcome callbacks for a sent message.
///
/// Exactly one method is called per message, on the courier's callback
/// executor.
pub trait MessageListener: Send + Sync + 'static {
    fn on_message_sent(&self, receipt: &Receipt);

    fn on_message_failed(&self, id: MessageId, error: &Error);

    fn on_message_cancelled(&self, id: MessageId);
}

/// Routes the outcome of `future` to `listener`.
///
/// Returns a handle that cancels the delivery; the listener then receives
/// `on_message_cancelled`.
pub fn listen(
    id: MessageId,
    future: CancellableFuture<Receipt>,
    listener: Arc<dyn MessageListener>,
) -> CancelHandle {
    let handle = future.cancel_handle();

    let _ = future.then(move |outcome| match outcome {
        Ok(receipt) => listener.on_message_sent(&receipt),
        Err(Error::Cancelled) => listener.on_message_cancelled(id),
        Err(error) => listener.on_message_failed(id, &error),
    });

    handle
}
