//! Message-sending service exposing a future-based API.
//!
//! [`Courier::send_message`] returns a [`CancellableFuture`] of the delivery
//! [`Receipt`]. Callers chain continuations on it, block on it, await it, or
//! cancel it. The classical listener style is still available through
//! [`Courier::send_message_with_listener`], implemented on top of the future.
//!
//! Messages are handed to a [`Transport`] on a dedicated delivery thread, so
//! user continuations never run on it unless the callback executor is inline.

mod builder;
mod listener;
mod message;
mod transport;

pub use builder::CourierBuilder;
pub use listener::{MessageListener, listen};
pub use message::{Message, MessageId, Receipt};
pub use transport::{Transport, TransportError};

use crate::error::Error;
use crate::executor::{BuildError, ExecutorRef};
use crate::promise::{CancelHandle, CancellableFuture, Promise};
use builder::DeliveryPolicy;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Errors raised by the courier itself, as opposed to its transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CourierError {
    #[error("delivery queue is full")]
    QueueFull,

    #[error("courier is shut down")]
    Closed,
}

/// The essay-style library interface: one asynchronous operation, returned as
/// a cancellable future.
pub trait MessageService: Send + Sync {
    fn send_message(&self, message: Message) -> CancellableFuture<Receipt>;
}

struct Envelope {
    message: Message,
    promise: Promise<Receipt>,
}

/// Delivers messages through a [`Transport`] on a background thread.
///
/// Dropping the courier delivers the messages already queued, then joins the
/// delivery thread.
pub struct Courier {
    sender: Option<Sender<Envelope>>,
    callback_executor: ExecutorRef,
    worker: Option<JoinHandle<()>>,
}

impl Courier {
    pub fn builder() -> CourierBuilder {
        CourierBuilder::new()
    }

    pub(crate) fn start<T: Transport>(
        transport: T,
        policy: DeliveryPolicy,
        callback_executor: ExecutorRef,
        queue_capacity: usize,
        thread_name: String,
    ) -> Result<Self, BuildError> {
        let (sender, receiver) = crossbeam_channel::bounded(queue_capacity);

        let worker = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run(transport, policy, receiver))
            .map_err(|source| BuildError::Spawn {
                name: thread_name,
                source,
            })?;

        debug!(queue_capacity, "courier started");

        Ok(Self {
            sender: Some(sender),
            callback_executor,
            worker: Some(worker),
        })
    }

    /// Queues `message` for delivery.
    ///
    /// The returned future resolves with the receipt, or fails with the
    /// transport's error wrapped in [`Error::Failed`]. Cancelling it before
    /// delivery starts guarantees the message is never delivered.
    pub fn send_message(&self, message: Message) -> CancellableFuture<Receipt> {
        let (promise, future) = Promise::pair(self.callback_executor.clone());
        let id = message.id();

        let Some(sender) = &self.sender else {
            let _ = promise.reject(Error::failed(CourierError::Closed));
            return future;
        };

        match sender.try_send(Envelope { message, promise }) {
            Ok(()) => trace!(%id, "message queued"),
            Err(TrySendError::Full(envelope)) => {
                warn!(%id, "delivery queue full");
                let _ = envelope.promise.reject(Error::failed(CourierError::QueueFull));
            }
            Err(TrySendError::Disconnected(envelope)) => {
                let _ = envelope.promise.reject(Error::failed(CourierError::Closed));
            }
        }

        future
    }

    /// Sends `message` and reports its outcome to `listener`.
    pub fn send_message_with_listener(
        &self,
        message: Message,
        listener: Arc<dyn MessageListener>,
    ) -> CancelHandle {
        let id = message.id();
        listen(id, self.send_message(message), listener)
    }
}

impl MessageService for Courier {
    fn send_message(&self, message: Message) -> CancellableFuture<Receipt> {
        Courier::send_message(self, message)
    }
}

impl Drop for Courier {
    fn drop(&mut self) {
        // Disconnecting the channel lets the worker finish the backlog and exit.
        drop(self.sender.take());

        if let Some(worker) = self.worker.take()
            && worker.thread().id() != thread::current().id()
        {
            let _ = worker.join();
        }

        debug!("courier stopped");
    }
}

fn run<T: Transport>(transport: T, policy: DeliveryPolicy, receiver: Receiver<Envelope>) {
    for envelope in receiver.iter() {
        deliver(&transport, &policy, envelope);
    }
}

fn deliver<T: Transport>(transport: &T, policy: &DeliveryPolicy, envelope: Envelope) {
    let Envelope { message, promise } = envelope;
    let id = message.id();

    // Wakes the backoff sleep as soon as the caller cancels.
    let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(1);
    promise.on_cancel(move || {
        let _ = cancel_tx.try_send(());
    });

    let mut backoff = policy.retry_backoff;

    for attempt in 1..=policy.max_attempts {
        if promise.is_cancelled() {
            debug!(%id, attempt, "message cancelled before delivery");
            return;
        }

        match transport.deliver(&message) {
            Ok(status) => {
                trace!(%id, status, attempt, "message delivered");
                let receipt = Receipt {
                    message_id: id,
                    status,
                    attempts: attempt,
                };
                if promise.resolve(receipt).is_err() {
                    debug!(%id, "message delivered after cancellation");
                }
                return;
            }
            Err(error) if error.retryable && attempt < policy.max_attempts => {
                debug!(%id, attempt, reason = %error.reason, "delivery failed, retrying");

                match cancel_rx.recv_timeout(backoff) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!(%id, "message cancelled during backoff");
                        return;
                    }
                }
                backoff = backoff.saturating_mul(2);
            }
            Err(error) => {
                warn!(%id, attempt, reason = %error.reason, "delivery failed");
                let _ = promise.reject(Error::failed(error));
                return;
            }
        }
    }
}
