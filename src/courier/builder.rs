//! Fluent builder for [`Courier`] configuration.

use crate::courier::{Courier, Transport};
use crate::executor::{self, BuildError, ExecutorRef};

use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);
const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_THREAD_NAME: &str = "pledge-courier";

/// Delivery settings shared with the courier's worker thread.
#[derive(Debug, Clone)]
pub(crate) struct DeliveryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) retry_backoff: Duration,
}

/// Builder for [`Courier`] instances.
///
/// # Example
/// ```ignore
/// let courier = Courier::builder()
///     .callback_executor(pool.executor())
///     .max_attempts(5)
///     .retry_backoff(Duration::from_millis(10))
///     .build(transport)?;
/// ```
pub struct CourierBuilder {
    callback_executor: ExecutorRef,
    max_attempts: u32,
    retry_backoff: Duration,
    queue_capacity: usize,
    thread_name: String,
}

impl Default for CourierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CourierBuilder {
    pub fn new() -> Self {
        Self {
            callback_executor: executor::inline(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Executor that runs continuations of the futures returned by
    /// [`Courier::send_message`]. Defaults to inline, i.e. the delivery thread.
    pub fn callback_executor(mut self, executor: ExecutorRef) -> Self {
        self.callback_executor = executor;
        self
    }

    /// Total delivery attempts per message. Values below 1 are raised to 1.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Delay before the first retry; doubled after each further failure.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Maximum number of messages waiting for delivery.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Starts the delivery thread.
    pub fn build<T: Transport>(self, transport: T) -> Result<Courier, BuildError> {
        if self.queue_capacity == 0 {
            return Err(BuildError::InvalidConfig("queue_capacity must be greater than 0"));
        }

        let policy = DeliveryPolicy {
            max_attempts: self.max_attempts,
            retry_backoff: self.retry_backoff,
        };

        Courier::start(
            transport,
            policy,
            self.callback_executor,
            self.queue_capacity,
            self.thread_name,
        )
    }
}
