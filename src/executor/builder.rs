//! Fluent builder for [`ThreadPool`] construction.

use crate::executor::ThreadPool;

use std::num::NonZeroUsize;

const DEFAULT_THREAD_NAME: &str = "pledge-worker";

/// Errors raised while building an executor or a courier.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("worker_threads must be greater than 0")]
    ZeroWorkers,

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("failed to spawn thread `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Builder for [`ThreadPool`] instances.
///
/// # Example
/// ```ignore
/// let pool = ThreadPoolBuilder::new()
///     .worker_threads(4)
///     .thread_name("io-callbacks")
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct ThreadPoolBuilder {
    worker_threads: usize,
    thread_name: String,
}

impl Default for ThreadPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadPoolBuilder {
    /// Creates a builder sized to the machine's available parallelism.
    pub fn new() -> Self {
        let worker_threads = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);

        Self {
            worker_threads,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Sets the number of worker threads. Zero is rejected by [`Self::build`].
    pub fn worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n;
        self
    }

    /// Sets the thread name prefix. Workers are named `{prefix}-{index}`.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Spawns the workers and returns the pool.
    pub fn build(self) -> Result<ThreadPool, BuildError> {
        if self.worker_threads == 0 {
            return Err(BuildError::ZeroWorkers);
        }

        ThreadPool::start(self.worker_threads, &self.thread_name)
    }
}
