//! Thread-safe job queue pumped by an [`EventLoop`](crate::EventLoop).
//!
//! Any thread may push; only the loop's thread pops. The loop sleeps on the
//! condvar when there is nothing to run and the main future has not been woken.

use crate::executor::{Executor, Job};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::warn;

struct QueueState {
    jobs: VecDeque<Job>,
    notified: bool,
}

/// A FIFO queue of jobs plus a wake flag for the loop's main future.
pub(crate) struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    closed: AtomicBool,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                notified: false,
            }),
            available: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues a job at the back of the queue.
    ///
    /// Jobs run in the order they were pushed. Wakes the loop if it is
    /// sleeping. A closed queue drops the job, which breaks any promise the
    /// job captured.
    ///
    /// # Arguments
    /// * `job` - The job to enqueue
    pub(crate) fn push(&self, job: Job) {
        if self.closed.load(Ordering::SeqCst) {
            warn!("event loop is closed, dropping job");
            return;
        }

        self.lock().jobs.push_back(job);
        self.available.notify_one();
    }

    /// Dequeues the next job.
    ///
    /// # Returns
    /// Some(job) if a job is queued, None if the queue is empty
    pub(crate) fn pop(&self) -> Option<Job> {
        self.lock().jobs.pop_front()
    }

    /// Number of jobs currently queued.
    pub(crate) fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    /// Marks the main future as woken.
    ///
    /// Called by the `block_on` waker. Wakes the loop so the main future is
    /// polled again even when no job is queued.
    pub(crate) fn notify(&self) {
        self.lock().notified = true;
        self.available.notify_one();
    }

    /// Clears and returns the main-future wake flag.
    ///
    /// # Returns
    /// `true` if the main future was woken since the last call
    pub(crate) fn take_notified(&self) -> bool {
        std::mem::take(&mut self.lock().notified)
    }

    /// Blocks until a job is queued or the main future is woken.
    pub(crate) fn wait(&self) {
        let mut state = self.lock();
        while state.jobs.is_empty() && !state.notified {
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Refuses further jobs and drops the ones still queued.
    ///
    /// # Returns
    /// The number of queued jobs that were dropped
    pub(crate) fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);

        let dropped: Vec<Job> = self.lock().jobs.drain(..).collect();
        // Dropping a job may drop a promise whose continuation pushes again,
        // so the lock must not be held here.
        let count = dropped.len();
        drop(dropped);
        count
    }
}

impl Executor for TaskQueue {
    fn execute(&self, job: Job) {
        self.push(job);
    }
}
