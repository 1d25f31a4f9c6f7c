//! Fixed-size thread pool executor.
//!
//! Jobs are pushed onto a global injector. Each worker owns a FIFO deque, refills
//! it in batches from the injector and steals from its siblings when both are
//! empty. Idle workers park and are unparked one at a time on submission.

use crate::executor::{BuildError, Executor, ExecutorRef, Job};

use crossbeam_deque::{Injector, Steal, Stealer, Worker as LocalQueue};
use std::iter;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, Thread};
use tracing::{debug, trace, warn};

struct WorkerSlot {
    idle: AtomicBool,
    thread: OnceLock<Thread>,
}

struct PoolShared {
    injector: Injector<Job>,
    stealers: Vec<Stealer<Job>>,
    slots: Vec<WorkerSlot>,
    shutdown: AtomicBool,
    // Set once every worker has been joined.
    stopped: AtomicBool,
}

impl PoolShared {
    // Wakes a single parked worker, if any.
    fn notify_one(&self) {
        for slot in &self.slots {
            if slot
                .idle
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                if let Some(thread) = slot.thread.get() {
                    thread.unpark();
                }
                return;
            }
        }
    }

    /// Drops every job left in the injector and returns how many there were.
    ///
    /// Dropping a job drops the promise it captured, which breaks the
    /// corresponding future instead of leaving it pending forever.
    fn discard_queued(&self) -> usize {
        let mut discarded = 0;
        loop {
            match self.injector.steal() {
                Steal::Success(job) => {
                    drop(job);
                    discarded += 1;
                }
                Steal::Retry => continue,
                Steal::Empty => return discarded,
            }
        }
    }

    fn notify_all(&self) {
        for slot in &self.slots {
            if let Some(thread) = slot.thread.get() {
                thread.unpark();
            }
        }
    }
}

impl Executor for PoolShared {
    fn execute(&self, job: Job) {
        if self.shutdown.load(Ordering::SeqCst) {
            warn!("thread pool is shut down, dropping job");
            return;
        }

        self.injector.push(job);

        // Lost a race with `Drop`: no worker is left to take the job.
        if self.stopped.load(Ordering::SeqCst) {
            let discarded = self.discard_queued();
            warn!(discarded, "thread pool stopped, dropping job");
            return;
        }

        self.notify_one();
    }
}

/// An executor backed by a fixed set of worker threads.
///
/// Built with [`ThreadPoolBuilder`](crate::executor::ThreadPoolBuilder).
/// Dropping the pool runs every job already submitted and then joins the
/// workers.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub(crate) fn start(worker_threads: usize, name: &str) -> Result<Self, BuildError> {
        let locals: Vec<LocalQueue<Job>> = (0..worker_threads)
            .map(|_| LocalQueue::new_fifo())
            .collect();

        let shared = Arc::new(PoolShared {
            injector: Injector::new(),
            stealers: locals.iter().map(LocalQueue::stealer).collect(),
            slots: (0..worker_threads)
                .map(|_| WorkerSlot {
                    idle: AtomicBool::new(false),
                    thread: OnceLock::new(),
                })
                .collect(),
            shutdown: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        });

        let mut pool = ThreadPool {
            shared: shared.clone(),
            workers: Vec::with_capacity(worker_threads),
        };

        for (id, local) in locals.into_iter().enumerate() {
            let thread_name = format!("{name}-{id}");
            let worker = Worker {
                id,
                local,
                shared: shared.clone(),
            };

            // On failure `pool` is dropped, which stops the workers spawned so far.
            let handle = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || worker.run())
                .map_err(|source| BuildError::Spawn {
                    name: thread_name,
                    source,
                })?;

            pool.workers.push(handle);
        }

        debug!(workers = worker_threads, "thread pool started");
        Ok(pool)
    }

    /// Returns a handle that submits jobs to this pool.
    pub fn executor(&self) -> ExecutorRef {
        self.shared.clone()
    }

    pub fn worker_count(&self) -> usize {
        self.shared.slots.len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.notify_all();

        let current = thread::current().id();
        for handle in self.workers.drain(..) {
            // A job that drops its own pool cannot join itself.
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }

        // Jobs pushed after the workers last looked at the injector.
        self.shared.stopped.store(true, Ordering::SeqCst);
        let discarded = self.shared.discard_queued();

        debug!(discarded, "thread pool stopped");
    }
}

struct Worker {
    id: usize,
    local: LocalQueue<Job>,
    shared: Arc<PoolShared>,
}

impl Worker {
    fn run(self) {
        let slot = &self.shared.slots[self.id];
        let _ = slot.thread.set(thread::current());

        loop {
            if let Some(job) = self.find_job() {
                self.run_job(job);
                continue;
            }

            if self.shared.shutdown.load(Ordering::SeqCst) {
                break;
            }

            slot.idle.store(true, Ordering::SeqCst);

            // Re-check after advertising idleness so a concurrent submit is not missed.
            if let Some(job) = self.find_job() {
                slot.idle.store(false, Ordering::SeqCst);
                self.run_job(job);
                continue;
            }

            if self.shared.shutdown.load(Ordering::SeqCst) {
                break;
            }

            thread::park();
            slot.idle.store(false, Ordering::SeqCst);
        }

        trace!(worker = self.id, "worker exiting");
    }

    fn find_job(&self) -> Option<Job> {
        self.local.pop().or_else(|| {
            iter::repeat_with(|| {
                self.shared
                    .injector
                    .steal_batch_and_pop(&self.local)
                    .or_else(|| self.shared.stealers.iter().map(Stealer::steal).collect())
            })
            .find(|steal| !steal.is_retry())
            .and_then(|steal| steal.success())
        })
    }

    fn run_job(&self, job: Job) {
        trace!(worker = self.id, "running job");

        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!(worker = self.id, "job panicked");
        }
    }
}
