//! Executor owning one dedicated thread.

use crate::executor::{BuildError, Executor, ExecutorRef, Job};

use crossbeam_channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

enum Command {
    Run(Job),
    Shutdown,
}

struct SingleShared {
    sender: Sender<Command>,
    closed: AtomicBool,
}

impl Executor for SingleShared {
    fn execute(&self, job: Job) {
        if self.closed.load(Ordering::SeqCst) {
            warn!("single-thread executor is shut down, dropping job");
            return;
        }

        if self.sender.send(Command::Run(job)).is_err() {
            warn!("single-thread executor thread is gone, dropping job");
        }
    }
}

/// Runs every job on one named thread, in submission order.
///
/// Dropping the executor runs the jobs already submitted, then joins the thread.
pub struct SingleThreadExecutor {
    shared: Arc<SingleShared>,
    thread: Option<JoinHandle<()>>,
}

impl SingleThreadExecutor {
    /// Starts the executor thread with the given name.
    pub fn new(name: impl Into<String>) -> Result<Self, BuildError> {
        let name = name.into();
        let (sender, receiver) = crossbeam_channel::unbounded();

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(receiver))
            .map_err(|source| BuildError::Spawn { name, source })?;

        debug!("single-thread executor started");

        Ok(Self {
            shared: Arc::new(SingleShared {
                sender,
                closed: AtomicBool::new(false),
            }),
            thread: Some(thread),
        })
    }

    /// Returns a handle that submits jobs to this thread.
    pub fn executor(&self) -> ExecutorRef {
        self.shared.clone()
    }
}

impl Drop for SingleThreadExecutor {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        let _ = self.shared.sender.send(Command::Shutdown);

        if let Some(handle) = self.thread.take()
            && handle.thread().id() != thread::current().id()
        {
            let _ = handle.join();
        }

        debug!("single-thread executor stopped");
    }
}

fn run(receiver: Receiver<Command>) {
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Run(job) => run_job(job),
            Command::Shutdown => {
                // Jobs that raced with shutdown still get to run.
                while let Ok(Command::Run(job)) = receiver.try_recv() {
                    run_job(job);
                }
                break;
            }
        }
    }
}

fn run_job(job: Job) {
    trace!("running job");

    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        warn!("job panicked");
    }
}
