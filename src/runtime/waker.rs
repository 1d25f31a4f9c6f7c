//! Wakers used by the event loop.
//!
//! A [`Task`] waker re-queues the task's next poll as a job. The main-future
//! waker only raises the queue's notification flag, so `block_on` polls the
//! main future again instead of sleeping.

use crate::runtime::TaskQueue;
use crate::task::Task;

use futures::task::{self, ArcWake};
use std::sync::Arc;
use std::task::Waker;

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.schedule();
    }
}

/// Creates a waker that re-schedules `task` on its queue when woken.
pub(crate) fn make_waker(task: Arc<Task>) -> Waker {
    task::waker(task)
}

struct MainWaker {
    queue: Arc<TaskQueue>,
}

impl ArcWake for MainWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.queue.notify();
    }
}

/// Creates the waker handed to the future driven by `block_on`.
pub(crate) fn main_waker(queue: Arc<TaskQueue>) -> Waker {
    task::waker(Arc::new(MainWaker { queue }))
}
