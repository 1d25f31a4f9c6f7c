//! Event loop subsystem modules.

pub(crate) mod context;
mod core;
pub(crate) mod queue;
pub(crate) mod waker;
pub mod yield_now;

pub use context::{current_executor, spawn};
pub use core::EventLoop;
pub use yield_now::yield_now;

pub(crate) use context::enter_context;
pub(crate) use queue::TaskQueue;
pub(crate) use waker::{main_waker, make_waker};
