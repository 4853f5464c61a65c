//! # Queue Module
//!
//! Bounded priority work queue and the items and results that flow through it.

pub mod task_result;
pub mod work_item;
pub mod work_queue;

pub use task_result::TaskResult;
pub use work_item::{task_fn, TaskFn, TaskFuture, WorkItem};
pub use work_queue::{QueueSnapshot, WorkQueue, WorkQueueConfig};
