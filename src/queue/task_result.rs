//! Outcome recorded for a single work item.

use std::time::Duration;

use crate::error::TaskError;

/// Exactly one of these is stored per completed work item
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult<T> {
    Success(T),
    Failure(TaskError),
    /// The worker gave up after the item's own timeout
    Timeout(Duration),
}

impl<T> TaskResult<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskResult::Success(_) => "success",
            TaskResult::Failure(_) => "failure",
            TaskResult::Timeout(_) => "timeout",
        }
    }
}
