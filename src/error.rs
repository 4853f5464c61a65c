//! # Error Types
//!
//! Error kinds surfaced by the resilient execution core. Task bodies fail with
//! [`TaskError`]; the executor and queue report [`ResilienceError`].

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigurationError;

/// Failure reported by a task body
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The wrapped operation itself failed
    #[error("task failed: {0}")]
    Failed(String),

    /// The execution environment is unsafe to keep using concurrently
    #[error("delegation depth {depth} exceeds limit {limit}")]
    RecursionDepth { depth: usize, limit: usize },

    /// The task panicked inside a worker
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Convenience constructor for ordinary task failures
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }

    /// Whether this failure must bypass retries and fallbacks
    pub fn is_recursion_depth(&self) -> bool {
        matches!(self, TaskError::RecursionDepth { .. })
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(error: anyhow::Error) -> Self {
        TaskError::Failed(format!("{error:#}"))
    }
}

/// Errors raised by the resilient execution core
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// An attempt exceeded its allotted timeout
    #[error("operation '{task_id}' timed out after {timeout:?}")]
    Timeout { task_id: String, timeout: Duration },

    /// Rejected without execution because the breaker is open. The executor logs
    /// this and hands out a fallback instead of returning it.
    #[error("circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Delegation depth makes concurrent execution unsafe
    #[error("delegation depth {depth} exceeds limit {limit}")]
    RecursionDepth { depth: usize, limit: usize },

    /// The wrapped operation failed
    #[error("task error: {0}")]
    Task(TaskError),

    /// The work queue has been shut down
    #[error("work queue is shut down")]
    QueueShutdown,

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl ResilienceError {
    /// Whether the executor may retry after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResilienceError::Timeout { .. } | ResilienceError::Task(_)
        )
    }
}

impl From<TaskError> for ResilienceError {
    fn from(error: TaskError) -> Self {
        match error {
            TaskError::RecursionDepth { depth, limit } => {
                ResilienceError::RecursionDepth { depth, limit }
            }
            other => ResilienceError::Task(other),
        }
    }
}

pub type Result<T, E = ResilienceError> = std::result::Result<T, E>;
