//! # Work Items
//!
//! One schedulable unit of work with its retry bookkeeping. Items are immutable once
//! built; a retry is a fresh item derived with [`WorkItem::next_attempt`], so a
//! worker never races a caller over shared retry counters.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::TaskError;

/// Boxed future produced by one invocation of a task
pub type TaskFuture<T> = BoxFuture<'static, Result<T, TaskError>>;

/// Zero-argument task body, shareable across retries
pub type TaskFn<T> = Arc<dyn Fn() -> TaskFuture<T> + Send + Sync>;

/// Erase a closure returning a future into a [`TaskFn`]
pub fn task_fn<T, F, Fut>(task: F) -> TaskFn<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    Arc::new(move || task().boxed())
}

/// Unit of work owned by the queue between submission and result retrieval
pub struct WorkItem<T> {
    id: String,
    task: TaskFn<T>,
    priority: i32,
    max_retries: u32,
    current_retry: u32,
    timeout: Duration,
    created_at: DateTime<Utc>,
}

impl<T> WorkItem<T> {
    /// Build the first attempt for a task
    pub fn new(
        id: impl Into<String>,
        task: TaskFn<T>,
        priority: i32,
        max_retries: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            task,
            priority,
            max_retries,
            current_retry: 0,
            timeout,
            created_at: Utc::now(),
        }
    }

    /// Unique per-submission id derived from a logical task id
    pub fn attempt_id(task_id: &str) -> String {
        format!("{task_id}#{}", Uuid::new_v4().simple())
    }

    /// Derive the follow-up attempt with a fresh id and a (usually longer) timeout.
    /// Returns `None` once the retry budget is spent.
    pub fn next_attempt(&self, timeout: Duration) -> Option<Self> {
        if self.current_retry >= self.max_retries {
            return None;
        }

        Some(Self {
            id: Self::attempt_id(self.task_id()),
            task: Arc::clone(&self.task),
            priority: self.priority,
            max_retries: self.max_retries,
            current_retry: self.current_retry + 1,
            timeout,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Logical task id (the submission id without its attempt suffix)
    pub fn task_id(&self) -> &str {
        self.id
            .rsplit_once('#')
            .map(|(task_id, _)| task_id)
            .unwrap_or(&self.id)
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn current_retry(&self) -> u32 {
        self.current_retry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Invoke the task body once
    pub(crate) fn run(&self) -> TaskFuture<T> {
        (self.task)()
    }
}

impl<T> fmt::Debug for WorkItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("max_retries", &self.max_retries)
            .field("current_retry", &self.current_retry)
            .field("timeout", &self.timeout)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_task() -> TaskFn<u32> {
        task_fn(|| async { Ok(7) })
    }

    #[test]
    fn test_next_attempt_increments_retry_and_keeps_task_id() {
        let first = WorkItem::new(
            WorkItem::<u32>::attempt_id("jsx_section_1"),
            constant_task(),
            2,
            2,
            Duration::from_secs(10),
        );
        assert_eq!(first.current_retry(), 0);
        assert_eq!(first.task_id(), "jsx_section_1");

        let second = first.next_attempt(Duration::from_secs(20)).unwrap();
        assert_eq!(second.current_retry(), 1);
        assert_eq!(second.timeout(), Duration::from_secs(20));
        assert_eq!(second.priority(), 2);
        assert_eq!(second.task_id(), "jsx_section_1");
        assert_ne!(second.id(), first.id());

        let third = second.next_attempt(Duration::from_secs(40)).unwrap();
        assert_eq!(third.current_retry(), 2);
        assert!(third.next_attempt(Duration::from_secs(80)).is_none());
    }

    #[tokio::test]
    async fn test_task_can_run_more_than_once() {
        let item = WorkItem::new("content_plan", constant_task(), 0, 1, Duration::from_secs(1));
        assert_eq!(item.run().await, Ok(7));
        assert_eq!(item.run().await, Ok(7));
    }
}
