//! # Work Queue
//!
//! Bounded, priority-ordered queue drained by a fixed pool of tokio workers.
//!
//! ## Behaviour
//!
//! - **Ordering**: lowest `priority` value first, FIFO among equal priorities.
//! - **Backpressure by eviction**: enqueue never blocks or fails; at capacity the
//!   oldest pending (not yet started) item is dropped and never produces a result.
//! - **One result per item**: each executed item records exactly one
//!   [`TaskResult`], consumed once by [`WorkQueue::get_result`] or purged after the
//!   result TTL.
//! - **Real cancellation**: a timed-out or cancelled item has its future dropped and
//!   its `CancellationToken` fired; cancelled items never store a result.

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigResult, ConfigurationError};
use crate::constants::queue::{
    DEFAULT_MAX_QUEUE_SIZE, DEFAULT_MAX_WORKERS, DEFAULT_RESULT_POLL_INTERVAL, DEFAULT_RESULT_TTL,
};
use crate::error::{ResilienceError, Result, TaskError};

use super::task_result::TaskResult;
use super::work_item::WorkItem;

/// Queue capacity and worker pool sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkQueueConfig {
    /// Pending items kept before the oldest is evicted
    pub max_queue_size: usize,

    /// Concurrent workers draining the queue
    pub max_workers: usize,

    /// Unconsumed results are purged after this long
    #[serde(rename = "result_ttl_ms", with = "crate::config::duration_ms")]
    pub result_ttl: Duration,

    /// Longest single sleep while waiting for a result
    #[serde(rename = "result_poll_interval_ms", with = "crate::config::duration_ms")]
    pub result_poll_interval: Duration,
}

impl WorkQueueConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_queue_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "work_queue.max_queue_size",
                self.max_queue_size,
                "must be greater than 0",
            ));
        }

        if self.max_workers == 0 {
            return Err(ConfigurationError::invalid_value(
                "work_queue.max_workers",
                self.max_workers,
                "must be greater than 0",
            ));
        }

        if self.result_poll_interval.is_zero() {
            return Err(ConfigurationError::invalid_value(
                "work_queue.result_poll_interval_ms",
                0,
                "must be greater than 0",
            ));
        }

        if self.result_ttl.is_zero() {
            return Err(ConfigurationError::invalid_value(
                "work_queue.result_ttl_ms",
                0,
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for WorkQueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            result_ttl: DEFAULT_RESULT_TTL,
            result_poll_interval: DEFAULT_RESULT_POLL_INTERVAL,
        }
    }
}

/// Point-in-time queue counters for debug and health endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub pending: usize,
    pub in_flight: usize,
    pub stored_results: usize,
    pub total_enqueued: u64,
    pub total_completed: u64,
    pub total_evicted: u64,
    pub total_cancelled: u64,
    pub workers_started: bool,
}

struct StoredResult<T> {
    result: TaskResult<T>,
    stored_at: Instant,
}

struct QueueState<T> {
    /// Dispatch order: (priority, arrival sequence)
    pending: BTreeMap<(i32, u64), WorkItem<T>>,
    /// Arrival order for eviction: sequence -> priority
    arrival: BTreeMap<u64, i32>,
    next_seq: u64,
    in_flight: HashMap<String, CancellationToken>,
    results: HashMap<String, StoredResult<T>>,
    total_enqueued: u64,
    total_completed: u64,
    total_evicted: u64,
    total_cancelled: u64,
}

impl<T> QueueState<T> {
    fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            arrival: BTreeMap::new(),
            next_seq: 0,
            in_flight: HashMap::new(),
            results: HashMap::new(),
            total_enqueued: 0,
            total_completed: 0,
            total_evicted: 0,
            total_cancelled: 0,
        }
    }

    fn evict_oldest(&mut self) -> Option<WorkItem<T>> {
        let (seq, priority) = self.arrival.pop_first()?;
        let evicted = self.pending.remove(&(priority, seq));
        if evicted.is_some() {
            self.total_evicted += 1;
        }
        evicted
    }

    fn remove_pending(&mut self, id: &str) -> Option<WorkItem<T>> {
        let key = self
            .pending
            .iter()
            .find(|(_, item)| item.id() == id)
            .map(|(key, _)| *key)?;
        self.arrival.remove(&key.1);
        self.pending.remove(&key)
    }

    fn purge_expired(&mut self, ttl: Duration) {
        let before = self.results.len();
        self.results.retain(|_, stored| stored.stored_at.elapsed() < ttl);
        let purged = before - self.results.len();
        if purged > 0 {
            debug!(purged, "Purged unconsumed results past their TTL");
        }
    }
}

struct QueueShared<T> {
    name: String,
    config: WorkQueueConfig,
    state: Mutex<QueueState<T>>,
    item_available: Notify,
    result_ready: Notify,
    shutdown: CancellationToken,
}

impl<T: Send + 'static> QueueShared<T> {
    fn take_next(&self) -> Option<(WorkItem<T>, CancellationToken)> {
        let mut state = self.state.lock();
        let ((_, seq), item) = state.pending.pop_first()?;
        state.arrival.remove(&seq);

        let token = self.shutdown.child_token();
        state
            .in_flight
            .insert(item.id().to_string(), token.clone());
        Some((item, token))
    }

    fn complete(&self, id: &str, outcome: Option<TaskResult<T>>) {
        let mut state = self.state.lock();

        // Cancelled items were already removed from in_flight by `cancel`/`clear`
        if state.in_flight.remove(id).is_none() {
            debug!(queue = %self.name, item_id = %id, "Discarding outcome of cancelled item");
            return;
        }

        let Some(result) = outcome else {
            return;
        };

        state.total_completed += 1;
        state.purge_expired(self.config.result_ttl);
        state.results.insert(
            id.to_string(),
            StoredResult {
                result,
                stored_at: Instant::now(),
            },
        );
        drop(state);

        self.result_ready.notify_waiters();
    }
}

/// Bounded priority queue plus the worker pool that drains it
pub struct WorkQueue<T: Send + 'static> {
    shared: Arc<QueueShared<T>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Send + 'static> WorkQueue<T> {
    /// Create a queue. Workers are spawned on first use inside a tokio runtime.
    pub fn new(name: impl Into<String>, config: WorkQueueConfig) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                name: name.into(),
                config,
                state: Mutex::new(QueueState::new()),
                item_available: Notify::new(),
                result_ready: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker pool if it is not running yet. Returns whether workers are running.
    pub fn start(&self) -> bool {
        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return true;
        }
        if self.shared.shutdown.is_cancelled() {
            return false;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(queue = %self.shared.name, "No tokio runtime available, workers not started");
            return false;
        };

        for worker_index in 0..self.shared.config.max_workers {
            let shared = Arc::clone(&self.shared);
            workers.push(handle.spawn(worker_loop(shared, worker_index)));
        }

        info!(
            queue = %self.shared.name,
            max_workers = self.shared.config.max_workers,
            max_queue_size = self.shared.config.max_queue_size,
            "Work queue workers started"
        );
        true
    }

    /// Add an item. At capacity the oldest pending item is evicted to make room.
    /// Returns `false` only when the queue has been shut down.
    pub fn enqueue(&self, item: WorkItem<T>) -> bool {
        if self.shared.shutdown.is_cancelled() {
            warn!(queue = %self.shared.name, item_id = %item.id(), "Enqueue after shutdown rejected");
            return false;
        }
        self.start();

        {
            let mut state = self.shared.state.lock();

            while state.pending.len() >= self.shared.config.max_queue_size {
                match state.evict_oldest() {
                    Some(evicted) => warn!(
                        queue = %self.shared.name,
                        evicted_id = %evicted.id(),
                        max_queue_size = self.shared.config.max_queue_size,
                        "Queue full, evicted oldest pending item"
                    ),
                    None => break,
                }
            }

            let seq = state.next_seq;
            state.next_seq += 1;
            state.arrival.insert(seq, item.priority());
            debug!(
                queue = %self.shared.name,
                item_id = %item.id(),
                priority = item.priority(),
                retry = item.current_retry(),
                "Work item enqueued"
            );
            state.pending.insert((item.priority(), seq), item);
            state.total_enqueued += 1;
        }

        self.shared.item_available.notify_one();
        true
    }

    /// Wait until the result for `id` exists, consuming it, or fail with
    /// [`ResilienceError::Timeout`] once `wait_timeout` elapses.
    pub async fn get_result(
        &self,
        id: &str,
        wait_timeout: Duration,
    ) -> Result<TaskResult<T>> {
        let deadline = Instant::now() + wait_timeout;

        loop {
            let notified = self.shared.result_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = self.take_result(id) {
                return Ok(result);
            }

            if self.shared.shutdown.is_cancelled() {
                return Err(ResilienceError::QueueShutdown);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ResilienceError::Timeout {
                    task_id: id.to_string(),
                    timeout: wait_timeout,
                });
            }

            let wait = (deadline - now).min(self.shared.config.result_poll_interval);
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Whether a result for `id` is stored and not yet consumed
    pub fn has_result(&self, id: &str) -> bool {
        self.shared.state.lock().results.contains_key(id)
    }

    /// Drop a pending item or cancel a running one, and discard any stored result
    pub fn cancel(&self, id: &str) -> bool {
        let mut state = self.shared.state.lock();

        let cancelled = if state.remove_pending(id).is_some() {
            true
        } else if let Some(token) = state.in_flight.remove(id) {
            token.cancel();
            true
        } else {
            false
        };

        let discarded = state.results.remove(id).is_some();
        if cancelled {
            state.total_cancelled += 1;
            debug!(queue = %self.shared.name, item_id = %id, "Work item cancelled");
        }
        cancelled || discarded
    }

    /// Drop pending items, cancel running ones, and forget stored results.
    /// Returns the number of pending plus running items removed.
    pub fn clear(&self) -> usize {
        let mut state = self.shared.state.lock();
        let pending = state.pending.len();
        state.pending.clear();
        state.arrival.clear();

        let running = state.in_flight.len();
        for (_, token) in state.in_flight.drain() {
            token.cancel();
        }
        state.results.clear();
        state.total_cancelled += (pending + running) as u64;

        info!(queue = %self.shared.name, pending, running, "Work queue cleared");
        pending + running
    }

    /// Stop all workers and cancel running items
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        self.shared.result_ready.notify_waiters();

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(queue = %self.shared.name, error = %e, "Worker ended with error");
            }
        }

        info!(queue = %self.shared.name, "Work queue shut down");
    }

    /// Pending item ids in dispatch order
    pub fn pending_ids(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .pending
            .values()
            .map(|item| item.id().to_string())
            .collect()
    }

    /// Number of pending (not yet started) items
    pub fn len(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight.len()
    }

    /// Results recorded but not yet consumed
    pub fn stored_results(&self) -> usize {
        self.shared.state.lock().results.len()
    }

    pub fn evicted_count(&self) -> u64 {
        self.shared.state.lock().total_evicted
    }

    pub fn total_enqueued(&self) -> u64 {
        self.shared.state.lock().total_enqueued
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let workers_started = !self.workers.lock().is_empty();
        let state = self.shared.state.lock();
        QueueSnapshot {
            pending: state.pending.len(),
            in_flight: state.in_flight.len(),
            stored_results: state.results.len(),
            total_enqueued: state.total_enqueued,
            total_completed: state.total_completed,
            total_evicted: state.total_evicted,
            total_cancelled: state.total_cancelled,
            workers_started,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &WorkQueueConfig {
        &self.shared.config
    }

    fn take_result(&self, id: &str) -> Option<TaskResult<T>> {
        let mut state = self.shared.state.lock();
        state.purge_expired(self.shared.config.result_ttl);
        state.results.remove(id).map(|stored| stored.result)
    }
}

impl<T: Send + 'static> Drop for WorkQueue<T> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl<T: Send + 'static> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("name", &self.shared.name)
            .field("config", &self.shared.config)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

async fn worker_loop<T: Send + 'static>(shared: Arc<QueueShared<T>>, worker_index: usize) {
    debug!(queue = %shared.name, worker_index, "Worker started");

    while !shared.shutdown.is_cancelled() {
        let (item, token) = match shared.take_next() {
            Some(next) => next,
            None => {
                tokio::select! {
                    _ = shared.shutdown.cancelled() => {}
                    _ = shared.item_available.notified() => {}
                }
                continue;
            }
        };

        let outcome = run_item(&item, &token).await;
        if let Some(result) = &outcome {
            debug!(
                queue = %shared.name,
                worker_index,
                item_id = %item.id(),
                outcome = result.kind(),
                "Work item finished"
            );
        }
        shared.complete(item.id(), outcome);
    }

    debug!(queue = %shared.name, worker_index, "Worker stopped");
}

/// Run one item under its timeout. `None` means it was cancelled.
async fn run_item<T: Send + 'static>(
    item: &WorkItem<T>,
    token: &CancellationToken,
) -> Option<TaskResult<T>> {
    let guarded = AssertUnwindSafe(async { item.run().await }).catch_unwind();

    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        outcome = tokio::time::timeout(item.timeout(), guarded) => Some(match outcome {
            Ok(Ok(Ok(value))) => TaskResult::Success(value),
            Ok(Ok(Err(error))) => TaskResult::Failure(error),
            Ok(Err(panic)) => TaskResult::Failure(TaskError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => TaskResult::Timeout(item.timeout()),
        }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
