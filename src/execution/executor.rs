//! # Resilient Executor
//!
//! Composes a [`CircuitBreaker`], a [`WorkQueue`], the shared [`DepthGuard`] and a
//! [`FallbackResultProvider`] into one "run this task reliably" operation.
//!
//! ## Flow per call
//!
//! 1. Contexts at or beyond the hard depth limit are rejected with
//!    [`ResilienceError::RecursionDepth`].
//! 2. In degraded mode the task runs once, directly on the caller's task, without the
//!    queue or the breaker. Any failure other than `RecursionDepth` yields a fallback.
//! 3. Otherwise each attempt first re-checks the shared latch (set: finish with one
//!    direct attempt as in step 2), then checks the breaker (open: fallback), enqueues a
//!    [`WorkItem`] and waits `initial_timeout * backoff_factor^attempt` for its result.
//!    Failures and timeouts are recorded on the breaker; timed-out items are cancelled
//!    in the queue. Between attempts the executor sleeps per its [`BackoffConfig`].
//! 4. Once retries are exhausted the fallback is returned.
//!
//! Only `RecursionDepth` (and a shut-down queue) ever surface as errors.

use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ConfigurationError, ResilienceConfig};
use crate::constants::debug_keys;
use crate::error::{ResilienceError, Result, TaskError};
use crate::logging::{log_error, log_execution_operation};
use crate::queue::{task_fn, TaskFn, TaskResult, WorkItem, WorkQueue, WorkQueueConfig};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};

use super::depth_guard::{DepthGuard, ExecutionContext};
use super::fallback::FallbackResultProvider;
use super::health::ExecutorHealth;
use super::retry::{BackoffConfig, RetryConfig};
use super::stats::{ExecutionStats, StatsCollector};

/// Retry, breaker, queue and fallback handling for one pipeline stage
pub struct ResilientExecutor<T: Send + 'static> {
    name: String,
    circuit_breaker: Arc<CircuitBreaker>,
    queue: Arc<WorkQueue<T>>,
    depth_guard: Arc<DepthGuard>,
    fallback: Arc<dyn FallbackResultProvider<T>>,
    backoff: BackoffConfig,
    stats: StatsCollector,
}

impl<T: Send + 'static> ResilientExecutor<T> {
    /// Assemble an executor from already-built components
    pub fn with_components(
        name: impl Into<String>,
        circuit_breaker: Arc<CircuitBreaker>,
        queue: Arc<WorkQueue<T>>,
        depth_guard: Arc<DepthGuard>,
        fallback: Arc<dyn FallbackResultProvider<T>>,
        backoff: BackoffConfig,
    ) -> Self {
        let name = name.into();
        info!(
            component = %name,
            max_queue_size = queue.config().max_queue_size,
            max_workers = queue.config().max_workers,
            degraded_threshold = depth_guard.threshold(),
            "🛡️ Resilient executor initialized"
        );

        Self {
            name,
            circuit_breaker,
            queue,
            depth_guard,
            fallback,
            backoff,
            stats: StatsCollector::new(),
        }
    }

    pub fn builder(name: impl Into<String>) -> ResilientExecutorBuilder<T> {
        ResilientExecutorBuilder::new(name)
    }

    /// Build an executor from a loaded configuration, sharing `depth_guard`
    pub fn from_config(
        name: impl Into<String>,
        config: &ResilienceConfig,
        depth_guard: Arc<DepthGuard>,
        fallback: Arc<dyn FallbackResultProvider<T>>,
    ) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        let breaker_config = config.circuit_breaker.clone().unwrap_or_default();

        Ok(Self::with_components(
            name.clone(),
            Arc::new(CircuitBreaker::new(name.clone(), breaker_config)),
            Arc::new(WorkQueue::new(name, config.work_queue.clone())),
            depth_guard,
            fallback,
            config.backoff.clone(),
        ))
    }

    /// Run `task` at the root depth
    pub async fn submit<F, Fut>(
        &self,
        task_id: &str,
        task: F,
        retry: &RetryConfig,
    ) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.execute_with_resilience(&ExecutionContext::root(), task_id, task, retry)
            .await
    }

    /// Run `task` with breaker protection, retries, escalating timeouts and fallback.
    pub async fn execute_with_resilience<F, Fut>(
        &self,
        ctx: &ExecutionContext,
        task_id: &str,
        task: F,
        retry: &RetryConfig,
    ) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        if let Err(error) = self.depth_guard.check_hard_limit(ctx) {
            log_error(
                &self.name,
                "execute_with_resilience",
                &error.to_string(),
                Some(task_id),
            );
            return Err(error);
        }

        let task = task_fn(task);

        if self.depth_guard.check_and_maybe_flag(ctx) {
            return self.run_degraded(task_id, task, retry).await;
        }

        let mut next_item = Some(WorkItem::new(
            WorkItem::<T>::attempt_id(task_id),
            Arc::clone(&task),
            retry.priority,
            retry.max_retries,
            retry.attempt_timeout(0),
        ));

        for attempt in 0..=retry.max_retries {
            // Another stage may have latched degraded mode while this call was retrying
            if attempt > 0 && self.depth_guard.is_degraded() {
                return self.run_degraded(task_id, task, retry).await;
            }

            if !self.circuit_breaker.allows_call() {
                self.stats.record_circuit_breaker_triggered();
                let rejected = ResilienceError::CircuitOpen {
                    component: self.name.clone(),
                };
                return Ok(self.hand_out_fallback(task_id, &rejected.to_string()));
            }

            let Some(item) = next_item.take() else {
                break;
            };
            next_item = item.next_attempt(retry.attempt_timeout(attempt + 1));

            let item_id = item.id().to_string();
            let timeout = item.timeout();
            self.stats.record_attempt();
            debug!(
                component = %self.name,
                task_id = %task_id,
                attempt,
                timeout_ms = timeout.as_millis() as u64,
                "Submitting attempt"
            );

            if !self.queue.enqueue(item) {
                return Err(ResilienceError::QueueShutdown);
            }

            match self.queue.get_result(&item_id, timeout).await {
                Ok(TaskResult::Success(value)) => {
                    self.circuit_breaker.record_success();
                    self.stats.record_success();
                    log_execution_operation(
                        "execute_with_resilience",
                        &self.name,
                        task_id,
                        Some(attempt),
                        "success",
                        None,
                    );
                    return Ok(value);
                }
                Ok(TaskResult::Failure(error)) if error.is_recursion_depth() => {
                    log_error(
                        &self.name,
                        "execute_with_resilience",
                        &error.to_string(),
                        Some(task_id),
                    );
                    return Err(error.into());
                }
                Ok(TaskResult::Failure(error)) => {
                    self.circuit_breaker.record_failure();
                    warn!(
                        component = %self.name,
                        task_id = %task_id,
                        attempt,
                        error = %error,
                        "Attempt failed"
                    );
                }
                Ok(TaskResult::Timeout(_)) | Err(ResilienceError::Timeout { .. }) => {
                    self.queue.cancel(&item_id);
                    self.circuit_breaker.record_failure();
                    self.stats.record_timeout();
                    warn!(
                        component = %self.name,
                        task_id = %task_id,
                        attempt,
                        timeout_ms = timeout.as_millis() as u64,
                        "⏱️ Attempt timed out"
                    );
                }
                Err(error) => return Err(error),
            }

            if attempt < retry.max_retries {
                let delay = self.backoff.delay_for(attempt, retry.backoff_factor);
                debug!(
                    component = %self.name,
                    task_id = %task_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Ok(self.hand_out_fallback(task_id, "retries exhausted"))
    }

    /// Single direct attempt used once the depth guard has latched
    async fn run_degraded(
        &self,
        task_id: &str,
        task: TaskFn<T>,
        retry: &RetryConfig,
    ) -> Result<T> {
        self.stats.record_attempt();
        debug!(component = %self.name, task_id = %task_id, "Running task directly in degraded mode");

        let guarded = AssertUnwindSafe(task()).catch_unwind();
        match tokio::time::timeout(retry.initial_timeout, guarded).await {
            Ok(Ok(Ok(value))) => {
                self.stats.record_success();
                Ok(value)
            }
            Ok(Ok(Err(error))) if error.is_recursion_depth() => Err(error.into()),
            Ok(Ok(Err(error))) => {
                warn!(component = %self.name, task_id = %task_id, error = %error, "Degraded attempt failed");
                Ok(self.hand_out_fallback(task_id, "degraded attempt failed"))
            }
            Ok(Err(_)) => {
                warn!(component = %self.name, task_id = %task_id, "Degraded attempt panicked");
                Ok(self.hand_out_fallback(task_id, "degraded attempt panicked"))
            }
            Err(_) => {
                self.stats.record_timeout();
                Ok(self.hand_out_fallback(task_id, "degraded attempt timed out"))
            }
        }
    }

    fn hand_out_fallback(&self, task_id: &str, reason: &str) -> T {
        self.stats.record_fallback();
        log_execution_operation(
            "fallback",
            &self.name,
            task_id,
            None,
            "degraded",
            Some(reason),
        );
        self.fallback.get(task_id)
    }

    pub fn stats(&self) -> ExecutionStats {
        self.stats.snapshot()
    }

    /// Reset breaker and counters and drop queued work. The depth guard latch is kept.
    pub fn reset_state(&self) {
        self.circuit_breaker.reset();
        self.stats.reset();
        let dropped = self.queue.clear();
        info!(
            component = %self.name,
            dropped_items = dropped,
            degraded_mode = self.depth_guard.is_degraded(),
            "Resilient executor state reset"
        );
    }

    /// Flat view of breaker, queue, guard and counters for debugging
    pub fn debug_state(&self) -> HashMap<String, Value> {
        let metrics = self.circuit_breaker.metrics();
        let queue = self.queue.snapshot();

        let mut state = HashMap::new();
        state.insert(
            debug_keys::COMPONENT.to_string(),
            Value::from(self.name.clone()),
        );
        state.insert(
            debug_keys::CIRCUIT_STATE.to_string(),
            Value::from(metrics.current_state.as_str()),
        );
        state.insert(
            debug_keys::FAILURE_COUNT.to_string(),
            Value::from(metrics.failure_count),
        );
        state.insert(debug_keys::QUEUE_DEPTH.to_string(), Value::from(queue.pending));
        state.insert(debug_keys::IN_FLIGHT.to_string(), Value::from(queue.in_flight));
        state.insert(
            debug_keys::STORED_RESULTS.to_string(),
            Value::from(queue.stored_results),
        );
        state.insert(debug_keys::EVICTED.to_string(), Value::from(queue.total_evicted));
        state.insert(
            debug_keys::DEGRADED_MODE.to_string(),
            Value::from(self.depth_guard.is_degraded()),
        );
        state.insert(
            debug_keys::STATS.to_string(),
            serde_json::to_value(self.stats()).unwrap_or(Value::Null),
        );
        state
    }

    pub fn health(&self) -> ExecutorHealth {
        ExecutorHealth::evaluate(
            self.circuit_breaker.state(),
            self.depth_guard.is_degraded(),
            &self.stats(),
        )
    }

    /// Stop the worker pool
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    pub fn queue(&self) -> &Arc<WorkQueue<T>> {
        &self.queue
    }

    pub fn depth_guard(&self) -> &Arc<DepthGuard> {
        &self.depth_guard
    }
}

impl<T: Send + 'static> std::fmt::Debug for ResilientExecutor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientExecutor")
            .field("name", &self.name)
            .field("circuit_breaker", &self.circuit_breaker.state())
            .field("queue", &self.queue.snapshot())
            .field("degraded", &self.depth_guard.is_degraded())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Step-by-step construction with defaults for anything not supplied
pub struct ResilientExecutorBuilder<T: Send + 'static> {
    name: String,
    circuit_breaker_config: CircuitBreakerConfig,
    queue_config: WorkQueueConfig,
    backoff: BackoffConfig,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    queue: Option<Arc<WorkQueue<T>>>,
    depth_guard: Option<Arc<DepthGuard>>,
    fallback: Option<Arc<dyn FallbackResultProvider<T>>>,
}

impl<T: Send + 'static> ResilientExecutorBuilder<T> {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            circuit_breaker_config: CircuitBreakerConfig::default(),
            queue_config: WorkQueueConfig::default(),
            backoff: BackoffConfig::default(),
            circuit_breaker: None,
            queue: None,
            depth_guard: None,
            fallback: None,
        }
    }

    pub fn circuit_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker_config = config;
        self
    }

    pub fn queue_config(mut self, config: WorkQueueConfig) -> Self {
        self.queue_config = config;
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Use an existing breaker instead of building one from config
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Use an existing queue instead of building one from config
    pub fn queue(mut self, queue: Arc<WorkQueue<T>>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn depth_guard(mut self, guard: Arc<DepthGuard>) -> Self {
        self.depth_guard = Some(guard);
        self
    }

    pub fn fallback(mut self, provider: impl FallbackResultProvider<T> + 'static) -> Self {
        self.fallback = Some(Arc::new(provider));
        self
    }

    pub fn shared_fallback(mut self, provider: Arc<dyn FallbackResultProvider<T>>) -> Self {
        self.fallback = Some(provider);
        self
    }

    pub fn build(self) -> Result<ResilientExecutor<T>> {
        let fallback = self.fallback.ok_or_else(|| {
            ConfigurationError::invalid_value(
                "fallback",
                "none",
                "a fallback provider is required",
            )
        })?;

        let circuit_breaker = match self.circuit_breaker {
            Some(breaker) => breaker,
            None => {
                self.circuit_breaker_config.validate()?;
                Arc::new(CircuitBreaker::new(
                    self.name.clone(),
                    self.circuit_breaker_config,
                ))
            }
        };

        let queue = match self.queue {
            Some(queue) => queue,
            None => {
                self.queue_config.validate()?;
                Arc::new(WorkQueue::new(self.name.clone(), self.queue_config))
            }
        };

        self.backoff.validate()?;

        Ok(ResilientExecutor::with_components(
            self.name,
            circuit_breaker,
            queue,
            self.depth_guard.unwrap_or_default(),
            fallback,
            self.backoff,
        ))
    }
}
