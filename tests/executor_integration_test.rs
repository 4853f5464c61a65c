//! Integration tests for the resilient executor: retries, escalating timeouts,
//! breaker short-circuiting, degraded mode and real cancellation.

use magazine_resilience::{
    BackoffConfig, CircuitBreakerConfig, CircuitState, ConfigManager, DepthGuard,
    DepthGuardConfig, ExecutionContext, ExecutionStats, FallbackResultProvider,
    MarkedFallbackProvider, ResilienceError, ResilientExecutor, RetryConfig, TaskError,
    WorkQueueConfig,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn executor_with(
    breaker: CircuitBreakerConfig,
    depth_guard: Arc<DepthGuard>,
) -> ResilientExecutor<Value> {
    ResilientExecutor::builder("magazine_stage")
        .circuit_breaker_config(breaker)
        .queue_config(WorkQueueConfig {
            max_queue_size: 16,
            max_workers: 2,
            ..Default::default()
        })
        .backoff(BackoffConfig::fixed(
            Duration::from_millis(1),
            Duration::from_millis(50),
        ))
        .depth_guard(depth_guard)
        .fallback(MarkedFallbackProvider::new())
        .build()
        .expect("executor should build")
}

fn executor() -> ResilientExecutor<Value> {
    executor_with(
        CircuitBreakerConfig::default(),
        Arc::new(DepthGuard::default()),
    )
}

#[tokio::test]
async fn test_always_failing_task_returns_fallback_after_every_attempt() {
    let executor = executor();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let before = executor.stats();
    let value = executor
        .submit(
            "content_plan_generation",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<Value, _>(TaskError::failed("LLM returned malformed JSON")) }
            },
            &RetryConfig::new(2, Duration::from_secs(1), 2.0),
        )
        .await
        .expect("fallback is returned, not an error");

    let after = executor.stats();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(after.total_attempts - before.total_attempts, 3);
    assert_eq!(after.fallback_used - before.fallback_used, 1);
    assert_eq!(after.successful_executions, 0);
    assert_eq!(value, MarkedFallbackProvider::new().get("content_plan_generation"));
    assert_eq!(value["fallback_used"], json!(true));
    assert_eq!(value["sections"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_success_on_second_attempt_returns_real_value() {
    let executor = executor();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let value = executor
        .submit(
            "article_section_1",
            move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(TaskError::failed("rate limited"))
                    } else {
                        Ok(json!({ "title": "Kyoto in Autumn" }))
                    }
                }
            },
            &RetryConfig::new(2, Duration::from_secs(1), 2.0),
        )
        .await
        .unwrap();

    assert_eq!(value, json!({ "title": "Kyoto in Autumn" }));
    let stats = executor.stats();
    assert_eq!(stats.total_attempts, 2);
    assert_eq!(stats.successful_executions, 1);
    assert_eq!(stats.fallback_used, 0);
    assert_eq!(executor.circuit_breaker().metrics().failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeouts_escalate_by_backoff_factor() {
    let executor = executor();
    let starts = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let recorder = starts.clone();

    let began = Instant::now();
    let value = executor
        .submit(
            "layout_analysis",
            move || {
                recorder.lock().push(Instant::now());
                async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(json!({ "never": true }))
                }
            },
            &RetryConfig::new(2, Duration::from_secs(10), 2.0),
        )
        .await
        .unwrap();
    let elapsed = began.elapsed();

    assert_eq!(value["degraded"], json!(true));
    assert_eq!(executor.stats().timeout_occurred, 3);

    let starts = starts.lock().clone();
    assert_eq!(starts.len(), 3);
    let gaps: Vec<Duration> = starts.windows(2).map(|pair| pair[1] - pair[0]).collect();
    // Each gap is the attempt timeout plus a millisecond-scale backoff sleep
    assert!(gaps[0] >= Duration::from_secs(10) && gaps[0] < Duration::from_millis(10_100));
    assert!(gaps[1] >= Duration::from_secs(20) && gaps[1] < Duration::from_millis(20_100));
    assert!(elapsed >= Duration::from_secs(70) && elapsed < Duration::from_millis(70_100));
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_task_is_cancelled() {
    let executor = executor();
    let side_effect = Arc::new(AtomicBool::new(false));
    let flag = side_effect.clone();

    let value = executor
        .submit(
            "image_caption",
            move || {
                let flag = flag.clone();
                async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(json!({ "caption": "late" }))
                }
            },
            &RetryConfig::new(0, Duration::from_secs(1), 2.0),
        )
        .await
        .unwrap();
    assert_eq!(value["category"], json!("image_analysis"));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!side_effect.load(Ordering::SeqCst));
    assert_eq!(executor.queue().in_flight(), 0);
    assert_eq!(executor.queue().stored_results(), 0);
}

#[tokio::test]
async fn test_latched_depth_guard_runs_single_direct_attempt() {
    let guard = Arc::new(DepthGuard::new(DepthGuardConfig {
        stack_limit: 20,
        safety_buffer: 5,
    }));
    let executor = executor_with(CircuitBreakerConfig::default(), guard.clone());
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    // A deep call latches degraded mode
    let deep = (0..16).fold(ExecutionContext::root(), |ctx, _| ctx.child());
    assert_eq!(deep.depth(), 16);

    let value = executor
        .execute_with_resilience(
            &deep,
            "jsx_section_4",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<Value, _>(TaskError::failed("generator crashed")) }
            },
            &RetryConfig::new(3, Duration::from_secs(1), 2.0),
        )
        .await
        .unwrap();

    assert!(guard.is_degraded());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(value["jsx_components"], json!([]));
    assert_eq!(executor.queue().total_enqueued(), 0);
    assert_eq!(executor.circuit_breaker().metrics().total_calls, 0);
    assert_eq!(
        executor.stats(),
        ExecutionStats {
            total_attempts: 1,
            fallback_used: 1,
            ..Default::default()
        }
    );

    // Shallow calls stay degraded
    let ok = executor
        .submit("jsx_section_5", || async { Ok(json!("<Hero />")) }, &RetryConfig::default())
        .await
        .unwrap();
    assert_eq!(ok, json!("<Hero />"));
    assert_eq!(executor.queue().total_enqueued(), 0);
}

#[tokio::test]
async fn test_latch_set_between_retries_skips_queue_for_remaining_attempts() {
    let guard = Arc::new(DepthGuard::new(DepthGuardConfig {
        stack_limit: 20,
        safety_buffer: 5,
    }));
    let executor = executor_with(CircuitBreakerConfig::default(), guard.clone());
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let latch = guard.clone();

    let value = executor
        .submit(
            "article_section_2",
            move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                // A nested stage latches degraded mode while this attempt runs
                if attempt == 0 {
                    latch.check_and_maybe_flag(&ExecutionContext::at_depth(19));
                }
                async move {
                    if attempt == 0 {
                        Err(TaskError::failed("upstream reset"))
                    } else {
                        Ok(json!({ "body": "direct" }))
                    }
                }
            },
            &RetryConfig::new(2, Duration::from_secs(1), 2.0),
        )
        .await
        .unwrap();

    assert!(guard.is_degraded());
    assert_eq!(value, json!({ "body": "direct" }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(executor.queue().total_enqueued(), 1);
    assert_eq!(executor.circuit_breaker().metrics().total_calls, 1);
    let stats = executor.stats();
    assert_eq!(stats.total_attempts, 2);
    assert_eq!(stats.successful_executions, 1);
    assert_eq!(stats.fallback_used, 0);
}

#[tokio::test]
async fn test_recursion_depth_is_never_retried_or_masked() {
    let guard = Arc::new(DepthGuard::new(DepthGuardConfig {
        stack_limit: 20,
        safety_buffer: 5,
    }));
    let executor = executor_with(CircuitBreakerConfig::default(), guard);

    let from_task = executor
        .submit(
            "template_analysis",
            || async { Err::<Value, _>(TaskError::RecursionDepth { depth: 19, limit: 20 }) },
            &RetryConfig::new(3, Duration::from_secs(1), 2.0),
        )
        .await;
    assert!(matches!(from_task, Err(ResilienceError::RecursionDepth { .. })));
    assert_eq!(executor.stats().total_attempts, 1);

    let pre_emptive = executor
        .execute_with_resilience(
            &ExecutionContext::at_depth(20),
            "template_analysis",
            || async { Ok(json!({})) },
            &RetryConfig::default(),
        )
        .await;
    assert!(matches!(
        pre_emptive,
        Err(ResilienceError::RecursionDepth { depth: 20, limit: 20 })
    ));
    assert_eq!(executor.stats().fallback_used, 0);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_short_circuits_and_recovers() {
    let executor = executor_with(
        CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            half_open_attempts: 1,
        },
        Arc::new(DepthGuard::default()),
    );
    let retry = RetryConfig::new(2, Duration::from_secs(1), 2.0);

    executor
        .submit(
            "vector_lookup",
            || async { Err::<Value, _>(TaskError::failed("index offline")) },
            &retry,
        )
        .await
        .unwrap();
    assert_eq!(executor.circuit_breaker().state(), CircuitState::Open);

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let short_circuited = executor
        .submit(
            "vector_lookup",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!({ "results": [1] })) }
            },
            &retry,
        )
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(short_circuited["results"], json!([]));
    assert_eq!(executor.stats().circuit_breaker_triggered, 1);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(executor.circuit_breaker().state(), CircuitState::HalfOpen);

    let recovered = executor
        .submit("vector_lookup", || async { Ok(json!({ "results": [7] })) }, &retry)
        .await
        .unwrap();
    assert_eq!(recovered, json!({ "results": [7] }));
    assert_eq!(executor.circuit_breaker().state(), CircuitState::Closed);
    assert_eq!(executor.circuit_breaker().metrics().failure_count, 0);
}

#[tokio::test]
async fn test_executor_from_shipped_configuration_file() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/resilience.toml");
    let manager = ConfigManager::load_from_file(&path).expect("sample configuration loads");
    let config = manager.config();
    assert_eq!(config.work_queue.max_workers, 4);
    assert_eq!(
        config.circuit_breaker.as_ref().map(|breaker| breaker.half_open_attempts),
        Some(2)
    );

    let guard = Arc::new(DepthGuard::new(config.depth_guard.clone()));
    let executor: ResilientExecutor<Value> = ResilientExecutor::from_config(
        "content_creation",
        config,
        guard,
        Arc::new(MarkedFallbackProvider::new()),
    )
    .unwrap();

    let value = executor
        .submit("article_intro", || async { Ok(json!("Welcome")) }, &config.retry)
        .await
        .unwrap();
    assert_eq!(value, json!("Welcome"));

    let debug = executor.debug_state();
    assert_eq!(debug["circuit_breaker_state"], json!("closed"));
    assert_eq!(debug["degraded_mode"], json!(false));
    executor.shutdown().await;
}
