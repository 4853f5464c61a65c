#![allow(clippy::doc_markdown)] // Allow technical terms like JSX, LLM in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Magazine Resilience Core
//!
//! Resilient task execution for the magazine generation pipeline.
//!
//! ## Overview
//!
//! Pipeline stages (content planning, article writing, JSX generation, template and
//! layout analysis, vector search) call slow and unreliable external services. This
//! crate wraps those calls so a stage always gets *some* value back: the real result
//! when the service cooperates, or a deterministic, clearly marked fallback when it
//! does not.
//!
//! ## Architecture
//!
//! - [`resilience`] - circuit breaker per external operation class
//! - [`queue`] - bounded priority work queue drained by a worker pool
//! - [`execution`] - the [`ResilientExecutor`] façade, depth guard, fallbacks,
//!   counters, health and the per-stage [`ExecutorRegistry`]
//! - [`config`] - TOML configuration via the `config` crate
//! - [`logging`] - `tracing` subscriber setup and operation records
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use magazine_resilience::{MarkedFallbackProvider, ResilientExecutor, RetryConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), magazine_resilience::ResilienceError> {
//! let executor = ResilientExecutor::builder("content_planning")
//!     .fallback(MarkedFallbackProvider::new())
//!     .build()?;
//!
//! let retry = RetryConfig::new(2, Duration::from_secs(10), 2.0);
//! let plan = executor
//!     .submit(
//!         "content_plan",
//!         || async { Ok(serde_json::json!({ "sections": ["intro"] })) },
//!         &retry,
//!     )
//!     .await?;
//! assert_eq!(plan["sections"][0], "intro");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod execution;
pub mod logging;
pub mod queue;
pub mod resilience;

pub use config::{ConfigManager, ConfigurationError, ResilienceConfig};
pub use error::{ResilienceError, Result, TaskError};
pub use execution::{
    BackoffConfig, DepthGuard, DepthGuardConfig, ExecutionContext, ExecutionStats,
    ExecutorHealth, ExecutorRegistry, FallbackCategory, FallbackResultProvider,
    MarkedFallbackProvider, PipelineStage, ResilientExecutor, RetryConfig,
};
pub use logging::{init_structured_logging, LoggingConfig};
pub use queue::{TaskResult, WorkItem, WorkQueue, WorkQueueConfig};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
