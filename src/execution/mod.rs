//! # Execution Module
//!
//! The resilient execution façade and the pieces it composes: retry and backoff
//! settings, the delegation depth guard, fallback providers, counters, health, and
//! the per-stage executor registry.

pub mod depth_guard;
pub mod executor;
pub mod fallback;
pub mod health;
pub mod registry;
pub mod retry;
pub mod stats;

pub use depth_guard::{DepthGuard, DepthGuardConfig, ExecutionContext};
pub use executor::{ResilientExecutor, ResilientExecutorBuilder};
pub use fallback::{FallbackCategory, FallbackResultProvider, MarkedFallbackProvider};
pub use health::ExecutorHealth;
pub use registry::{ExecutorRegistry, PipelineStage};
pub use retry::{BackoffConfig, RetryConfig};
pub use stats::{ExecutionStats, StatsCollector};
