//! # Resilience Module
//!
//! Circuit breaker primitives that keep a failing external operation class (LLM
//! completions, vector search, rendering) from piling up failures across the
//! pipeline.
//!
//! ## Usage
//!
//! ```rust
//! use magazine_resilience::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     recovery_timeout: Duration::from_secs(30),
//!     half_open_attempts: 2,
//! };
//!
//! let breaker = CircuitBreaker::new("llm_completions", config);
//!
//! let result = breaker
//!     .execute(|| async { Ok::<_, String>("layout plan") })
//!     .await;
//! assert!(result.is_ok());
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod metrics;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use config::CircuitBreakerConfig;
pub use metrics::CircuitBreakerMetrics;
