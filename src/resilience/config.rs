//! # Circuit Breaker Configuration
//!
//! Thresholds for a single circuit breaker, with presets for the pipeline's
//! external operation classes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ConfigResult, ConfigurationError};
use crate::constants::circuit_breaker::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_HALF_OPEN_ATTEMPTS, DEFAULT_RECOVERY_TIMEOUT,
};

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,

    /// Time to wait in open state before attempting recovery
    #[serde(rename = "recovery_timeout_ms", with = "crate::config::duration_ms")]
    pub recovery_timeout: Duration,

    /// Number of successful calls in half-open state to close circuit
    pub half_open_attempts: u32,
}

impl CircuitBreakerConfig {
    /// LLM completions: slow and flaky, so tolerate a few failures and cool down longer
    pub fn for_llm() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_attempts: 2,
        }
    }

    /// Vector search: fast to fail, fast to recover
    pub fn for_vector_search() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(15),
            half_open_attempts: 2,
        }
    }

    /// Image analysis and rendering calls
    pub fn for_rendering() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(45),
            half_open_attempts: 1,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.failure_threshold",
                self.failure_threshold,
                "must be greater than 0",
            ));
        }

        if self.failure_threshold > 100 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.failure_threshold",
                self.failure_threshold,
                "should not exceed 100",
            ));
        }

        if self.recovery_timeout.is_zero() {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.recovery_timeout_ms",
                self.recovery_timeout.as_millis(),
                "must be greater than 0",
            ));
        }

        if self.half_open_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.half_open_attempts",
                self.half_open_attempts,
                "must be greater than 0",
            ));
        }

        if self.half_open_attempts > 50 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.half_open_attempts",
                self.half_open_attempts,
                "should not exceed 50",
            ));
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            half_open_attempts: DEFAULT_HALF_OPEN_ATTEMPTS,
        }
    }
}
