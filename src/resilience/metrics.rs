//! # Circuit Breaker Metrics
//!
//! Point-in-time snapshot of a breaker's counters for health checks and logging.

use serde::{Deserialize, Serialize};

use crate::resilience::CircuitState;

/// Metrics for a single circuit breaker instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Current circuit breaker state
    pub current_state: CircuitState,

    /// Consecutive failures counted toward the threshold
    pub failure_count: u32,

    /// Successes counted while half-open
    pub success_count: u32,

    /// Total outcomes recorded (successes plus failures)
    pub total_calls: u64,

    /// Total failures recorded
    pub total_failures: u64,

    /// Calls rejected because the circuit was open
    pub rejected_calls: u64,

    /// Number of Closed/HalfOpen -> Open transitions
    pub times_opened: u64,

    /// Milliseconds since the last recorded failure, if any
    pub millis_since_last_failure: Option<u64>,

    /// Calculated failure rate (0.0 to 1.0)
    pub failure_rate: f64,
}

impl CircuitBreakerMetrics {
    /// Create new metrics instance with zero values
    pub fn new() -> Self {
        Self {
            current_state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            total_calls: 0,
            total_failures: 0,
            rejected_calls: 0,
            times_opened: 0,
            millis_since_last_failure: None,
            failure_rate: 0.0,
        }
    }

    /// Check if metrics indicate healthy operation
    pub fn is_healthy(&self) -> bool {
        match self.current_state {
            CircuitState::Closed => self.failure_rate < 0.1,
            CircuitState::Open => false,
            CircuitState::HalfOpen => true,
        }
    }

    /// Get human-readable state description
    pub fn state_description(&self) -> &'static str {
        match self.current_state {
            CircuitState::Closed => "Healthy - Normal operation",
            CircuitState::Open => "Failing - Rejecting all calls",
            CircuitState::HalfOpen => "Recovering - Testing system health",
        }
    }

    /// Format metrics for logging
    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Calls: {} | Failures: {} | Rejected: {} | Failure rate: {:.1}%",
            self.state_description(),
            self.total_calls,
            self.total_failures,
            self.rejected_calls,
            self.failure_rate * 100.0
        )
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_health_calculation() {
        let mut metrics = CircuitBreakerMetrics::new();
        assert!(metrics.is_healthy());

        metrics.failure_rate = 0.15;
        assert!(!metrics.is_healthy());

        metrics.current_state = CircuitState::Open;
        metrics.failure_rate = 0.0;
        assert!(!metrics.is_healthy());

        metrics.current_state = CircuitState::HalfOpen;
        assert!(metrics.is_healthy());
    }

    #[test]
    fn test_summary_mentions_state() {
        let mut metrics = CircuitBreakerMetrics::new();
        metrics.current_state = CircuitState::Open;
        metrics.total_calls = 4;
        metrics.total_failures = 4;
        metrics.failure_rate = 1.0;

        let summary = metrics.format_summary();
        assert!(summary.starts_with("State: Failing"));
        assert!(summary.contains("Failure rate: 100.0%"));
    }
}
