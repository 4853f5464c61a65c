//! # Executor Health
//!
//! Coarse health for one resilient executor, derived from its breaker state, the
//! shared degraded-mode latch, and how often it has had to hand out fallbacks.

use serde::{Deserialize, Serialize};

use crate::resilience::CircuitState;

use super::stats::ExecutionStats;

/// Fallback ratio above which an executor is reported degraded
pub const DEGRADED_FALLBACK_RATIO: f64 = 0.25;

/// Health state of a resilient executor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ExecutorHealth {
    /// Breaker closed, no degraded mode, fallbacks rare
    Healthy {
        successful_executions: u64,
        fallback_ratio: f64,
    },
    /// Still serving results, but some of them are fallbacks
    Degraded {
        reason: String,
        fallback_ratio: f64,
    },
    /// Every call currently short-circuits to a fallback
    Unhealthy { reason: String },
}

impl ExecutorHealth {
    /// Evaluate health from the executor's current signals
    pub fn evaluate(state: CircuitState, degraded_mode: bool, stats: &ExecutionStats) -> Self {
        let fallback_ratio = stats.fallback_ratio();

        match state {
            CircuitState::Open => ExecutorHealth::Unhealthy {
                reason: "circuit breaker open".to_string(),
            },
            CircuitState::HalfOpen => ExecutorHealth::Degraded {
                reason: "circuit breaker probing recovery".to_string(),
                fallback_ratio,
            },
            CircuitState::Closed if degraded_mode => ExecutorHealth::Degraded {
                reason: "delegation depth degraded mode".to_string(),
                fallback_ratio,
            },
            CircuitState::Closed if fallback_ratio > DEGRADED_FALLBACK_RATIO => {
                ExecutorHealth::Degraded {
                    reason: "high fallback ratio".to_string(),
                    fallback_ratio,
                }
            }
            CircuitState::Closed => ExecutorHealth::Healthy {
                successful_executions: stats.successful_executions,
                fallback_ratio,
            },
        }
    }

    /// Check if the executor still returns results (real or fallback)
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            ExecutorHealth::Healthy { .. } | ExecutorHealth::Degraded { .. }
        )
    }

    pub fn needs_attention(&self) -> bool {
        !matches!(self, ExecutorHealth::Healthy { .. })
    }

    /// Get a human-readable description of the health state
    pub fn description(&self) -> String {
        match self {
            ExecutorHealth::Healthy {
                successful_executions,
                fallback_ratio,
            } => format!(
                "Healthy - {successful_executions} successful executions, {:.1}% fallbacks",
                fallback_ratio * 100.0
            ),
            ExecutorHealth::Degraded {
                reason,
                fallback_ratio,
            } => format!(
                "Degraded - {} (fallbacks: {:.1}%)",
                reason,
                fallback_ratio * 100.0
            ),
            ExecutorHealth::Unhealthy { reason } => format!("Unhealthy - {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_breaker_is_unhealthy() {
        let health = ExecutorHealth::evaluate(CircuitState::Open, false, &ExecutionStats::default());
        assert!(!health.is_operational());
        assert_eq!(health.description(), "Unhealthy - circuit breaker open");
    }

    #[test]
    fn test_degraded_mode_and_fallback_ratio() {
        let latched =
            ExecutorHealth::evaluate(CircuitState::Closed, true, &ExecutionStats::default());
        assert!(matches!(latched, ExecutorHealth::Degraded { .. }));
        assert!(latched.is_operational());

        let stats = ExecutionStats {
            successful_executions: 1,
            fallback_used: 1,
            ..Default::default()
        };
        let noisy = ExecutorHealth::evaluate(CircuitState::Closed, false, &stats);
        assert_eq!(noisy.description(), "Degraded - high fallback ratio (fallbacks: 50.0%)");
    }

    #[test]
    fn test_closed_breaker_with_successes_is_healthy() {
        let stats = ExecutionStats {
            successful_executions: 10,
            ..Default::default()
        };
        let health = ExecutorHealth::evaluate(CircuitState::Closed, false, &stats);
        assert!(!health.needs_attention());
    }
}
