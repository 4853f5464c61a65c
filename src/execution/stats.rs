//! Execution counters kept per executor.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of an executor's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total_attempts: u64,
    pub successful_executions: u64,
    pub fallback_used: u64,
    pub circuit_breaker_triggered: u64,
    pub timeout_occurred: u64,
}

impl ExecutionStats {
    /// Share of finished executions that ended in a fallback
    pub fn fallback_ratio(&self) -> f64 {
        let finished = self.successful_executions + self.fallback_used;
        if finished == 0 {
            0.0
        } else {
            self.fallback_used as f64 / finished as f64
        }
    }

    /// Sum of two snapshots, used for registry-wide totals
    pub fn merge(&self, other: &ExecutionStats) -> ExecutionStats {
        ExecutionStats {
            total_attempts: self.total_attempts + other.total_attempts,
            successful_executions: self.successful_executions + other.successful_executions,
            fallback_used: self.fallback_used + other.fallback_used,
            circuit_breaker_triggered: self.circuit_breaker_triggered
                + other.circuit_breaker_triggered,
            timeout_occurred: self.timeout_occurred + other.timeout_occurred,
        }
    }
}

/// Lock-free counters behind [`ExecutionStats`]
#[derive(Debug, Default)]
pub struct StatsCollector {
    total_attempts: AtomicU64,
    successful_executions: AtomicU64,
    fallback_used: AtomicU64,
    circuit_breaker_triggered: AtomicU64,
    timeout_occurred: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successful_executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallback_used.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_circuit_breaker_triggered(&self) {
        self.circuit_breaker_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeout_occurred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ExecutionStats {
        ExecutionStats {
            total_attempts: self.total_attempts.load(Ordering::Relaxed),
            successful_executions: self.successful_executions.load(Ordering::Relaxed),
            fallback_used: self.fallback_used.load(Ordering::Relaxed),
            circuit_breaker_triggered: self.circuit_breaker_triggered.load(Ordering::Relaxed),
            timeout_occurred: self.timeout_occurred.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.total_attempts.store(0, Ordering::Relaxed);
        self.successful_executions.store(0, Ordering::Relaxed);
        self.fallback_used.store(0, Ordering::Relaxed);
        self.circuit_breaker_triggered.store(0, Ordering::Relaxed);
        self.timeout_occurred.store(0, Ordering::Relaxed);
    }
}
