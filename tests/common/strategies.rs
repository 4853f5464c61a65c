//! Proptest strategies for queue and retry properties

use proptest::prelude::*;

/// Priorities for a burst of submissions, with plenty of ties
pub fn priority_sequence_strategy() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(-3i32..=3, 0..64)
}

/// Queue capacities small enough to force eviction regularly
pub fn capacity_strategy() -> impl Strategy<Value = usize> {
    1usize..=12
}

/// (max_retries, initial_timeout_ms, backoff_factor)
pub fn retry_settings_strategy() -> impl Strategy<Value = (u32, u64, f64)> {
    (0u32..6, 1u64..120_000, 1.0f64..4.0)
}
