//! # Constants
//!
//! Default tuning values shared by configuration defaults and stage presets.

use std::time::Duration;

/// Work queue defaults
pub mod queue {
    use super::Duration;

    pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;
    pub const DEFAULT_MAX_WORKERS: usize = 4;
    /// Upper bound on a single result-wait sleep
    pub const DEFAULT_RESULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
    /// Unconsumed results are purged after this long
    pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(300);
}

/// Circuit breaker defaults
pub mod circuit_breaker {
    use super::Duration;

    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_HALF_OPEN_ATTEMPTS: u32 = 3;
}

/// Retry and backoff defaults
pub mod retry {
    use super::Duration;

    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_INITIAL_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
    pub const DEFAULT_PRIORITY: i32 = 0;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
    pub const DEFAULT_JITTER_MAX_PERCENTAGE: f64 = 0.1;
}

/// Delegation depth defaults
pub mod depth {
    pub const DEFAULT_STACK_LIMIT: usize = 50;
    pub const DEFAULT_SAFETY_BUFFER: usize = 10;
}

/// Keys exposed by `ResilientExecutor::debug_state`
pub mod debug_keys {
    pub const COMPONENT: &str = "component";
    pub const CIRCUIT_STATE: &str = "circuit_breaker_state";
    pub const FAILURE_COUNT: &str = "failure_count";
    pub const QUEUE_DEPTH: &str = "queue_depth";
    pub const IN_FLIGHT: &str = "in_flight";
    pub const STORED_RESULTS: &str = "stored_results";
    pub const EVICTED: &str = "evicted_items";
    pub const DEGRADED_MODE: &str = "degraded_mode";
    pub const STATS: &str = "stats";
}
