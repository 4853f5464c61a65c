//! # Resilience Configuration
//!
//! Aggregate configuration for the execution core. Every section has defaults, so a
//! TOML document only needs the values it overrides. Durations are written as
//! milliseconds (`*_ms` keys).
//!
//! ## Usage
//!
//! ```rust
//! use magazine_resilience::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::from_toml_str(
//!     r#"
//!     [work_queue]
//!     max_workers = 2
//!     "#,
//! )?;
//! assert_eq!(manager.config().work_queue.max_workers, 2);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::execution::depth_guard::DepthGuardConfig;
use crate::execution::retry::{BackoffConfig, RetryConfig};
use crate::logging::LoggingConfig;
use crate::queue::WorkQueueConfig;
use crate::resilience::CircuitBreakerConfig;

/// Root configuration for one resilient executor (or a registry of them)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Breaker thresholds. When absent, registry executors use their stage preset
    /// and standalone executors use `CircuitBreakerConfig::default()`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,

    /// Queue capacity and worker pool size
    pub work_queue: WorkQueueConfig,

    /// Delegation depth limits for degraded mode
    pub depth_guard: DepthGuardConfig,

    /// Retry settings for callers that keep one policy in configuration, passed
    /// explicitly as `&config.retry`
    pub retry: RetryConfig,

    /// Inter-retry sleep settings
    pub backoff: BackoffConfig,

    /// Subscriber settings for `logging::init_structured_logging`
    pub logging: LoggingConfig,
}

impl ResilienceConfig {
    /// Validate every section, reporting the first problem found
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(circuit_breaker) = &self.circuit_breaker {
            circuit_breaker.validate()?;
        }
        self.work_queue.validate()?;
        self.depth_guard.validate()?;
        self.retry.validate()?;
        self.backoff.validate()?;
        Ok(())
    }
}

/// Serde helpers for durations written as whole milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_is_valid() {
        let config = ResilienceConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_configuration_serializes_durations_as_millis() {
        let config = ResilienceConfig {
            circuit_breaker: Some(CircuitBreakerConfig::default()),
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json["circuit_breaker"]["recovery_timeout_ms"],
            serde_json::json!(60_000)
        );
        assert_eq!(json["retry"]["initial_timeout_ms"], serde_json::json!(60_000));
    }

    #[test]
    fn test_breaker_section_is_optional() {
        let config: ResilienceConfig = serde_json::from_str("{}").unwrap();
        assert!(config.circuit_breaker.is_none());
        assert!(serde_json::to_value(&config).unwrap().get("circuit_breaker").is_none());

        let invalid = ResilienceConfig {
            circuit_breaker: Some(CircuitBreakerConfig {
                failure_threshold: 0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(invalid.validate().is_err());
    }
}
