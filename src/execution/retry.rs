//! # Retry and Backoff
//!
//! Per-call retry settings and the inter-attempt sleep schedule.
//!
//! Attempt `n` (0-indexed) waits at most `initial_timeout * backoff_factor^n` for its
//! result. Between attempts the executor sleeps `base_delay * backoff_factor^n`,
//! capped at `max_delay`, with optional jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ConfigResult, ConfigurationError};
use crate::constants::retry::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY, DEFAULT_INITIAL_TIMEOUT,
    DEFAULT_JITTER_MAX_PERCENTAGE, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES, DEFAULT_PRIORITY,
};

/// Retry settings for one `execute_with_resilience` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Timeout for the first attempt
    #[serde(rename = "initial_timeout_ms", with = "crate::config::duration_ms")]
    pub initial_timeout: Duration,

    /// Growth factor applied to timeouts and backoff delays
    pub backoff_factor: f64,

    /// Queue priority, lower runs first
    pub priority: i32,
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_timeout: Duration, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            initial_timeout,
            backoff_factor,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Timeout for the given 0-indexed attempt
    pub fn attempt_timeout(&self, attempt: u32) -> Duration {
        let nanos = self.initial_timeout.as_nanos() as f64 * self.backoff_factor.powi(attempt as i32);
        Duration::from_nanos(nanos.round().min(u64::MAX as f64) as u64)
    }

    /// Timeouts for every attempt, in order
    pub fn attempt_timeouts(&self) -> Vec<Duration> {
        (0..=self.max_retries)
            .map(|attempt| self.attempt_timeout(attempt))
            .collect()
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.initial_timeout.is_zero() {
            return Err(ConfigurationError::invalid_value(
                "retry.initial_timeout_ms",
                0,
                "must be greater than 0",
            ));
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_factor",
                self.backoff_factor,
                "must be at least 1.0",
            ));
        }

        if self.max_retries > 20 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_retries",
                self.max_retries,
                "must be at most 20",
            ));
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_RETRIES,
            DEFAULT_INITIAL_TIMEOUT,
            DEFAULT_BACKOFF_FACTOR,
        )
    }
}

/// Sleep schedule between attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    #[serde(rename = "base_delay_ms", with = "crate::config::duration_ms")]
    pub base_delay: Duration,

    #[serde(rename = "max_delay_ms", with = "crate::config::duration_ms")]
    pub max_delay: Duration,

    /// Whether to add jitter to prevent thundering herd
    pub jitter_enabled: bool,

    /// Maximum jitter percentage (0.0 to 1.0)
    pub jitter_max_percentage: f64,
}

impl BackoffConfig {
    /// Backoff without jitter, handy for deterministic tests
    pub fn fixed(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_enabled: false,
            jitter_max_percentage: 0.0,
        }
    }

    /// Delay before the attempt following `attempt`
    pub fn delay_for(&self, attempt: u32, backoff_factor: f64) -> Duration {
        let exponential = self
            .base_delay
            .as_secs_f64()
            * backoff_factor.powi(attempt as i32);
        let capped = exponential.min(self.max_delay.as_secs_f64());
        let delay = Duration::from_secs_f64(capped.max(0.0));

        if self.jitter_enabled {
            self.apply_jitter(delay)
        } else {
            delay
        }
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        let jitter_range = (delay.as_millis() as f64 * self.jitter_max_percentage) as u64;
        if jitter_range == 0 {
            return delay;
        }

        let mut rng = rand::thread_rng();
        let jitter = Duration::from_millis(rng.gen_range(0..=jitter_range));

        // Add or subtract jitter randomly
        if rng.gen_bool(0.5) {
            delay.saturating_add(jitter)
        } else {
            delay.saturating_sub(jitter)
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_delay < self.base_delay {
            return Err(ConfigurationError::invalid_value(
                "backoff.max_delay_ms",
                self.max_delay.as_millis(),
                "must not be smaller than backoff.base_delay_ms",
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter_max_percentage) {
            return Err(ConfigurationError::invalid_value(
                "backoff.jitter_max_percentage",
                self.jitter_max_percentage,
                "must be between 0.0 and 1.0",
            ));
        }

        Ok(())
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_enabled: true,
            jitter_max_percentage: DEFAULT_JITTER_MAX_PERCENTAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_attempt_timeouts_escalate() {
        let config = RetryConfig::new(2, Duration::from_secs(10), 2.0);
        assert_eq!(
            config.attempt_timeouts(),
            vec![
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(40)
            ]
        );
        assert_eq!(config.total_attempts(), 3);
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        let backoff = BackoffConfig::fixed(Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(backoff.delay_for(0, 2.0), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(2, 2.0), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(6, 2.0), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_factor_below_one_is_rejected() {
        let config = RetryConfig::new(1, Duration::from_secs(1), 0.5);
        let error = config.validate().unwrap_err();
        assert!(matches!(
            error,
            ConfigurationError::InvalidValue { ref field, .. } if field == "retry.backoff_factor"
        ));
    }

    proptest! {
        #[test]
        fn jittered_delay_stays_within_bounds(attempt in 0u32..8, base_ms in 1u64..5_000) {
            let backoff = BackoffConfig {
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_secs(60),
                jitter_enabled: true,
                jitter_max_percentage: 0.1,
            };
            let expected = (base_ms as f64 * 2f64.powi(attempt as i32)).min(60_000.0);
            let delay = backoff.delay_for(attempt, 2.0).as_millis() as f64;
            prop_assert!(delay >= expected * 0.9 - 1.0);
            prop_assert!(delay <= expected * 1.1 + 1.0);
        }
    }
}
