//! # Depth Guard
//!
//! Tracks how deeply pipeline stages have delegated into one another and flips a
//! one-way degraded-mode latch when nesting gets close to the configured limit.
//!
//! Depth is counted explicitly: every nested stage call passes `ctx.child()` down,
//! so the guard never has to inspect the native stack.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use crate::config::{ConfigResult, ConfigurationError};
use crate::constants::depth::{DEFAULT_SAFETY_BUFFER, DEFAULT_STACK_LIMIT};
use crate::error::{ResilienceError, Result};

/// Delegation depth carried through nested stage calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    depth: usize,
}

impl ExecutionContext {
    /// Context for a top-level call
    pub fn root() -> Self {
        Self { depth: 0 }
    }

    pub fn at_depth(depth: usize) -> Self {
        Self { depth }
    }

    /// Context to hand to a nested stage call
    pub fn child(&self) -> Self {
        Self {
            depth: self.depth.saturating_add(1),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthGuardConfig {
    /// Depth at which calls are rejected outright
    pub stack_limit: usize,

    /// Headroom below `stack_limit` where degraded mode kicks in
    pub safety_buffer: usize,
}

impl DepthGuardConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.stack_limit == 0 {
            return Err(ConfigurationError::invalid_value(
                "depth_guard.stack_limit",
                self.stack_limit,
                "must be greater than 0",
            ));
        }

        if self.safety_buffer >= self.stack_limit {
            return Err(ConfigurationError::invalid_value(
                "depth_guard.safety_buffer",
                self.safety_buffer,
                "must be smaller than depth_guard.stack_limit",
            ));
        }

        Ok(())
    }
}

impl Default for DepthGuardConfig {
    fn default() -> Self {
        Self {
            stack_limit: DEFAULT_STACK_LIMIT,
            safety_buffer: DEFAULT_SAFETY_BUFFER,
        }
    }
}

/// Degraded-mode latch shared by every executor of one pipeline session.
///
/// Once set the latch stays set; build a new guard for a new session.
#[derive(Debug, Default)]
pub struct DepthGuard {
    config: DepthGuardConfig,
    degraded: AtomicBool,
}

impl DepthGuard {
    pub fn new(config: DepthGuardConfig) -> Self {
        Self {
            config,
            degraded: AtomicBool::new(false),
        }
    }

    /// Depth above which degraded mode is entered
    pub fn threshold(&self) -> usize {
        self.config
            .stack_limit
            .saturating_sub(self.config.safety_buffer)
    }

    /// Latch degraded mode if `ctx` is deeper than the threshold.
    /// Returns whether the guard is degraded after the check.
    pub fn check_and_maybe_flag(&self, ctx: &ExecutionContext) -> bool {
        if ctx.depth() > self.threshold() && !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(
                depth = ctx.depth(),
                threshold = self.threshold(),
                stack_limit = self.config.stack_limit,
                "⚠️ Delegation depth near limit, switching to degraded mode"
            );
        }
        self.is_degraded()
    }

    /// Reject contexts at or beyond the hard limit
    pub fn check_hard_limit(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.depth() >= self.config.stack_limit {
            error!(
                depth = ctx.depth(),
                stack_limit = self.config.stack_limit,
                "❌ Delegation depth limit reached"
            );
            return Err(ResilienceError::RecursionDepth {
                depth: ctx.depth(),
                limit: self.config.stack_limit,
            });
        }
        Ok(())
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &DepthGuardConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(stack_limit: usize, safety_buffer: usize) -> DepthGuard {
        DepthGuard::new(DepthGuardConfig {
            stack_limit,
            safety_buffer,
        })
    }

    #[test]
    fn test_child_contexts_count_depth() {
        let root = ExecutionContext::root();
        let nested = root.child().child().child();
        assert_eq!(root.depth(), 0);
        assert_eq!(nested.depth(), 3);
    }

    #[test]
    fn test_latch_trips_above_threshold_and_stays_set() {
        let guard = guard(10, 3);
        assert_eq!(guard.threshold(), 7);

        assert!(!guard.check_and_maybe_flag(&ExecutionContext::at_depth(7)));
        assert!(guard.check_and_maybe_flag(&ExecutionContext::at_depth(8)));

        // Shallow calls do not clear it
        assert!(guard.check_and_maybe_flag(&ExecutionContext::root()));
        assert!(guard.is_degraded());
    }

    #[test]
    fn test_hard_limit_is_rejected() {
        let guard = guard(10, 3);
        assert!(guard.check_hard_limit(&ExecutionContext::at_depth(9)).is_ok());

        let error = guard
            .check_hard_limit(&ExecutionContext::at_depth(10))
            .unwrap_err();
        assert!(matches!(
            error,
            ResilienceError::RecursionDepth { depth: 10, limit: 10 }
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(DepthGuardConfig::default().validate().is_ok());
        assert!(DepthGuardConfig {
            stack_limit: 10,
            safety_buffer: 10,
        }
        .validate()
        .is_err());
    }
}
