//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed exchange may be replayed
//! - Compute the delay before the next attempt
//!
//! # Design Decisions
//! - Off unless enabled in configuration
//! - Only stale-connection failures qualify
//! - Never retry POST/PATCH (non-idempotent)
//! - The replay always goes out on a newly opened connection

use std::time::Duration;

use http::Method;

use crate::config::RetryConfig;
use crate::error::PoolError;
use crate::resilience::backoff::calculate_backoff;

/// When and how long to wait before replaying a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Whether attempt number `attempt` (1-based) that failed with `err` may be replayed.
    pub fn should_retry(&self, err: &PoolError, method: &Method, attempt: u32) -> bool {
        self.enabled
            && attempt < self.max_attempts
            && err.is_retryable()
            && method.is_idempotent()
    }

    /// Delay before the attempt that follows attempt number `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay, self.max_delay)
    }
}
