//! Staleness policy.
//!
//! Decides what to do with an idle connection before handing it out again.
//!
//! # Decision Table
//! ```text
//! validate_after_inactivity set and idle >= it  → Validate
//! keep_alive_timeout set and idle >= it         → Evict
//! otherwise                                      → Reuse
//! ```
//!
//! With neither threshold set every idle connection is reused as-is, even one
//! the peer has already closed. That request then fails; the policy does not
//! paper over it.

use std::time::Duration;

/// What the pool does with an idle candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Hand out immediately, no probe.
    Reuse,
    /// Probe liveness first; discard on failure.
    Validate,
    /// Discard without probing.
    Evict,
}

/// Idle-connection thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StalenessPolicy {
    /// Probe connections idle at least this long.
    pub validate_after_inactivity: Option<Duration>,
    /// Evict connections idle at least this long.
    pub keep_alive_timeout: Option<Duration>,
}

impl StalenessPolicy {
    pub fn new(
        validate_after_inactivity: Option<Duration>,
        keep_alive_timeout: Option<Duration>,
    ) -> Self {
        Self {
            validate_after_inactivity,
            keep_alive_timeout,
        }
    }

    /// Decide the fate of a connection that has been idle for `idle`.
    pub fn decide(&self, idle: Duration) -> Decision {
        if self.validate_after_inactivity.is_some_and(|t| idle >= t) {
            return Decision::Validate;
        }
        if self.keep_alive_expired(idle) {
            return Decision::Evict;
        }
        Decision::Reuse
    }

    /// True once `idle` reaches the keep-alive timeout.
    pub fn keep_alive_expired(&self, idle: Duration) -> bool {
        self.keep_alive_timeout.is_some_and(|t| idle >= t)
    }

    /// True when no threshold is configured.
    pub fn is_unbounded(&self) -> bool {
        self.validate_after_inactivity.is_none() && self.keep_alive_timeout.is_none()
    }
}
