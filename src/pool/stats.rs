//! Per-endpoint pool counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lifetime counters for one endpoint pool.
#[derive(Debug, Default)]
pub struct PoolStats {
    created: AtomicU64,
    reused: AtomicU64,
    validated: AtomicU64,
    validation_failures: AtomicU64,
    evicted: AtomicU64,
    discarded: AtomicU64,
    stale_failures: AtomicU64,
}

impl PoolStats {
    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reused(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validated(&self) {
        self.validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Idle connection dropped by policy (keep-alive or reaper).
    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Connection closed on release because its exchange failed.
    pub fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_failure(&self) {
        self.stale_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy; `idle` and `live` come from the pool itself.
    pub fn snapshot(&self, idle: usize, live: usize) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            validated: self.validated.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            stale_failures: self.stale_failures.load(Ordering::Relaxed),
            idle,
            live,
        }
    }
}

/// Serializable view of [`PoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStatsSnapshot {
    pub created: u64,
    /// Idle connections handed out again (with or without validation).
    pub reused: u64,
    pub validated: u64,
    pub validation_failures: u64,
    pub evicted: u64,
    pub discarded: u64,
    pub stale_failures: u64,
    /// Connections currently parked in the idle set.
    pub idle: usize,
    /// Connections currently alive, idle or lent out.
    pub live: usize,
}
