//! Connections for a single endpoint.
//!
//! # Responsibilities
//! - Keep idle connections in insertion order (front = oldest, back = most recently used)
//! - Enforce the live-connection limit with a semaphore; every live connection holds a permit
//! - Apply the staleness policy when handing out idle connections
//! - Take connections back, or close them, when a lease ends

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::PoolError;
use crate::net::connection::Connection;
use crate::net::connector;
use crate::net::endpoint::Endpoint;
use crate::observability::metrics;
use crate::pool::lease::{Lease, Outcome};
use crate::pool::manager::PoolSettings;
use crate::pool::policy::Decision;
use crate::pool::stats::{PoolStats, PoolStatsSnapshot};

/// An idle connection together with the capacity permit it occupies.
#[derive(Debug)]
struct IdleConnection {
    conn: Connection,
    permit: OwnedSemaphorePermit,
}

/// Pool of connections to one endpoint.
#[derive(Debug)]
pub struct EndpointPool {
    endpoint: Endpoint,
    settings: Arc<PoolSettings>,
    /// Only ever locked for push/pop; never held across an await.
    idle: Mutex<VecDeque<IdleConnection>>,
    capacity: Arc<Semaphore>,
    /// Signalled when a connection is parked in the idle set.
    returned: Notify,
    stats: PoolStats,
    closed: AtomicBool,
}

impl EndpointPool {
    pub fn new(endpoint: Endpoint, settings: Arc<PoolSettings>) -> Self {
        let capacity = Arc::new(Semaphore::new(settings.max_connections));
        Self {
            endpoint,
            settings,
            idle: Mutex::new(VecDeque::new()),
            capacity,
            returned: Notify::new(),
            stats: PoolStats::default(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    fn idle_set(&self) -> MutexGuard<'_, VecDeque<IdleConnection>> {
        // The guarded data stays consistent across a panic: every critical
        // section is a single push or pop.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connections currently alive, idle or lent out.
    pub fn live(&self) -> usize {
        self.settings
            .max_connections
            .saturating_sub(self.capacity.available_permits())
    }

    /// Take one entry out of the idle set and refresh the idle gauge.
    fn pop_idle(
        &self,
        pop: impl FnOnce(&mut VecDeque<IdleConnection>) -> Option<IdleConnection>,
    ) -> Option<IdleConnection> {
        let (entry, remaining) = {
            let mut set = self.idle_set();
            let entry = pop(&mut *set);
            (entry, set.len())
        };
        if entry.is_some() {
            metrics::set_idle_connections(&self.endpoint, remaining);
        }
        entry
    }

    pub fn idle_count(&self) -> usize {
        self.idle_set().len()
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        self.stats.snapshot(self.idle_count(), self.live())
    }

    /// Lease a connection.
    ///
    /// With `fresh` set the idle set is bypassed and a new connection is
    /// opened, evicting the oldest idle connection if that is the only way to
    /// get under capacity.
    pub async fn acquire(self: &Arc<Self>, fresh: bool) -> Result<Lease, PoolError> {
        let deadline = self
            .settings
            .acquire_timeout
            .map(|t| tokio::time::Instant::now() + t);

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(PoolError::PoolClosed);
            }

            if !fresh {
                if let Some(lease) = self.take_idle().await {
                    return Ok(lease);
                }
            }

            match self.capacity.clone().try_acquire_owned() {
                Ok(permit) => return self.open(permit).await,
                Err(TryAcquireError::Closed) => return Err(PoolError::PoolClosed),
                Err(TryAcquireError::NoPermits) => {}
            }

            if fresh && self.evict_oldest_idle() {
                continue;
            }

            // At capacity: wait for a slot to free up or a connection to come back.
            tracing::debug!(
                endpoint = %self.endpoint,
                live = self.live(),
                "Pool at capacity, waiting"
            );
            let wait = async {
                tokio::select! {
                    permit = self.capacity.clone().acquire_owned() => Some(permit),
                    _ = self.returned.notified() => None,
                }
            };
            let woke = match deadline {
                Some(deadline) if deadline <= tokio::time::Instant::now() => {
                    return Err(self.exhausted());
                }
                Some(deadline) => tokio::time::timeout_at(deadline, wait)
                    .await
                    .map_err(|_| self.exhausted())?,
                None => wait.await,
            };

            match woke {
                Some(Ok(permit)) => return self.open(permit).await,
                Some(Err(_)) => return Err(PoolError::PoolClosed),
                None => continue,
            }
        }
    }

    fn exhausted(&self) -> PoolError {
        metrics::record_pool_exhausted(&self.endpoint);
        PoolError::PoolExhausted {
            endpoint: self.endpoint.to_string(),
            max: self.settings.max_connections,
        }
    }

    /// Pop idle candidates, most recently used first, until one passes the policy.
    async fn take_idle(self: &Arc<Self>) -> Option<Lease> {
        loop {
            let IdleConnection { mut conn, permit } = self.pop_idle(VecDeque::pop_back)?;
            let idle = conn.idle_for(Instant::now());

            match self.settings.policy.decide(idle) {
                Decision::Reuse => {}
                Decision::Evict => {
                    tracing::debug!(
                        endpoint = %self.endpoint,
                        connection_id = %conn.id(),
                        idle_ms = idle.as_millis() as u64,
                        "Evicting idle connection past keep-alive timeout"
                    );
                    conn.close();
                    self.stats.record_evicted();
                    metrics::record_eviction(&self.endpoint, "keep_alive");
                    continue;
                }
                Decision::Validate => {
                    if let Err(e) = conn.validate(self.settings.validation_timeout).await {
                        tracing::warn!(
                            endpoint = %self.endpoint,
                            idle_ms = idle.as_millis() as u64,
                            error = %e,
                            "Discarding idle connection that failed validation"
                        );
                        self.stats.record_validation_failure();
                        metrics::record_validation(&self.endpoint, false);
                        continue;
                    }
                    self.stats.record_validated();
                    metrics::record_validation(&self.endpoint, true);
                }
            }

            tracing::debug!(
                endpoint = %self.endpoint,
                connection_id = %conn.id(),
                idle_ms = idle.as_millis() as u64,
                "Reusing idle connection"
            );
            self.stats.record_reused();
            metrics::record_connection_reused(&self.endpoint);
            conn.mark_in_use();
            return Some(Lease::new(conn, permit, Arc::clone(self)));
        }
    }

    async fn open(self: &Arc<Self>, permit: OwnedSemaphorePermit) -> Result<Lease, PoolError> {
        match connector::connect(&self.endpoint, self.settings.connect_timeout).await {
            Ok(mut conn) => {
                self.stats.record_created();
                metrics::record_connection_created(&self.endpoint);
                conn.mark_in_use();
                Ok(Lease::new(conn, permit, Arc::clone(self)))
            }
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "Failed to open connection");
                Err(e)
            }
        }
    }

    /// Take a connection back from a lease.
    pub(crate) fn release(&self, mut conn: Connection, permit: OwnedSemaphorePermit, outcome: Outcome) {
        let reusable =
            outcome == Outcome::Healthy && conn.is_open() && !self.closed.load(Ordering::Acquire);

        if !reusable {
            tracing::debug!(
                endpoint = %self.endpoint,
                connection_id = %conn.id(),
                outcome = ?outcome,
                "Closing released connection"
            );
            conn.close();
            self.stats.record_discarded();
            metrics::record_eviction(&self.endpoint, "released_failed");
            // Dropping the permit frees the slot for waiters.
            drop(permit);
            return;
        }

        conn.mark_idle();
        tracing::trace!(endpoint = %self.endpoint, connection_id = %conn.id(), "Connection returned to idle set");
        let idle = {
            let mut set = self.idle_set();
            set.push_back(IdleConnection { conn, permit });
            set.len()
        };
        metrics::set_idle_connections(&self.endpoint, idle);
        self.returned.notify_one();
    }

    /// Close the least recently used idle connection. Returns false if none was idle.
    fn evict_oldest_idle(&self) -> bool {
        let Some(IdleConnection { mut conn, permit }) = self.pop_idle(VecDeque::pop_front) else {
            return false;
        };
        tracing::debug!(endpoint = %self.endpoint, connection_id = %conn.id(), "Evicting oldest idle connection to make room");
        conn.close();
        drop(permit);
        self.stats.record_evicted();
        metrics::record_eviction(&self.endpoint, "capacity");
        true
    }

    /// Evict idle connections whose keep-alive timeout has passed. Returns how many.
    pub fn reap_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<IdleConnection> = {
            let mut set = self.idle_set();
            let (expired, keep): (Vec<_>, Vec<_>) = set
                .drain(..)
                .partition(|e| self.settings.policy.keep_alive_expired(e.conn.idle_for(now)));
            *set = keep.into();
            expired
        };

        let count = expired.len();
        for IdleConnection { mut conn, permit } in expired {
            conn.close();
            drop(permit);
            self.stats.record_evicted();
            metrics::record_eviction(&self.endpoint, "reaper");
        }
        if count > 0 {
            metrics::set_idle_connections(&self.endpoint, self.idle_count());
        }
        count
    }

    /// Close all idle connections and refuse further acquires.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.capacity.close();
        let drained: Vec<IdleConnection> = self.idle_set().drain(..).collect();
        let count = drained.len();
        for IdleConnection { mut conn, .. } in drained {
            conn.close();
        }
        self.returned.notify_waiters();
        metrics::set_idle_connections(&self.endpoint, 0);
        tracing::info!(endpoint = %self.endpoint, closed_idle = count, "Endpoint pool closed");
    }
}
