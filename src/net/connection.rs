//! Pooled connection state machine.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track connection state (Idle → InUse → Idle/Closed, Idle → Validating → Idle/Closed)
//! - Track last activity for the staleness policy
//! - Release the transport exactly once

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::Full;
use hyper::client::conn::http1::SendRequest;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::PoolError;
use crate::net::endpoint::Endpoint;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// Parked in the pool's idle set.
    Idle,
    /// Lent to exactly one caller.
    InUse,
    /// Liveness probe in progress.
    Validating,
    /// Transport released. Terminal.
    Closed,
}

impl ConnectionState {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Idle, InUse)
                | (Idle, Validating)
                | (Idle, Closed)
                | (InUse, Idle)
                | (InUse, Closed)
                | (Validating, Idle)
                | (Validating, Closed)
        )
    }
}

/// A persistent HTTP/1.1 connection owned by the pool.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    endpoint: Endpoint,
    sender: SendRequest<Full<Bytes>>,
    /// Task driving the hyper connection; aborting it drops the socket.
    driver: Option<JoinHandle<()>>,
    created_at: Instant,
    last_used_at: Instant,
    requests_served: u64,
    state: ConnectionState,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        endpoint: Endpoint,
        sender: SendRequest<Full<Bytes>>,
        driver: JoinHandle<()>,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            endpoint,
            sender,
            driver: Some(driver),
            created_at: now,
            last_used_at: now,
            requests_served: 0,
            state: ConnectionState::Idle,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    /// Time since the last completed exchange (or since creation).
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used_at)
    }

    /// Number of exchanges completed over this connection.
    pub fn requests_served(&self) -> u64 {
        self.requests_served
    }

    /// True once the connection has served at least one exchange.
    pub fn is_reused(&self) -> bool {
        self.requests_served > 0
    }

    /// False once closed locally or once hyper has observed the transport going away.
    pub fn is_open(&self) -> bool {
        self.state != ConnectionState::Closed
            && !self.sender.is_closed()
            && self.driver.as_ref().is_some_and(|d| !d.is_finished())
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal connection transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(connection_id = %self.id, from = ?self.state, to = ?next, "Connection state change");
        self.state = next;
    }

    pub(crate) fn mark_in_use(&mut self) {
        self.transition(ConnectionState::InUse);
    }

    pub(crate) fn mark_idle(&mut self) {
        self.last_used_at = Instant::now();
        self.transition(ConnectionState::Idle);
    }

    /// Record a completed exchange.
    pub(crate) fn touch(&mut self) {
        self.last_used_at = Instant::now();
        self.requests_served += 1;
    }

    pub(crate) fn sender_mut(&mut self) -> &mut SendRequest<Full<Bytes>> {
        &mut self.sender
    }

    /// Lightweight liveness probe for an idle connection.
    ///
    /// Passes if hyper still has a running dispatcher for the socket and it
    /// accepts a request within `timeout`. On failure the connection is closed.
    pub(crate) async fn validate(&mut self, timeout: Duration) -> Result<(), PoolError> {
        self.transition(ConnectionState::Validating);

        let verdict = if !self.is_open() {
            Err("peer closed the connection".to_string())
        } else {
            match tokio::time::timeout(timeout, self.sender.ready()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("liveness probe timed out after {:?}", timeout)),
            }
        };

        match verdict {
            Ok(()) => {
                self.transition(ConnectionState::Idle);
                Ok(())
            }
            Err(reason) => {
                self.close();
                Err(PoolError::Validation {
                    connection: self.id,
                    reason,
                })
            }
        }
    }

    /// Close the connection. Idempotent; the transport is released once.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.transition(ConnectionState::Closed);
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        tracing::trace!(
            connection_id = %self.id,
            endpoint = %self.endpoint,
            requests_served = self.requests_served,
            "Connection closed"
        );
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
