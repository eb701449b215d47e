//! Exclusive loan of one pooled connection.

use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use crate::net::connection::{Connection, ConnectionId};
use crate::pool::endpoint_pool::EndpointPool;

/// How an exchange ended, as reported back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exchange completed and the body was drained; the connection may be reused.
    Healthy,
    /// Transport failure, timeout, cancellation or undrained body; the connection is closed.
    Failed,
}

/// A RAII guard proving exclusive use of one connection.
///
/// Holds the capacity permit for the connection's lifetime. Dropping the lease
/// without calling [`Lease::release`] reports [`Outcome::Failed`], so a
/// cancelled or panicking caller never puts a connection of unknown state back.
#[derive(Debug)]
pub struct Lease {
    conn: Option<Connection>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<EndpointPool>,
}

impl Lease {
    pub(crate) fn new(conn: Connection, permit: OwnedSemaphorePermit, pool: Arc<EndpointPool>) -> Self {
        Self {
            conn: Some(conn),
            permit: Some(permit),
            pool,
        }
    }

    /// Borrow the leased connection.
    pub fn connection(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("lease holds its connection until released")
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .expect("lease holds its connection until released")
    }

    pub fn id(&self) -> ConnectionId {
        self.connection().id()
    }

    /// Count a stale-connection failure against this lease's endpoint.
    pub(crate) fn record_stale_failure(&self) {
        self.pool.stats().record_stale_failure();
    }

    /// Return the connection to the pool.
    pub fn release(mut self, outcome: Outcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: Outcome) {
        if let (Some(conn), Some(permit)) = (self.conn.take(), self.permit.take()) {
            self.pool.release(conn, permit, outcome);
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.finish(Outcome::Failed);
    }
}
