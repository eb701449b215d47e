//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint URI ("unix:///run/podman/podman.sock", "tcp://host:port")
//!     → endpoint.rs (parse into a pool key)
//!     → connector.rs (dial socket, HTTP/1.1 handshake, spawn driver task)
//!     → connection.rs (state machine, last-activity tracking)
//!     → Hand off to the pool
//!
//! Connection States:
//!     Idle → InUse → Idle | Closed
//!     Idle → Validating → Idle | Closed
//! ```
//!
//! # Design Decisions
//! - One hyper HTTP/1.1 connection per pooled entry; no multiplexing
//! - The driver task owns the socket; closing aborts it exactly once
//! - A missing Unix socket is reported as a refused connection

pub mod connection;
pub mod connector;
pub mod endpoint;

pub use connection::{Connection, ConnectionId, ConnectionState};
pub use endpoint::Endpoint;
