//! Pooled HTTP/1.1 client for container daemons on local sockets.
//!
//! Daemons such as Podman close keep-alive connections that sit idle for a
//! few seconds. A pool that hands such a connection out again fails the next
//! request. This crate pools connections per endpoint and applies a
//! staleness policy on checkout: validate connections idle past one
//! threshold, evict those idle past another.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod pool;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub mod probe;

pub use crate::config::SockpoolConfig;
pub use crate::error::{ErrorKind, PoolError, PoolResult};
pub use crate::http::{Client, Request, Response};
pub use crate::lifecycle::Shutdown;
pub use crate::net::Endpoint;
pub use crate::pool::{Pool, PoolSettings, PoolStatsSnapshot, StalenessPolicy};
