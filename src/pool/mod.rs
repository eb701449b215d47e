//! Connection pooling subsystem.
//!
//! # Data Flow
//! ```text
//! Client::execute(endpoint)
//!     → manager.rs (find or create the endpoint pool)
//!     → endpoint_pool.rs:
//!         - pop idle connections, most recently used first
//!         - policy.rs decides Reuse / Validate / Evict per candidate
//!         - none eligible and under capacity → connector opens a new one
//!         - at capacity → wait for a returned connection or a freed slot
//!     → lease.rs (exclusive loan, released on drop)
//!     → Healthy release: back to the idle set; Failed release: closed
//! ```
//!
//! # Design Decisions
//! - The idle-set lock covers only push/pop; probes and transfers run outside it
//! - Most-recently-used reuse concentrates traffic and lets the rest age out
//! - Capacity counts idle and lent connections alike (semaphore permits)
//! - Failures are never retried here; retry belongs to the caller

pub mod endpoint_pool;
pub mod lease;
pub mod manager;
pub mod policy;
pub mod stats;

pub use lease::{Lease, Outcome};
pub use manager::{Pool, PoolSettings};
pub use policy::{Decision, StalenessPolicy};
pub use stats::PoolStatsSnapshot;
