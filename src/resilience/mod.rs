//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Exchange fails with StaleConnection:
//!     → retries.rs (retry enabled? idempotent? attempts left?)
//!     → backoff.rs (delay before the next attempt)
//!     → fresh connection, never an idle one
//! ```
//!
//! # Design Decisions
//! - Retries are opt-in; by default a stale failure reaches the caller
//! - Retries only for idempotent requests (GET, HEAD, etc.)

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
