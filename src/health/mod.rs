//! Connection health subsystem.
//!
//! # Data Flow
//! ```text
//! On acquire (pool/endpoint_pool.rs):
//!     idle ≥ validate_after_inactivity → liveness probe
//!     idle ≥ keep_alive_timeout        → evict
//!
//! In the background (reaper.rs):
//!     Periodic timer
//!     → Evict idle connections past keep-alive
//! ```

pub mod reaper;

pub use reaper::IdleReaper;
