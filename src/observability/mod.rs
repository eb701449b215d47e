//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pool, executor, client:
//!     → logging.rs (structured log events with connection_id / endpoint fields)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr (text or JSON)
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
