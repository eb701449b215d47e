//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, lints)
//!     → SockpoolConfig (validated, immutable)
//!     → PoolSettings / RetryPolicy derived once at client construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a new pool is built for new settings
//! - All fields have defaults to allow minimal configs
//! - Optional thresholds are `Option`s: unset means disabled, never zero
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ClientConfig, ObservabilityConfig, PoolConfig, RetryConfig, SockpoolConfig, TimeoutConfig,
    DEFAULT_ENDPOINT,
};
pub use validation::{lint_config, validate_config, ValidationError};
