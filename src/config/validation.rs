//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check the endpoint URI parses
//! - Lint risky but legal settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SockpoolConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is handed to the pool

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::SockpoolConfig;
use crate::net::endpoint::Endpoint;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, collecting every error.
pub fn validate_config(config: &SockpoolConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = Endpoint::parse(&config.client.endpoint) {
        errors.push(ValidationError::new("client.endpoint", e.to_string()));
    }

    if config.pool.max_connections == Some(0) {
        errors.push(ValidationError::new(
            "pool.max_connections",
            "must be greater than 0 (omit for unbounded)",
        ));
    }
    if config.pool.validation_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "pool.validation_timeout_ms",
            "must be greater than 0",
        ));
    }
    if config.pool.reap_interval_ms == Some(0) {
        errors.push(ValidationError::new(
            "pool.reap_interval_ms",
            "must be greater than 0 (omit to disable)",
        ));
    }

    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::new("timeouts.connect_ms", "must be greater than 0"));
    }
    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::new("timeouts.request_ms", "must be greater than 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new(
            "retries.max_attempts",
            "must be at least 1",
        ));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            format!(
                "{} exceeds retries.max_delay_ms ({})",
                config.retries.base_delay_ms, config.retries.max_delay_ms
            ),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Warnings for legal configurations that are likely to misbehave.
pub fn lint_config(config: &SockpoolConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.pool.validate_after_inactivity_ms.is_none() && config.pool.keep_alive_timeout_ms.is_none() {
        warnings.push(
            "no staleness threshold set: idle connections closed by the peer will be reused and fail"
                .to_string(),
        );
    }
    if config.pool.reap_interval_ms.is_some() && config.pool.keep_alive_timeout_ms.is_none() {
        warnings.push("pool.reap_interval_ms has no effect without pool.keep_alive_timeout_ms".to_string());
    }
    if config.retries.enabled && config.retries.max_attempts == 1 {
        warnings.push("retries enabled but max_attempts is 1: nothing will be retried".to_string());
    }

    warnings
}
