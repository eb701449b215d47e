//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client and pool.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default daemon socket for a rootless Podman user session.
pub const DEFAULT_ENDPOINT: &str = "unix:///run/user/1000/podman/podman.sock";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SockpoolConfig {
    /// Which daemon to talk to.
    pub client: ClientConfig,

    /// Pool sizing and staleness thresholds.
    pub pool: PoolConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint URI (`unix:///path`, `tcp://host:port` or `http://host:port`).
    pub endpoint: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// Connection pool configuration.
///
/// Unset optional fields mean "no limit" / "disabled".
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum live connections per endpoint. Unset means unbounded.
    pub max_connections: Option<usize>,

    /// Probe idle connections that have been inactive at least this long.
    pub validate_after_inactivity_ms: Option<u64>,

    /// Evict idle connections that have been inactive at least this long.
    pub keep_alive_timeout_ms: Option<u64>,

    /// Upper bound on one liveness probe.
    pub validation_timeout_ms: u64,

    /// How long to wait for a connection at capacity. Unset waits
    /// indefinitely; 0 fails immediately.
    pub acquire_timeout_ms: Option<u64>,

    /// Run the idle reaper at this interval. Unset disables it.
    pub reap_interval_ms: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: None,
            validate_after_inactivity_ms: None,
            keep_alive_timeout_ms: None,
            validation_timeout_ms: 1_000,
            acquire_timeout_ms: None,
            reap_interval_ms: None,
        }
    }
}

impl PoolConfig {
    pub fn validate_after_inactivity(&self) -> Option<Duration> {
        self.validate_after_inactivity_ms.map(Duration::from_millis)
    }

    pub fn keep_alive_timeout(&self) -> Option<Duration> {
        self.keep_alive_timeout_ms.map(Duration::from_millis)
    }

    pub fn reap_interval(&self) -> Option<Duration> {
        self.reap_interval_ms.map(Duration::from_millis)
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Dial plus handshake timeout in milliseconds.
    pub connect_ms: u64,

    /// Request timeout in milliseconds; applied to the response head and,
    /// separately, to draining the body.
    pub request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            request_ms: 30_000,
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

/// Retry configuration.
///
/// Only stale-connection failures of idempotent requests are ever retried,
/// and only when `enabled` is set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries on a fresh connection after a stale-connection failure.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 2,
            base_delay_ms: 0,
            max_delay_ms: 1_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
