//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sockpool_connections_created_total` (counter): connections opened, by endpoint
//! - `sockpool_connections_reused_total` (counter): idle connections handed out again
//! - `sockpool_connections_validated_total` (counter): liveness probes, by result
//! - `sockpool_connections_evicted_total` (counter): closed connections, by reason
//! - `sockpool_pool_exhausted_total` (counter): acquires that gave up at capacity
//! - `sockpool_requests_total` (counter): exchanges, by outcome
//! - `sockpool_request_duration_seconds` (histogram): exchange latency
//! - `sockpool_idle_connections` (gauge): idle set size, by endpoint
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::net::endpoint::Endpoint;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_created(endpoint: &Endpoint) {
    counter!("sockpool_connections_created_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_connection_reused(endpoint: &Endpoint) {
    counter!("sockpool_connections_reused_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_validation(endpoint: &Endpoint, passed: bool) {
    let result = if passed { "passed" } else { "failed" };
    counter!(
        "sockpool_connections_validated_total",
        "endpoint" => endpoint.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_eviction(endpoint: &Endpoint, reason: &'static str) {
    counter!(
        "sockpool_connections_evicted_total",
        "endpoint" => endpoint.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_pool_exhausted(endpoint: &Endpoint) {
    counter!("sockpool_pool_exhausted_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn set_idle_connections(endpoint: &Endpoint, idle: usize) {
    gauge!("sockpool_idle_connections", "endpoint" => endpoint.to_string()).set(idle as f64);
}

/// Record one finished exchange. `outcome` is "ok" or an error kind.
pub fn record_request(endpoint: &Endpoint, outcome: &'static str, start: Instant) {
    let endpoint = endpoint.to_string();
    counter!(
        "sockpool_requests_total",
        "endpoint" => endpoint.clone(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("sockpool_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}
