//! Idle-timeout reproduction.
//!
//! Fill the pool with concurrent requests, stay quiet longer than the
//! daemon's idle timeout, then send one more request. Whether that last
//! request succeeds shows whether the configured staleness policy copes with
//! the peer closing idle connections.

use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;

use crate::error::{ErrorKind, PoolError};
use crate::http::Client;
use crate::net::ConnectionId;
use crate::pool::PoolStatsSnapshot;

/// Shape of one probe run.
#[derive(Debug, Clone)]
pub struct ProbePlan {
    /// Concurrent warm-up requests.
    pub requests: usize,
    /// Quiet period before the final request.
    pub delay: Duration,
    pub path: String,
}

impl Default for ProbePlan {
    fn default() -> Self {
        Self {
            requests: 10,
            delay: Duration::from_secs(11),
            path: "/version".to_string(),
        }
    }
}

/// Result of a single request within a probe.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestOutcome {
    /// No error and a 2xx status.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status.is_some_and(|s| (200..300).contains(&s))
    }

    fn failed(err: &PoolError) -> Self {
        Self {
            status: None,
            connection: None,
            bytes: None,
            error_kind: Some(err.kind()),
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub endpoint: String,
    pub delay_ms: u64,
    pub warmup: Vec<RequestOutcome>,
    pub after_idle: RequestOutcome,
    pub stats: PoolStatsSnapshot,
}

impl ProbeReport {
    pub fn warmup_succeeded(&self) -> bool {
        self.warmup.iter().all(RequestOutcome::is_success)
    }

    /// True if every warm-up request and the request sent after the quiet
    /// period came back 2xx.
    pub fn succeeded(&self) -> bool {
        self.warmup_succeeded() && self.after_idle.is_success()
    }
}

/// GET `path` and drain the body.
async fn fetch(client: &Client, path: &str) -> RequestOutcome {
    let response = match client.get(path).await {
        Ok(response) => response,
        Err(e) => return RequestOutcome::failed(&e),
    };
    let status = response.status_code();
    let connection = response.connection_id();
    match response.bytes().await {
        Ok(body) => RequestOutcome {
            status: Some(status),
            connection: Some(connection),
            bytes: Some(body.len()),
            error_kind: None,
            error: None,
        },
        Err(e) => RequestOutcome {
            status: Some(status),
            connection: Some(connection),
            ..RequestOutcome::failed(&e)
        },
    }
}

/// Run the probe described by `plan` against `client`'s endpoint.
pub async fn run_idle_probe(client: &Client, plan: &ProbePlan) -> ProbeReport {
    tracing::info!(
        endpoint = %client.endpoint(),
        requests = plan.requests,
        delay_ms = plan.delay.as_millis() as u64,
        path = %plan.path,
        "Starting idle probe"
    );

    let warmup = join_all((0..plan.requests).map(|_| fetch(client, &plan.path))).await;
    let failed = warmup.iter().filter(|o| !o.is_success()).count();
    tracing::info!(
        succeeded = warmup.len() - failed,
        failed,
        idle = client.stats().idle,
        "Warm-up finished, going quiet"
    );

    tokio::time::sleep(plan.delay).await;

    let after_idle = fetch(client, &plan.path).await;
    match &after_idle.error {
        None if after_idle.is_success() => {
            tracing::info!(status = ?after_idle.status, "Request after idle period succeeded")
        }
        None => tracing::error!(status = ?after_idle.status, "Request after idle period returned an error status"),
        Some(error) => tracing::error!(error = %error, "Request after idle period failed"),
    }

    ProbeReport {
        endpoint: client.endpoint().to_string(),
        delay_ms: plan.delay.as_millis() as u64,
        warmup,
        after_idle,
        stats: client.stats(),
    }
}
