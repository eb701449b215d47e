//! Pooled HTTP client for one daemon endpoint.
//!
//! # Responsibilities
//! - Own the endpoint address and share a [`Pool`] across clones
//! - Run each request through acquire → execute, with optional stale retry
//! - Record per-request metrics

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::SockpoolConfig;
use crate::error::PoolError;
use crate::health::IdleReaper;
use crate::http::executor;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::net::endpoint::Endpoint;
use crate::observability::metrics;
use crate::pool::{Pool, PoolSettings, PoolStatsSnapshot};
use crate::resilience::RetryPolicy;

/// A cheap-to-clone client. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Client {
    endpoint: Endpoint,
    pool: Arc<Pool>,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl Client {
    /// Build a client and a pool of its own from configuration.
    pub fn new(config: &SockpoolConfig) -> Result<Self, PoolError> {
        let pool = Arc::new(Pool::new(PoolSettings::from_config(config)));
        Self::with_pool(config, pool)
    }

    /// Build a client over an existing pool. Pool settings in `config` are ignored.
    pub fn with_pool(config: &SockpoolConfig, pool: Arc<Pool>) -> Result<Self, PoolError> {
        let endpoint = Endpoint::parse(&config.client.endpoint)?;
        Ok(Self {
            endpoint,
            pool,
            request_timeout: config.timeouts.request(),
            retry: RetryPolicy::from_config(&config.retries),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Counters and gauges for this client's endpoint.
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.pool.stats(&self.endpoint).unwrap_or_default()
    }

    /// Send `request` and return the response head. The body must be read
    /// (or the response dropped) before the connection can be reused.
    pub async fn execute(&self, request: Request) -> Result<Response, PoolError> {
        let start = Instant::now();
        let mut attempt = 1;

        loop {
            match self.try_once(&request, attempt > 1).await {
                Ok(response) => {
                    metrics::record_request(&self.endpoint, "ok", start);
                    return Ok(response);
                }
                Err(err) if self.retry.should_retry(&err, request.method(), attempt) => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        method = %request.method(),
                        path = %request.path(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying on a fresh connection"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => {
                    metrics::record_request(&self.endpoint, err.kind().as_str(), start);
                    return Err(err);
                }
            }
        }
    }

    async fn try_once(&self, request: &Request, fresh: bool) -> Result<Response, PoolError> {
        let http_request = request.to_http(&self.endpoint)?;
        let lease = if fresh {
            self.pool.acquire_fresh(&self.endpoint).await?
        } else {
            self.pool.acquire(&self.endpoint).await?
        };
        tracing::debug!(
            connection_id = %lease.id(),
            method = %request.method(),
            path = %request.path(),
            "Sending request"
        );
        executor::execute(lease, http_request, self.request_timeout).await
    }

    /// `GET path`.
    pub async fn get(&self, path: &str) -> Result<Response, PoolError> {
        self.execute(Request::get(path)).await
    }

    /// Start the idle reaper on this client's pool.
    pub fn spawn_reaper(&self, interval: Duration, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let reaper = IdleReaper::new(Arc::clone(&self.pool), interval);
        tokio::spawn(reaper.run(shutdown))
    }

    /// Close the shared pool. Every clone is affected.
    pub fn close(&self) {
        self.pool.close();
    }
}
