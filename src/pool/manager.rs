//! Endpoint-keyed connection pool.
//!
//! # Responsibilities
//! - Lazily create one [`EndpointPool`] per endpoint
//! - Route acquires to the right endpoint pool
//! - Aggregate reaping, stats and shutdown across endpoints

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Semaphore;

use crate::config::SockpoolConfig;
use crate::error::PoolError;
use crate::net::endpoint::Endpoint;
use crate::pool::endpoint_pool::EndpointPool;
use crate::pool::lease::Lease;
use crate::pool::policy::StalenessPolicy;
use crate::pool::stats::PoolStatsSnapshot;

/// Runtime pool settings, resolved from configuration.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Live connections allowed per endpoint.
    pub max_connections: usize,
    pub policy: StalenessPolicy,
    /// Upper bound on a single liveness probe.
    pub validation_timeout: Duration,
    /// How long `acquire` may wait at capacity. `None` waits indefinitely.
    pub acquire_timeout: Option<Duration>,
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: Semaphore::MAX_PERMITS,
            policy: StalenessPolicy::default(),
            validation_timeout: Duration::from_secs(1),
            acquire_timeout: None,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolSettings {
    /// Resolve settings from a validated configuration.
    pub fn from_config(config: &SockpoolConfig) -> Self {
        Self {
            max_connections: config
                .pool
                .max_connections
                .unwrap_or(Semaphore::MAX_PERMITS)
                .min(Semaphore::MAX_PERMITS),
            policy: StalenessPolicy::new(
                config.pool.validate_after_inactivity(),
                config.pool.keep_alive_timeout(),
            ),
            validation_timeout: Duration::from_millis(config.pool.validation_timeout_ms),
            acquire_timeout: config.pool.acquire_timeout_ms.map(Duration::from_millis),
            connect_timeout: Duration::from_millis(config.timeouts.connect_ms),
        }
    }
}

/// Connection pool shared by every caller of a client.
#[derive(Debug)]
pub struct Pool {
    settings: Arc<PoolSettings>,
    endpoints: DashMap<Endpoint, Arc<EndpointPool>>,
    closed: AtomicBool,
}

impl Pool {
    pub fn new(settings: PoolSettings) -> Self {
        tracing::debug!(
            max_connections = settings.max_connections,
            validate_after_inactivity = ?settings.policy.validate_after_inactivity,
            keep_alive_timeout = ?settings.policy.keep_alive_timeout,
            "Connection pool created"
        );
        Self {
            settings: Arc::new(settings),
            endpoints: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    fn endpoint_pool(&self, endpoint: &Endpoint) -> Arc<EndpointPool> {
        if let Some(pool) = self.endpoints.get(endpoint) {
            return Arc::clone(pool.value());
        }
        self.endpoints
            .entry(endpoint.clone())
            .or_insert_with(|| {
                Arc::new(EndpointPool::new(endpoint.clone(), Arc::clone(&self.settings)))
            })
            .value()
            .clone()
    }

    /// Lease a connection to `endpoint`, reusing an idle one when the policy allows.
    pub async fn acquire(&self, endpoint: &Endpoint) -> Result<Lease, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }
        self.endpoint_pool(endpoint).acquire(false).await
    }

    /// Lease a newly opened connection to `endpoint`, bypassing the idle set.
    pub async fn acquire_fresh(&self, endpoint: &Endpoint) -> Result<Lease, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }
        self.endpoint_pool(endpoint).acquire(true).await
    }

    /// Stats for one endpoint, if it has been used.
    pub fn stats(&self, endpoint: &Endpoint) -> Option<PoolStatsSnapshot> {
        self.endpoints.get(endpoint).map(|p| p.value().snapshot())
    }

    /// Evict keep-alive-expired idle connections on every endpoint.
    pub fn reap_idle(&self) -> usize {
        let pools: Vec<Arc<EndpointPool>> =
            self.endpoints.iter().map(|e| Arc::clone(e.value())).collect();
        pools.iter().map(|p| p.reap_expired()).sum()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shut the pool down. Idle connections close now, leased ones when released.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let pools: Vec<Arc<EndpointPool>> =
            self.endpoints.iter().map(|e| Arc::clone(e.value())).collect();
        for pool in pools {
            pool.close();
        }
        tracing::info!("Connection pool closed");
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.close();
    }
}
