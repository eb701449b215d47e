//! Pool behaviour against a daemon that closes idle keep-alive connections.
//!
//! Timings are scaled: the daemon drops connections idle for 300ms, the quiet
//! period is 450ms, and thresholds are either 150ms (below the peer) or 1s
//! (above it).

mod common;

use std::time::Duration;

use futures_util::future::join_all;
use sockpool::error::ErrorKind;
use sockpool::probe::{run_idle_probe, ProbePlan};
use sockpool::{Client, PoolError, Shutdown, SockpoolConfig};

use common::{IdleGaugeRecorder, MockDaemon, MockOptions, ABOVE_PEER, BELOW_PEER, IDLE_DELAY, VERSION_BODY};

const WARMUP: usize = 4;

/// Fire `n` concurrent GETs and drain them all.
async fn warm(client: &Client, n: usize) {
    let responses = join_all((0..n).map(|_| client.get("/version"))).await;
    for response in responses {
        let body = response.unwrap().bytes().await.unwrap();
        assert_eq!(&body[..], VERSION_BODY.as_bytes());
    }
}

async fn get_body(client: &Client) -> Result<String, PoolError> {
    client.get("/version").await?.text().await
}

fn client(config: &SockpoolConfig) -> Client {
    Client::new(config).unwrap()
}

#[tokio::test]
async fn test_no_policy_reuses_closed_connection_and_fails() {
    let daemon = MockDaemon::start().await;
    let client = client(&daemon.config());

    warm(&client, WARMUP).await;
    assert_eq!(client.stats().idle, WARMUP);

    tokio::time::sleep(IDLE_DELAY).await;
    assert_eq!(daemon.idle_closes(), WARMUP);

    let err = get_body(&client).await.unwrap_err();
    assert!(err.is_stale(), "expected stale connection, got {err}");
    assert_eq!(err.kind(), ErrorKind::StaleConnection);

    let stats = client.stats();
    assert_eq!(stats.stale_failures, 1);
    assert_eq!(stats.created, WARMUP as u64);
}

#[tokio::test]
async fn test_validation_below_peer_timeout_recovers() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.pool.validate_after_inactivity_ms = Some(BELOW_PEER);
    let client = client(&config);

    warm(&client, WARMUP).await;
    tokio::time::sleep(IDLE_DELAY).await;

    assert_eq!(get_body(&client).await.unwrap(), VERSION_BODY);

    let stats = client.stats();
    assert_eq!(stats.validation_failures, WARMUP as u64);
    assert_eq!(stats.created, WARMUP as u64 + 1);
    assert_eq!(stats.stale_failures, 0);
    assert_eq!(stats.idle, 1);
}

#[tokio::test]
async fn test_validation_above_peer_timeout_still_fails() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.pool.validate_after_inactivity_ms = Some(ABOVE_PEER);
    let client = client(&config);

    warm(&client, WARMUP).await;
    tokio::time::sleep(IDLE_DELAY).await;

    let err = get_body(&client).await.unwrap_err();
    assert!(err.is_stale(), "expected stale connection, got {err}");
    assert_eq!(client.stats().validated, 0);
}

#[tokio::test]
async fn test_keep_alive_below_peer_timeout_recovers() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.pool.keep_alive_timeout_ms = Some(BELOW_PEER);
    let client = client(&config);

    warm(&client, WARMUP).await;
    tokio::time::sleep(IDLE_DELAY).await;

    assert_eq!(get_body(&client).await.unwrap(), VERSION_BODY);

    let stats = client.stats();
    assert_eq!(stats.evicted, WARMUP as u64);
    assert_eq!(stats.validated, 0);
    assert_eq!(stats.created, WARMUP as u64 + 1);
}

#[tokio::test]
async fn test_keep_alive_above_peer_timeout_still_fails() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.pool.keep_alive_timeout_ms = Some(ABOVE_PEER);
    let client = client(&config);

    warm(&client, WARMUP).await;
    tokio::time::sleep(IDLE_DELAY).await;

    assert!(get_body(&client).await.unwrap_err().is_stale());
    assert_eq!(client.stats().evicted, 0);
}

#[tokio::test]
async fn test_live_connection_passes_validation_and_is_reused() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.pool.validate_after_inactivity_ms = Some(50);
    let client = client(&config);

    get_body(&client).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    get_body(&client).await.unwrap();

    let stats = client.stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.validated, 1);
    assert_eq!(stats.reused, 1);
    assert_eq!(daemon.connections(), 1);
}

#[tokio::test]
async fn test_sequential_requests_share_one_connection() {
    let daemon = MockDaemon::start().await;
    let client = client(&daemon.config());

    let mut served_by = Vec::new();
    for _ in 0..5 {
        let response = client.get("/version").await.unwrap();
        served_by.push(response.connection_id());
        response.bytes().await.unwrap();
    }

    assert!(served_by.windows(2).all(|w| w[0] == w[1]));
    let stats = client.stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.reused, 4);
    assert_eq!(daemon.connections(), 1);
    assert_eq!(daemon.requests(), 5);
}

#[tokio::test]
async fn test_capacity_fail_fast() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.pool.max_connections = Some(1);
    config.pool.acquire_timeout_ms = Some(0);
    let client = client(&config);

    let held = client.get("/version").await.unwrap();
    let err = client.get("/version").await.unwrap_err();
    assert!(matches!(err, PoolError::PoolExhausted { max: 1, .. }));

    held.bytes().await.unwrap();
    get_body(&client).await.unwrap();
}

#[tokio::test]
async fn test_capacity_wait_times_out() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.pool.max_connections = Some(1);
    config.pool.acquire_timeout_ms = Some(100);
    let client = client(&config);

    let _held = client.get("/version").await.unwrap();
    let started = std::time::Instant::now();
    let err = client.get("/version").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PoolExhausted);
    assert!(started.elapsed() >= Duration::from_millis(90));
}

#[tokio::test]
async fn test_waiter_receives_returned_connection() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.pool.max_connections = Some(1);
    let client = client(&config);

    let held = client.get("/version").await.unwrap();
    let first = held.connection_id();

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move {
            let response = client.get("/version").await?;
            let id = response.connection_id();
            response.bytes().await?;
            Ok::<_, PoolError>(id)
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    held.bytes().await.unwrap();

    let second = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(client.stats().created, 1);
}

#[tokio::test]
async fn test_stale_retry_uses_fresh_connection() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.retries.enabled = true;
    let client = client(&config);

    warm(&client, WARMUP).await;
    tokio::time::sleep(IDLE_DELAY).await;

    assert_eq!(get_body(&client).await.unwrap(), VERSION_BODY);

    let stats = client.stats();
    assert_eq!(stats.stale_failures, 1);
    assert_eq!(stats.created, WARMUP as u64 + 1);
}

#[tokio::test]
async fn test_stale_retry_skips_post() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.retries.enabled = true;
    let client = client(&config);

    warm(&client, 1).await;
    tokio::time::sleep(IDLE_DELAY).await;

    let err = client
        .execute(sockpool::Request::post("/version").body("{}"))
        .await
        .unwrap_err();
    assert!(err.is_stale());
}

#[tokio::test]
async fn test_request_timeout_discards_connection() {
    let daemon = MockDaemon::start_with(MockOptions {
        response_delay: Duration::from_millis(500),
        ..MockOptions::default()
    })
    .await;
    let mut config = daemon.config();
    config.timeouts.request_ms = 100;
    let client = client(&config);

    let err = client.get("/version").await.unwrap_err();
    assert!(matches!(err, PoolError::RequestTimeout(_)));

    let stats = client.stats();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.live, 0);
}

#[tokio::test]
async fn test_missing_socket_is_connection_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SockpoolConfig::default();
    config.client.endpoint = format!("unix://{}", dir.path().join("absent.sock").display());
    let client = client(&config);

    let err = client.get("/version").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
    assert_eq!(client.stats().live, 0);
}

#[tokio::test]
async fn test_closed_pool_rejects_requests() {
    let daemon = MockDaemon::start().await;
    let client = client(&daemon.config());

    get_body(&client).await.unwrap();
    client.close();

    assert!(matches!(
        client.get("/version").await.unwrap_err(),
        PoolError::PoolClosed
    ));
    assert_eq!(client.stats().idle, 0);
}

#[tokio::test]
async fn test_dropped_response_closes_connection() {
    let daemon = MockDaemon::start().await;
    let client = client(&daemon.config());

    let response = client.get("/version").await.unwrap();
    response.discard();

    let stats = client.stats();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.idle, 0);

    get_body(&client).await.unwrap();
    assert_eq!(client.stats().created, 2);
}

#[tokio::test]
async fn test_reaper_evicts_expired_idle_connections() {
    let daemon = MockDaemon::start_with(MockOptions {
        idle_timeout: Duration::from_secs(10),
        ..MockOptions::default()
    })
    .await;
    let mut config = daemon.config();
    config.pool.keep_alive_timeout_ms = Some(100);
    let client = client(&config);

    let shutdown = Shutdown::new();
    let reaper = client.spawn_reaper(Duration::from_millis(20), shutdown.subscribe());

    warm(&client, 2).await;
    assert_eq!(client.stats().idle, 2);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let stats = client.stats();
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.evicted, 2);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(1), reaper)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_idle_run_recovers_with_validation() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.pool.validate_after_inactivity_ms = Some(BELOW_PEER);
    let client = client(&config);

    let plan = ProbePlan {
        requests: 3,
        delay: IDLE_DELAY,
        path: "/version".to_string(),
    };
    let report = run_idle_probe(&client, &plan).await;

    assert!(report.succeeded());
    assert_eq!(report.warmup.len(), 3);
    assert!(report.warmup.iter().all(|o| o.status == Some(200)));
    assert_eq!(report.stats.validation_failures, 3);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["after_idle"]["status"], 200);
}

#[tokio::test]
async fn test_idle_run_reports_stale_failure_without_policy() {
    let daemon = MockDaemon::start().await;
    let client = client(&daemon.config());

    let plan = ProbePlan {
        requests: 3,
        delay: IDLE_DELAY,
        path: "/version".to_string(),
    };
    let report = run_idle_probe(&client, &plan).await;

    assert!(!report.succeeded());
    assert_eq!(report.after_idle.error_kind, Some(ErrorKind::StaleConnection));
}

#[tokio::test]
async fn test_idle_run_fails_on_error_status() {
    let daemon = MockDaemon::start().await;
    let mut config = daemon.config();
    config.pool.validate_after_inactivity_ms = Some(BELOW_PEER);
    let client = client(&config);

    let plan = ProbePlan {
        requests: 3,
        delay: IDLE_DELAY,
        path: "/missing".to_string(),
    };
    let report = run_idle_probe(&client, &plan).await;

    assert!(report.warmup.iter().all(|o| o.status == Some(404)));
    assert_eq!(report.after_idle.status, Some(404));
    assert!(report.after_idle.error.is_none());
    assert!(!report.warmup_succeeded());
    assert!(!report.succeeded());
}

#[test]
fn test_idle_gauge_follows_acquire_evictions() {
    let recorder = IdleGaugeRecorder::default();
    let idle = recorder.idle.clone();

    metrics::with_local_recorder(&recorder, || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let daemon = MockDaemon::start().await;
            let mut config = daemon.config();
            config.pool.keep_alive_timeout_ms = Some(BELOW_PEER);
            let client = client(&config);

            warm(&client, WARMUP).await;
            assert_eq!(idle.value(), Some(WARMUP as f64));

            tokio::time::sleep(IDLE_DELAY).await;
            let held = client.get("/version").await.unwrap();
            assert_eq!(client.stats().idle, 0);
            assert_eq!(idle.value(), Some(0.0));

            held.bytes().await.unwrap();
            assert_eq!(idle.value(), Some(1.0));
        });
    });
}

#[tokio::test]
async fn test_most_recently_returned_connection_is_reused_first() {
    let daemon = MockDaemon::start_with(MockOptions {
        idle_timeout: Duration::from_secs(10),
        ..MockOptions::default()
    })
    .await;
    let client = client(&daemon.config());

    let first = client.get("/version").await.unwrap();
    let second = client.get("/version").await.unwrap();
    let (older, newer) = (first.connection_id(), second.connection_id());
    assert_ne!(older, newer);

    first.bytes().await.unwrap();
    second.bytes().await.unwrap();
    assert_eq!(client.stats().idle, 2);

    let next = client.get("/version").await.unwrap();
    assert_eq!(next.connection_id(), newer);
    next.bytes().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_callers_never_exceed_capacity() {
    const MAX: usize = 2;
    const CALLERS: usize = 10;

    let daemon = MockDaemon::start_with(MockOptions {
        idle_timeout: Duration::from_secs(10),
        response_delay: Duration::from_millis(20),
    })
    .await;
    let mut config = daemon.config();
    config.pool.max_connections = Some(MAX);
    let client = client(&config);

    let tasks: Vec<_> = (0..CALLERS)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                let response = client.get("/version").await?;
                let live = client.stats().live;
                response.bytes().await?;
                Ok::<_, PoolError>(live)
            })
        })
        .collect();

    for task in join_all(tasks).await {
        let live = task.unwrap().unwrap();
        assert!(live <= MAX, "{live} live connections with a limit of {MAX}");
    }

    assert!(daemon.connections() <= MAX);
    assert_eq!(daemon.requests(), CALLERS);
    let stats = client.stats();
    assert!(stats.created <= MAX as u64);
    assert!(stats.live <= MAX);
}
