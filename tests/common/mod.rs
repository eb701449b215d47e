//! Shared utilities for integration tests: an in-process daemon on a Unix socket.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sockpool::SockpoolConfig;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

use metrics::{Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};

/// Idle timeout the mock daemon enforces, scaled down from Podman's 10s.
pub const PEER_IDLE: Duration = Duration::from_millis(300);
/// Quiet period longer than `PEER_IDLE`.
pub const IDLE_DELAY: Duration = Duration::from_millis(450);
/// Threshold below the peer idle timeout.
pub const BELOW_PEER: u64 = 150;
/// Threshold above the peer idle timeout.
pub const ABOVE_PEER: u64 = 1_000;

pub const VERSION_BODY: &str = r#"{"Version":"4.9.3","ApiVersion":"1.41.0"}"#;

#[derive(Debug, Clone)]
pub struct MockOptions {
    /// Close a keep-alive connection after this long without a request.
    pub idle_timeout: Duration,
    /// Wait this long before answering each request.
    pub response_delay: Duration,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            idle_timeout: PEER_IDLE,
            response_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockCounters {
    pub connections: AtomicUsize,
    pub requests: AtomicUsize,
    pub idle_closes: AtomicUsize,
}

/// Minimal HTTP/1.1 keep-alive server that drops idle connections like Podman does.
pub struct MockDaemon {
    _dir: TempDir,
    path: PathBuf,
    counters: Arc<MockCounters>,
    task: JoinHandle<()>,
}

impl MockDaemon {
    pub async fn start() -> Self {
        Self::start_with(MockOptions::default()).await
    }

    pub async fn start_with(options: MockOptions) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podman.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let counters = Arc::new(MockCounters::default());

        let task = {
            let counters = counters.clone();
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((socket, _)) => {
                            counters.connections.fetch_add(1, Ordering::SeqCst);
                            tokio::spawn(serve(socket, options.clone(), counters.clone()));
                        }
                        Err(_) => break,
                    }
                }
            })
        };

        Self {
            _dir: dir,
            path,
            counters,
            task,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("unix://{}", self.path.display())
    }

    pub fn connections(&self) -> usize {
        self.counters.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.counters.requests.load(Ordering::SeqCst)
    }

    pub fn idle_closes(&self) -> usize {
        self.counters.idle_closes.load(Ordering::SeqCst)
    }

    /// Client configuration pointing at this daemon with no staleness policy.
    pub fn config(&self) -> SockpoolConfig {
        let mut config = SockpoolConfig::default();
        config.client.endpoint = self.endpoint();
        config.timeouts.connect_ms = 1_000;
        config.timeouts.request_ms = 2_000;
        config
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

async fn serve(mut socket: UnixStream, options: MockOptions, counters: Arc<MockCounters>) {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        // Read one request head; the idle timer only runs between requests.
        let head_end = loop {
            if let Some(end) = find_head_end(&buf) {
                break end;
            }
            let read = if buf.is_empty() {
                match tokio::time::timeout(options.idle_timeout, socket.read(&mut chunk)).await {
                    Ok(read) => read,
                    Err(_) => {
                        counters.idle_closes.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                }
            } else {
                socket.read(&mut chunk).await
            };
            match read {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let body_len = content_length(&head);
        while buf.len() < head_end + body_len {
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
        buf.drain(..head_end + body_len);

        counters.requests.fetch_add(1, Ordering::SeqCst);
        if !options.response_delay.is_zero() {
            tokio::time::sleep(options.response_delay).await;
        }

        let path = head.split_whitespace().nth(1).unwrap_or("/");
        let (status, body) = match path {
            "/version" => ("200 OK", VERSION_BODY),
            "/_ping" => ("200 OK", "OK"),
            _ => ("404 Not Found", r#"{"message":"not found"}"#),
        };
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        if socket.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Last value written to the `sockpool_idle_connections` gauge.
#[derive(Debug, Default)]
pub struct IdleGauge(Mutex<Option<f64>>);

impl IdleGauge {
    pub fn value(&self) -> Option<f64> {
        *self.0.lock().unwrap()
    }
}

impl GaugeFn for IdleGauge {
    fn increment(&self, value: f64) {
        let mut current = self.0.lock().unwrap();
        *current = Some(current.unwrap_or(0.0) + value);
    }

    fn decrement(&self, value: f64) {
        let mut current = self.0.lock().unwrap();
        *current = Some(current.unwrap_or(0.0) - value);
    }

    fn set(&self, value: f64) {
        *self.0.lock().unwrap() = Some(value);
    }
}

/// Recorder that only keeps the idle-connections gauge; everything else is dropped.
#[derive(Debug, Default)]
pub struct IdleGaugeRecorder {
    pub idle: Arc<IdleGauge>,
}

impl Recorder for IdleGaugeRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
        Counter::noop()
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        if key.name() == "sockpool_idle_connections" {
            Gauge::from_arc(self.idle.clone())
        } else {
            Gauge::noop()
        }
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
