//! Error types for pooled request execution.

use std::io;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::net::connection::ConnectionId;

/// Result alias used throughout the crate.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by the pool, the executor and the client.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The endpoint URI could not be parsed.
    #[error("invalid endpoint '{uri}': {reason}")]
    InvalidEndpoint { uri: String, reason: String },

    /// Nothing is listening at the endpoint (refused, or socket file missing).
    #[error("connection refused by {endpoint}: {source}")]
    ConnectionRefused {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// Dialing the endpoint failed for another reason.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// Dial plus handshake did not finish in time.
    #[error("connecting to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    /// HTTP/1.1 handshake over a fresh stream failed.
    #[error("HTTP handshake with {endpoint} failed: {source}")]
    Handshake {
        endpoint: String,
        #[source]
        source: hyper::Error,
    },

    /// A request was sent over a reused connection the peer had already closed.
    #[error("stale connection {connection} (idle for {idle:?}): {source}")]
    StaleConnection {
        connection: ConnectionId,
        idle: Duration,
        #[source]
        source: hyper::Error,
    },

    /// A liveness probe on an idle connection failed.
    #[error("validation of connection {connection} failed: {reason}")]
    Validation {
        connection: ConnectionId,
        reason: String,
    },

    /// Capacity reached and the wait policy does not allow (further) waiting.
    #[error("connection pool for {endpoint} exhausted ({max} connections)")]
    PoolExhausted { endpoint: String, max: usize },

    /// The response head arrived but reading the body failed.
    #[error("failed to read response body: {0}")]
    ResponseBodyRead(#[source] hyper::Error),

    /// Transport failure on a connection that was not reused.
    #[error("transport error on connection {connection}: {source}")]
    Transport {
        connection: ConnectionId,
        #[source]
        source: hyper::Error,
    },

    /// The exchange (or the body drain) exceeded the request timeout.
    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// The request could not be turned into a valid HTTP message.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] http::Error),

    /// The response body was not valid JSON for the requested type.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The pool has been shut down.
    #[error("connection pool is closed")]
    PoolClosed,
}

/// Coarse classification of a [`PoolError`], used for metrics labels and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidEndpoint,
    ConnectionRefused,
    Connect,
    StaleConnection,
    Validation,
    PoolExhausted,
    ResponseBodyRead,
    Transport,
    Timeout,
    InvalidRequest,
    PoolClosed,
}

impl ErrorKind {
    /// Stable label for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidEndpoint => "invalid_endpoint",
            ErrorKind::ConnectionRefused => "connection_refused",
            ErrorKind::Connect => "connect",
            ErrorKind::StaleConnection => "stale_connection",
            ErrorKind::Validation => "validation",
            ErrorKind::PoolExhausted => "pool_exhausted",
            ErrorKind::ResponseBodyRead => "response_body_read",
            ErrorKind::Transport => "transport",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::PoolClosed => "pool_closed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PoolError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::InvalidEndpoint { .. } => ErrorKind::InvalidEndpoint,
            PoolError::ConnectionRefused { .. } => ErrorKind::ConnectionRefused,
            PoolError::Connect { .. } | PoolError::Handshake { .. } => ErrorKind::Connect,
            PoolError::StaleConnection { .. } => ErrorKind::StaleConnection,
            PoolError::Validation { .. } => ErrorKind::Validation,
            PoolError::PoolExhausted { .. } => ErrorKind::PoolExhausted,
            PoolError::ResponseBodyRead(_) | PoolError::Decode(_) => ErrorKind::ResponseBodyRead,
            PoolError::Transport { .. } => ErrorKind::Transport,
            PoolError::ConnectTimeout { .. } | PoolError::RequestTimeout(_) => ErrorKind::Timeout,
            PoolError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            PoolError::PoolClosed => ErrorKind::PoolClosed,
        }
    }

    /// True if the request went out over a connection the peer had already closed.
    pub fn is_stale(&self) -> bool {
        matches!(self, PoolError::StaleConnection { .. })
    }

    /// Errors a caller may retry on a fresh connection.
    ///
    /// Only staleness is retryable; every other kind reaches the caller unchanged.
    pub fn is_retryable(&self) -> bool {
        self.is_stale()
    }
}

/// A real hyper error from a connection whose peer hung up.
#[cfg(test)]
pub(crate) async fn peer_closed_error() -> hyper::Error {
    use bytes::Bytes;
    use http_body_util::Full;
    use hyper_util::rt::TokioIo;

    let (client, server) = tokio::net::UnixStream::pair().unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Full<Bytes>>(TokioIo::new(client))
        .await
        .unwrap();
    let driver = tokio::spawn(conn);
    drop(server);
    let _ = driver.await;
    sender.ready().await.unwrap_err()
}

/// A stale-connection error as the executor would produce it.
#[cfg(test)]
pub(crate) async fn stale_error() -> PoolError {
    PoolError::StaleConnection {
        connection: ConnectionId::new(),
        idle: Duration::from_secs(11),
        source: peer_closed_error().await,
    }
}
