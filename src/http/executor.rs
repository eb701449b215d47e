//! Request execution over a leased connection.
//!
//! # Responsibilities
//! - Send one request over one leased connection, bounded by a timeout
//! - Record activity on success and hand the lease to the [`Response`]
//! - Classify transport failures and evict the connection
//!
//! # Design Decisions
//! - A failure on a reused connection that shows the peer went away is
//!   `StaleConnection`; the same failure on a fresh connection is `Transport`
//! - Nothing is retried here

use std::error::Error as StdError;
use std::io;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::Full;

use crate::error::PoolError;
use crate::http::response::Response;
use crate::pool::lease::{Lease, Outcome};

/// Perform one exchange over `lease`.
pub async fn execute(
    mut lease: Lease,
    request: http::Request<Full<Bytes>>,
    timeout: Duration,
) -> Result<Response, PoolError> {
    let connection = lease.id();
    let reused = lease.connection().is_reused();
    let idle = lease.connection().idle_for(Instant::now());

    let exchange = async {
        let sender = lease.connection_mut().sender_mut();
        sender.ready().await?;
        sender.send_request(request).await
    };
    let result = tokio::time::timeout(timeout, exchange).await;

    match result {
        Ok(Ok(response)) => {
            lease.connection_mut().touch();
            tracing::debug!(
                connection_id = %connection,
                status = %response.status(),
                reused,
                "Response received"
            );
            Ok(Response::new(response, lease, timeout))
        }
        Ok(Err(source)) => {
            let err = classify(connection, reused, idle, source);
            if err.is_stale() {
                lease.record_stale_failure();
            }
            tracing::warn!(
                connection_id = %connection,
                reused,
                idle_ms = idle.as_millis() as u64,
                error = %err,
                "Request failed, evicting connection"
            );
            lease.release(Outcome::Failed);
            Err(err)
        }
        Err(_) => {
            tracing::warn!(connection_id = %connection, timeout = ?timeout, "Request timed out, evicting connection");
            lease.release(Outcome::Failed);
            Err(PoolError::RequestTimeout(timeout))
        }
    }
}

fn classify(
    connection: crate::net::ConnectionId,
    reused: bool,
    idle: Duration,
    source: hyper::Error,
) -> PoolError {
    if reused && is_connection_lost(&source) {
        PoolError::StaleConnection {
            connection,
            idle,
            source,
        }
    } else {
        PoolError::Transport { connection, source }
    }
}

/// True if the error shows the transport went away (closed, reset, half-closed).
pub(crate) fn is_connection_lost(err: &hyper::Error) -> bool {
    if err.is_canceled() || err.is_closed() || err.is_incomplete_message() {
        return true;
    }
    matches!(
        io_error_kind(err),
        Some(
            io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::UnexpectedEof
                | io::ErrorKind::NotConnected
        )
    )
}

/// Walk the source chain looking for an I/O error.
fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = e.source();
    }
    None
}
