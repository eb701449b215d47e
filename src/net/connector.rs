//! Dialing endpoints and establishing HTTP/1.1 connections.

use std::io;
use std::time::Duration;

use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};

use crate::error::PoolError;
use crate::net::connection::{Connection, ConnectionId};
use crate::net::endpoint::Endpoint;

/// Open a new connection to `endpoint`, bounded by `timeout` for dial plus handshake.
pub async fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Connection, PoolError> {
    let dial = async {
        match endpoint {
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(path)
                    .await
                    .map_err(|e| dial_error(endpoint, e))?;
                handshake(endpoint, stream).await
            }
            Endpoint::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(|e| dial_error(endpoint, e))?;
                stream.set_nodelay(true).ok();
                handshake(endpoint, stream).await
            }
        }
    };

    tokio::time::timeout(timeout, dial)
        .await
        .map_err(|_| PoolError::ConnectTimeout {
            endpoint: endpoint.to_string(),
            timeout,
        })?
}

async fn handshake<S>(endpoint: &Endpoint, stream: S) -> Result<Connection, PoolError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (sender, conn) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|source| PoolError::Handshake {
            endpoint: endpoint.to_string(),
            source,
        })?;

    let id = ConnectionId::new();

    // Spawn connection driver; it finishes when either side closes the socket.
    let driver = tokio::spawn(async move {
        match conn.await {
            Ok(()) => tracing::trace!(connection_id = %id, "Connection driver finished"),
            Err(e) => tracing::debug!(connection_id = %id, error = %e, "Connection driver failed"),
        }
    });

    tracing::debug!(connection_id = %id, endpoint = %endpoint, "Connection established");
    Ok(Connection::new(id, endpoint.clone(), sender, driver))
}

/// Map a dial failure. A missing socket file counts as refused: nothing is listening.
fn dial_error(endpoint: &Endpoint, source: io::Error) -> PoolError {
    match source.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => PoolError::ConnectionRefused {
            endpoint: endpoint.to_string(),
            source,
        },
        _ => PoolError::Connect {
            endpoint: endpoint.to_string(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_socket_counts_as_refused() {
        let ep = Endpoint::unix("/nonexistent/daemon.sock");
        let err = dial_error(&ep, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, PoolError::ConnectionRefused { .. }));

        let err = dial_error(&ep, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, PoolError::Connect { .. }));
    }

    #[tokio::test]
    async fn connect_to_missing_socket_fails_fast() {
        let ep = Endpoint::unix("/nonexistent/sockpool-test/daemon.sock");
        let err = connect(&ep, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, PoolError::ConnectionRefused { .. }));
    }
}
