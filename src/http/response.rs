//! Response with a pool-bound body.
//!
//! A [`Response`] keeps the connection's lease until its body has been read.
//! Reading the whole body returns the connection to the pool as healthy;
//! dropping the response (or failing mid-body) closes it, because an
//! HTTP/1.1 connection with unread bytes cannot be reused.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde::de::DeserializeOwned;

use crate::error::PoolError;
use crate::net::connection::ConnectionId;
use crate::pool::lease::{Lease, Outcome};

#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Incoming,
    lease: Lease,
    read_timeout: Duration,
}

impl Response {
    pub(crate) fn new(response: http::Response<Incoming>, lease: Lease, read_timeout: Duration) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
            lease,
            read_timeout,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Connection that carried this exchange.
    pub fn connection_id(&self) -> ConnectionId {
        self.lease.id()
    }

    /// Drain the body and release the connection.
    pub async fn bytes(self) -> Result<Bytes, PoolError> {
        let Self {
            body,
            lease,
            read_timeout,
            ..
        } = self;

        match tokio::time::timeout(read_timeout, body.collect()).await {
            Ok(Ok(collected)) => {
                lease.release(Outcome::Healthy);
                Ok(collected.to_bytes())
            }
            Ok(Err(e)) => {
                tracing::warn!(connection_id = %lease.id(), error = %e, "Failed reading response body");
                lease.release(Outcome::Failed);
                Err(PoolError::ResponseBodyRead(e))
            }
            Err(_) => {
                tracing::warn!(connection_id = %lease.id(), timeout = ?read_timeout, "Timed out reading response body");
                lease.release(Outcome::Failed);
                Err(PoolError::RequestTimeout(read_timeout))
            }
        }
    }

    /// Drain the body as UTF-8 text (lossy).
    pub async fn text(self) -> Result<String, PoolError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Drain the body and decode it as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, PoolError> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Give up on the body. The connection is closed, not reused.
    pub fn discard(self) {
        drop(self);
    }
}
