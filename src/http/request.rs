//! Outgoing request representation.
//!
//! # Responsibilities
//! - Hold method, path, headers and a buffered body
//! - Stamp every request with an `x-request-id` for correlation
//! - Convert to a hyper request addressed to an endpoint
//!
//! Bodies are buffered so a request can be replayed on a fresh connection.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use http_body_util::Full;
use serde::Serialize;
use uuid::Uuid;

use crate::error::PoolError;
use crate::net::endpoint::Endpoint;

/// Header name for request IDs.
pub const X_REQUEST_ID: &str = "x-request-id";

/// A request to the daemon.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    /// Build a request. A missing leading slash is added.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Self {
            method,
            path,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a header, replacing any previous value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a header from strings.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, PoolError> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(http::Error::from)?;
        let value = HeaderValue::from_str(value).map_err(http::Error::from)?;
        Ok(self.header(name, value))
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, PoolError> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .body(body))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Build the hyper request sent to `endpoint`.
    pub(crate) fn to_http(&self, endpoint: &Endpoint) -> Result<http::Request<Full<Bytes>>, PoolError> {
        let mut builder = http::Request::builder()
            .method(self.method.clone())
            .uri(self.path.as_str())
            .header(header::HOST, endpoint.host_header());

        if let Some(headers) = builder.headers_mut() {
            for (name, value) in self.headers.iter() {
                headers.insert(name.clone(), value.clone());
            }
            if !headers.contains_key(X_REQUEST_ID) {
                let id = Uuid::new_v4().to_string();
                if let Ok(value) = HeaderValue::from_str(&id) {
                    headers.insert(X_REQUEST_ID, value);
                }
            }
        }

        Ok(builder.body(Full::new(self.body.clone()))?)
    }
}
