//! Endpoint addressing.
//!
//! An endpoint is written as a URI:
//! - `unix:///run/user/1000/podman/podman.sock` for a Unix domain socket
//! - `tcp://127.0.0.1:2375` or `http://127.0.0.1:2375` for TCP

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use url::Url;

use crate::error::PoolError;

/// Host header sent on Unix socket requests; the daemon ignores it but HTTP/1.1 requires one.
const UNIX_HOST_HEADER: &str = "localhost";

/// Identity of a remote endpoint; the pool keys its connections by this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Unix domain socket path.
    Unix(PathBuf),
    /// TCP host and port.
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    /// Parse an endpoint URI.
    pub fn parse(uri: &str) -> Result<Self, PoolError> {
        let invalid = |reason: &str| PoolError::InvalidEndpoint {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        // Socket paths are taken verbatim; URL parsing would mangle them.
        if let Some(path) = uri.strip_prefix("unix://") {
            if path.is_empty() || path == "/" {
                return Err(invalid("missing socket path"));
            }
            let path = PathBuf::from(path);
            if !path.is_absolute() {
                return Err(invalid("socket path must be absolute"));
            }
            return Ok(Endpoint::Unix(path));
        }

        let url = Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;

        match url.scheme() {
            "tcp" | "http" => {
                let host = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| invalid("missing host"))?;
                let port = url
                    .port_or_known_default()
                    .ok_or_else(|| invalid("missing port"))?;
                Ok(Endpoint::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            other => Err(invalid(&format!("unsupported scheme '{}'", other))),
        }
    }

    /// Build a Unix socket endpoint from a path.
    pub fn unix(path: impl AsRef<Path>) -> Self {
        Endpoint::Unix(path.as_ref().to_path_buf())
    }

    /// Value for the `Host` header of requests to this endpoint.
    pub fn host_header(&self) -> String {
        match self {
            Endpoint::Unix(_) => UNIX_HOST_HEADER.to_string(),
            Endpoint::Tcp { host, port } => format!("{}:{}", host, port),
        }
    }

    /// True for Unix domain socket endpoints.
    pub fn is_unix(&self) -> bool {
        matches!(self, Endpoint::Unix(_))
    }
}

impl FromStr for Endpoint {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_socket_uri() {
        let ep = Endpoint::parse("unix:///run/user/1000/podman/podman.sock").unwrap();
        assert_eq!(
            ep,
            Endpoint::Unix(PathBuf::from("/run/user/1000/podman/podman.sock"))
        );
        assert!(ep.is_unix());
        assert_eq!(ep.host_header(), "localhost");
        assert_eq!(ep.to_string(), "unix:///run/user/1000/podman/podman.sock");
    }

    #[test]
    fn parses_tcp_and_http_uris() {
        let tcp: Endpoint = "tcp://127.0.0.1:2375".parse().unwrap();
        assert_eq!(
            tcp,
            Endpoint::Tcp {
                host: "127.0.0.1".into(),
                port: 2375
            }
        );
        assert_eq!(tcp.host_header(), "127.0.0.1:2375");

        let http: Endpoint = "http://docker.local".parse().unwrap();
        assert_eq!(
            http,
            Endpoint::Tcp {
                host: "docker.local".into(),
                port: 80
            }
        );
    }

    #[test]
    fn rejects_bad_uris() {
        assert!(Endpoint::parse("unix://").is_err());
        assert!(Endpoint::parse("tcp://127.0.0.1").is_err());
        assert!(Endpoint::parse("npipe:////./pipe/docker_engine").is_err());
        assert!(Endpoint::parse("not a uri").is_err());
    }
}
