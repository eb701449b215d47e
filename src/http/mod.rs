//! HTTP client subsystem.
//!
//! # Data Flow
//! ```text
//! Client::execute(Request)
//!     → request.rs (Host, x-request-id, hyper request)
//!     → Pool::acquire (lease, possibly after validation)
//!     → executor.rs (ready + send, classify failures)
//!     → response.rs (holds the lease until the body is drained)
//! ```

pub mod client;
pub mod executor;
pub mod request;
pub mod response;

pub use client::Client;
pub use request::{Request, X_REQUEST_ID};
pub use response::Response;
