//! Interceptor-capable HTTP client for Rust.
//!
//! This crate wraps a single-shot HTTP transport in an ergonomic client with
//! client-level defaults, per-call configuration and three interceptor chains.
//!
//! ## Features
//!
//! - Default configuration merged with per-call overrides (headers merge
//!   case-insensitively, everything else is replaced)
//! - URL resolution against a base URL, with ordered query parameters
//! - Request, response and error interceptors, sync or async, removable by handle
//! - Timeouts and external cancellation via `CancellationToken`
//! - JSON, text, blob and raw byte response decoding
//! - Pluggable status validation
//! - Any `tower::Service` as transport; a hyper + rustls transport by default
//!
//! ## Example
//!
//! ```ignore
//! use request_client::{RequestClient, RequestConfig};
//! use std::time::Duration;
//!
//! let client = RequestClient::builder()
//!     .base_url("https://api.example.com")
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! client.interceptors().request.add(|config: RequestConfig| {
//!     Ok(config.header("authorization", "Bearer token123"))
//! });
//!
//! let response = client
//!     .get_with_config("/users", RequestConfig::new().param("page", 1).param("size", 20))
//!     .await?;
//!
//! println!("{} {}", response.status(), response.status_text());
//! ```
//!
//! ## Errors
//!
//! Every failure surfaces as a [`RequestError`] after passing through the
//! error interceptors. Its [`ErrorKind`] tells a rejected status (with the
//! captured response) apart from a timeout or a transport failure:
//!
//! ```ignore
//! use request_client::ErrorKind;
//!
//! match client.get("/users/42").await {
//!     Ok(response) => println!("{:?}", response.data()),
//!     Err(err) if err.kind() == ErrorKind::Status => {
//!         let response = err.response().unwrap();
//!         eprintln!("{}: {:?}", err, response.data());
//!     }
//!     Err(err) if err.is_timeout() => eprintln!("gave up: {err}"),
//!     Err(err) => eprintln!("failed: {err}"),
//! }
//! ```
//!
//! ## Custom Transport
//!
//! ```ignore
//! use request_client::{RequestClient, RequestConfig, TransportBody};
//!
//! let transport = tower::service_fn(|req: http::Request<TransportBody>| async move {
//!     let body = http_body_util::Full::new(bytes::Bytes::from_static(b"{}"));
//!     Ok::<_, std::convert::Infallible>(http::Response::new(body))
//! });
//!
//! let client = RequestClient::with_transport(transport, RequestConfig::new());
//! ```

mod builder;
mod client;
pub mod config;
mod error;
pub mod interceptor;
pub mod response;
pub mod transport;

pub use builder::{ClientBuildError, ClientBuilder};
pub use client::RequestClient;
pub use error::{BoxError, ErrorKind, RequestError};

pub use config::{ParamValue, Payload, RequestConfig, ResponseType, StatusValidator};
pub use interceptor::{Interceptor, InterceptorId, InterceptorManager, Interceptors};
pub use response::{Blob, RequestResponse, ResponseData};
pub use transport::{HyperTransport, HyperTransportBuilder, Transport, TransportBody};

// Re-export commonly used types
pub use bytes::Bytes;
pub use tokio_util::sync::CancellationToken;

/// Create a client with the given defaults and the default hyper transport.
///
/// Equivalent to [`RequestClient::new`].
pub fn create_client(config: RequestConfig) -> Result<RequestClient, ClientBuildError> {
    RequestClient::new(config)
}
