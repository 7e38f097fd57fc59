//! HTTP transport layer for the request client.
//!
//! The client never performs network I/O itself. It hands a fully built
//! `http::Request<TransportBody>` to a [`Transport`] and decodes whatever
//! comes back. Any `tower::Service` with a compatible signature is a
//! transport, so tests and middleware stacks plug in directly; the default
//! is [`HyperTransport`].
//!
//! # Cancellation
//!
//! Every request carries a [`CancellationToken`] in its extensions (see
//! [`cancellation_token`]). The client stops waiting as soon as that token is
//! cancelled and drops the transport future; transports may also observe the
//! token to abandon work early.
//!
//! # Example
//!
//! ```ignore
//! use request_client::transport::{HyperTransport, HyperTransportBuilder};
//! use std::time::Duration;
//!
//! let transport = HyperTransportBuilder::new()
//!     .pool_idle_timeout(Duration::from_secs(60))
//!     .build()?;
//!
//! let client = RequestClient::builder()
//!     .base_url("https://api.example.com")
//!     .transport(transport)
//!     .build()?;
//! ```

mod body;
mod connector;
mod hyper;

use bytes::Bytes;
use http::{Request, Response};
use http_body::Body;
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceExt};

use crate::error::BoxError;
use crate::interceptor::BoxFuture;

pub use body::TransportBody;
pub use connector::build_https_connector;

#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
pub use connector::default_tls_config;

pub use self::hyper::{HyperTransport, HyperTransportBuilder};

/// Type-erased response body handed back by a [`Transport`].
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// A single-shot HTTP request/response capability.
///
/// Implemented for every `tower::Service<http::Request<TransportBody>>` that
/// is `Clone + Send + Sync` and returns an `http::Response` with a
/// `Bytes`-framed body. Each call clones the service and drives it with
/// [`ServiceExt::oneshot`].
pub trait Transport: Send + Sync + 'static {
    /// Send one request.
    fn send(
        &self,
        request: Request<TransportBody>,
    ) -> BoxFuture<'static, Result<Response<ResponseBody>, BoxError>>;
}

impl<S, B> Transport for S
where
    S: Service<Request<TransportBody>, Response = Response<B>> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    fn send(
        &self,
        request: Request<TransportBody>,
    ) -> BoxFuture<'static, Result<Response<ResponseBody>, BoxError>> {
        let service = self.clone();
        Box::pin(async move {
            let response = service
                .oneshot(request)
                .await
                .map_err(Into::<BoxError>::into)?;
            let response = response.map(|body| body.map_err(Into::<BoxError>::into).boxed_unsync());
            Ok::<_, BoxError>(response)
        })
    }
}

/// The cancellation token attached to a request by the client.
///
/// Transports can await [`CancellationToken::cancelled`] to stop early when the
/// request times out or the caller cancels it.
pub fn cancellation_token<B>(request: &Request<B>) -> Option<&CancellationToken> {
    request.extensions().get::<CancellationToken>()
}
