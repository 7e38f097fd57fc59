//! Default transport on top of hyper_util's pooled client.

use std::fmt;
use std::task::{Context, Poll};
use std::time::Duration;

use http::{Request, Response};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::{Builder, Client, Error, ResponseFuture};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::ClientConfig;
use tower::Service;

use super::body::TransportBody;
use super::connector::build_https_connector;
use crate::builder::ClientBuildError;

/// Pooled HTTP/1.1 + HTTP/2 transport speaking both `http://` and `https://`.
///
/// HTTPS uses rustls with the roots selected by the `tls-*` features and
/// negotiates HTTP/2 via ALPN. Clones share one connection pool.
///
/// ```ignore
/// use request_client::{HyperTransport, RequestClient};
/// use std::time::Duration;
///
/// let transport = HyperTransport::builder()
///     .pool_idle_timeout(Duration::from_secs(30))
///     .build()?;
/// let client = RequestClient::builder().transport(transport).build()?;
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, TransportBody>,
}

impl HyperTransport {
    /// Start configuring a transport.
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// A transport with pool defaults and the feature-selected TLS setup.
    pub fn new() -> Result<Self, ClientBuildError> {
        HyperTransportBuilder::new().build()
    }
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

impl Service<Request<TransportBody>> for HyperTransport {
    type Response = Response<Incoming>;
    type Error = Error;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        Service::<Request<TransportBody>>::poll_ready(&mut self.client, cx)
    }

    fn call(&mut self, request: Request<TransportBody>) -> ResponseFuture {
        self.client.request(request)
    }
}

/// Configures a [`HyperTransport`].
///
/// Pooled connections idle for 90 seconds are closed; at most 32 idle
/// connections are kept per host.
#[derive(Clone)]
pub struct HyperTransportBuilder {
    client: Builder,
    tls_config: Option<ClientConfig>,
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransportBuilder {
    pub fn new() -> Self {
        let mut client = Client::builder(TokioExecutor::new());
        // idle expiry only runs with a timer installed
        client
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(32);
        Self {
            client,
            tls_config: None,
        }
    }

    /// Replace the feature-selected TLS setup, e.g. to trust a private CA.
    pub fn tls_config(mut self, config: ClientConfig) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Skip protocol negotiation and always speak HTTP/2 (h2c on `http://`).
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.client.http2_only(enabled);
        self
    }

    /// Close pooled connections idle for longer than `timeout`.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.client.pool_idle_timeout(timeout);
        self
    }

    /// Keep idle connections open indefinitely.
    pub fn pool_idle_timeout_none(mut self) -> Self {
        self.client.pool_idle_timeout(None::<Duration>);
        self
    }

    /// Cap the idle connections kept per host. Zero disables pooling.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.client.pool_max_idle_per_host(max);
        self
    }

    /// # Errors
    ///
    /// [`ClientBuildError::Tls`] when no TLS configuration was supplied and
    /// the enabled features cannot produce one.
    pub fn build(self) -> Result<HyperTransport, ClientBuildError> {
        let connector = build_https_connector(self.tls_config)?;
        tracing::debug!(builder = ?self.client, "building hyper transport");
        Ok(HyperTransport {
            client: self.client.build(connector),
        })
    }
}

impl fmt::Debug for HyperTransportBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransportBuilder")
            .field("client", &self.client)
            .field("custom_tls", &self.tls_config.is_some())
            .finish()
    }
}
