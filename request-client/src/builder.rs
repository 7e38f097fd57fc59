//! Client builder for the request client.
//!
//! Provides a fluent API for configuring and building a [`RequestClient`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use url::Url;

use crate::client::RequestClient;
use crate::config::{ParamValue, RequestConfig, ResponseType, overlay_headers};
use crate::transport::{HyperTransport, Transport};

/// Builder for creating a [`RequestClient`].
///
/// Everything set here becomes the client-level default configuration that
/// each request's own [`RequestConfig`] is overlaid on.
///
/// # Example
///
/// ```ignore
/// use request_client::RequestClient;
/// use std::time::Duration;
///
/// let client = RequestClient::builder()
///     .base_url("https://api.example.com")
///     .header("accept", "application/json")
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    defaults: RequestConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("defaults", &self.defaults)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl ClientBuilder {
    /// Create a builder with empty defaults and the hyper transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL that relative request URLs are resolved against.
    ///
    /// The base URL must be absolute, e.g. `https://api.example.com/v1/`.
    /// Resolution follows the URL standard, so keep a trailing slash when
    /// request paths should be appended below the base path.
    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.defaults.base_url = Some(base_url.into());
        self
    }

    /// Add a default header.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid. Use
    /// [`try_header`](Self::try_header) for a non-panicking alternative.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Debug,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Debug,
    {
        self.defaults = self.defaults.header(name, value);
        self
    }

    /// Try to add a default header.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header<K, V>(mut self, name: K, value: V) -> Option<Self>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        self.defaults = self.defaults.try_header(name, value)?;
        Some(self)
    }

    /// Add several default headers, replacing existing values per name.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        overlay_headers(&mut self.defaults.headers, &headers);
        self
    }

    /// Set the default timeout. A zero duration disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.defaults.timeout = Some(timeout);
        self
    }

    /// Append a default query parameter.
    ///
    /// Requests that set their own params replace the defaults as a whole.
    pub fn param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        self.defaults = self.defaults.param(key, value);
        self
    }

    /// Set the default response decoding mode.
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.defaults.response_type = Some(response_type);
        self
    }

    /// Set the default status validator.
    pub fn validate_status<F>(mut self, f: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.defaults = self.defaults.validate_status(f);
        self
    }

    /// Replace the whole default configuration.
    pub fn config(mut self, config: RequestConfig) -> Self {
        self.defaults = config;
        self
    }

    /// Use a custom transport instead of [`HyperTransport`].
    ///
    /// Any `tower::Service<http::Request<TransportBody>>` that is
    /// `Clone + Send + Sync` qualifies, see [`Transport`].
    ///
    /// [`TransportBody`]: crate::transport::TransportBody
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute URL, or if the
    /// default transport cannot be created.
    pub fn build(self) -> Result<RequestClient, ClientBuildError> {
        if let Some(base_url) = &self.defaults.base_url {
            Url::parse(base_url).map_err(|source| ClientBuildError::InvalidBaseUrl {
                url: base_url.clone(),
                source,
            })?;
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::new()?),
        };

        Ok(RequestClient::from_parts(transport, self.defaults))
    }
}

/// Error type for client building failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// The base URL could not be parsed as an absolute URL.
    #[error("invalid base URL `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// No TLS configuration could be assembled for the default transport.
    #[error("failed to configure TLS: {0}")]
    Tls(String),
}
