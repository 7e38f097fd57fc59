//! Request error types.
//!
//! This module provides [`RequestError`], the single error type surfaced by
//! every request made through [`RequestClient`](crate::RequestClient).

use std::error::Error as StdError;
use std::sync::Arc;

use crate::config::RequestConfig;
use crate::response::RequestResponse;

/// Boxed error type used at the transport seam.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Message used for every cancellation-triggered failure.
pub(crate) const TIMEOUT_MESSAGE: &str = "Request timeout";

/// Classification of a [`RequestError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The exchange succeeded but the status validator rejected the status.
    Status,
    /// The request was cancelled, either by its timeout or by an external token.
    Timeout,
    /// The transport failed (connection refused, reset, body read error, ...).
    Transport,
    /// The request URL could not be resolved.
    InvalidUrl,
    /// The request could not be assembled (invalid header, body encoding).
    Encode,
    /// A response with an accepted status could not be decoded.
    Decode,
    /// Raised by an interceptor.
    Interceptor,
}

/// Error returned by [`RequestClient`](crate::RequestClient) requests.
///
/// Status failures carry the captured [`RequestResponse`]; every other kind
/// has no response attached. Error interceptors receive this value and may
/// rewrite its message, response or config before it reaches the caller.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct RequestError {
    kind: ErrorKind,
    message: String,
    response: Option<Box<RequestResponse>>,
    config: Option<Box<RequestConfig>>,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl RequestError {
    /// Create an error raised by an interceptor.
    ///
    /// # Example
    ///
    /// ```
    /// use request_client::{ErrorKind, RequestError};
    ///
    /// let err = RequestError::new("missing credentials");
    /// assert_eq!(err.kind(), ErrorKind::Interceptor);
    /// assert_eq!(err.to_string(), "missing credentials");
    /// ```
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self::with_kind(ErrorKind::Interceptor, message)
    }

    /// Create an error of the given kind.
    pub fn with_kind<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            response: None,
            config: None,
            source: None,
        }
    }

    /// Create a status-validation failure capturing the rejected response.
    pub fn status(response: RequestResponse) -> Self {
        let message = format!("Request failed with status {}", response.status().as_u16());
        let config = response.config().clone();
        Self {
            kind: ErrorKind::Status,
            message,
            response: Some(Box::new(response)),
            config: Some(Box::new(config)),
            source: None,
        }
    }

    /// Create the cancellation failure.
    pub fn timeout() -> Self {
        Self::with_kind(ErrorKind::Timeout, TIMEOUT_MESSAGE)
    }

    /// Wrap a transport failure, keeping its message.
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::from_source(ErrorKind::Transport, err.into())
    }

    /// Wrap a failure of the given kind, keeping its message and source.
    pub(crate) fn from_source(kind: ErrorKind, err: BoxError) -> Self {
        Self {
            kind,
            message: err.to_string(),
            response: None,
            config: None,
            source: Some(Arc::from(err)),
        }
    }

    /// Attach the configuration that produced this error.
    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = Some(Box::new(config));
        self
    }

    /// Attach the config only if none is attached yet.
    pub(crate) fn or_config(mut self, config: &RequestConfig) -> Self {
        if self.config.is_none() {
            self.config = Some(Box::new(config.clone()));
        }
        self
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Replace the error message.
    pub fn set_message<S: Into<String>>(&mut self, message: S) {
        self.message = message.into();
    }

    /// Get the captured response, present for [`ErrorKind::Status`] failures.
    pub fn response(&self) -> Option<&RequestResponse> {
        self.response.as_deref()
    }

    /// Get a mutable reference to the captured response.
    pub fn response_mut(&mut self) -> Option<&mut RequestResponse> {
        self.response.as_deref_mut()
    }

    /// Remove and return the captured response.
    pub fn take_response(&mut self) -> Option<RequestResponse> {
        self.response.take().map(|response| *response)
    }

    /// Get the configuration that produced this error.
    pub fn config(&self) -> Option<&RequestConfig> {
        self.config.as_deref()
    }

    /// Get a mutable reference to the attached configuration.
    pub fn config_mut(&mut self) -> Option<&mut RequestConfig> {
        self.config.as_deref_mut()
    }

    /// Whether this error was caused by cancellation.
    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    /// Whether this error is a rejected status.
    pub fn is_status(&self) -> bool {
        self.kind == ErrorKind::Status
    }
}
