//! Request configuration.
//!
//! [`RequestConfig`] is used both for client-level defaults and for per-call
//! overrides. Each request computes its effective configuration with
//! [`RequestConfig::merge`], which never mutates the defaults.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, RequestError};

/// How the response body is decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// Parse the body as JSON.
    #[default]
    Json,
    /// Decode the body as UTF-8 text.
    Text,
    /// Keep the raw bytes together with the response MIME type.
    Blob,
    /// Keep the raw bytes.
    Bytes,
}

/// A query parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    String(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::String(s) => f.write_str(s),
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Uint(n) => write!(f, "{n}"),
            ParamValue::Float(n) => write!(f, "{n}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Float(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

macro_rules! param_from_int {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::$variant(value.into())
                }
            }
        )*
    };
}

param_from_int!(Int: i8, i16, i32, i64);
param_from_int!(Uint: u8, u16, u32, u64);

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::Uint(value as u64)
    }
}

/// A request body.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Sent verbatim.
    Text(String),
    /// Serialized as JSON.
    Json(serde_json::Value),
}

impl Payload {
    /// Serialize any value into a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, RequestError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| RequestError::from_source(ErrorKind::Encode, e.into()))
    }

    /// Whether this payload should be left off the request.
    pub(crate) fn is_blank(&self) -> bool {
        match self {
            Payload::Text(text) => text.is_empty(),
            Payload::Json(value) => value.is_null(),
        }
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_owned())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// Predicate deciding whether a response status counts as success.
#[derive(Clone)]
pub struct StatusValidator(Arc<dyn Fn(StatusCode) -> bool + Send + Sync>);

impl StatusValidator {
    /// Create a validator from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Validator accepting every status.
    pub fn accept_all() -> Self {
        Self::new(|_| true)
    }

    /// Check a status.
    pub fn validate(&self, status: StatusCode) -> bool {
        (self.0)(status)
    }
}

impl Default for StatusValidator {
    /// Accepts statuses in `200..300`.
    fn default() -> Self {
        Self::new(|status| status.is_success())
    }
}

impl fmt::Debug for StatusValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusValidator").finish_non_exhaustive()
    }
}

/// Configuration for a request, or the defaults of a client.
///
/// Every field is optional; unset fields fall back to the client defaults and
/// then to built-in behavior. Request interceptors receive the effective
/// config and may change any field.
///
/// # Example
///
/// ```
/// use request_client::{RequestConfig, ResponseType};
/// use std::time::Duration;
///
/// let config = RequestConfig::new()
///     .header("authorization", "Bearer token123")
///     .param("page", 1)
///     .timeout(Duration::from_secs(5))
///     .response_type(ResponseType::Text);
///
/// assert_eq!(config.headers.get("authorization").unwrap(), "Bearer token123");
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestConfig {
    /// Request URL, resolved against `base_url` when relative.
    pub url: Option<String>,
    /// HTTP method. Defaults to `GET`.
    pub method: Option<Method>,
    /// Base URL for relative request URLs.
    pub base_url: Option<String>,
    /// Request headers. Merged key-by-key over the client defaults.
    pub headers: HeaderMap,
    /// Cancel the request after this long. Zero disables the timeout.
    pub timeout: Option<Duration>,
    /// Query parameters, appended in order.
    pub params: Option<Vec<(String, ParamValue)>>,
    /// Request body.
    pub data: Option<Payload>,
    /// Response decoding mode. Defaults to JSON.
    pub response_type: Option<ResponseType>,
    /// External cancellation token. When set, the timeout timer is not started.
    pub cancel_token: Option<CancellationToken>,
    /// Status validator. Defaults to accepting `200..300`.
    pub validate_status: Option<StatusValidator>,
}

impl RequestConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request URL.
    pub fn url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the base URL.
    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a header, replacing any value under the same name.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Debug,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Debug,
    {
        let name = name.try_into().expect("invalid header name");
        let value = value.try_into().expect("invalid header value");
        self.headers.insert(name, value);
        self
    }

    /// Try to add a header.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header<K, V>(mut self, name: K, value: V) -> Option<Self>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        let name = name.try_into().ok()?;
        let value = value.try_into().ok()?;
        self.headers.insert(name, value);
        Some(self)
    }

    /// Replace all headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append a query parameter.
    pub fn param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        self.params
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    /// Replace all query parameters.
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        self.params = Some(
            params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Set the request body.
    pub fn data<P: Into<Payload>>(mut self, data: P) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the response decoding mode.
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Supply an external cancellation token.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Set the status validator.
    pub fn validate_status<F>(mut self, f: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.validate_status = Some(StatusValidator::new(f));
        self
    }

    /// The method to use, defaulting to `GET`.
    pub fn effective_method(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }

    /// The response type to use, defaulting to JSON.
    pub fn effective_response_type(&self) -> ResponseType {
        self.response_type.unwrap_or_default()
    }

    /// The timeout to arm, if any. Zero counts as unset.
    pub(crate) fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }

    /// Check a status against the configured validator.
    pub fn is_valid_status(&self, status: StatusCode) -> bool {
        match &self.validate_status {
            Some(validator) => validator.validate(status),
            None => StatusValidator::default().validate(status),
        }
    }

    /// Overlay `overlay` on top of `self`.
    ///
    /// Set fields of `overlay` win. Headers merge key-by-key with
    /// case-insensitive names; all other fields, `params` included, are
    /// replaced as a whole.
    ///
    /// # Example
    ///
    /// ```
    /// use request_client::RequestConfig;
    ///
    /// let defaults = RequestConfig::new().header("x-a", "1").header("x-b", "2");
    /// let call = RequestConfig::new().header("X-B", "override").header("x-c", "3");
    /// let merged = defaults.merge(&call);
    ///
    /// assert_eq!(merged.headers.get("x-a").unwrap(), "1");
    /// assert_eq!(merged.headers.get("x-b").unwrap(), "override");
    /// assert_eq!(merged.headers.get("x-c").unwrap(), "3");
    /// ```
    pub fn merge(&self, overlay: &RequestConfig) -> RequestConfig {
        let mut headers = self.headers.clone();
        overlay_headers(&mut headers, &overlay.headers);

        RequestConfig {
            url: overlay.url.clone().or_else(|| self.url.clone()),
            method: overlay.method.clone().or_else(|| self.method.clone()),
            base_url: overlay.base_url.clone().or_else(|| self.base_url.clone()),
            headers,
            timeout: overlay.timeout.or(self.timeout),
            params: overlay.params.clone().or_else(|| self.params.clone()),
            data: overlay.data.clone().or_else(|| self.data.clone()),
            response_type: overlay.response_type.or(self.response_type),
            cancel_token: overlay
                .cancel_token
                .clone()
                .or_else(|| self.cancel_token.clone()),
            validate_status: overlay
                .validate_status
                .clone()
                .or_else(|| self.validate_status.clone()),
        }
    }
}

/// Overlay `overlay` onto `base`, one header name at a time.
///
/// Every value of an overlaid name replaces all values `base` held for it.
pub(crate) fn overlay_headers(base: &mut HeaderMap, overlay: &HeaderMap) {
    for name in overlay.keys() {
        let mut values = overlay.get_all(name).iter();
        if let Some(first) = values.next() {
            base.insert(name.clone(), first.clone());
            for value in values {
                base.append(name.clone(), value.clone());
            }
        }
    }
}
