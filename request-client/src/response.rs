//! Response types for the request client.
//!
//! This module provides [`RequestResponse`], which wraps the decoded body of
//! a completed request along with its status, headers and the effective
//! configuration that produced it.

use std::ops::Deref;

use bytes::Bytes;
use http::{HeaderMap, StatusCode, header};
use serde::de::DeserializeOwned;

use crate::config::{RequestConfig, ResponseType};
use crate::error::{ErrorKind, RequestError};

/// Raw bytes together with the response MIME type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Blob {
    bytes: Bytes,
    mime_type: String,
}

impl Blob {
    /// Create a blob. The MIME type is stored lowercased.
    pub fn new(bytes: Bytes, mime_type: &str) -> Self {
        Self {
            bytes,
            mime_type: mime_type.to_ascii_lowercase(),
        }
    }

    /// The blob contents.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// The MIME type, empty when the response had no `content-type`.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the blob and return its contents.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// A decoded response body, shaped by the [`ResponseType`] of the request.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseData {
    Json(serde_json::Value),
    Text(String),
    Blob(Blob),
    Bytes(Bytes),
}

impl ResponseData {
    /// The JSON value, if this body was decoded as JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseData::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The text, if this body was decoded as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The raw bytes of a blob or byte body.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseData::Blob(blob) => Some(blob.bytes()),
            ResponseData::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Deserialize a JSON body into `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, RequestError> {
        match self {
            ResponseData::Json(value) => serde_json::from_value(value)
                .map_err(|e| RequestError::from_source(ErrorKind::Decode, e.into())),
            _ => Err(RequestError::with_kind(
                ErrorKind::Decode,
                "response body was not decoded as JSON",
            )),
        }
    }
}

/// Decode a collected body according to `response_type`.
///
/// An empty JSON body decodes to `null`.
pub(crate) fn decode_body(
    body: Bytes,
    response_type: ResponseType,
    headers: &HeaderMap,
) -> Result<ResponseData, RequestError> {
    match response_type {
        ResponseType::Json => {
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(ResponseData::Json(serde_json::Value::Null));
            }
            serde_json::from_slice(&body)
                .map(ResponseData::Json)
                .map_err(|e| RequestError::from_source(ErrorKind::Decode, e.into()))
        }
        ResponseType::Text => {
            let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&body[..]);
            Ok(ResponseData::Text(String::from_utf8_lossy(body).into_owned()))
        }
        ResponseType::Blob => {
            let mime_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            Ok(ResponseData::Blob(Blob::new(body, mime_type)))
        }
        ResponseType::Bytes => Ok(ResponseData::Bytes(body)),
    }
}

/// Response of a completed request.
///
/// `T` is the body type; the client produces `RequestResponse<ResponseData>`
/// and [`json`](Self::json), [`text`](Self::text) and [`bytes`](Self::bytes)
/// convert it into a typed body.
///
/// # Example
///
/// ```ignore
/// #[derive(serde::Deserialize)]
/// struct User { name: String }
///
/// let response = client.get("/users/1").await?.json::<User>()?;
/// println!("{} ({})", response.name, response.status());
/// ```
#[derive(Clone, Debug)]
pub struct RequestResponse<T = ResponseData> {
    data: T,
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    config: RequestConfig,
}

impl<T> RequestResponse<T> {
    /// Create a new response.
    pub fn new(
        data: T,
        status: StatusCode,
        status_text: String,
        headers: HeaderMap,
        config: RequestConfig,
    ) -> Self {
        Self {
            data,
            status,
            status_text,
            headers,
            config,
        }
    }

    /// Get a reference to the body.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Get a mutable reference to the body.
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Extract the body, discarding everything else.
    pub fn into_data(self) -> T {
        self.data
    }

    /// The HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The status text reported by the server, or the canonical reason.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a mutable reference to the response headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The effective configuration of the request.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Transform the body, preserving everything else.
    pub fn map<U, F>(self, f: F) -> RequestResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        RequestResponse {
            data: f(self.data),
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
            config: self.config,
        }
    }

    fn try_map<U, F>(self, f: F) -> Result<RequestResponse<U>, RequestError>
    where
        F: FnOnce(T) -> Result<U, RequestError>,
    {
        let Self {
            data,
            status,
            status_text,
            headers,
            config,
        } = self;
        let data = f(data).map_err(|e| e.with_config(config.clone()))?;
        Ok(RequestResponse {
            data,
            status,
            status_text,
            headers,
            config,
        })
    }
}

impl RequestResponse<ResponseData> {
    /// Deserialize a JSON body into `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<RequestResponse<T>, RequestError> {
        self.try_map(ResponseData::into_json)
    }

    /// Take a text body.
    pub fn text(self) -> Result<RequestResponse<String>, RequestError> {
        self.try_map(|data| match data {
            ResponseData::Text(text) => Ok(text),
            _ => Err(RequestError::with_kind(
                ErrorKind::Decode,
                "response body was not decoded as text",
            )),
        })
    }

    /// Take a blob or byte body.
    pub fn bytes(self) -> Result<RequestResponse<Bytes>, RequestError> {
        self.try_map(|data| match data {
            ResponseData::Bytes(bytes) => Ok(bytes),
            ResponseData::Blob(blob) => Ok(blob.into_bytes()),
            _ => Err(RequestError::with_kind(
                ErrorKind::Decode,
                "response body was not decoded as bytes",
            )),
        })
    }
}

impl<T> Deref for RequestResponse<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> AsRef<T> for RequestResponse<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}
