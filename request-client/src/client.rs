//! Request client implementation.
//!
//! This module provides [`RequestClient`], which runs every request through
//! the same pipeline: merge the configuration, run the request interceptors,
//! build the URL and the HTTP request, dispatch it under a cancellation token,
//! decode and validate the response, and finally run the response or error
//! interceptors.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Method, Request, Uri};
use http_body_util::BodyExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, field, info_span};
use url::Url;

use crate::builder::{ClientBuildError, ClientBuilder};
use crate::config::{Payload, RequestConfig};
use crate::error::{BoxError, ErrorKind, RequestError};
use crate::interceptor::Interceptors;
use crate::response::{RequestResponse, ResponseData, decode_body};
use crate::transport::{Transport, TransportBody};

/// HTTP client with configurable defaults and interceptor chains.
///
/// Cloning is cheap: clones share the transport, the defaults and the
/// interceptor chains.
///
/// # Example
///
/// ```ignore
/// use request_client::{RequestClient, RequestConfig};
///
/// let client = RequestClient::builder()
///     .base_url("https://api.example.com")
///     .build()?;
///
/// client.interceptors().request.add(|config: RequestConfig| {
///     Ok(config.header("authorization", "Bearer token123"))
/// });
///
/// let users = client
///     .get_with_config("/users", RequestConfig::new().param("page", 1))
///     .await?;
/// println!("{} {:?}", users.status(), users.data());
/// ```
#[derive(Clone)]
pub struct RequestClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    defaults: RequestConfig,
    interceptors: Interceptors,
}

impl fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestClient")
            .field("defaults", &self.inner.defaults)
            .field("interceptors", &self.inner.interceptors)
            .finish_non_exhaustive()
    }
}

impl RequestClient {
    /// Create a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client with the given defaults and the hyper transport.
    pub fn new(config: RequestConfig) -> Result<Self, ClientBuildError> {
        ClientBuilder::new().config(config).build()
    }

    /// Create a client with the given defaults on a custom transport.
    pub fn with_transport<T: Transport>(transport: T, config: RequestConfig) -> Self {
        Self::from_parts(Arc::new(transport), config)
    }

    pub(crate) fn from_parts(transport: Arc<dyn Transport>, defaults: RequestConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                defaults,
                interceptors: Interceptors::new(),
            }),
        }
    }

    /// The client-level default configuration.
    pub fn defaults(&self) -> &RequestConfig {
        &self.inner.defaults
    }

    /// The interceptor chains of this client.
    pub fn interceptors(&self) -> &Interceptors {
        &self.inner.interceptors
    }

    /// Perform a request.
    ///
    /// `config` is overlaid on the client defaults to form the effective
    /// configuration. Every failure, whatever its origin, passes through the
    /// error interceptors before it is returned.
    pub async fn request(&self, config: RequestConfig) -> Result<RequestResponse, RequestError> {
        // 1. Merge call-site config over the defaults
        let config = self.inner.defaults.merge(&config);

        let span = info_span!(
            "http.request",
            http.method = %config.effective_method(),
            url.full = field::Empty,
            http.status_code = field::Empty,
        );

        async move {
            match self.execute(config).await {
                Ok(response) => Ok(response),
                Err(err) => Err(self.handle_error(err).await),
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, config: RequestConfig) -> Result<RequestResponse, RequestError> {
        // 2. Request interceptors
        let config = self.inner.interceptors.request.run(config).await?;

        // 3. URL
        let url = build_url(&config).map_err(|e| e.or_config(&config))?;
        tracing::Span::current().record("url.full", url.as_str());

        // 4-5. Headers and body
        let mut request = build_request(&config, &url).map_err(|e| e.or_config(&config))?;

        // 6. Dispatch under the cancellation token
        let token = config
            .cancel_token
            .clone()
            .unwrap_or_else(CancellationToken::new);
        let timer = match (&config.cancel_token, config.effective_timeout()) {
            (None, Some(timeout)) => Some(TimerGuard::start(token.clone(), timeout)),
            _ => None,
        };
        request.extensions_mut().insert(token.clone());

        debug!("dispatching request");
        let (parts, body) = self
            .dispatch(request, &token)
            .await
            .map_err(|e| e.or_config(&config))?;
        drop(timer);

        tracing::Span::current().record("http.status_code", parts.status.as_u16());
        debug!(status = %parts.status, bytes = body.len(), "response received");

        // 7. Decode and validate
        let status = parts.status;
        let valid = config.is_valid_status(status);
        let data = match decode_body(body.clone(), config.effective_response_type(), &parts.headers)
        {
            Ok(data) => data,
            Err(_) if !valid => ResponseData::Bytes(body),
            Err(err) => return Err(err.or_config(&config)),
        };

        let status_text = status_text(&parts);
        let response = RequestResponse::new(data, status, status_text, parts.headers, config);
        if !valid {
            return Err(RequestError::status(response));
        }

        // 8. Response interceptors
        self.inner.interceptors.response.run(response).await
    }

    /// Send the request and collect the body, racing the cancellation token.
    async fn dispatch(
        &self,
        request: Request<TransportBody>,
        token: &CancellationToken,
    ) -> Result<(http::response::Parts, Bytes), RequestError> {
        let exchange = async {
            let response = self.inner.transport.send(request).await?;
            let (parts, body) = response.into_parts();
            let body = body.collect().await?.to_bytes();
            Ok::<_, BoxError>((parts, body))
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(RequestError::timeout()),
            result = exchange => result.map_err(|err| {
                // a transport that observed the token fails instead of hanging
                if token.is_cancelled() {
                    RequestError::timeout()
                } else {
                    RequestError::transport(err)
                }
            }),
        }
    }

    // 9. Error interceptors
    async fn handle_error(&self, err: RequestError) -> RequestError {
        debug!(kind = ?err.kind(), error = %err, "request failed");
        match self.inner.interceptors.error.run(err).await {
            Ok(err) | Err(err) => err,
        }
    }

    /// Send a `GET` request.
    pub async fn get(&self, url: &str) -> Result<RequestResponse, RequestError> {
        self.get_with_config(url, RequestConfig::new()).await
    }

    /// Send a `GET` request with extra configuration.
    pub async fn get_with_config(
        &self,
        url: &str,
        config: RequestConfig,
    ) -> Result<RequestResponse, RequestError> {
        self.request(config.url(url).method(Method::GET)).await
    }

    /// Send a `DELETE` request.
    pub async fn delete(&self, url: &str) -> Result<RequestResponse, RequestError> {
        self.delete_with_config(url, RequestConfig::new()).await
    }

    /// Send a `DELETE` request with extra configuration.
    pub async fn delete_with_config(
        &self,
        url: &str,
        config: RequestConfig,
    ) -> Result<RequestResponse, RequestError> {
        self.request(config.url(url).method(Method::DELETE)).await
    }

    /// Send a `HEAD` request.
    pub async fn head(&self, url: &str) -> Result<RequestResponse, RequestError> {
        self.head_with_config(url, RequestConfig::new()).await
    }

    /// Send a `HEAD` request with extra configuration.
    pub async fn head_with_config(
        &self,
        url: &str,
        config: RequestConfig,
    ) -> Result<RequestResponse, RequestError> {
        self.request(config.url(url).method(Method::HEAD)).await
    }

    /// Send an `OPTIONS` request.
    pub async fn options(&self, url: &str) -> Result<RequestResponse, RequestError> {
        self.options_with_config(url, RequestConfig::new()).await
    }

    /// Send an `OPTIONS` request with extra configuration.
    pub async fn options_with_config(
        &self,
        url: &str,
        config: RequestConfig,
    ) -> Result<RequestResponse, RequestError> {
        self.request(config.url(url).method(Method::OPTIONS)).await
    }

    /// Send a `POST` request with a body.
    pub async fn post<P: Into<Payload>>(
        &self,
        url: &str,
        data: P,
    ) -> Result<RequestResponse, RequestError> {
        self.post_with_config(url, data, RequestConfig::new()).await
    }

    /// Send a `POST` request with a body and extra configuration.
    pub async fn post_with_config<P: Into<Payload>>(
        &self,
        url: &str,
        data: P,
        config: RequestConfig,
    ) -> Result<RequestResponse, RequestError> {
        self.request(config.url(url).method(Method::POST).data(data))
            .await
    }

    /// Send a `PUT` request with a body.
    pub async fn put<P: Into<Payload>>(
        &self,
        url: &str,
        data: P,
    ) -> Result<RequestResponse, RequestError> {
        self.put_with_config(url, data, RequestConfig::new()).await
    }

    /// Send a `PUT` request with a body and extra configuration.
    pub async fn put_with_config<P: Into<Payload>>(
        &self,
        url: &str,
        data: P,
        config: RequestConfig,
    ) -> Result<RequestResponse, RequestError> {
        self.request(config.url(url).method(Method::PUT).data(data))
            .await
    }

    /// Send a `PATCH` request with a body.
    pub async fn patch<P: Into<Payload>>(
        &self,
        url: &str,
        data: P,
    ) -> Result<RequestResponse, RequestError> {
        self.patch_with_config(url, data, RequestConfig::new()).await
    }

    /// Send a `PATCH` request with a body and extra configuration.
    pub async fn patch_with_config<P: Into<Payload>>(
        &self,
        url: &str,
        data: P,
        config: RequestConfig,
    ) -> Result<RequestResponse, RequestError> {
        self.request(config.url(url).method(Method::PATCH).data(data))
            .await
    }
}

/// Cancels the token when the timeout elapses, unless dropped first.
struct TimerGuard(JoinHandle<()>);

impl TimerGuard {
    fn start(token: CancellationToken, timeout: Duration) -> Self {
        let task = async move {
            tokio::time::sleep(timeout).await;
            debug!(?timeout, "request timeout elapsed");
            token.cancel();
        };
        Self(tokio::spawn(task.in_current_span()))
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Resolve the request URL against the base URL and append the params.
fn build_url(config: &RequestConfig) -> Result<Url, RequestError> {
    let target = config.url.as_deref().unwrap_or_default();
    let resolved = match config.base_url.as_deref() {
        Some(base) => Url::parse(base).and_then(|base| base.join(target)),
        None => Url::parse(target),
    };
    let mut url = resolved.map_err(|e| {
        RequestError::with_kind(ErrorKind::InvalidUrl, format!("Invalid URL `{target}`: {e}"))
    })?;

    if let Some(params) = config.params.as_ref().filter(|p| !p.is_empty()) {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, &value.to_string());
        }
    }

    Ok(url)
}

/// Methods whose requests carry the configured payload.
fn carries_body(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn build_request(config: &RequestConfig, url: &Url) -> Result<Request<TransportBody>, RequestError> {
    let method = config.effective_method();
    let uri = Uri::try_from(url.as_str())
        .map_err(|e| RequestError::with_kind(ErrorKind::InvalidUrl, format!("Invalid URL `{url}`: {e}")))?;
    let mut headers = config.headers.clone();

    let body = match &config.data {
        Some(payload) if carries_body(&method) && !payload.is_blank() => match payload {
            Payload::Text(text) => TransportBody::full(Bytes::from(text.clone())),
            Payload::Json(value) => {
                let encoded = serde_json::to_vec(value)
                    .map_err(|e| RequestError::from_source(ErrorKind::Encode, e.into()))?;
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                TransportBody::full(Bytes::from(encoded))
            }
        },
        _ => TransportBody::empty(),
    };

    let mut request = Request::new(body);
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.headers_mut() = headers;
    Ok(request)
}

/// The reason phrase sent by the server, else the canonical one.
fn status_text(parts: &http::response::Parts) -> String {
    parts
        .extensions
        .get::<hyper::ext::ReasonPhrase>()
        .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
        .or_else(|| parts.status.canonical_reason())
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Response, StatusCode};
    use http_body_util::Full;
    use serde_json::json;
    use std::convert::Infallible;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::ResponseType;

    const BASE: &str = "https://api.example.com";

    /// What the mock transport saw.
    struct Captured {
        method: Method,
        uri: String,
        headers: HeaderMap,
        body: Bytes,
        token: Option<CancellationToken>,
    }

    type Log = Arc<Mutex<Vec<Captured>>>;

    fn mock<F>(respond: F) -> (impl Transport, Log)
    where
        F: Fn(&Captured) -> Response<Full<Bytes>> + Send + Sync + 'static,
    {
        let respond = Arc::new(respond);
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let seen = log.clone();
        let transport = tower::service_fn(move |req: Request<TransportBody>| {
            let respond = respond.clone();
            let seen = seen.clone();
            async move {
                let (parts, body) = req.into_parts();
                let captured = Captured {
                    method: parts.method,
                    uri: parts.uri.to_string(),
                    headers: parts.headers,
                    body: body.collect().await.unwrap().to_bytes(),
                    token: parts.extensions.get::<CancellationToken>().cloned(),
                };
                let response = respond(&captured);
                seen.lock().unwrap().push(captured);
                Ok::<_, Infallible>(response)
            }
        });
        (transport, log)
    }

    /// A transport that records the token it received, then never answers in time.
    fn stalled() -> (impl Transport, Arc<Mutex<Option<CancellationToken>>>) {
        let slot = Arc::new(Mutex::new(None));
        let seen = slot.clone();
        let transport = tower::service_fn(move |req: Request<TransportBody>| {
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap() = req.extensions().get::<CancellationToken>().cloned();
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, Infallible>(Response::new(Full::new(Bytes::new())))
            }
        });
        (transport, slot)
    }

    fn reply(status: u16, body: &'static str) -> Response<Full<Bytes>> {
        Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    fn ok_json(_: &Captured) -> Response<Full<Bytes>> {
        reply(200, r#"{"ok":true}"#)
    }

    fn client_with<T: Transport>(transport: T) -> RequestClient {
        RequestClient::with_transport(transport, RequestConfig::new().base_url(BASE))
    }

    #[tokio::test]
    async fn test_get_builds_url_with_params() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);

        client
            .get_with_config("/users", RequestConfig::new().param("page", 1).param("size", 20))
            .await
            .unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log[0].method, Method::GET);
        assert_eq!(log[0].uri, "https://api.example.com/users?page=1&size=20");
    }

    #[tokio::test]
    async fn test_params_are_encoded_and_repeatable() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);

        client
            .get_with_config(
                "/search",
                RequestConfig::new()
                    .param("q", "a b&c")
                    .param("tag", "x")
                    .param("tag", "y")
                    .param("exact", true)
                    .param("ratio", 1.5),
            )
            .await
            .unwrap();

        assert_eq!(
            log.lock().unwrap()[0].uri,
            "https://api.example.com/search?q=a+b%26c&tag=x&tag=y&exact=true&ratio=1.5"
        );
    }

    #[tokio::test]
    async fn test_absolute_url_ignores_base() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);

        client.get("https://other.example.com/ping").await.unwrap();
        assert_eq!(log.lock().unwrap()[0].uri, "https://other.example.com/ping");
    }

    #[tokio::test]
    async fn test_relative_url_without_base_is_invalid() {
        let (transport, log) = mock(ok_json);
        let client = RequestClient::with_transport(transport, RequestConfig::new());

        let err = client.get("/users").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
        assert!(err.config().is_some());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_headers_merge_case_insensitively() {
        let (transport, log) = mock(ok_json);
        let client = RequestClient::with_transport(
            transport,
            RequestConfig::new()
                .base_url(BASE)
                .header("x-a", "1")
                .header("x-b", "2"),
        );

        client
            .get_with_config(
                "/h",
                RequestConfig::new().header("X-B", "override").header("x-c", "3"),
            )
            .await
            .unwrap();

        let log = log.lock().unwrap();
        let headers = &log[0].headers;
        assert_eq!(headers.get("x-a").unwrap(), "1");
        assert_eq!(headers.get("x-b").unwrap(), "override");
        assert_eq!(headers.get("x-c").unwrap(), "3");
        assert_eq!(headers.get_all("x-b").iter().count(), 1);

        // the stored defaults are untouched by the merge
        assert_eq!(client.defaults().headers.get("x-b").unwrap(), "2");
        assert!(client.defaults().headers.get("x-c").is_none());
    }

    #[tokio::test]
    async fn test_request_interceptor_header_wins() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);
        client
            .interceptors()
            .request
            .add(|config: RequestConfig| Ok(config.header("authorization", "Bearer token123")));

        client
            .get_with_config("/me", RequestConfig::new().header("Authorization", "Basic old"))
            .await
            .unwrap();

        assert_eq!(
            log.lock().unwrap()[0].headers.get("authorization").unwrap(),
            "Bearer token123"
        );
    }

    #[tokio::test]
    async fn test_post_json_sets_content_type() {
        let (transport, log) = mock(|captured| {
            Response::new(Full::new(captured.body.clone()))
        });
        let client = client_with(transport);

        let payload = json!({ "name": "ada", "tags": ["x", 1, null] });
        let response = client.post("/users", payload.clone()).await.unwrap();

        assert_eq!(response.data().as_json(), Some(&payload));
        let log = log.lock().unwrap();
        assert_eq!(log[0].method, Method::POST);
        assert_eq!(log[0].headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_explicit_content_type_is_kept() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);

        client
            .put_with_config(
                "/doc",
                json!({ "a": 1 }),
                RequestConfig::new().header("content-type", "application/merge-patch+json"),
            )
            .await
            .unwrap();

        assert_eq!(
            log.lock().unwrap()[0].headers.get(CONTENT_TYPE).unwrap(),
            "application/merge-patch+json"
        );
    }

    #[tokio::test]
    async fn test_text_payload_is_sent_verbatim() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);

        client.patch("/notes/1", "plain body").await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log[0].method, Method::PATCH);
        assert_eq!(log[0].body, Bytes::from_static(b"plain body"));
        assert!(log[0].headers.get(CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_get_never_sends_body() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);

        client
            .get_with_config("/users", RequestConfig::new().data(json!({ "ignored": true })))
            .await
            .unwrap();

        let log = log.lock().unwrap();
        assert!(log[0].body.is_empty());
        assert!(log[0].headers.get(CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_blank_payload_is_not_sent() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);

        client.post("/a", "").await.unwrap();
        client.post("/b", serde_json::Value::Null).await.unwrap();

        let log = log.lock().unwrap();
        assert!(log.iter().all(|captured| captured.body.is_empty()));
        assert!(log[1].headers.get(CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_text_and_bytes_response_types() {
        let (transport, _log) = mock(|_| {
            Response::builder()
                .header(CONTENT_TYPE, "Image/PNG")
                .body(Full::new(Bytes::from_static(&[0x89, b'P', b'N', b'G'])))
                .unwrap()
        });
        let client = client_with(transport);

        let text = client
            .get_with_config("/t", RequestConfig::new().response_type(ResponseType::Text))
            .await
            .unwrap();
        assert_eq!(text.data().as_text(), Some("\u{FFFD}PNG"));

        let bytes = client
            .get_with_config("/b", RequestConfig::new().response_type(ResponseType::Bytes))
            .await
            .unwrap();
        assert_eq!(bytes.data().as_bytes().unwrap().as_ref(), &[0x89, b'P', b'N', b'G']);

        let blob = client
            .get_with_config("/b", RequestConfig::new().response_type(ResponseType::Blob))
            .await
            .unwrap();
        let ResponseData::Blob(blob) = blob.into_data() else {
            panic!("expected blob");
        };
        assert_eq!(blob.mime_type(), "image/png");
        assert_eq!(blob.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_json_body_is_null() {
        let (transport, _log) = mock(|_| {
            Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(Full::new(Bytes::new()))
                .unwrap()
        });
        let client = client_with(transport);

        let response = client.delete("/users/1").await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.status_text(), "No Content");
        assert_eq!(response.data().as_json(), Some(&serde_json::Value::Null));
    }

    #[tokio::test]
    async fn test_response_exposes_effective_config() {
        let (transport, _log) = mock(ok_json);
        let client = client_with(transport);

        let response = client
            .get_with_config("/users", RequestConfig::new().header("x-trace", "1"))
            .await
            .unwrap();
        let config = response.config();
        assert_eq!(config.url.as_deref(), Some("/users"));
        assert_eq!(config.base_url.as_deref(), Some(BASE));
        assert_eq!(config.headers.get("x-trace").unwrap(), "1");
    }

    #[tokio::test]
    async fn test_default_validator_rejects_404() {
        let (transport, _log) = mock(|_| reply(404, r#"{"error":"missing"}"#));
        let client = client_with(transport);

        let err = client.get("/missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Status);
        assert_eq!(err.message(), "Request failed with status 404");

        let response = err.response().unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.status_text(), "Not Found");
        assert_eq!(response.data().as_json(), Some(&json!({ "error": "missing" })));
        assert_eq!(err.config().unwrap().url.as_deref(), Some("/missing"));
    }

    #[tokio::test]
    async fn test_custom_validator_rejects_201() {
        let (transport, _log) = mock(|_| reply(201, "{}"));
        let client = client_with(transport);

        let err = client
            .post_with_config(
                "/users",
                json!({}),
                RequestConfig::new().validate_status(|status| status == StatusCode::OK),
            )
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Request failed with status 201");
    }

    #[tokio::test]
    async fn test_accept_all_validator_resolves_503() {
        let (transport, _log) = mock(|_| reply(503, r#"{"retry":true}"#));
        let client = client_with(transport);

        let response = client
            .get_with_config("/busy", RequestConfig::new().validate_status(|_| true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.data().as_json(), Some(&json!({ "retry": true })));
    }

    #[tokio::test]
    async fn test_undecodable_rejected_body_is_kept_raw() {
        let (transport, _log) = mock(|_| reply(500, "<html>oops</html>"));
        let client = client_with(transport);

        let err = client.get("/boom").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Status);
        assert_eq!(
            err.response().unwrap().data().as_bytes().unwrap().as_ref(),
            b"<html>oops</html>"
        );
    }

    #[tokio::test]
    async fn test_undecodable_accepted_body_is_decode_error() {
        let (transport, _log) = mock(|_| reply(200, "not json"));
        let client = client_with(transport);

        let err = client.get("/broken").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.response().is_none());
        assert!(err.config().is_some());
    }

    #[tokio::test]
    async fn test_interceptor_order_on_success() {
        let (transport, _log) = mock(ok_json);
        let client = client_with(transport);
        let calls = Arc::new(Mutex::new(Vec::new()));

        let seen = calls.clone();
        client.interceptors().request.add(move |config| {
            seen.lock().unwrap().push("request");
            Ok(config)
        });
        let seen = calls.clone();
        client.interceptors().response.add(move |response| {
            seen.lock().unwrap().push("response");
            Ok(response)
        });
        let seen = calls.clone();
        client.interceptors().error.add(move |err| {
            seen.lock().unwrap().push("error");
            Ok(err)
        });

        client.get("/ok").await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["request", "response"]);
    }

    #[tokio::test]
    async fn test_response_interceptors_chain() {
        let (transport, _log) = mock(ok_json);
        let client = client_with(transport);
        client.interceptors().response.add(|response: RequestResponse| {
            Ok(response.map(|_| ResponseData::Text("first".into())))
        });
        client.interceptors().response.add_async(|response: RequestResponse| async move {
            let text = format!("{} then second", response.data().as_text().unwrap_or_default());
            Ok(response.map(|_| ResponseData::Text(text)))
        });

        let response = client.get("/ok").await.unwrap();
        assert_eq!(response.data().as_text(), Some("first then second"));
    }

    #[tokio::test]
    async fn test_ejected_interceptor_never_runs() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);
        let id = client
            .interceptors()
            .request
            .add(|config: RequestConfig| Ok(config.header("x-ejected", "1")));
        client
            .interceptors()
            .request
            .add(|config: RequestConfig| Ok(config.header("x-kept", "1")));

        assert!(client.interceptors().request.eject(id));
        assert!(!client.interceptors().request.eject(id));
        client.get("/ok").await.unwrap();

        let log = log.lock().unwrap();
        assert!(log[0].headers.get("x-ejected").is_none());
        assert_eq!(log[0].headers.get("x-kept").unwrap(), "1");
    }

    #[tokio::test]
    async fn test_request_interceptor_runs_once_on_rejected_status() {
        let (transport, log) = mock(|_| reply(503, "{}"));
        let client = client_with(transport);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        client.interceptors().request.add(move |config| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(config)
        });

        let err = client.get("/busy").await.unwrap_err();
        assert!(err.is_status());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_request_interceptor_takes_error_path() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        client.interceptors().request.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RequestError::new("missing credentials"))
        });
        client.interceptors().error.add(|mut err| {
            let message = format!("auth: {}", err.message());
            err.set_message(message);
            Ok(err)
        });

        let err = client.get("/me").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interceptor);
        assert_eq!(err.to_string(), "auth: missing credentials");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_interceptor_err_ends_chain() {
        let (transport, _log) = mock(|_| reply(404, "{}"));
        let client = client_with(transport);
        let later = Arc::new(AtomicUsize::new(0));
        client
            .interceptors()
            .error
            .add(|_| Err(RequestError::new("replaced")));
        let counter = later.clone();
        client.interceptors().error.add(move |err| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(err)
        });

        let err = client.get("/x").await.unwrap_err();
        assert_eq!(err.message(), "replaced");
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_interceptors_see_status_failures() {
        let (transport, _log) = mock(|_| reply(404, "{}"));
        let client = client_with(transport);
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let seen = statuses.clone();
        client.interceptors().error.add_async(move |err: RequestError| {
            let seen = seen.clone();
            async move {
                seen.lock()
                    .unwrap()
                    .push(err.response().map(|response| response.status()));
                Ok(err)
            }
        });

        client.get("/missing").await.unwrap_err();
        assert_eq!(*statuses.lock().unwrap(), vec![Some(StatusCode::NOT_FOUND)]);
    }

    #[tokio::test]
    async fn test_timeout_cancels_transport_token() {
        let (transport, slot) = stalled();
        let client = client_with(transport);

        let err = client
            .get_with_config("/slow", RequestConfig::new().timeout(Duration::from_millis(20)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.message(), "Request timeout");
        assert!(err.response().is_none());
        assert!(slot.lock().unwrap().as_ref().unwrap().is_cancelled());
    }

    #[tokio::test]
    async fn test_default_timeout_applies() {
        let (transport, _slot) = stalled();
        let client = RequestClient::with_transport(
            transport,
            RequestConfig::new()
                .base_url(BASE)
                .timeout(Duration::from_millis(20)),
        );

        let err = client.get("/slow").await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_external_token_cancels() {
        let (transport, slot) = stalled();
        let client = client_with(transport);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = client
            .get_with_config("/slow", RequestConfig::new().cancel_token(token.clone()))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.message(), "Request timeout");
        // the transport received the caller's token itself
        let received = slot.lock().unwrap().clone().unwrap();
        assert!(received.is_cancelled());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_external_token_suppresses_timer() {
        let (transport, _log) = mock(ok_json);
        let client = client_with(transport);
        let token = CancellationToken::new();

        client
            .get_with_config(
                "/ok",
                RequestConfig::new()
                    .cancel_token(token.clone())
                    .timeout(Duration::from_millis(1)),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_zero_timeout_disables_timer() {
        let transport = tower::service_fn(|_req: Request<TransportBody>| async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok::<_, Infallible>(reply(200, "{}"))
        });
        let client = client_with(transport);

        let response = client
            .get_with_config("/slowish", RequestConfig::new().timeout(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_completed_request_token_not_cancelled() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);

        client
            .get_with_config("/ok", RequestConfig::new().timeout(Duration::from_millis(10)))
            .await
            .unwrap();

        // the timer was aborted when the exchange settled
        tokio::time::sleep(Duration::from_millis(40)).await;
        let token = log.lock().unwrap()[0].token.clone().unwrap();
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_transport_error_is_wrapped() {
        let transport = tower::service_fn(|_req: Request<TransportBody>| async {
            Err::<Response<Full<Bytes>>, _>(std::io::Error::other("connection refused"))
        });
        let client = client_with(transport);

        let err = client.get("/down").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.message(), "connection refused");
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.response().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_client() {
        let (transport, log) = mock(ok_json);
        let client = client_with(transport);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let client = client.clone();
                tokio::spawn(async move {
                    client
                        .get_with_config("/n", RequestConfig::new().param("i", i))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(log.lock().unwrap().len(), 8);
    }

    #[test]
    fn test_carries_body() {
        assert!(carries_body(&Method::POST));
        assert!(carries_body(&Method::DELETE));
        assert!(!carries_body(&Method::GET));
        assert!(!carries_body(&Method::HEAD));
        assert!(!carries_body(&Method::OPTIONS));
    }
}
