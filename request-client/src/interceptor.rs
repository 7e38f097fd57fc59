//! Interceptors for the request client.
//!
//! An interceptor is a transformation step applied at a fixed stage of the
//! request pipeline:
//! - request interceptors see the effective [`RequestConfig`] before the URL
//!   and headers are built,
//! - response interceptors see each accepted [`RequestResponse`],
//! - error interceptors see every [`RequestError`] before it is returned.
//!
//! Each stage runs its interceptors in registration order, feeding every
//! step's output into the next step.
//!
//! # Example
//!
//! ```
//! use request_client::{RequestClient, RequestConfig};
//!
//! # fn demo(client: &RequestClient) {
//! let id = client.interceptors().request.add(|config: RequestConfig| {
//!     Ok(config.header("authorization", "Bearer token123"))
//! });
//!
//! client.interceptors().error.add(|mut err| {
//!     let message = format!("api: {}", err.message());
//!     err.set_message(message);
//!     Ok(err)
//! });
//!
//! client.interceptors().request.eject(id);
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use http::{HeaderName, HeaderValue};

use crate::config::RequestConfig;
use crate::error::RequestError;
use crate::response::RequestResponse;

/// Type alias for a boxed future returning a result.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type SyncFn<T> = Arc<dyn Fn(T) -> Result<T, RequestError> + Send + Sync>;
type AsyncFn<T> = Arc<dyn Fn(T) -> BoxFuture<'static, Result<T, RequestError>> + Send + Sync>;

/// A single transformation step over a value of type `T`.
///
/// Returning `Err` from a request or response interceptor sends the request
/// down the error path. Returning `Err` from an error interceptor ends the
/// error chain with that error.
pub enum Interceptor<T> {
    /// Runs to completion without suspending.
    Sync(SyncFn<T>),
    /// Returns a future that is awaited before the next step runs.
    Async(AsyncFn<T>),
}

impl<T: Send + 'static> Interceptor<T> {
    /// Create an interceptor from a synchronous closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(T) -> Result<T, RequestError> + Send + Sync + 'static,
    {
        Interceptor::Sync(Arc::new(f))
    }

    /// Create an interceptor from an asynchronous closure.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RequestError>> + Send + 'static,
    {
        Interceptor::Async(Arc::new(move |value| Box::pin(f(value))))
    }

    /// Apply this step.
    pub async fn apply(&self, value: T) -> Result<T, RequestError> {
        match self {
            Interceptor::Sync(f) => f(value),
            Interceptor::Async(f) => f(value).await,
        }
    }
}

impl Interceptor<RequestConfig> {
    /// A request interceptor that sets a header on every request.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn header(name: &str, value: &str) -> Self {
        let name: HeaderName = name.parse().expect("invalid header name");
        let value: HeaderValue = value.parse().expect("invalid header value");
        Self::new(move |mut config: RequestConfig| {
            config.headers.insert(name.clone(), value.clone());
            Ok(config)
        })
    }
}

impl<T> Clone for Interceptor<T> {
    fn clone(&self) -> Self {
        match self {
            Interceptor::Sync(f) => Interceptor::Sync(f.clone()),
            Interceptor::Async(f) => Interceptor::Async(f.clone()),
        }
    }
}

impl<T> fmt::Debug for Interceptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interceptor::Sync(_) => f.write_str("Interceptor::Sync"),
            Interceptor::Async(_) => f.write_str("Interceptor::Async"),
        }
    }
}

/// Handle returned when an interceptor is registered.
///
/// Handles are never reused, so ejecting with a stale handle can never remove
/// a different interceptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InterceptorId(u64);

/// Ordered registry of interceptors for one pipeline stage.
pub struct InterceptorManager<T> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(InterceptorId, Interceptor<T>)>>,
}

impl<T: Send + 'static> InterceptorManager<T> {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register a synchronous interceptor at the end of the chain.
    pub fn add<F>(&self, f: F) -> InterceptorId
    where
        F: Fn(T) -> Result<T, RequestError> + Send + Sync + 'static,
    {
        self.push(Interceptor::new(f))
    }

    /// Register an asynchronous interceptor at the end of the chain.
    pub fn add_async<F, Fut>(&self, f: F) -> InterceptorId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RequestError>> + Send + 'static,
    {
        self.push(Interceptor::from_async(f))
    }

    /// Register a prepared interceptor at the end of the chain.
    pub fn push(&self, interceptor: Interceptor<T>) -> InterceptorId {
        let id = InterceptorId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, interceptor));
        id
    }

    /// Remove the interceptor registered under `id`.
    ///
    /// Returns `false` and does nothing if it was already removed.
    pub fn eject(&self, id: InterceptorId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter().position(|(entry, _)| *entry == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the current chain, in registration order.
    pub fn get_all(&self) -> Vec<Interceptor<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, interceptor)| interceptor.clone())
            .collect()
    }

    /// Remove every interceptor.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Get the number of registered interceptors.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no interceptor is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `value` through a snapshot of the chain.
    ///
    /// Stops at the first step that returns `Err`.
    pub async fn run(&self, value: T) -> Result<T, RequestError> {
        let mut value = value;
        for interceptor in self.get_all() {
            value = interceptor.apply(value).await?;
        }
        Ok(value)
    }
}

impl<T: Send + 'static> Default for InterceptorManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for InterceptorManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("InterceptorManager")
            .field("count", &count)
            .finish()
    }
}

/// The three interceptor chains of a client.
#[derive(Debug, Default)]
pub struct Interceptors {
    /// Applied to the effective config before dispatch.
    pub request: InterceptorManager<RequestConfig>,
    /// Applied to each accepted response.
    pub response: InterceptorManager<RequestResponse>,
    /// Applied to every error before it is returned.
    pub error: InterceptorManager<RequestError>,
}

impl Interceptors {
    /// Create empty chains.
    pub fn new() -> Self {
        Self::default()
    }
}
