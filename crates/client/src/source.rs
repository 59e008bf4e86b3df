//! Data sources and the entities they produce.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

/// Named parameters handed to every source of a lookup, e.g. `account`, `character`.
pub type FetchParams = BTreeMap<String, String>;

/// A value a source can produce and the cache can store.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Whether a successfully fetched value is worth returning.
    ///
    /// An unusable value counts as a source failure and is never cached.
    fn is_usable(&self) -> bool {
        true
    }
}

impl Entity for serde_json::Value {
    fn is_usable(&self) -> bool {
        match self {
            serde_json::Value::Null => false,
            serde_json::Value::Object(map) => !map.is_empty(),
            serde_json::Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }
}

/// Errors a source reports for one attempt.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("not found")]
    NotFound,

    /// Upstream answered 429.
    #[error("rate limited by upstream")]
    RateLimited,

    #[error("HTTP error: {status}")]
    Http { status: u16 },

    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("parse error: {0}")]
    Parse(String),

    /// A parameter the source needs is missing or malformed.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { SourceError::Timeout } else { SourceError::Network(Arc::new(err)) }
    }
}

/// Something that can fetch an entity from parameters.
#[async_trait]
pub trait Source<E>: Send + Sync {
    async fn fetch(&self, params: &FetchParams) -> Result<E, SourceError>;
}

struct FnSource<F>(F);

#[async_trait]
impl<E, F, Fut> Source<E> for FnSource<F>
where
    E: Send + 'static,
    F: Fn(FetchParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<E, SourceError>> + Send,
{
    async fn fetch(&self, params: &FetchParams) -> Result<E, SourceError> {
        (self.0)(params.clone()).await
    }
}

/// A named source with a priority. Lower priority values are tried first.
pub struct SourceDescriptor<E> {
    pub name: String,
    pub priority: i32,
    pub source: Arc<dyn Source<E>>,
    /// Limiter endpoint for this source; `None` uses the endpoint of the lookup.
    pub endpoint: Option<String>,
}

impl<E> SourceDescriptor<E> {
    pub fn new(name: impl Into<String>, priority: i32, source: Arc<dyn Source<E>>) -> Self {
        Self { name: name.into(), priority, source, endpoint: None }
    }

    /// Pace this source under its own limiter endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// A source backed by an async closure.
    pub fn from_fn<F, Fut>(name: impl Into<String>, priority: i32, f: F) -> Self
    where
        E: Send + 'static,
        F: Fn(FetchParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<E, SourceError>> + Send + 'static,
    {
        Self::new(name, priority, Arc::new(FnSource(f)))
    }
}

impl<E> Clone for SourceDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            priority: self.priority,
            source: self.source.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

impl<E> std::fmt::Debug for SourceDescriptor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
