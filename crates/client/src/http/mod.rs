//! Generic HTTP JSON source.
//!
//! ### Request
//! - URL rendered from a template; placeholder values are percent-encoded.
//! - `GET` with `Accept: application/json`, shared user agent and timeout.
//! - Max body bytes: 5MB (configurable)
//!
//! ### Response mapping
//! - 404 -> `SourceError::NotFound`
//! - 429 -> `SourceError::RateLimited`
//! - other non-2xx -> `SourceError::Http`
//! - 2xx -> JSON body, optionally narrowed by a JSON pointer, deserialized into the entity.

pub mod template;

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use relay_core::{AppConfig, Error};
use serde_json::Value;

pub use template::{TemplateError, UrlTemplate};

use crate::source::{Entity, FetchParams, Source, SourceError};

/// Configuration for the shared HTTP client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// User agent string (default: "poe-relay/0.1")
    pub user_agent: String,

    /// Request timeout (default: 30s)
    pub timeout: Duration,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { user_agent: "poe-relay/0.1".to_string(), timeout: Duration::from_secs(30), max_bytes: 5 * 1024 * 1024 }
    }
}

impl HttpConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// JSON-over-HTTP client shared by every [`HttpJsonSource`].
#[derive(Debug, Clone)]
pub struct JsonClient {
    http: Client,
    max_bytes: usize,
}

impl JsonClient {
    /// Build the client described by `config`.
    pub fn new(config: &HttpConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Source(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, max_bytes: config.max_bytes })
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(http: Client, max_bytes: usize) -> Self {
        Self { http, max_bytes }
    }

    /// GET `url` and parse the body as JSON.
    pub async fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        let response = self.http.get(url).header(header::ACCEPT, "application/json").send().await?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return Err(SourceError::NotFound),
            StatusCode::TOO_MANY_REQUESTS => return Err(SourceError::RateLimited),
            s if !s.is_success() => return Err(SourceError::Http { status: s.as_u16() }),
            _ => {}
        }

        if let Some(len) = response.content_length()
            && len as usize > self.max_bytes
        {
            return Err(SourceError::Other(format!("{len} bytes exceeds {}", self.max_bytes)));
        }

        let bytes = response.bytes().await?;
        if bytes.len() > self.max_bytes {
            return Err(SourceError::Other(format!("{} bytes exceeds {}", bytes.len(), self.max_bytes)));
        }

        tracing::debug!(url, bytes = bytes.len(), "Fetched JSON");
        serde_json::from_slice(&bytes).map_err(|e| SourceError::Parse(e.to_string()))
    }
}

/// A [`Source`] that GETs a templated URL and deserializes the JSON body.
pub struct HttpJsonSource<E> {
    client: JsonClient,
    template: UrlTemplate,
    pointer: Option<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> HttpJsonSource<E> {
    /// Create a source for `template`, optionally narrowing the body to the
    /// JSON pointer `pointer` (e.g. `/charModel`).
    pub fn new(client: JsonClient, template: &str, pointer: Option<String>) -> Result<Self, TemplateError> {
        let template = UrlTemplate::parse(template)?;
        if let Some(p) = &pointer
            && !p.is_empty()
            && !p.starts_with('/')
        {
            return Err(TemplateError::BadPointer(p.clone()));
        }
        Ok(Self { client, template, pointer, _entity: PhantomData })
    }

    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }
}

impl<E> std::fmt::Debug for HttpJsonSource<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJsonSource")
            .field("template", &self.template.as_str())
            .field("pointer", &self.pointer)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<E: Entity> Source<E> for HttpJsonSource<E> {
    async fn fetch(&self, params: &FetchParams) -> Result<E, SourceError> {
        let url = self.template.render(params)?;
        let body = self.client.get_json(&url).await?;

        let body = match &self.pointer {
            Some(pointer) => body.pointer(pointer).cloned().ok_or(SourceError::NotFound)?,
            None => body,
        };

        serde_json::from_value(body).map_err(|e| SourceError::Parse(e.to_string()))
    }
}
