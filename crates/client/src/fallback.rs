//! Cache-first lookup with ordered fallback across sources.
//!
//! ### Lookup
//!
//! 1. Try the tiered cache. A hit returns without touching any limiter.
//! 2. Sort sources by ascending priority (stable, so ties keep list order).
//! 3. For each source: wait for its endpoint's limiter, call the source.
//!    - usable value: record success, write it to the cache, return it.
//!    - error or unusable value: record failure, log, try the next source.
//! 4. Every source failed: return nothing.
//!
//! Sources are called one at a time. A failed source is not retried within
//! the same lookup; the limiter backoff slows the next lookup instead.

use std::sync::Arc;
use std::time::Duration;

use relay_core::{EndpointLimiterRegistry, JsonCodec, TieredCache};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::source::{Entity, FetchParams, SourceDescriptor};

/// Where a lookup's value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Origin {
    Cache,
    /// Fetched from the named source.
    Source(String),
    /// No source produced a usable value.
    Exhausted,
}

/// What happened when one source was tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    /// The source answered but the value failed `Entity::is_usable`.
    Unusable,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceAttempt {
    pub source: String,
    pub outcome: AttemptOutcome,
}

/// Result of a lookup with the trail of sources tried.
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport<E> {
    pub value: Option<E>,
    pub origin: Origin,
    pub attempts: Vec<SourceAttempt>,
}

/// Cache-first fetcher shared by every entity lookup.
#[derive(Debug, Clone)]
pub struct FallbackFetcher {
    cache: Arc<TieredCache>,
    limiters: Arc<EndpointLimiterRegistry>,
    codec: JsonCodec,
}

impl FallbackFetcher {
    pub fn new(cache: Arc<TieredCache>, limiters: Arc<EndpointLimiterRegistry>) -> Self {
        Self { cache, limiters, codec: JsonCodec }
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn limiters(&self) -> &Arc<EndpointLimiterRegistry> {
        &self.limiters
    }

    /// Look `key` up in the cache, falling back to `sources` in priority order.
    ///
    /// Sources without an endpoint of their own are paced under the limiter for
    /// `endpoint`. A fetched value is cached for `ttl`.
    pub async fn fetch<E: Entity>(
        &self, key: &str, endpoint: &str, sources: &[SourceDescriptor<E>], params: &FetchParams, ttl: Duration,
    ) -> Option<E> {
        self.fetch_report(key, endpoint, sources, params, ttl).await.value
    }

    /// Like [`Self::fetch`], also reporting the origin and each source attempt.
    pub async fn fetch_report<E: Entity>(
        &self, key: &str, endpoint: &str, sources: &[SourceDescriptor<E>], params: &FetchParams, ttl: Duration,
    ) -> FetchReport<E> {
        if let Some(value) = self.cache.get_decoded::<E, _>(key, &self.codec).await {
            tracing::debug!(key, "Serving from cache");
            return FetchReport { value: Some(value), origin: Origin::Cache, attempts: Vec::new() };
        }

        let mut ordered: Vec<&SourceDescriptor<E>> = sources.iter().collect();
        ordered.sort_by_key(|descriptor| descriptor.priority);

        let mut attempts = Vec::with_capacity(ordered.len());
        for descriptor in ordered {
            let endpoint = descriptor.endpoint.as_deref().unwrap_or(endpoint);
            self.limiters.acquire_configured(endpoint).await;

            let outcome = match descriptor.source.fetch(params).await {
                Ok(value) if value.is_usable() => {
                    self.limiters.record_success(endpoint);
                    if let Err(e) = self.cache.set_encoded(key, &value, ttl, &self.codec).await {
                        tracing::warn!(key, error = %e, "Fetched value could not be cached");
                    }
                    tracing::info!(key, endpoint, source = %descriptor.name, "Fetched from source");
                    attempts.push(SourceAttempt { source: descriptor.name.clone(), outcome: AttemptOutcome::Success });
                    return FetchReport { value: Some(value), origin: Origin::Source(descriptor.name.clone()), attempts };
                }
                Ok(_) => {
                    tracing::warn!(key, endpoint, source = %descriptor.name, "Source returned an unusable value");
                    AttemptOutcome::Unusable
                }
                Err(e) => {
                    tracing::warn!(key, endpoint, source = %descriptor.name, error = %e, "Source failed");
                    AttemptOutcome::Failed { error: e.to_string() }
                }
            };

            self.limiters.record_failure(endpoint);
            attempts.push(SourceAttempt { source: descriptor.name.clone(), outcome });
        }

        tracing::warn!(key, tried = attempts.len(), "All sources exhausted");
        FetchReport { value: None, origin: Origin::Exhausted, attempts }
    }
}
