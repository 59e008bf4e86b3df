//! cache_delete, cache_clear and cache_cleanup tool implementations.
//!
//! Removes one key, every key, or only expired keys from the tiered cache.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use relay_core::{CleanupReport, Error, TieredCache};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteParams {
    /// The full cache key, e.g. `character:acct:Bob:Standard`.
    pub key: String,
}

/// Output from the cache_delete and cache_clear tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// The key removed, or `None` when every key was removed.
    pub key: Option<String>,
    pub cleared: bool,
}

/// Implementation of the cache_delete tool.
pub async fn delete_impl(cache: &TieredCache, params: CacheDeleteParams) -> Result<CallToolResult, McpError> {
    let key = params.key.trim();
    if key.is_empty() {
        return Err(Error::InvalidInput("key must not be empty".to_string()).into());
    }

    cache.delete(key).await;
    tracing::info!(key, "Cache key deleted");
    json_result(&CachePurgeOutput { key: Some(key.to_string()), cleared: true })
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(cache: &TieredCache) -> Result<CallToolResult, McpError> {
    cache.clear().await;
    tracing::info!("Cache cleared");
    json_result(&CachePurgeOutput { key: None, cleared: true })
}

/// Implementation of the cache_cleanup tool.
pub async fn cleanup_impl(cache: &TieredCache) -> Result<CallToolResult, McpError> {
    let report: CleanupReport = cache.cleanup_expired().await;
    json_result(&report)
}
