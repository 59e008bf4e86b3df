//! cache_stats tool implementation.
//!
//! Reports tier sizes and hit counters for the tiered cache.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use relay_core::TieredCache;

use crate::tools::json_result;

/// Implementation of the cache_stats tool.
pub async fn stats_impl(cache: &TieredCache) -> Result<CallToolResult, McpError> {
    json_result(&cache.get_statistics().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_result;
    use relay_core::{CacheDb, CacheStats, TierOptions};
    use std::time::Duration;

    #[tokio::test]
    async fn test_stats_impl() {
        let cache = TieredCache::new(CacheDb::open_in_memory().await.unwrap(), TierOptions::default());
        cache.set("character:acct:Bob:Standard", "{}".into(), Duration::from_secs(60)).await;
        cache.get("character:acct:Bob:Standard").await;
        cache.get("character:acct:Nobody:Standard").await;

        let result = stats_impl(&cache).await.unwrap();
        let stats: CacheStats = parse_result(&result);

        assert_eq!(stats.t1_items, 1);
        assert_eq!(stats.t1_capacity, 1000);
        assert_eq!(stats.t3_items, Some(1));
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(!stats.shared_enabled);
    }
}
