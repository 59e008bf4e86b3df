//! Shared state behind every tool call.

use std::sync::Arc;

use relay_client::{CharacterService, FallbackFetcher, HttpConfig, JsonClient};
use relay_core::{AppConfig, EndpointLimiterRegistry, Error, TieredCache, cache::spawn_cleanup};
use tokio::task::JoinHandle;

/// Cache, limiters and entity services, built once at startup.
#[derive(Debug)]
pub struct AppState {
    pub cache: Arc<TieredCache>,
    pub limiters: Arc<EndpointLimiterRegistry>,
    pub characters: CharacterService,
}

impl AppState {
    pub fn new(cache: Arc<TieredCache>, limiters: Arc<EndpointLimiterRegistry>, characters: CharacterService) -> Self {
        Self { cache, limiters, characters }
    }

    /// Open the cache tiers and build the services described by `config`.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let cache = Arc::new(TieredCache::from_config(config).await?);
        let limiters = Arc::new(EndpointLimiterRegistry::from_config(config));
        let fetcher = FallbackFetcher::new(cache.clone(), limiters.clone());
        let client = JsonClient::new(&HttpConfig::from_config(config))?;
        let characters = CharacterService::from_config(fetcher, &client, config)?;

        tracing::info!(sources = ?characters.source_names(), "Character sources ready");
        Ok(Self::new(cache, limiters, characters))
    }

    /// Start the periodic expiry sweep if `config` enables one.
    pub fn spawn_cleanup(&self, config: &AppConfig) -> Option<JoinHandle<()>> {
        config.cleanup_interval().map(|every| spawn_cleanup(self.cache.clone(), every))
    }

    /// Drop every service and close the durable tier.
    pub async fn shutdown(self) -> Result<(), Error> {
        let Self { cache, limiters, characters } = self;
        drop(characters);
        drop(limiters);

        match Arc::try_unwrap(cache) {
            Ok(cache) => cache.close().await,
            Err(_) => {
                tracing::warn!("Cache still shared at shutdown; durable tier left to close on drop");
                Ok(())
            }
        }
    }

    /// State over an in-memory durable tier with no character sources.
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        use relay_core::{CacheDb, LimiterDefaults, TierOptions};

        let cache = Arc::new(TieredCache::new(CacheDb::open_in_memory().await.unwrap(), TierOptions::default()));
        let limiters = Arc::new(EndpointLimiterRegistry::new(LimiterDefaults::default()));
        let fetcher = FallbackFetcher::new(cache.clone(), limiters.clone());
        let characters = CharacterService::new(fetcher, Vec::new(), std::time::Duration::from_secs(3600));
        Self::new(cache, limiters, characters)
    }
}
