use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use super::{LimiterStats, TokenBucketLimiter};
use crate::AppConfig;

/// Settings shared by every limiter a registry creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterDefaults {
    pub burst: u32,
    pub adaptive: bool,
    /// Rate for endpoints with no override.
    pub rate_per_minute: u32,
}

impl Default for LimiterDefaults {
    fn default() -> Self {
        Self { burst: 3, adaptive: true, rate_per_minute: 10 }
    }
}

/// One limiter per endpoint name, created on first use.
///
/// A limiter's rate is fixed by whichever call creates it. Later calls with a
/// different rate get the existing limiter.
#[derive(Debug, Default)]
pub struct EndpointLimiterRegistry {
    defaults: LimiterDefaults,
    endpoint_rates: HashMap<String, u32>,
    limiters: RwLock<HashMap<String, Arc<TokenBucketLimiter>>>,
}

impl EndpointLimiterRegistry {
    pub fn new(defaults: LimiterDefaults) -> Self {
        Self { defaults, endpoint_rates: HashMap::new(), limiters: RwLock::new(HashMap::new()) }
    }

    /// Per-endpoint rate overrides used by [`Self::acquire_configured`].
    pub fn with_endpoint_rates(mut self, rates: HashMap<String, u32>) -> Self {
        self.endpoint_rates = rates;
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(LimiterDefaults {
            burst: config.burst,
            adaptive: config.adaptive,
            rate_per_minute: config.default_rate_per_minute,
        })
        .with_endpoint_rates(config.endpoint_rates.clone())
    }

    /// Configured rate for `endpoint`, or the default rate.
    pub fn rate_for(&self, endpoint: &str) -> u32 {
        self.endpoint_rates.get(endpoint).copied().unwrap_or(self.defaults.rate_per_minute)
    }

    fn existing(&self, endpoint: &str) -> Option<Arc<TokenBucketLimiter>> {
        self.limiters.read().unwrap_or_else(PoisonError::into_inner).get(endpoint).cloned()
    }

    /// The limiter for `endpoint`, created at `default_rate` if it does not exist yet.
    pub fn get_limiter(&self, endpoint: &str, default_rate: u32) -> Arc<TokenBucketLimiter> {
        if let Some(limiter) = self.existing(endpoint) {
            return limiter;
        }

        let mut limiters = self.limiters.write().unwrap_or_else(PoisonError::into_inner);
        limiters
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                tracing::info!(endpoint, rate_per_minute = default_rate, "Created rate limiter");
                Arc::new(TokenBucketLimiter::new(default_rate, self.defaults.burst, self.defaults.adaptive))
            })
            .clone()
    }

    pub async fn acquire(&self, endpoint: &str, default_rate: u32) {
        self.get_limiter(endpoint, default_rate).acquire().await;
    }

    /// Acquire at the configured rate for `endpoint`.
    pub async fn acquire_configured(&self, endpoint: &str) {
        self.acquire(endpoint, self.rate_for(endpoint)).await;
    }

    pub fn record_success(&self, endpoint: &str) {
        if let Some(limiter) = self.existing(endpoint) {
            limiter.record_success();
        }
    }

    pub fn record_failure(&self, endpoint: &str) {
        if let Some(limiter) = self.existing(endpoint) {
            limiter.record_failure();
        }
    }

    pub fn get_statistics(&self) -> BTreeMap<String, LimiterStats> {
        self.limiters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(endpoint, limiter)| (endpoint.clone(), limiter.get_statistics()))
            .collect()
    }

    /// Reset one endpoint's limiter. Returns false if it does not exist.
    pub fn reset(&self, endpoint: &str) -> bool {
        match self.existing(endpoint) {
            Some(limiter) => {
                limiter.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        for limiter in self.limiters.read().unwrap_or_else(PoisonError::into_inner).values() {
            limiter.reset();
        }
    }
}
