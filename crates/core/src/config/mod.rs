//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (POE_RELAY_*)
//! 2. TOML config file (if POE_RELAY_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// One upstream source for an entity, tried in ascending `priority`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Name used in logs and fetch reports.
    pub name: String,

    /// Rate-limiter endpoint this source is paced under.
    pub endpoint: String,

    /// URL with `{param}` placeholders, e.g. `https://host/{account}/{character}`.
    pub url_template: String,

    #[serde(default)]
    pub priority: i32,

    /// Optional JSON pointer selecting the entity inside the response body.
    #[serde(default)]
    pub pointer: Option<String>,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (POE_RELAY_*)
/// 2. TOML config file (if POE_RELAY_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite durable cache tier.
    ///
    /// Set via POE_RELAY_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Maximum number of entries held in the in-process tier.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// TTL in seconds given to entries promoted into the in-process tier.
    #[serde(default = "default_promotion_ttl_secs")]
    pub promotion_ttl_secs: u64,

    /// Whether the shared Redis tier is used.
    ///
    /// Set via POE_RELAY_SHARED_STORE_ENABLED environment variable.
    #[serde(default)]
    pub shared_store_enabled: bool,

    /// Redis URL for the shared tier.
    #[serde(default = "default_shared_store_url")]
    pub shared_store_url: String,

    /// TTL in seconds for namespaces without an entry in `entity_ttls`.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Per-namespace TTL in seconds (namespace is the key prefix before `:`).
    ///
    /// Set via POE_RELAY_ENTITY_TTLS__<NAMESPACE> environment variables.
    #[serde(default = "default_entity_ttls")]
    pub entity_ttls: HashMap<String, u64>,

    /// Requests per minute for endpoints without an entry in `endpoint_rates`.
    #[serde(default = "default_rate_per_minute")]
    pub default_rate_per_minute: u32,

    /// Token bucket size for every endpoint limiter.
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Whether consecutive failures stretch limiter waits.
    #[serde(default = "default_true")]
    pub adaptive: bool,

    /// Per-endpoint requests per minute.
    ///
    /// Set via POE_RELAY_ENDPOINT_RATES__<ENDPOINT> environment variables.
    #[serde(default = "default_endpoint_rates")]
    pub endpoint_rates: HashMap<String, u32>,

    /// Interval in seconds between background sweeps of expired entries (0 disables).
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via POE_RELAY_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Ordered sources for character lookups.
    #[serde(default)]
    pub character_sources: Vec<SourceConfig>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./poe-relay-cache.sqlite")
}

fn default_memory_capacity() -> usize {
    1000
}

fn default_promotion_ttl_secs() -> u64 {
    300
}

fn default_shared_store_url() -> String {
    "redis://localhost:6379/0".into()
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_entity_ttls() -> HashMap<String, u64> {
    HashMap::from([
        ("character".into(), 3600),
        ("ladder".into(), 1800),
        ("items".into(), 3600),
        ("static".into(), 86_400),
    ])
}

fn default_rate_per_minute() -> u32 {
    10
}

fn default_burst() -> u32 {
    3
}

fn default_endpoint_rates() -> HashMap<String, u32> {
    HashMap::from([
        ("poe_ninja".into(), 20),
        ("poe_official".into(), 10),
        ("poe2db".into(), 30),
        ("trade".into(), 2),
        ("scrape".into(), 5),
    ])
}

fn default_cleanup_interval_secs() -> u64 {
    600
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    "poe-relay/0.1".into()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            memory_capacity: default_memory_capacity(),
            promotion_ttl_secs: default_promotion_ttl_secs(),
            shared_store_enabled: false,
            shared_store_url: default_shared_store_url(),
            default_ttl_secs: default_ttl_secs(),
            entity_ttls: default_entity_ttls(),
            default_rate_per_minute: default_rate_per_minute(),
            burst: default_burst(),
            adaptive: true,
            endpoint_rates: default_endpoint_rates(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
            character_sources: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn promotion_ttl(&self) -> Duration {
        Duration::from_secs(self.promotion_ttl_secs)
    }

    /// Cache TTL for a key namespace, falling back to `default_ttl_secs`.
    pub fn ttl_for(&self, namespace: &str) -> Duration {
        let secs = self.entity_ttls.get(namespace).copied().unwrap_or(self.default_ttl_secs);
        Duration::from_secs(secs)
    }

    /// Requests per minute for an endpoint, falling back to `default_rate_per_minute`.
    pub fn rate_for(&self, endpoint: &str) -> u32 {
        self.endpoint_rates
            .get(endpoint)
            .copied()
            .unwrap_or(self.default_rate_per_minute)
    }

    /// Background sweep interval, `None` when sweeping is disabled.
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `POE_RELAY_`
    /// 2. TOML file from `POE_RELAY_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("POE_RELAY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("POE_RELAY_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate a configuration from an already-layered figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
