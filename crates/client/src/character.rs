//! Character lookup over the configured character sources.
//!
//! Each source returns raw JSON which is normalized into a [`CharacterRecord`].
//! Payloads that wrap the character in a `charModel` object are unwrapped, and
//! fields the payload omits are filled from the lookup parameters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::cache::compose_key;
use relay_core::{AppConfig, Error, SourceConfig};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fallback::{FallbackFetcher, FetchReport};
use crate::http::{HttpJsonSource, JsonClient};
use crate::source::{Entity, FetchParams, Source, SourceDescriptor, SourceError};

/// Key namespace for characters; also selects the TTL.
pub const NAMESPACE: &str = "character";

/// League used when the caller does not name one.
pub const DEFAULT_LEAGUE: &str = "Standard";

/// Endpoint for sources that do not name their own.
pub const DEFAULT_ENDPOINT: &str = "poe_official";

/// Display names that differ from the league identifier the official API expects.
const LEAGUE_ALIASES: &[(&str, &str)] = &[
    ("Rise of the Abyssal", "Abyss"),
    ("Abyss", "Abyss"),
    ("Abyss Hardcore", "Hardcore Abyss"),
    ("Abyss SSF", "SSF Abyss"),
    ("Abyss Hardcore SSF", "SSF Hardcore Abyss"),
];

/// Map a league display name to its API identifier, case-insensitively.
/// Unknown names pass through unchanged.
pub fn normalize_league(league: &str) -> &str {
    LEAGUE_ALIASES
        .iter()
        .find(|(display, _)| display.eq_ignore_ascii_case(league))
        .map_or(league, |&(_, api)| api)
}

/// Cache key for a character.
pub fn character_key(account: &str, character: &str, league: &str) -> String {
    compose_key(NAMESPACE, &[account, character, league])
}

/// A character as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CharacterRecord {
    pub name: String,
    pub account: String,
    pub class: String,
    pub level: u32,
    pub league: String,
    #[serde(default)]
    pub experience: u64,
    /// Name of the source that produced this record.
    pub source: String,
}

impl Entity for CharacterRecord {
    fn is_usable(&self) -> bool {
        self.level > 0 && !self.name.is_empty()
    }
}

impl CharacterRecord {
    /// Normalize a raw source payload, falling back to `params` for missing fields.
    pub fn from_raw(raw: &Value, params: &FetchParams, source: &str) -> Self {
        let model = raw.get("charModel").unwrap_or(raw);
        let text = |field: &str| model.get(field).and_then(Value::as_str).map(str::to_string);
        let param = |name: &str, fallback: &str| params.get(name).cloned().unwrap_or_else(|| fallback.to_string());

        Self {
            name: text("name").unwrap_or_else(|| param("character", "")),
            account: text("account").unwrap_or_else(|| param("account", "")),
            class: text("class").unwrap_or_else(|| "Unknown".to_string()),
            level: model
                .get("level")
                .and_then(Value::as_u64)
                .and_then(|level| u32::try_from(level).ok())
                .unwrap_or(0),
            league: text("league").unwrap_or_else(|| param("league", DEFAULT_LEAGUE)),
            experience: model.get("experience").and_then(Value::as_u64).unwrap_or(0),
            source: source.to_string(),
        }
    }
}

/// An HTTP source whose JSON is normalized into a [`CharacterRecord`].
#[derive(Debug)]
struct CharacterSource {
    name: String,
    inner: HttpJsonSource<Value>,
}

#[async_trait]
impl Source<CharacterRecord> for CharacterSource {
    async fn fetch(&self, params: &FetchParams) -> Result<CharacterRecord, SourceError> {
        let raw = self.inner.fetch(params).await?;
        Ok(CharacterRecord::from_raw(&raw, params, &self.name))
    }
}

/// Build one descriptor per configured source.
fn build_sources(
    client: &JsonClient, configs: &[SourceConfig],
) -> Result<Vec<SourceDescriptor<CharacterRecord>>, Error> {
    configs
        .iter()
        .map(|config| {
            let inner = HttpJsonSource::new(client.clone(), &config.url_template, config.pointer.clone())
                .map_err(|e| Error::Source(format!("character source {}: {e}", config.name)))?;
            let source = CharacterSource { name: config.name.clone(), inner };
            Ok(SourceDescriptor::new(config.name.clone(), config.priority, Arc::new(source))
                .with_endpoint(config.endpoint.clone()))
        })
        .collect()
}

/// Character lookups through the cache and the configured sources.
#[derive(Debug, Clone)]
pub struct CharacterService {
    fetcher: FallbackFetcher,
    sources: Vec<SourceDescriptor<CharacterRecord>>,
    ttl: Duration,
}

impl CharacterService {
    pub fn new(fetcher: FallbackFetcher, sources: Vec<SourceDescriptor<CharacterRecord>>, ttl: Duration) -> Self {
        Self { fetcher, sources, ttl }
    }

    /// Build the service from `config.character_sources`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Source` if a source template is invalid.
    pub fn from_config(fetcher: FallbackFetcher, client: &JsonClient, config: &AppConfig) -> Result<Self, Error> {
        let sources = build_sources(client, &config.character_sources)?;
        if sources.is_empty() {
            tracing::warn!("No character sources configured; lookups will only hit the cache");
        }
        Ok(Self::new(fetcher, sources, config.ttl_for(NAMESPACE)))
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look a character up, reporting where the result came from.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an empty account or character name.
    pub async fn lookup(
        &self, account: &str, character: &str, league: Option<&str>,
    ) -> Result<FetchReport<CharacterRecord>, Error> {
        let account = account.trim();
        let character = character.trim();
        if account.is_empty() {
            return Err(Error::InvalidInput("account must not be empty".into()));
        }
        if character.is_empty() {
            return Err(Error::InvalidInput("character must not be empty".into()));
        }
        let league = league.map(str::trim).filter(|l| !l.is_empty()).unwrap_or(DEFAULT_LEAGUE);

        let params = FetchParams::from([
            ("account".to_string(), account.to_string()),
            ("character".to_string(), character.to_string()),
            ("league".to_string(), league.to_string()),
            ("api_league".to_string(), normalize_league(league).to_string()),
        ]);

        tracing::info!(account, character, league, "Fetching character");
        let key = character_key(account, character, league);
        Ok(self.fetcher.fetch_report(&key, DEFAULT_ENDPOINT, &self.sources, &params, self.ttl).await)
    }

    /// Look a character up.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no source produced a usable record.
    pub async fn get_character(
        &self, account: &str, character: &str, league: Option<&str>,
    ) -> Result<CharacterRecord, Error> {
        self.lookup(account, character, league)
            .await?
            .value
            .ok_or_else(|| Error::NotFound(format!("character {character} of account {account}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::Origin;
    use relay_core::{CacheDb, EndpointLimiterRegistry, LimiterDefaults, TierOptions, TieredCache};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn params(account: &str, character: &str, league: &str) -> FetchParams {
        FetchParams::from([
            ("account".to_string(), account.to_string()),
            ("character".to_string(), character.to_string()),
            ("league".to_string(), league.to_string()),
        ])
    }

    async fn fetcher() -> FallbackFetcher {
        let cache = TieredCache::new(CacheDb::open_in_memory().await.unwrap(), TierOptions::default());
        let limiters = EndpointLimiterRegistry::new(LimiterDefaults { burst: 10, adaptive: true, rate_per_minute: 600 });
        FallbackFetcher::new(Arc::new(cache), Arc::new(limiters))
    }

    #[test]
    fn test_character_key() {
        assert_eq!(character_key("acct", "Bob", "Standard"), "character:acct:Bob:Standard");
        assert_ne!(character_key("a:b", "c", "Standard"), character_key("a", "b:c", "Standard"));
    }

    #[test]
    fn test_normalize_league() {
        assert_eq!(normalize_league("Rise of the Abyssal"), "Abyss");
        assert_eq!(normalize_league("abyss hardcore"), "Hardcore Abyss");
        assert_eq!(normalize_league("Standard"), "Standard");
    }

    #[test]
    fn test_from_raw_unwraps_char_model() {
        let raw = json!({"charModel": {"name": "Bob", "class": "Witch", "level": 92, "league": "Abyss"}});
        let record = CharacterRecord::from_raw(&raw, &params("acct", "Bob", "Standard"), "poe_ninja");

        assert_eq!(record.name, "Bob");
        assert_eq!(record.account, "acct");
        assert_eq!(record.class, "Witch");
        assert_eq!(record.level, 92);
        assert_eq!(record.league, "Abyss");
        assert_eq!(record.source, "poe_ninja");
        assert!(record.is_usable());
    }

    #[test]
    fn test_from_raw_defaults() {
        let record = CharacterRecord::from_raw(&json!({}), &params("acct", "Bob", "Hardcore"), "ladder");

        assert_eq!(record.name, "Bob");
        assert_eq!(record.class, "Unknown");
        assert_eq!(record.league, "Hardcore");
        assert_eq!(record.level, 0);
        assert!(!record.is_usable());
    }

    #[tokio::test]
    async fn test_lookup_falls_back_and_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let sources = vec![
            SourceDescriptor::from_fn("empty", 1, |p: FetchParams| async move {
                Ok(CharacterRecord::from_raw(&json!({}), &p, "empty"))
            }),
            SourceDescriptor::from_fn("ladder", 2, move |p: FetchParams| {
                counted.fetch_add(1, Ordering::SeqCst);
                async move { Ok(CharacterRecord::from_raw(&json!({"level": 80, "class": "Ranger"}), &p, "ladder")) }
            })
            .with_endpoint("scrape"),
        ];
        let service = CharacterService::new(fetcher().await, sources, Duration::from_secs(3600));

        let first = service.lookup("acct", "Bob", None).await.unwrap();
        assert_eq!(first.origin, Origin::Source("ladder".into()));
        assert_eq!(first.value.as_ref().map(|r| r.level), Some(80));
        assert_eq!(first.value.as_ref().map(|r| r.league.as_str()), Some("Standard"));

        let second = service.get_character(" acct ", "Bob", Some("Standard")).await.unwrap();
        assert_eq!(second.class, "Ranger");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lookup_rejects_empty_names() {
        let service = CharacterService::new(fetcher().await, Vec::new(), Duration::from_secs(60));

        assert!(matches!(service.lookup("", "Bob", None).await, Err(Error::InvalidInput(_))));
        assert!(matches!(service.lookup("acct", "  ", None).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_get_character_not_found() {
        let service = CharacterService::new(fetcher().await, Vec::new(), Duration::from_secs(60));
        let result = service.get_character("acct", "Nobody", None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_from_config_builds_ordered_sources() {
        let mut config = AppConfig::default();
        config.character_sources = vec![
            SourceConfig {
                name: "ladder".into(),
                endpoint: "poe_official".into(),
                url_template: "https://www.pathofexile.com/api/ladders/{api_league}?character={character}".into(),
                priority: 2,
                pointer: None,
            },
            SourceConfig {
                name: "poe_ninja".into(),
                endpoint: "poe_ninja".into(),
                url_template: "https://poe.ninja/api/data/character/{account}/{character}".into(),
                priority: 1,
                pointer: Some("/charModel".into()),
            },
        ];
        let client = JsonClient::new(&crate::http::HttpConfig::default()).unwrap();

        let service = CharacterService::from_config(fetcher().await, &client, &config).unwrap();
        assert_eq!(service.source_names(), vec!["ladder", "poe_ninja"]);

        config.character_sources[0].url_template = "ftp://example.com/{character}".into();
        let result = CharacterService::from_config(fetcher().await, &client, &config);
        assert!(matches!(result, Err(Error::Source(_))));
    }
}
