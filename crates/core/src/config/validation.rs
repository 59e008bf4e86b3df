//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

/// Upper bound for any cache TTL (one year).
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `memory_capacity`, `burst` or any rate is 0
    /// - any TTL is 0 or longer than a year
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - a character source has an empty name, endpoint or template
    ///
    /// Returns `ConfigError::Missing` if the shared tier is enabled without a URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_capacity == 0 {
            return Err(ConfigError::Invalid { field: "memory_capacity".into(), reason: "must be greater than 0".into() });
        }

        if self.promotion_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "promotion_ttl_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        validate_ttl("default_ttl_secs", self.default_ttl_secs)?;
        for (namespace, ttl) in &self.entity_ttls {
            validate_ttl(&format!("entity_ttls.{namespace}"), *ttl)?;
        }

        if self.default_rate_per_minute == 0 {
            return Err(ConfigError::Invalid {
                field: "default_rate_per_minute".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if let Some((endpoint, _)) = self.endpoint_rates.iter().find(|(_, rate)| **rate == 0) {
            return Err(ConfigError::Invalid {
                field: format!("endpoint_rates.{endpoint}"),
                reason: "must be greater than 0".into(),
            });
        }

        if self.burst == 0 {
            return Err(ConfigError::Invalid { field: "burst".into(), reason: "must be greater than 0".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.shared_store_enabled && self.shared_store_url.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "shared_store_url".into(),
                hint: "Set POE_RELAY_SHARED_STORE_URL or disable the shared tier".into(),
            });
        }

        for (idx, source) in self.character_sources.iter().enumerate() {
            if source.name.trim().is_empty() || source.endpoint.trim().is_empty() || source.url_template.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: format!("character_sources[{idx}]"),
                    reason: "name, endpoint and url_template must not be empty".into(),
                });
            }
            if !self.endpoint_rates.contains_key(&source.endpoint) {
                tracing::debug!(
                    source = %source.name,
                    endpoint = %source.endpoint,
                    "Character source endpoint has no rate override; default rate applies"
                );
            }
        }

        Ok(())
    }
}

fn validate_ttl(field: &str, ttl: u64) -> Result<(), ConfigError> {
    if ttl == 0 {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must be greater than 0".into() });
    }
    if ttl > MAX_TTL_SECS {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must not exceed one year".into() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_memory_capacity_zero() {
        let config = AppConfig { memory_capacity: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "memory_capacity"));
    }

    #[test]
    fn test_validate_zero_rate_override() {
        let mut config = AppConfig::default();
        config.endpoint_rates.insert("trade".into(), 0);
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "endpoint_rates.trade"));
    }

    #[test]
    fn test_validate_burst_zero() {
        let config = AppConfig { burst: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "burst"));
    }

    #[test]
    fn test_validate_ttl_bounds() {
        let config = AppConfig { default_ttl_secs: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "default_ttl_secs"));

        let mut config = AppConfig::default();
        config.entity_ttls.insert("ladder".into(), MAX_TTL_SECS + 1);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "entity_ttls.ladder"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() }; // 5min 1sec
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_shared_store_without_url() {
        let config = AppConfig { shared_store_enabled: true, shared_store_url: " ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "shared_store_url"));
    }

    #[test]
    fn test_validate_blank_source() {
        let config = AppConfig {
            character_sources: vec![SourceConfig {
                name: "ninja".into(),
                endpoint: String::new(),
                url_template: "https://poe.ninja/{account}".into(),
                priority: 0,
                pointer: None,
            }],
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "character_sources[0]"));
    }
}
