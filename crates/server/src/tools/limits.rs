//! rate_limit_stats and rate_limit_reset tool implementations.

use std::collections::BTreeMap;

use relay_core::{EndpointLimiterRegistry, Error, LimiterStats};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the rate_limit_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RateLimitStatsOutput {
    /// Statistics per endpoint that has been used at least once.
    pub endpoints: BTreeMap<String, LimiterStats>,
}

/// Parameters for the rate_limit_reset tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RateLimitResetParams {
    /// Endpoint to reset. Omit to reset every endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Output from the rate_limit_reset tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RateLimitResetOutput {
    pub reset: Vec<String>,
}

/// Implementation of the rate_limit_stats tool.
pub fn stats_impl(limiters: &EndpointLimiterRegistry) -> Result<CallToolResult, McpError> {
    json_result(&RateLimitStatsOutput { endpoints: limiters.get_statistics() })
}

/// Implementation of the rate_limit_reset tool.
pub fn reset_impl(limiters: &EndpointLimiterRegistry, params: RateLimitResetParams) -> Result<CallToolResult, McpError> {
    let reset = match params.endpoint.as_deref().map(str::trim) {
        Some(endpoint) => {
            if !limiters.reset(endpoint) {
                return Err(Error::NotFound(format!("no rate limiter for endpoint {endpoint}")).into());
            }
            vec![endpoint.to_string()]
        }
        None => {
            limiters.reset_all();
            limiters.get_statistics().into_keys().collect()
        }
    };

    tracing::info!(?reset, "Rate limiters reset");
    json_result(&RateLimitResetOutput { reset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_result;
    use relay_core::LimiterDefaults;

    fn registry() -> EndpointLimiterRegistry {
        let registry = EndpointLimiterRegistry::new(LimiterDefaults::default());
        registry.get_limiter("trade", 2);
        registry.get_limiter("poe_ninja", 20);
        registry.record_failure("trade");
        registry.record_failure("poe_ninja");
        registry
    }

    #[test]
    fn test_stats_impl() {
        let output: RateLimitStatsOutput = parse_result(&stats_impl(&registry()).unwrap());

        assert_eq!(output.endpoints.len(), 2);
        assert_eq!(output.endpoints["trade"].rate_per_minute, 2);
        assert_eq!(output.endpoints["trade"].current_backoff, 2.0);
    }

    #[test]
    fn test_reset_one() {
        let registry = registry();
        let params = RateLimitResetParams { endpoint: Some("trade".into()) };
        let output: RateLimitResetOutput = parse_result(&reset_impl(&registry, params).unwrap());

        assert_eq!(output.reset, vec!["trade"]);
        let stats = registry.get_statistics();
        assert_eq!(stats["trade"].consecutive_failures, 0);
        assert_eq!(stats["poe_ninja"].consecutive_failures, 1);
    }

    #[test]
    fn test_reset_all() {
        let registry = registry();
        let output: RateLimitResetOutput = parse_result(&reset_impl(&registry, RateLimitResetParams::default()).unwrap());

        assert_eq!(output.reset, vec!["poe_ninja", "trade"]);
        assert!(registry.get_statistics().values().all(|s| s.consecutive_failures == 0));
    }

    #[test]
    fn test_reset_unknown_endpoint() {
        let params = RateLimitResetParams { endpoint: Some("nowhere".into()) };
        let err = reset_impl(&registry(), params).unwrap_err();
        assert_eq!(err.code.0, -32001);
    }
}
