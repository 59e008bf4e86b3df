//! get_character tool implementation.
//!
//! Looks a character up through the cache, then each configured source in
//! priority order.

use relay_client::{CharacterRecord, CharacterService, Origin, SourceAttempt};
use relay_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the get_character tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetCharacterParams {
    /// Account name, e.g. `acct#1234`.
    pub account: String,

    /// Character name.
    pub character: String,

    /// League display name (default: "Standard").
    #[serde(default)]
    pub league: Option<String>,
}

/// Output from the get_character tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetCharacterOutput {
    pub character: CharacterRecord,
    /// `cache` or the source that produced the record.
    pub origin: Origin,
    /// Sources tried before the record was found. Empty for cache hits.
    pub attempts: Vec<SourceAttempt>,
}

/// Implementation of the get_character tool.
pub async fn get_character_impl(
    characters: &CharacterService, params: GetCharacterParams,
) -> Result<CallToolResult, McpError> {
    let report = characters
        .lookup(&params.account, &params.character, params.league.as_deref())
        .await?;

    let Some(character) = report.value else {
        let tried: Vec<&str> = report.attempts.iter().map(|a| a.source.as_str()).collect();
        return Err(Error::NotFound(format!(
            "character {} of account {} (sources tried: {})",
            params.character.trim(),
            params.account.trim(),
            if tried.is_empty() { "none".to_string() } else { tried.join(", ") }
        ))
        .into());
    };

    json_result(&GetCharacterOutput { character, origin: report.origin, attempts: report.attempts })
}
