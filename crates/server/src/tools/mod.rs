//! MCP tool implementations.
//!
//! This module contains all tools exposed by the poe-relay server.

pub mod cache;
pub mod character;
pub mod limits;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use relay_core::Error;
use serde::Serialize;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json =
        serde_json::to_string_pretty(output).map_err(|e| Error::Codec(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Parse the JSON text content of a tool result.
#[cfg(test)]
pub(crate) fn parse_result<T: serde::de::DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
