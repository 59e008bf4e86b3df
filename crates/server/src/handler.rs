//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::AppState;
use crate::tools::{
    cache::{self as cache_tools, CacheDeleteParams},
    character::{GetCharacterParams, get_character_impl},
    limits::{self, RateLimitResetParams},
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for poe-relay.
#[derive(Clone)]
pub struct RelayServer {
    state: Arc<AppState>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl RelayServer {
    /// Create a new server handler over shared state.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Look up a Path of Exile character by account and name. Serves from cache when fresh, otherwise tries each configured source in priority order."
    )]
    async fn get_character(&self, params: Parameters<GetCharacterParams>) -> Result<CallToolResult, McpError> {
        get_character_impl(&self.state.characters, params.0).await
    }

    #[tool(description = "Report cache tier sizes and hit/miss counters.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        cache_tools::stats_impl(&self.state.cache).await
    }

    #[tool(description = "Remove one key from every cache tier.")]
    async fn cache_delete(&self, params: Parameters<CacheDeleteParams>) -> Result<CallToolResult, McpError> {
        cache_tools::delete_impl(&self.state.cache, params.0).await
    }

    #[tool(description = "Remove every key from every cache tier.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        cache_tools::clear_impl(&self.state.cache).await
    }

    #[tool(description = "Sweep expired entries from the in-process and durable cache tiers.")]
    async fn cache_cleanup(&self) -> Result<CallToolResult, McpError> {
        cache_tools::cleanup_impl(&self.state.cache).await
    }

    #[tool(description = "Report request counts, waits and backoff per rate-limited endpoint.")]
    async fn rate_limit_stats(&self) -> Result<CallToolResult, McpError> {
        limits::stats_impl(&self.state.limiters)
    }

    #[tool(description = "Refill the token bucket and clear backoff for one endpoint, or for all endpoints.")]
    async fn rate_limit_reset(&self, params: Parameters<RateLimitResetParams>) -> Result<CallToolResult, McpError> {
        limits::reset_impl(&self.state.limiters, params.0)
    }
}

impl ServerHandler for RelayServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "poe-relay".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tool_list() {
        let server = RelayServer::new(Arc::new(AppState::in_memory().await));
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "cache_cleanup",
                "cache_clear",
                "cache_delete",
                "cache_stats",
                "get_character",
                "rate_limit_reset",
                "rate_limit_stats"
            ]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = RelayServer::new(Arc::new(AppState::in_memory().await));
        assert_eq!(server.get_info().server_info.name, "poe-relay");
    }
}
