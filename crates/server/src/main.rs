//! poe-relay server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use relay_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod state;
mod tools;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(db_path = %config.db_path.display(), shared = config.shared_store_enabled, "Configuration loaded");

    let state = Arc::new(AppState::from_config(&config).await?);
    let cleanup = state.spawn_cleanup(&config);

    tracing::info!("Starting poe-relay server on stdio transport");

    let handler = handler::RelayServer::new(state.clone());
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    if let Some(cleanup) = cleanup {
        cleanup.abort();
        let _ = cleanup.await;
    }

    match Arc::try_unwrap(state) {
        Ok(state) => state.shutdown().await?,
        Err(_) => tracing::warn!("Server state still shared at shutdown"),
    }

    tracing::info!("poe-relay stopped");
    Ok(())
}
