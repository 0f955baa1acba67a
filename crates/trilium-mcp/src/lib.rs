//! Trilium MCP server
//!
//! An MCP (Model Context Protocol) server exposing a Trilium note store,
//! reached over its external HTTP API, as tools for language-model clients:
//! search, resolve-by-name, retrieval, creation, hash-checked updates and
//! deletion.

pub mod error;
pub mod server;
pub mod tools;

use std::sync::Arc;

use trilium_core::{Config, EtapiClient};

pub use error::{McpError, McpResult};
pub use server::TriliumServer;

/// Main entry point for the MCP server.
///
/// Loads configuration from the environment, wires up tracing on standard
/// error (stdout belongs to the protocol transport), probes the upstream
/// once, and serves over stdio until the peer disconnects.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the server fails to
/// initialize or run. An unreachable upstream is only a warning at this
/// point; it may come up later.
pub async fn serve_stdio() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if config.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    tracing::debug!(
        base_url = %config.base_url,
        permissions = %config.permissions,
        "initializing trilium MCP server"
    );

    let client = EtapiClient::new(&config)?;
    match client.app_info().await {
        Ok(info) => tracing::debug!(upstream_version = %info.app_version, "upstream reachable"),
        Err(e) => tracing::warn!(error = %e, "upstream not reachable at startup, continuing"),
    }

    let server = TriliumServer::new(Arc::new(client), config.permissions.clone());
    server.serve_stdio().await?;
    Ok(())
}
