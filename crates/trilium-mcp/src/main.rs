//! Binary entry point for the Trilium MCP server.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    trilium_mcp::serve_stdio().await
}
