//! MCP server implementation: tool catalog, permission gate, dispatch.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::ToolCallContext;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{tool, tool_router, ErrorData, RoleServer, ServerHandler};
use serde::Serialize;
use trilium_core::{EtapiClient, Permission, PermissionSet};

use crate::error::{McpError, McpResult};
use crate::tools;

/// Tools dispatchable with the READ capability.
const READ_TOOLS: &[&str] = &["search_notes", "get_note", "resolve_note_id"];
/// Tools dispatchable with the WRITE capability.
const WRITE_TOOLS: &[&str] = &["create_note", "update_note", "append_note", "delete_note"];

/// MCP server for a Trilium note store.
#[derive(Clone)]
pub struct TriliumServer {
    client: Arc<EtapiClient>,
    permissions: PermissionSet,
    tool_router: ToolRouter<Self>,
}

impl TriliumServer {
    /// Create a server over the given upstream client and capability set.
    #[must_use]
    pub fn new(client: Arc<EtapiClient>, permissions: PermissionSet) -> Self {
        Self {
            client,
            permissions,
            tool_router: Self::tool_router(),
        }
    }

    /// Serve the MCP protocol over stdio until the peer disconnects.
    pub async fn serve_stdio(&self) -> McpResult<()> {
        tracing::info!(permissions = %self.permissions, "trilium MCP server starting");

        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();

        let service = rmcp::serve_server(self.clone(), (stdin, stdout))
            .await
            .map_err(|e| {
                tracing::error!("server initialization error: {}", e);
                McpError::Protocol(e.to_string())
            })?;

        service.waiting().await.map_err(|e| {
            tracing::error!("server runtime error: {}", e);
            McpError::Protocol(e.to_string())
        })?;

        tracing::info!("trilium MCP server stopped");
        Ok(())
    }

    /// The capability a tool name requires, if the tool is known.
    fn required_capability(name: &str) -> Option<Permission> {
        if READ_TOOLS.contains(&name) {
            Some(Permission::Read)
        } else if WRITE_TOOLS.contains(&name) {
            Some(Permission::Write)
        } else {
            None
        }
    }

    /// Reject a call whose capability is not held, before any handler runs.
    fn check_capability(&self, name: &str) -> Result<(), ErrorData> {
        match Self::required_capability(name) {
            Some(capability) if !self.permissions.contains(capability) => Err(McpError::from(
                trilium_core::Error::PermissionDenied(format!(
                    "tool '{name}' requires the {capability} capability \
                     (active permissions: {})",
                    self.permissions
                )),
            )
            .into()),
            _ => Ok(()),
        }
    }

    /// The tool descriptors visible under the active capability set.
    fn visible_tools(&self) -> Vec<Tool> {
        self.tool_router
            .list_all()
            .into_iter()
            .filter(|tool| self.check_capability(&tool.name).is_ok())
            .collect()
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, ErrorData> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

#[tool_router]
impl TriliumServer {
    /// Search notes with a full-text token and/or structured criteria.
    #[tool(
        description = "Search notes by full-text and/or structured criteria (labels, relations, \
                       note properties). Criteria join left-to-right via each item's 'logic' \
                       (AND/OR). Returns matching note metadata as JSON."
    )]
    async fn search_notes(
        &self,
        Parameters(params): Parameters<tools::SearchNotesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let results = tools::handle_search(&self.client, params)
            .await
            .map_err(ErrorData::from)?;
        json_result(&results)
    }

    /// Resolve a note name to an identifier with ranked candidates.
    #[tool(
        description = "Resolve a note name to its identifier. Ranks candidates by exact title \
                       match, folder-likeness and recency; returns the ranked list and, unless \
                       several candidates tie without autoSelect, the chosen noteId."
    )]
    async fn resolve_note_id(
        &self,
        Parameters(params): Parameters<tools::ResolveNoteIdParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let output = tools::handle_resolve(&self.client, params)
            .await
            .map_err(ErrorData::from)?;
        json_result(&output)
    }

    /// Fetch a note's metadata, content and concurrency token.
    #[tool(
        description = "Get a note's metadata and (by default) its content plus contentHash. \
                       The contentHash must be echoed back as expectedHash when updating."
    )]
    async fn get_note(
        &self,
        Parameters(params): Parameters<tools::GetNoteParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let output = tools::handle_get(&self.client, params)
            .await
            .map_err(ErrorData::from)?;
        json_result(&output)
    }

    /// Create a note under a parent, with duplicate detection.
    #[tool(
        description = "Create a note under a parent. Checks for a sibling with the same title \
                       first and returns reuse guidance instead of creating a duplicate unless \
                       forceCreate is set. Markdown content is converted to HTML for text notes."
    )]
    async fn create_note(
        &self,
        Parameters(params): Parameters<tools::CreateNoteParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let output = tools::handle_create(&self.client, params)
            .await
            .map_err(ErrorData::from)?;
        json_result(&output)
    }

    /// Overwrite a note's content and/or title under a hash check.
    #[tool(
        description = "Overwrite a note's content and/or title. Requires the expectedHash from a \
                       preceding get_note; a mismatch returns a conflict instructing a re-fetch. \
                       Snapshots a revision of the old content by default."
    )]
    async fn update_note(
        &self,
        Parameters(params): Parameters<tools::UpdateNoteParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let output = tools::handle_update(&self.client, params)
            .await
            .map_err(ErrorData::from)?;
        json_result(&output)
    }

    /// Append content after a note's existing body under a hash check.
    #[tool(
        description = "Append content after a note's existing body. Same expectedHash contract \
                       as update_note; skips the revision snapshot by default."
    )]
    async fn append_note(
        &self,
        Parameters(params): Parameters<tools::AppendNoteParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let output = tools::handle_append(&self.client, params)
            .await
            .map_err(ErrorData::from)?;
        json_result(&output)
    }

    /// Delete a note permanently.
    #[tool(description = "Delete a note permanently, including its attributes. Irreversible.")]
    async fn delete_note(
        &self,
        Parameters(params): Parameters<tools::DeleteNoteParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let status = tools::handle_delete(&self.client, params)
            .await
            .map_err(ErrorData::from)?;
        Ok(CallToolResult::success(vec![Content::text(status)]))
    }
}

// Manual impl (no #[tool_handler]) so the catalog and dispatch both honor
// the capability set loaded at startup.
impl ServerHandler for TriliumServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "trilium-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Trilium note store".to_string()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools for a Trilium note store. Use resolve_note_id to turn a note name into \
                 an identifier, search_notes for full-text and structured queries, and get_note \
                 before any update: the returned contentHash is the expectedHash a subsequent \
                 update_note/append_note must present."
                    .to_string(),
            ),
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.check_capability(&request.name)?;
        let tcc = ToolCallContext::new(self, request, context);
        self.tool_router.call(tcc).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.visible_tools()))
    }
}
