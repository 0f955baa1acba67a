//! Note retrieval: metadata plus content and the concurrency token.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use trilium_core::{EtapiClient, NoteMeta};

use crate::error::McpResult;

/// Parameters for the `get_note` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetNoteParams {
    /// Identifier of the note to fetch.
    #[schemars(description = "Note identifier")]
    pub note_id: String,

    /// Whether the content body is included (default true).
    #[schemars(
        description = "Include the content body and its hash (default true); the returned \
                       contentHash must be echoed back as expectedHash on a later update"
    )]
    pub include_content: Option<bool>,
}

/// Output of the `get_note` tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNoteOutput {
    /// Note metadata.
    #[serde(flatten)]
    pub meta: NoteMeta,
    /// Content body, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Content-hash token to echo back on updates, when content was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// Handle a `get_note` call.
#[tracing::instrument(skip(client, params))]
pub async fn handle_get(client: &EtapiClient, params: GetNoteParams) -> McpResult<GetNoteOutput> {
    let note_id = params.note_id.trim();
    if note_id.is_empty() {
        return Err(trilium_core::Error::Validation(
            "noteId: must not be empty".to_string(),
        )
        .into());
    }

    let meta = client.get_note(note_id).await?;

    if params.include_content.unwrap_or(true) {
        let content = client.get_content(note_id).await?;
        let content_hash = meta.blob_id.clone();
        Ok(GetNoteOutput {
            meta,
            content: Some(content),
            content_hash,
        })
    } else {
        Ok(GetNoteOutput {
            meta,
            content: None,
            content_hash: None,
        })
    }
}
