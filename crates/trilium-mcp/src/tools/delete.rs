//! Note deletion. Irreversible upstream; there is no soft delete.

use schemars::JsonSchema;
use serde::Deserialize;
use trilium_core::EtapiClient;

use crate::error::McpResult;

/// Parameters for the `delete_note` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNoteParams {
    /// Identifier of the note to delete.
    #[schemars(description = "Note identifier; deletion is permanent and removes the note's attributes")]
    pub note_id: String,
}

/// Handle a `delete_note` call, returning a short status line.
#[tracing::instrument(skip(client, params), fields(note_id = %params.note_id))]
pub async fn handle_delete(client: &EtapiClient, params: DeleteNoteParams) -> McpResult<String> {
    let note_id = params.note_id.trim();
    if note_id.is_empty() {
        return Err(trilium_core::Error::Validation(
            "noteId: must not be empty".to_string(),
        )
        .into());
    }

    client.delete_note(note_id).await?;
    Ok(format!("Deleted note {note_id}"))
}
