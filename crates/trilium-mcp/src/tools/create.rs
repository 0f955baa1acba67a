//! Note creation with duplicate detection and the create-time attribute bundle.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use trilium_core::types::{CriterionKind, CriterionOp, JoinLogic};
use trilium_core::{
    content, query, Attribute, AttributeKind, CreateNoteRequest, EtapiClient, NoteKind, NoteMeta,
    SearchCriterion, SearchRequest,
};

use crate::error::McpResult;

/// Parameters for the `create_note` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteParams {
    /// Identifier of the parent note; "root" places the note at the top.
    #[schemars(description = "Identifier of the parent note ('root' for the tree origin)")]
    pub parent_note_id: String,

    /// Title of the new note.
    #[schemars(description = "Title of the new note")]
    pub title: String,

    /// Kind of the new note.
    #[serde(rename = "type")]
    #[schemars(description = "Note kind: text, code, render, search, relationMap, book, noteMap, mermaid or webView")]
    pub kind: NoteKind,

    /// Content body; shape depends on the kind.
    #[schemars(description = "Content body; Markdown is converted to HTML for text notes")]
    pub content: String,

    /// MIME subtype; required for code notes.
    #[schemars(description = "MIME subtype, e.g. text/x-rust; required when type is code")]
    pub mime: Option<String>,

    /// Attributes to attach at creation time.
    #[schemars(description = "Labels and relations to attach to the new note")]
    pub attributes: Option<Vec<Attribute>>,

    /// Create even when a sibling with the same title exists.
    #[serde(default)]
    #[schemars(description = "Skip the duplicate-title check and create anyway (default false)")]
    pub force_create: bool,
}

/// A sibling note that already carries the requested title.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCandidate {
    /// Existing note identifier.
    pub note_id: String,
    /// Existing note title.
    pub title: String,
    /// Existing note kind.
    #[serde(rename = "type")]
    pub kind: NoteKind,
    /// Last modification timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
}

/// Output of the `create_note` tool.
///
/// A duplicate hit is a successful response carrying guidance, not an
/// error: the caller decides between reusing the existing note and retrying
/// with `forceCreate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteOutput {
    /// Identifier of the created note; absent on a duplicate hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_id: Option<String>,
    /// Human-readable summary of what happened.
    pub message: String,
    /// Existing siblings with the same title, on a duplicate hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<Vec<DuplicateCandidate>>,
    /// What the caller can do next, on a duplicate hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
}

/// Handle a `create_note` call.
#[tracing::instrument(skip(client, params), fields(title = %params.title))]
pub async fn handle_create(
    client: &EtapiClient,
    params: CreateNoteParams,
) -> McpResult<CreateNoteOutput> {
    validate(&params)?;

    if !params.force_create {
        let siblings = probe_duplicates(client, &params.parent_note_id, &params.title).await?;
        if !siblings.is_empty() {
            tracing::debug!(count = siblings.len(), "duplicate titles found, not creating");
            return Ok(duplicate_output(&params.title, &params.parent_note_id, siblings));
        }
    }

    let prepared = content::prepare_content(params.kind, &params.content)?;

    let request = CreateNoteRequest {
        parent_note_id: params.parent_note_id.clone(),
        title: params.title.clone(),
        kind: params.kind,
        mime: params.mime.clone(),
        content: prepared,
    };
    let attributes = params.attributes.unwrap_or_default();
    let note = client.create_note(&request, &attributes).await?;

    Ok(CreateNoteOutput {
        message: format!("Created {} note '{}' ({})", note.kind, note.title, note.note_id),
        note_id: Some(note.note_id),
        duplicates: None,
        next_steps: None,
    })
}

fn validate(params: &CreateNoteParams) -> McpResult<()> {
    if params.parent_note_id.trim().is_empty() {
        return Err(
            trilium_core::Error::Validation("parentNoteId: must not be empty".to_string()).into(),
        );
    }
    if params.title.trim().is_empty() {
        return Err(
            trilium_core::Error::Validation("title: must not be empty".to_string()).into(),
        );
    }
    if !params.kind.is_creatable() {
        return Err(trilium_core::Error::Validation(format!(
            "type: '{}' notes cannot be created through this adapter",
            params.kind
        ))
        .into());
    }
    if params.kind == NoteKind::Code
        && params.mime.as_deref().is_none_or(|m| m.trim().is_empty())
    {
        return Err(
            trilium_core::Error::Validation("mime: required when type is code".to_string()).into(),
        );
    }
    for attribute in params.attributes.iter().flatten() {
        if attribute.name.trim().is_empty() {
            return Err(trilium_core::Error::Validation(
                "attributes.name: must not be empty".to_string(),
            )
            .into());
        }
        if attribute.kind == AttributeKind::Relation && attribute.value.trim().is_empty() {
            return Err(trilium_core::Error::Validation(format!(
                "attributes.value: relation '{}' requires a target note identifier",
                attribute.name
            ))
            .into());
        }
        if attribute.position < 0 {
            return Err(trilium_core::Error::Validation(
                "attributes.position: must be non-negative".to_string(),
            )
            .into());
        }
    }
    Ok(())
}

/// Search for siblings of `parent` carrying `title`.
///
/// The probe goes through the regular query compiler. Titles the DSL cannot
/// express (an embedded single quote) skip the probe instead of failing the
/// create.
async fn probe_duplicates(
    client: &EtapiClient,
    parent: &str,
    title: &str,
) -> McpResult<Vec<NoteMeta>> {
    let request = SearchRequest {
        criteria: vec![
            SearchCriterion {
                property: "title".to_string(),
                kind: CriterionKind::NoteProperty,
                op: CriterionOp::Eq,
                value: Some(title.to_string()),
                logic: JoinLogic::And,
            },
            SearchCriterion {
                property: "parents.noteId".to_string(),
                kind: CriterionKind::NoteProperty,
                op: CriterionOp::Eq,
                value: Some(parent.to_string()),
                logic: JoinLogic::And,
            },
        ],
        ..SearchRequest::default()
    };

    match query::compile(&request) {
        Ok(compiled) => Ok(client.search(&compiled.query, false, true).await?),
        Err(err) => {
            tracing::debug!(error = %err, "duplicate probe not expressible, skipping");
            Ok(Vec::new())
        },
    }
}

fn duplicate_output(
    title: &str,
    parent: &str,
    siblings: Vec<NoteMeta>,
) -> CreateNoteOutput {
    let duplicates: Vec<DuplicateCandidate> = siblings
        .into_iter()
        .map(|meta| DuplicateCandidate {
            note_id: meta.note_id,
            title: meta.title,
            kind: meta.kind,
            date_modified: meta.date_modified,
        })
        .collect();

    CreateNoteOutput {
        note_id: None,
        message: format!(
            "A note titled '{title}' already exists under '{parent}'; nothing was created."
        ),
        duplicates: Some(duplicates),
        next_steps: Some(vec![
            "Reuse the existing note via its noteId (update_note or append_note)".to_string(),
            "Retry with forceCreate=true to create a second note with the same title".to_string(),
        ]),
    }
}
