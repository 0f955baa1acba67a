//! Overwrite and append paths with hash-based optimistic concurrency.
//!
//! Both paths follow the same pipeline: fetch the current metadata, compare
//! the upstream's content-hash token against the caller's `expectedHash`,
//! prepare the new body for the kind, optionally snapshot a revision, then
//! put the content and report the fresh hash. A mismatch terminates the
//! call before anything is written.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use trilium_core::{content, EtapiClient, NoteKind, NotePatch};

use crate::error::McpResult;

/// Parameters for the `update_note` tool (full overwrite).
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteParams {
    /// Identifier of the note to update.
    #[schemars(description = "Note identifier")]
    pub note_id: String,

    /// Content-hash token from the preceding `get_note`.
    #[schemars(
        description = "contentHash returned by get_note; the update is rejected when the note \
                       changed in between"
    )]
    pub expected_hash: String,

    /// Kind the content is validated against.
    #[serde(rename = "type")]
    #[schemars(description = "Note kind the new content must fit")]
    pub kind: NoteKind,

    /// New title, when renaming.
    #[schemars(description = "New title (optional)")]
    pub title: Option<String>,

    /// New content body, when overwriting.
    #[schemars(description = "New content body (optional; at least one of title/content)")]
    pub content: Option<String>,

    /// New MIME subtype.
    #[schemars(description = "New MIME subtype (optional)")]
    pub mime: Option<String>,

    /// Snapshot the previous content before overwriting (default true).
    #[schemars(description = "Create a revision of the old content first (default true)")]
    pub revision: Option<bool>,
}

/// Parameters for the `append_note` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppendNoteParams {
    /// Identifier of the note to append to.
    #[schemars(description = "Note identifier")]
    pub note_id: String,

    /// Content-hash token from the preceding `get_note`.
    #[schemars(description = "contentHash returned by get_note")]
    pub expected_hash: String,

    /// Kind the content is validated against.
    #[serde(rename = "type")]
    #[schemars(description = "Note kind the appended content must fit")]
    pub kind: NoteKind,

    /// Content to concatenate after the existing body.
    #[schemars(description = "Content appended after the existing body")]
    pub content: String,

    /// Snapshot the previous content first (default false).
    #[schemars(description = "Create a revision of the old content first (default false)")]
    pub revision: Option<bool>,
}

/// Output shared by the write paths.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteNoteOutput {
    /// Identifier of the written note.
    pub note_id: String,
    /// Fresh content-hash token after the write.
    pub new_hash: String,
    /// Whether a revision snapshot was taken before the write.
    pub revision_created: bool,
}

/// Handle an `update_note` call.
#[tracing::instrument(skip(client, params), fields(note_id = %params.note_id))]
pub async fn handle_update(
    client: &EtapiClient,
    params: UpdateNoteParams,
) -> McpResult<WriteNoteOutput> {
    validate_target(&params.note_id, &params.expected_hash)?;
    if params.title.is_none() && params.content.is_none() {
        return Err(trilium_core::Error::Validation(
            "at least one of 'title' or 'content' is required".to_string(),
        )
        .into());
    }

    let current = check_hash(client, &params.note_id, &params.expected_hash).await?;

    let prepared = match &params.content {
        Some(body) => Some(content::prepare_content(params.kind, body)?),
        None => None,
    };

    let patch = NotePatch {
        title: params.title.clone(),
        mime: params.mime.clone(),
    };
    if !patch.is_empty() {
        client.patch_note(&params.note_id, &patch).await?;
    }

    let revision = params.revision.unwrap_or(true);
    let mut revision_created = false;
    let new_hash = if let Some(body) = prepared {
        if revision {
            client.create_revision(&params.note_id).await?;
            revision_created = true;
        }
        client.put_content(&params.note_id, body).await?
    } else {
        // Title-only change: the content hash stays what it was.
        current
    };

    Ok(WriteNoteOutput {
        note_id: params.note_id,
        new_hash,
        revision_created,
    })
}

/// Handle an `append_note` call.
#[tracing::instrument(skip(client, params), fields(note_id = %params.note_id))]
pub async fn handle_append(
    client: &EtapiClient,
    params: AppendNoteParams,
) -> McpResult<WriteNoteOutput> {
    validate_target(&params.note_id, &params.expected_hash)?;
    if params.content.trim().is_empty() {
        return Err(trilium_core::Error::Validation(
            "content: must not be empty".to_string(),
        )
        .into());
    }

    check_hash(client, &params.note_id, &params.expected_hash).await?;

    let existing = client.get_content(&params.note_id).await?;
    let addition = content::prepare_content(params.kind, &params.content)?;
    let joined = join_content(&existing, &addition);

    let revision = params.revision.unwrap_or(false);
    if revision {
        client.create_revision(&params.note_id).await?;
    }
    let new_hash = client.put_content(&params.note_id, joined).await?;

    Ok(WriteNoteOutput {
        note_id: params.note_id,
        new_hash,
        revision_created: revision,
    })
}

fn validate_target(note_id: &str, expected_hash: &str) -> McpResult<()> {
    if note_id.trim().is_empty() {
        return Err(
            trilium_core::Error::Validation("noteId: must not be empty".to_string()).into(),
        );
    }
    if expected_hash.trim().is_empty() {
        return Err(trilium_core::Error::Validation(
            "expectedHash: must not be empty; fetch the note first".to_string(),
        )
        .into());
    }
    Ok(())
}

/// Compare the caller's token against the upstream's current one and return
/// the current token on match.
async fn check_hash(client: &EtapiClient, note_id: &str, expected: &str) -> McpResult<String> {
    let meta = client.get_note(note_id).await?;
    let actual = meta.blob_id.unwrap_or_default();
    if actual != expected {
        return Err(trilium_core::Error::Conflict {
            expected: expected.to_string(),
            actual,
        }
        .into());
    }
    Ok(actual)
}

/// Join the existing body and the prepared addition with a line break; an
/// empty existing body takes the addition as-is.
fn join_content(existing: &str, addition: &str) -> String {
    if existing.trim().is_empty() {
        addition.to_string()
    } else {
        format!("{}\n{addition}", existing.trim_end_matches('\n'))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use trilium_core::Config;
    use wiremock::matchers::{body_json, body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> EtapiClient {
        let config = Config::new(&format!("{}/etapi", server.uri()), "tok_test").unwrap();
        EtapiClient::new(&config).unwrap()
    }

    fn note_json(blob: &str) -> serde_json::Value {
        json!({"noteId": "n1", "title": "Doc", "type": "text", "blobId": blob})
    }

    async fn mount_note(server: &MockServer, blob: &str) {
        Mock::given(method("GET"))
            .and(path("/etapi/notes/n1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(note_json(blob)))
            .mount(server)
            .await;
    }

    #[test]
    fn join_inserts_a_single_line_break() {
        assert_eq!(join_content("<p>a</p>\n", "<p>b</p>"), "<p>a</p>\n<p>b</p>");
        assert_eq!(join_content("", "<p>b</p>"), "<p>b</p>");
        assert_eq!(join_content("  \n", "line"), "line");
    }

    #[tokio::test]
    async fn stale_hash_yields_a_conflict_citing_both_hashes() {
        let server = MockServer::start().await;
        mount_note(&server, "H2").await;
        Mock::given(method("PUT"))
            .and(path("/etapi/notes/n1/content"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: UpdateNoteParams = serde_json::from_value(json!({
            "noteId": "n1",
            "expectedHash": "H1",
            "type": "text",
            "content": "new body"
        }))
        .unwrap();
        let err = handle_update(&client, params).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("H1") && msg.contains("H2"), "got: {msg}");
        assert!(msg.contains("re-fetch"));
    }

    #[tokio::test]
    async fn update_snapshots_a_revision_by_default() {
        let server = MockServer::start().await;
        mount_note(&server, "H1").await;
        Mock::given(method("POST"))
            .and(path("/etapi/notes/n1/revision"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/etapi/notes/n1/content"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: UpdateNoteParams = serde_json::from_value(json!({
            "noteId": "n1",
            "expectedHash": "H1",
            "type": "text",
            "content": "<p>new body</p>"
        }))
        .unwrap();
        let output = handle_update(&client, params).await.unwrap();
        assert!(output.revision_created);
        assert_eq!(output.note_id, "n1");
        // put_content re-reads the note; the mock keeps serving blobId H1.
        assert_eq!(output.new_hash, "H1");
    }

    #[tokio::test]
    async fn update_with_revision_false_skips_the_snapshot() {
        let server = MockServer::start().await;
        mount_note(&server, "H1").await;
        Mock::given(method("POST"))
            .and(path("/etapi/notes/n1/revision"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/etapi/notes/n1/content"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: UpdateNoteParams = serde_json::from_value(json!({
            "noteId": "n1",
            "expectedHash": "H1",
            "type": "text",
            "content": "<p>new body</p>",
            "revision": false
        }))
        .unwrap();
        let output = handle_update(&client, params).await.unwrap();
        assert!(!output.revision_created);
    }

    #[tokio::test]
    async fn title_only_update_patches_without_touching_content() {
        let server = MockServer::start().await;
        mount_note(&server, "H1").await;
        Mock::given(method("PATCH"))
            .and(path("/etapi/notes/n1"))
            .and(body_json(json!({"title": "Renamed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(note_json("H1")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/etapi/notes/n1/content"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: UpdateNoteParams = serde_json::from_value(json!({
            "noteId": "n1",
            "expectedHash": "H1",
            "type": "text",
            "title": "Renamed"
        }))
        .unwrap();
        let output = handle_update(&client, params).await.unwrap();
        assert_eq!(output.new_hash, "H1");
        assert!(!output.revision_created);
    }

    #[tokio::test]
    async fn update_requires_title_or_content() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        let params: UpdateNoteParams = serde_json::from_value(json!({
            "noteId": "n1",
            "expectedHash": "H1",
            "type": "text"
        }))
        .unwrap();
        let err = handle_update(&client, params).await.unwrap_err();
        assert!(err.to_string().contains("title"));
    }

    #[tokio::test]
    async fn append_joins_after_the_existing_body() {
        let server = MockServer::start().await;
        mount_note(&server, "H1").await;
        Mock::given(method("GET"))
            .and(path("/etapi/notes/n1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>first</p>"))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/etapi/notes/n1/content"))
            .and(body_string("<p>first</p>\n<p>second</p>"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/etapi/notes/n1/revision"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: AppendNoteParams = serde_json::from_value(json!({
            "noteId": "n1",
            "expectedHash": "H1",
            "type": "text",
            "content": "second"
        }))
        .unwrap();
        let output = handle_append(&client, params).await.unwrap();
        // Appends default to skipping the revision snapshot.
        assert!(!output.revision_created);
    }

    #[tokio::test]
    async fn append_checks_the_hash_before_reading_content() {
        let server = MockServer::start().await;
        mount_note(&server, "H9").await;
        Mock::given(method("GET"))
            .and(path("/etapi/notes/n1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: AppendNoteParams = serde_json::from_value(json!({
            "noteId": "n1",
            "expectedHash": "H1",
            "type": "text",
            "content": "second"
        }))
        .unwrap();
        let err = handle_append(&client, params).await.unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[tokio::test]
    async fn append_rejects_html_into_code_notes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/etapi/notes/n1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "noteId": "n1", "title": "Snippet", "type": "code",
                "mime": "text/x-rust", "blobId": "H1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/etapi/notes/n1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fn main() {}"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: AppendNoteParams = serde_json::from_value(json!({
            "noteId": "n1",
            "expectedHash": "H1",
            "type": "code",
            "content": "<p>markup</p>"
        }))
        .unwrap();
        let err = handle_append(&client, params).await.unwrap_err();
        assert!(err.to_string().contains("code"));
    }

    #[tokio::test]
    async fn blank_hash_is_rejected_up_front() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        let params: UpdateNoteParams = serde_json::from_value(json!({
            "noteId": "n1",
            "expectedHash": "",
            "type": "text",
            "content": "x"
        }))
        .unwrap();
        let err = handle_update(&client, params).await.unwrap_err();
        assert!(err.to_string().contains("expectedHash"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
