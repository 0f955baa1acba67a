//! HTTP client for the upstream's external API (ETAPI).
//!
//! Thin typed wrapper over the endpoints the adapter uses: search, note
//! metadata and content retrieval, note creation with an attribute bundle,
//! content replacement, metadata patching, revision snapshots, and
//! deletion. Every request carries the static `Authorization` token and the
//! per-call timeout from the process configuration.
//!
//! No retry policy lives here; failures surface as typed errors and the
//! handlers above decide what to do with them.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::types::{Attribute, NoteKind, NoteMeta};
use crate::{Error, Result};

/// Typed client for the upstream ETAPI surface.
pub struct EtapiClient {
    http: Client,
    base_url: String,
    token: String,
}

/// Payload for creating a note.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    /// Identifier of the parent under which the note is placed.
    pub parent_note_id: String,
    /// Note title.
    pub title: String,
    /// Note kind.
    #[serde(rename = "type")]
    pub kind: NoteKind,
    /// MIME subtype; required upstream for code notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Prepared content body.
    pub content: String,
}

/// Partial metadata update for an existing note.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    /// New title, when changing it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New MIME subtype, when changing it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

impl NotePatch {
    /// Whether the patch carries any change at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.mime.is_none()
    }
}

/// Upstream application info, used for the startup connectivity probe.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    /// Upstream application version.
    pub app_version: String,
    /// Database schema version.
    #[serde(default)]
    pub db_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<NoteMeta>,
}

#[derive(Debug, Deserialize)]
struct CreateNoteResponse {
    note: NoteMeta,
}

/// Error body the upstream returns on failed requests.
#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    message: Option<String>,
}

impl EtapiClient {
    /// Build a client from the process configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("trilium-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            http,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Execute a search query.
    ///
    /// `fast` selects the upstream's indexed fast path; `include_archived`
    /// widens the result set to archived notes.
    pub async fn search(
        &self,
        query: &str,
        fast: bool,
        include_archived: bool,
    ) -> Result<Vec<NoteMeta>> {
        debug!(query, fast, include_archived, "upstream search");
        let response = self
            .http
            .get(self.url("notes"))
            .header(AUTHORIZATION, &self.token)
            .query(&[
                ("search", query),
                ("fastSearch", bool_str(fast)),
                ("includeArchivedNotes", bool_str(include_archived)),
            ])
            .send()
            .await
            .map_err(map_transport)?;
        let body: SearchResponse = decode(check_status(response).await?).await?;
        Ok(body.results)
    }

    /// Fetch a note's metadata.
    pub async fn get_note(&self, note_id: &str) -> Result<NoteMeta> {
        let response = self
            .http
            .get(self.url(&format!("notes/{note_id}")))
            .header(AUTHORIZATION, &self.token)
            .send()
            .await
            .map_err(map_transport)?;
        decode(check_status(response).await?).await
    }

    /// Fetch a note's content body.
    pub async fn get_content(&self, note_id: &str) -> Result<String> {
        let response = self
            .http
            .get(self.url(&format!("notes/{note_id}/content")))
            .header(AUTHORIZATION, &self.token)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(response)
            .await?
            .text()
            .await
            .map_err(map_transport)
    }

    /// Create a note and attach its attribute bundle.
    ///
    /// The upstream has no atomic create-with-attributes call, so the note
    /// is created first and each attribute is posted against the fresh
    /// identifier afterwards.
    pub async fn create_note(
        &self,
        request: &CreateNoteRequest,
        attributes: &[Attribute],
    ) -> Result<NoteMeta> {
        debug!(title = %request.title, kind = %request.kind, "upstream create note");
        let response = self
            .http
            .post(self.url("create-note"))
            .header(AUTHORIZATION, &self.token)
            .json(request)
            .send()
            .await
            .map_err(map_transport)?;
        let created: CreateNoteResponse = decode(check_status(response).await?).await?;

        for attribute in attributes {
            let mut owned = attribute.clone();
            owned.note_id = Some(created.note.note_id.clone());
            self.create_attribute(&owned).await?;
        }

        Ok(created.note)
    }

    /// Attach a single attribute to an existing note.
    pub async fn create_attribute(&self, attribute: &Attribute) -> Result<Attribute> {
        let response = self
            .http
            .post(self.url("attributes"))
            .header(AUTHORIZATION, &self.token)
            .json(attribute)
            .send()
            .await
            .map_err(map_transport)?;
        decode(check_status(response).await?).await
    }

    /// Replace a note's content and return the fresh content-hash token.
    ///
    /// The content endpoint replies without a body, so the new `blobId` is
    /// read back from the note metadata afterwards.
    pub async fn put_content(&self, note_id: &str, body: String) -> Result<String> {
        let response = self
            .http
            .put(self.url(&format!("notes/{note_id}/content")))
            .header(AUTHORIZATION, &self.token)
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(response).await?;

        let meta = self.get_note(note_id).await?;
        Ok(meta.blob_id.unwrap_or_default())
    }

    /// Patch note metadata (title, MIME).
    pub async fn patch_note(&self, note_id: &str, patch: &NotePatch) -> Result<NoteMeta> {
        let response = self
            .http
            .patch(self.url(&format!("notes/{note_id}")))
            .header(AUTHORIZATION, &self.token)
            .json(patch)
            .send()
            .await
            .map_err(map_transport)?;
        decode(check_status(response).await?).await
    }

    /// Snapshot the note's current content as a revision.
    pub async fn create_revision(&self, note_id: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("notes/{note_id}/revision")))
            .header(AUTHORIZATION, &self.token)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(response).await?;
        Ok(())
    }

    /// Delete a note. Irreversible upstream.
    pub async fn delete_note(&self, note_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("notes/{note_id}")))
            .header(AUTHORIZATION, &self.token)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(response).await?;
        Ok(())
    }

    /// Fetch upstream application info (startup connectivity probe).
    pub async fn app_info(&self) -> Result<AppInfo> {
        let response = self
            .http
            .get(self.url("app-info"))
            .header(AUTHORIZATION, &self.token)
            .send()
            .await
            .map_err(map_transport)?;
        decode(check_status(response).await?).await
    }
}

const fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn map_transport(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(err.to_string())
    } else {
        Error::Network(err)
    }
}

/// Turn non-success statuses into typed errors, decoding the upstream's
/// error body when it has one.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.text().await {
        Ok(body) if !body.is_empty() => serde_json::from_str::<UpstreamErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body),
        _ => status
            .canonical_reason()
            .unwrap_or("upstream request failed")
            .to_string(),
    };

    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(message));
    }
    Err(Error::Upstream {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    response.json::<T>().await.map_err(map_transport)
}
