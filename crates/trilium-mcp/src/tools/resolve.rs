//! Name-to-identifier resolution with ranked candidates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use trilium_core::types::{CriterionKind, CriterionOp, JoinLogic};
use trilium_core::{query, EtapiClient, NoteKind, NoteMeta, SearchCriterion, SearchRequest};

use crate::error::McpResult;

/// Default number of candidates returned.
const DEFAULT_MAX_RESULTS: usize = 3;
/// Hard cap on the candidate list.
const MAX_RESULTS_CEILING: usize = 10;

/// Parameters for the `resolve_note_id` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveNoteIdParams {
    /// Name of the note to resolve.
    #[schemars(description = "Note title (or fragment) to resolve to an identifier")]
    pub note_name: String,

    /// Require the title to equal the name instead of containing it.
    #[serde(default)]
    #[schemars(description = "Match the title exactly instead of by substring (default false)")]
    pub exact_match: bool,

    /// Candidate list size, clamped to 1..=10.
    #[schemars(description = "Number of candidates to return (1-10, default 3)")]
    pub max_results: Option<u32>,

    /// Pick the top candidate even when the match is ambiguous.
    #[serde(default)]
    #[schemars(
        description = "Select the best match automatically instead of asking the caller to \
                       choose among candidates (default false)"
    )]
    pub auto_select: bool,
}

/// One ranked candidate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveCandidate {
    /// Candidate identifier.
    pub note_id: String,
    /// Candidate title.
    pub title: String,
    /// Candidate kind.
    #[serde(rename = "type")]
    pub kind: NoteKind,
    /// Last modification timestamp, when the upstream supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    /// Whether the title equals the requested name.
    pub exact: bool,
}

/// Output of the `resolve_note_id` tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveNoteIdOutput {
    /// Identifier of the selected note, when one was selected.
    pub note_id: Option<String>,
    /// Title of the selected note.
    pub title: Option<String>,
    /// Whether any note matched at all.
    pub found: bool,
    /// Total number of matches before truncation.
    pub matches: usize,
    /// Ranked candidate list, truncated to `maxResults`.
    pub top_matches: Vec<ResolveCandidate>,
    /// Set when several candidates tie and `autoSelect` was off.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_user_choice: bool,
    /// Guidance when nothing matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Handle a `resolve_note_id` call.
#[tracing::instrument(skip(client, params))]
pub async fn handle_resolve(
    client: &EtapiClient,
    params: ResolveNoteIdParams,
) -> McpResult<ResolveNoteIdOutput> {
    let name = params.note_name.trim();
    if name.is_empty() {
        return Err(trilium_core::Error::Validation(
            "noteName: must not be empty".to_string(),
        )
        .into());
    }

    let max_results = params
        .max_results
        .map_or(DEFAULT_MAX_RESULTS, |n| {
            (n as usize).clamp(1, MAX_RESULTS_CEILING)
        });

    let op = if params.exact_match {
        CriterionOp::Eq
    } else {
        CriterionOp::Contains
    };
    let request = SearchRequest {
        criteria: vec![SearchCriterion {
            property: "title".to_string(),
            kind: CriterionKind::NoteProperty,
            op,
            value: Some(name.to_string()),
            logic: JoinLogic::And,
        }],
        ..SearchRequest::default()
    };
    let compiled = query::compile(&request)?;

    let mut hits = client.search(&compiled.query, false, false).await?;
    rank_candidates(&mut hits, name);

    let matches = hits.len();
    let top_matches: Vec<ResolveCandidate> = hits
        .into_iter()
        .take(max_results)
        .map(|meta| to_candidate(meta, name))
        .collect();

    if top_matches.is_empty() {
        return Ok(ResolveNoteIdOutput {
            note_id: None,
            title: None,
            found: false,
            matches: 0,
            top_matches,
            requires_user_choice: false,
            suggestion: Some(format!(
                "No notes matched '{name}'. Try the search_notes tool with a broader query."
            )),
        });
    }

    if params.auto_select || matches == 1 {
        let best = &top_matches[0];
        return Ok(ResolveNoteIdOutput {
            note_id: Some(best.note_id.clone()),
            title: Some(best.title.clone()),
            found: true,
            matches,
            top_matches,
            requires_user_choice: false,
            suggestion: None,
        });
    }

    Ok(ResolveNoteIdOutput {
        note_id: None,
        title: None,
        found: true,
        matches,
        top_matches,
        requires_user_choice: true,
        suggestion: None,
    })
}

/// Rank candidates: exact title equality first, then folder-like notes,
/// then most recently modified.
fn rank_candidates(hits: &mut [NoteMeta], name: &str) {
    hits.sort_by(|a, b| rank_key(b, name).cmp(&rank_key(a, name)));
}

fn rank_key(meta: &NoteMeta, name: &str) -> (bool, bool, String) {
    (
        meta.title.eq_ignore_ascii_case(name),
        meta.kind == NoteKind::Book,
        meta.date_modified.clone().unwrap_or_default(),
    )
}

fn to_candidate(meta: NoteMeta, name: &str) -> ResolveCandidate {
    let exact = meta.title.eq_ignore_ascii_case(name);
    ResolveCandidate {
        note_id: meta.note_id,
        title: meta.title,
        kind: meta.kind,
        date_modified: meta.date_modified,
        exact,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use trilium_core::Config;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> EtapiClient {
        let config = Config::new(&format!("{}/etapi", server.uri()), "tok_test").unwrap();
        EtapiClient::new(&config).unwrap()
    }

    fn meta(id: &str, title: &str, kind: &str, modified: &str) -> serde_json::Value {
        json!({
            "noteId": id,
            "title": title,
            "type": kind,
            "dateModified": modified
        })
    }

    fn parse_meta(value: serde_json::Value) -> NoteMeta {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn ranking_prefers_exact_then_book_then_recency() {
        let mut hits = vec![
            parse_meta(meta("C", "Alphanumeric", "text", "2025-01-03 00:00:00.000+0000")),
            parse_meta(meta("A", "Alpha", "text", "2025-01-02 00:00:00.000+0000")),
            parse_meta(meta("B", "Alpha", "book", "2025-01-01 00:00:00.000+0000")),
        ];
        rank_candidates(&mut hits, "Alpha");
        let order: Vec<&str> = hits.iter().map(|m| m.note_id.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn ranking_falls_back_to_recency_within_a_tier() {
        let mut hits = vec![
            parse_meta(meta("old", "Alpha", "text", "2024-01-01 00:00:00.000+0000")),
            parse_meta(meta("new", "Alpha", "text", "2025-06-01 00:00:00.000+0000")),
        ];
        rank_candidates(&mut hits, "Alpha");
        assert_eq!(hits[0].note_id, "new");
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        let params: ResolveNoteIdParams =
            serde_json::from_value(json!({"noteName": "  "})).unwrap();
        assert!(handle_resolve(&client, params).await.is_err());
    }

    #[tokio::test]
    async fn contains_search_by_default_exact_on_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/etapi/notes"))
            .and(query_param("search", "note.title *=* 'Alpha'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/etapi/notes"))
            .and(query_param("search", "note.title = 'Alpha'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let contains: ResolveNoteIdParams =
            serde_json::from_value(json!({"noteName": "Alpha"})).unwrap();
        handle_resolve(&client, contains).await.unwrap();

        let exact: ResolveNoteIdParams =
            serde_json::from_value(json!({"noteName": "Alpha", "exactMatch": true})).unwrap();
        handle_resolve(&client, exact).await.unwrap();
    }

    #[tokio::test]
    async fn zero_matches_return_a_suggestion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/etapi/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: ResolveNoteIdParams =
            serde_json::from_value(json!({"noteName": "Ghost"})).unwrap();
        let output = handle_resolve(&client, params).await.unwrap();
        assert!(!output.found);
        assert!(output.note_id.is_none());
        assert!(output.suggestion.unwrap().contains("search_notes"));
    }

    #[tokio::test]
    async fn ambiguous_matches_require_a_user_choice() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/etapi/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [
                meta("A", "Alpha", "text", "2025-01-02 00:00:00.000+0000"),
                meta("B", "Alpha", "book", "2025-01-01 00:00:00.000+0000"),
                meta("C", "Alphanumeric", "text", "2025-01-03 00:00:00.000+0000"),
            ]})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: ResolveNoteIdParams =
            serde_json::from_value(json!({"noteName": "Alpha", "maxResults": 3})).unwrap();
        let output = handle_resolve(&client, params).await.unwrap();

        assert!(output.found);
        assert!(output.requires_user_choice);
        assert!(output.note_id.is_none());
        assert_eq!(output.matches, 3);
        let ids: Vec<&str> = output.top_matches.iter().map(|c| c.note_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
        assert!(output.top_matches[0].exact);
    }

    #[tokio::test]
    async fn auto_select_picks_the_top_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/etapi/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [
                meta("A", "Alpha", "text", "2025-01-02 00:00:00.000+0000"),
                meta("B", "Alpha", "book", "2025-01-01 00:00:00.000+0000"),
            ]})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: ResolveNoteIdParams =
            serde_json::from_value(json!({"noteName": "Alpha", "autoSelect": true})).unwrap();
        let output = handle_resolve(&client, params).await.unwrap();
        assert_eq!(output.note_id.as_deref(), Some("B"));
        assert!(!output.requires_user_choice);
    }

    #[tokio::test]
    async fn single_match_is_selected_without_auto_select() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/etapi/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [
                meta("A", "Alpha", "text", "2025-01-02 00:00:00.000+0000"),
            ]})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: ResolveNoteIdParams =
            serde_json::from_value(json!({"noteName": "Alpha"})).unwrap();
        let output = handle_resolve(&client, params).await.unwrap();
        assert_eq!(output.note_id.as_deref(), Some("A"));
        assert_eq!(output.title.as_deref(), Some("Alpha"));
    }

    #[tokio::test]
    async fn max_results_is_clamped_to_the_ceiling() {
        let server = MockServer::start().await;
        let many: Vec<serde_json::Value> = (0..20)
            .map(|i| meta(&format!("n{i}"), "Alpha", "text", "2025-01-01 00:00:00.000+0000"))
            .collect();
        Mock::given(method("GET"))
            .and(path("/etapi/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": many})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params: ResolveNoteIdParams =
            serde_json::from_value(json!({"noteName": "Alpha", "maxResults": 50})).unwrap();
        let output = handle_resolve(&client, params).await.unwrap();
        assert_eq!(output.top_matches.len(), 10);
        assert_eq!(output.matches, 20);
    }
}
