//! Search tool: structured criteria plus full-text over the upstream DSL.

use schemars::JsonSchema;
use serde::Deserialize;
use trilium_core::{query, EtapiClient, NoteMeta, SearchCriterion, SearchRequest};

use crate::error::McpResult;

/// Parameters for the `search_notes` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchNotesParams {
    /// Full-text token matched against note text.
    #[schemars(description = "Full-text search token; matched across note titles and content")]
    pub text: Option<String>,

    /// Structured criteria joined left-to-right by each item's `logic`.
    #[schemars(
        description = "Structured criteria; each item's 'logic' (AND/OR, default AND) joins it \
                       to the NEXT item and is ignored on the last one"
    )]
    pub search_criteria: Option<Vec<SearchCriterion>>,

    /// Maximum number of results (must be >= 1 when present).
    #[schemars(description = "Maximum number of results to return (minimum 1)")]
    pub limit: Option<u32>,

    /// Whether archived notes appear in the results.
    #[serde(default)]
    #[schemars(description = "Include archived notes in the results (default false)")]
    pub include_archived_notes: bool,
}

/// Handle a `search_notes` call: validate, compile, execute.
#[tracing::instrument(skip(client, params))]
pub async fn handle_search(
    client: &EtapiClient,
    params: SearchNotesParams,
) -> McpResult<Vec<NoteMeta>> {
    if let Some(limit) = params.limit {
        if limit == 0 {
            return Err(trilium_core::Error::Validation(
                "limit: must be at least 1".to_string(),
            )
            .into());
        }
    }

    let request = SearchRequest {
        text: params.text,
        criteria: params.search_criteria.unwrap_or_default(),
        limit: params.limit,
    };
    if request.is_empty() {
        return Err(trilium_core::Error::Validation(
            "at least one of 'text' or 'searchCriteria' is required".to_string(),
        )
        .into());
    }

    let compiled = query::compile(&request)?;
    tracing::debug!(query = %compiled.query, fast = compiled.fast_eligible, "compiled search");

    let results = client
        .search(
            &compiled.query,
            compiled.fast_eligible,
            params.include_archived_notes,
        )
        .await?;
    tracing::debug!(count = results.len(), "search completed");
    Ok(results)
}
