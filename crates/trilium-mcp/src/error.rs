//! Error types for the MCP server with protocol error-code mapping.

use rmcp::ErrorData;
use serde_json::json;
use thiserror::Error;

/// Errors that can occur while serving a tool call.
#[derive(Debug, Error)]
pub enum McpError {
    /// A core operation failed (validation, compilation, upstream, ...).
    #[error(transparent)]
    Core(#[from] trilium_core::Error),

    /// JSON serialization of a tool result failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol-level failure (transport setup, shutdown).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl McpError {
    /// Build the data payload attached to the wire error, when the error
    /// kind carries structure worth machine-reading.
    fn data(&self) -> Option<serde_json::Value> {
        match self {
            Self::Core(trilium_core::Error::Conflict { expected, actual }) => Some(json!({
                "expectedHash": expected,
                "actualHash": actual,
                "recovery": "re-fetch the note and retry with the current hash",
            })),
            Self::Core(trilium_core::Error::Upstream { status, .. }) => {
                Some(json!({ "upstreamStatus": status }))
            },
            _ => None,
        }
    }
}

impl From<McpError> for ErrorData {
    fn from(err: McpError) -> Self {
        let data = err.data();
        let message = err.to_string();
        match &err {
            McpError::Core(core) => match core.category() {
                "validation" | "compile" | "content_shape" | "not_found" => {
                    Self::invalid_params(message, data)
                },
                "permission" | "conflict" => Self::invalid_request(message, data),
                _ => Self::internal_error(message, data),
            },
            McpError::Json(_) | McpError::Protocol(_) => Self::internal_error(message, data),
        }
    }
}

/// Result type alias for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    fn code_of(err: McpError) -> ErrorCode {
        ErrorData::from(err).code
    }

    #[test]
    fn validation_and_compile_map_to_invalid_params() {
        assert_eq!(
            code_of(trilium_core::Error::Validation("limit must be >= 1".into()).into()),
            ErrorCode::INVALID_PARAMS
        );
        assert_eq!(
            code_of(trilium_core::Error::Compile("empty query".into()).into()),
            ErrorCode::INVALID_PARAMS
        );
        assert_eq!(
            code_of(
                trilium_core::Error::ContentShape {
                    kind: trilium_core::NoteKind::Code,
                    message: "HTML found".into(),
                }
                .into()
            ),
            ErrorCode::INVALID_PARAMS
        );
    }

    #[test]
    fn permission_and_conflict_map_to_invalid_request() {
        assert_eq!(
            code_of(trilium_core::Error::PermissionDenied("WRITE".into()).into()),
            ErrorCode::INVALID_REQUEST
        );

        let conflict: McpError = trilium_core::Error::Conflict {
            expected: "H1".into(),
            actual: "H2".into(),
        }
        .into();
        let wire = ErrorData::from(conflict);
        assert_eq!(wire.code, ErrorCode::INVALID_REQUEST);
        let data = wire.data.unwrap();
        assert_eq!(data["expectedHash"], "H1");
        assert_eq!(data["actualHash"], "H2");
    }

    #[test]
    fn upstream_failures_map_to_internal_with_status() {
        let err: McpError = trilium_core::Error::Upstream {
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        let wire = ErrorData::from(err);
        assert_eq!(wire.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(wire.data.unwrap()["upstreamStatus"], 502);
    }

    #[test]
    fn messages_survive_the_mapping() {
        let err: McpError = trilium_core::Error::Validation("title must not be empty".into()).into();
        let wire = ErrorData::from(err);
        assert!(wire.message.contains("title must not be empty"));
    }
}
