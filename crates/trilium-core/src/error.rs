//! Error types and handling for trilium-core operations.
//!
//! Every failure the adapter can encounter maps onto one variant here, so
//! callers (and the MCP layer above) can route on the error kind instead of
//! string-matching messages.
//!
//! ## Error categories
//!
//! - **Validation / Compile**: the caller's input was rejected before any
//!   upstream traffic happened; recoverable by fixing the input.
//! - **ContentShape**: the supplied body does not match what the note kind
//!   requires; recoverable by reshaping the content.
//! - **Conflict**: the optimistic-concurrency token did not match; the
//!   caller must re-fetch and retry with the current hash.
//! - **Permission**: the capability set loaded at startup does not allow the
//!   operation; not recoverable without a configuration change.
//! - **Upstream / Network / Timeout**: the ETAPI call itself failed.

use thiserror::Error;

use crate::types::NoteKind;

/// The main error type for trilium-core operations.
///
/// All public functions in trilium-core return `Result<T, Error>`. The
/// variants preserve enough structure for the protocol layer to pick the
/// right wire-level error code without re-parsing messages.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is missing or invalid (bad env var, unparsable URL).
    #[error("configuration error: {0}")]
    Config(String),

    /// Tool input failed schema-level validation.
    ///
    /// The message names the offending field and the rule it broke.
    #[error("invalid parameter: {0}")]
    Validation(String),

    /// A search request could not be compiled into the upstream DSL.
    ///
    /// Covers empty requests, unknown note properties, and relation
    /// comparisons without a property access path. Compilation failures are
    /// synchronous and never reach the upstream.
    #[error("query compilation failed: {0}")]
    Compile(String),

    /// The content body is not admissible for the target note kind.
    #[error("content not admissible for '{kind}' notes: {message}")]
    ContentShape {
        /// Note kind the content was checked against.
        kind: NoteKind,
        /// What the kind requires and what was found instead.
        message: String,
    },

    /// The caller's expected content hash no longer matches the upstream.
    ///
    /// The note was modified between the caller's read and this write.
    /// Recovery is always the same: re-fetch the note, take the new hash,
    /// and retry the write.
    #[error(
        "content hash mismatch: expected '{expected}' but the note now has '{actual}'; \
         re-fetch the note and retry with the current hash"
    )]
    Conflict {
        /// Hash the caller presented.
        expected: String,
        /// Hash the upstream currently reports.
        actual: String,
    },

    /// The active capability set does not permit this operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The requested note (or other upstream entity) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The upstream returned a non-success HTTP status.
    ///
    /// The decoded response body is preserved so the caller sees the
    /// upstream's own explanation.
    #[error("upstream error (HTTP {status}): {message}")]
    Upstream {
        /// HTTP status code returned by the upstream.
        status: u16,
        /// Decoded response body, or a placeholder when undecodable.
        message: String,
    },

    /// Network-level failure talking to the upstream.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// An upstream call exceeded its per-call timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Only transport-level failures qualify: a timed-out or refused
    /// connection may succeed on a later attempt. Everything else requires
    /// the caller to change something first (input, content, hash, or
    /// configuration), so blind retries would loop.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Get the error category as a static string identifier.
    ///
    /// Used for structured log fields and for mapping onto protocol error
    /// codes at the MCP boundary.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
            Self::Compile(_) => "compile",
            Self::ContentShape { .. } => "content_shape",
            Self::Conflict { .. } => "conflict",
            Self::PermissionDenied(_) => "permission",
            Self::NotFound(_) => "not_found",
            Self::Upstream { .. } => "upstream",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn conflict_message_cites_both_hashes_and_recovery() {
        let err = Error::Conflict {
            expected: "H1".to_string(),
            actual: "H2".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("H1"));
        assert!(msg.contains("H2"));
        assert!(msg.contains("re-fetch"));
    }

    #[test]
    fn content_shape_message_names_the_kind() {
        let err = Error::ContentShape {
            kind: NoteKind::Code,
            message: "HTML tags are not allowed in code notes".to_string(),
        };
        assert!(err.to_string().contains("code"));
        assert!(err.to_string().contains("HTML tags"));
    }

    #[test]
    fn upstream_message_carries_status_and_body() {
        let err = Error::Upstream {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("maintenance"));
        assert_eq!(err.category(), "upstream");
    }

    #[test]
    fn categories_are_stable() {
        let cases = vec![
            (Error::Config("x".into()), "config"),
            (Error::Validation("x".into()), "validation"),
            (Error::Compile("x".into()), "compile"),
            (
                Error::Conflict {
                    expected: "a".into(),
                    actual: "b".into(),
                },
                "conflict",
            ),
            (Error::PermissionDenied("x".into()), "permission"),
            (Error::NotFound("x".into()), "not_found"),
            (
                Error::Upstream {
                    status: 500,
                    message: "x".into(),
                },
                "upstream",
            ),
            (Error::Timeout("x".into()), "timeout"),
            (Error::Serialization("x".into()), "serialization"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.category(), expected);
        }
    }

    #[test]
    fn only_transport_failures_are_recoverable() {
        assert!(Error::Timeout("slow upstream".into()).is_recoverable());
        assert!(!Error::Validation("bad field".into()).is_recoverable());
        assert!(!Error::Compile("empty query".into()).is_recoverable());
        assert!(
            !Error::Conflict {
                expected: "a".into(),
                actual: "b".into(),
            }
            .is_recoverable()
        );
        assert!(!Error::PermissionDenied("WRITE".into()).is_recoverable());
    }

    #[test]
    fn serde_json_errors_convert_to_serialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.category(), "serialization");
    }

    proptest! {
        #[test]
        fn validation_errors_preserve_arbitrary_messages(msg in r".{0,500}") {
            let err = Error::Validation(msg.clone());
            prop_assert!(err.to_string().contains(&msg));
            prop_assert_eq!(err.category(), "validation");
            prop_assert!(!err.is_recoverable());
        }

        #[test]
        fn compile_errors_preserve_arbitrary_messages(msg in r".{0,500}") {
            let err = Error::Compile(msg.clone());
            prop_assert!(err.to_string().contains(&msg));
            prop_assert_eq!(err.category(), "compile");
        }
    }
}
