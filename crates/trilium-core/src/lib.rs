//! # trilium-core
//!
//! Core functionality for the Trilium MCP adapter: translating structured
//! search criteria into the upstream's search DSL, classifying and preparing
//! note content for the write paths, and wrapping the upstream's external
//! HTTP API (ETAPI) behind a typed client.
//!
//! This crate has no protocol awareness; the MCP surface lives in
//! `trilium-mcp` and composes the pieces here.
//!
//! ## Architecture
//!
//! - **Configuration**: immutable process settings loaded from the
//!   environment, including the capability set gating tools
//! - **Query compilation**: pure [`query::compile`] from a
//!   [`SearchRequest`] to a DSL string plus fast-path eligibility
//! - **Content preparation**: [`content::prepare_content`] enforcing the
//!   per-kind content shape and converting Markdown where appropriate
//! - **Upstream client**: [`EtapiClient`] with typed errors and the opaque
//!   `blobId` token used for optimistic concurrency
//!
//! ## Error handling
//!
//! All operations return [`Result<T, Error>`](Result) with structured error
//! kinds; `Error::category()` drives the protocol-level error code mapping.

/// Immutable process configuration and the capability set.
pub mod config;
/// Content classification and per-kind shape enforcement.
pub mod content;
/// Error types and result alias.
pub mod error;
/// Typed HTTP client for the upstream ETAPI.
pub mod etapi;
/// Structured-criteria to search-DSL compiler.
pub mod query;
/// Core data types shared across modules.
pub mod types;

pub use config::{Config, Permission, PermissionSet};
pub use content::prepare_content;
pub use error::{Error, Result};
pub use etapi::{AppInfo, CreateNoteRequest, EtapiClient, NotePatch};
pub use query::{compile, CompiledQuery};
pub use types::{
    Attribute, AttributeKind, CriterionKind, CriterionOp, JoinLogic, NoteKind, NoteMeta,
    SearchCriterion, SearchRequest,
};
