//! Core data structures for the Trilium ETAPI adapter.
//!
//! This module defines the types shared between the query compiler, the
//! content classifier, the upstream client, and the tool handlers:
//!
//! - **Note model**: [`NoteKind`], [`NoteMeta`], [`Attribute`]
//! - **Search input**: [`SearchRequest`], [`SearchCriterion`] and its
//!   [`CriterionKind`] / [`CriterionOp`] / [`JoinLogic`] discriminants
//!
//! ## Serialization
//!
//! Field names follow the upstream's camelCase JSON. The search-input types
//! additionally derive `JsonSchema` so tool schemas can expose them without
//! a hand-maintained mirror.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Note kinds known to the upstream.
///
/// The first group can be created through this adapter; `file`, `image` and
/// `canvas` only appear in search results (binary upload is not supported
/// over the ETAPI surface this adapter uses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum NoteKind {
    /// Rich-text note; content is HTML.
    Text,
    /// Source code note; content is plain text, `mime` selects the language.
    Code,
    /// Render note referencing a code note.
    Render,
    /// Saved search note.
    Search,
    /// Relation map note.
    RelationMap,
    /// Container (folder-like) note.
    Book,
    /// Note map note.
    NoteMap,
    /// Mermaid diagram note; content is mermaid source text.
    Mermaid,
    /// Embedded web view note.
    WebView,
    /// Binary file attachment note (search results only).
    File,
    /// Image note (search results only).
    Image,
    /// Canvas drawing note (search results only).
    Canvas,
}

impl NoteKind {
    /// Whether notes of this kind can be created through the adapter.
    #[must_use]
    pub const fn is_creatable(self) -> bool {
        !matches!(self, Self::File | Self::Image | Self::Canvas)
    }

    /// The upstream's string form of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
            Self::Render => "render",
            Self::Search => "search",
            Self::RelationMap => "relationMap",
            Self::Book => "book",
            Self::NoteMap => "noteMap",
            Self::Mermaid => "mermaid",
            Self::WebView => "webView",
            Self::File => "file",
            Self::Image => "image",
            Self::Canvas => "canvas",
        }
    }
}

impl std::fmt::Display for NoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attribute owned by a note: either a label or a relation.
///
/// Labels carry an optional string value; relations point at another note by
/// identifier. Attributes are deleted together with their owning note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Upstream identifier; absent on attributes that have not been created yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_id: Option<String>,
    /// Identifier of the owning note; filled in by the upstream on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_id: Option<String>,
    /// Discriminator: `label` or `relation`.
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    /// Attribute name.
    pub name: String,
    /// Label value, or the target note identifier for relations.
    #[serde(default)]
    pub value: String,
    /// Ordering position among the note's attributes.
    #[serde(default = "default_position")]
    pub position: i64,
    /// Whether the attribute is inherited by descendant notes.
    #[serde(default)]
    pub is_inheritable: bool,
}

const fn default_position() -> i64 {
    10
}

/// Discriminator for [`Attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Name with an optional string value.
    Label,
    /// Name with a target-note value.
    Relation,
}

/// Note metadata as returned by the upstream.
///
/// `blob_id` is the opaque content-hash token: it changes exactly when the
/// note's content changes and is the version token for optimistic
/// concurrency on the write paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMeta {
    /// Opaque note identifier. "root" is reserved for the tree origin.
    pub note_id: String,
    /// Note title.
    pub title: String,
    /// Note kind.
    #[serde(rename = "type")]
    pub kind: NoteKind,
    /// MIME subtype; meaningful for code notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Content-hash token; absent on upstreams that omit it from listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<String>,
    /// Whether the note is protected (encrypted) upstream.
    #[serde(default)]
    pub is_protected: bool,
    /// Creation timestamp, ISO-8601 with offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    /// Last modification timestamp, ISO-8601 with offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    /// Attributes owned by this note.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    /// Identifiers of the note's parents.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_note_ids: Vec<String>,
    /// Identifiers of the note's children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_note_ids: Vec<String>,
}

/// How a criterion joins with the next one in the sequence.
///
/// The connector is carried on the left-hand item; the value on the last
/// item of a sequence has nothing to bind to and is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinLogic {
    /// Conjunction with the next criterion (the default).
    #[default]
    And,
    /// Disjunction with the next criterion.
    Or,
}

/// What a criterion's `property` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum CriterionKind {
    /// A user-defined label attribute.
    Label,
    /// A user-defined relation attribute; comparisons need a property path
    /// such as `author.title`.
    Relation,
    /// A built-in note property such as `title` or `dateCreated`.
    NoteProperty,
    /// A bare full-text token at this position in the expression.
    Fulltext,
}

/// Comparison operator of a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum CriterionOp {
    /// Attribute is present; no value.
    #[serde(rename = "exists")]
    Exists,
    /// Attribute is absent; no value.
    #[serde(rename = "not_exists")]
    NotExists,
    /// Equality.
    #[serde(rename = "=")]
    Eq,
    /// Inequality.
    #[serde(rename = "!=")]
    NotEq,
    /// Greater-or-equal.
    #[serde(rename = ">=")]
    Gte,
    /// Less-or-equal.
    #[serde(rename = "<=")]
    Lte,
    /// Strictly greater.
    #[serde(rename = ">")]
    Gt,
    /// Strictly less.
    #[serde(rename = "<")]
    Lt,
    /// Substring match.
    #[serde(rename = "contains")]
    Contains,
    /// Prefix match.
    #[serde(rename = "starts_with")]
    StartsWith,
    /// Suffix match.
    #[serde(rename = "ends_with")]
    EndsWith,
    /// Regular-expression match.
    #[serde(rename = "regex")]
    Regex,
}

impl CriterionOp {
    /// Whether this operator takes a comparison value.
    #[must_use]
    pub const fn takes_value(self) -> bool {
        !matches!(self, Self::Exists | Self::NotExists)
    }
}

/// One clause of a structured search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchCriterion {
    /// Attribute name, note property path, or full-text token.
    pub property: String,
    /// What `property` refers to.
    #[serde(rename = "type")]
    pub kind: CriterionKind,
    /// Comparison operator.
    pub op: CriterionOp,
    /// Comparison value; required unless `op` is existence-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Connector binding this criterion to the next one.
    #[serde(default)]
    pub logic: JoinLogic,
}

/// A full search request: free-text token, structured criteria, result cap.
///
/// At least one of `text` and `criteria` must be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text token emitted ahead of the structured criteria.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Ordered criterion sequence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub criteria: Vec<SearchCriterion>,
    /// Maximum number of results to request from the upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl SearchRequest {
    /// A request carrying only a free-text token.
    #[must_use]
    pub fn fulltext(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Whether the request carries neither text nor criteria.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(|t| t.trim().is_empty()) && self.criteria.is_empty()
    }
}
