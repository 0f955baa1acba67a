//! Search-criteria to upstream-DSL compiler.
//!
//! Translates a validated [`SearchRequest`] into a query string the upstream
//! search parser accepts, together with a flag saying whether the indexed
//! fast path may be used.
//!
//! The emitted surface:
//!
//! - full-text tokens are bare words,
//! - labels are `#name`, `#!name`, or `#name OP value`,
//! - relations are the same with `~`, and comparisons always go through a
//!   property access path (`~author.title = 'Tolkien'`),
//! - note properties are `note.<path> OP value`,
//! - consecutive OR-joined criteria become one parenthesized group with `OR`
//!   between terms; adjacent groups are joined by whitespace, which the
//!   upstream parser reads as AND.
//!
//! One parser quirk matters more than everything else: an expression that
//! begins with `(` is ambiguous to the upstream and must be prefixed by the
//! expression-separator sign `~`. The prefix is applied unconditionally
//! whenever the first emitted character is a parenthesis.
//!
//! Compilation is pure and synchronous; failures are returned to the caller
//! before any upstream traffic happens.

use chrono::{DateTime, NaiveDate};

use crate::types::{CriterionKind, CriterionOp, JoinLogic, SearchCriterion, SearchRequest};
use crate::{Error, Result};

/// A compiled query string plus fast-path eligibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    /// Query string in the upstream search DSL.
    pub query: String,
    /// Whether the upstream's indexed fast search can serve this request.
    ///
    /// True only for a bare full-text request: no criteria and no limit.
    pub fast_eligible: bool,
}

/// How values of a note property must be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueClass {
    /// Quoted with single quotes.
    Text,
    /// Emitted bare; must parse as a number.
    Number,
    /// Emitted bare; must be the literal `true` or `false`.
    Boolean,
    /// Quoted; must be strict ISO-8601.
    Date,
}

/// Recognized scalar note properties and their value classes.
const SCALAR_PROPERTIES: &[(&str, ValueClass)] = &[
    ("title", ValueClass::Text),
    ("content", ValueClass::Text),
    ("type", ValueClass::Text),
    ("mime", ValueClass::Text),
    ("isArchived", ValueClass::Boolean),
    ("isProtected", ValueClass::Boolean),
    ("dateCreated", ValueClass::Date),
    ("dateModified", ValueClass::Date),
    ("labelCount", ValueClass::Number),
    ("ownedLabelCount", ValueClass::Number),
    ("attributeCount", ValueClass::Number),
    ("relationCount", ValueClass::Number),
    ("parentCount", ValueClass::Number),
    ("childrenCount", ValueClass::Number),
    ("contentSize", ValueClass::Number),
    ("revisionCount", ValueClass::Number),
];

/// Navigation roots usable at the head of a dotted note-property path.
const NAVIGATION_ROOTS: &[&str] = &["parents", "children", "ancestors"];

/// Leaf segments permitted at the end of a navigation path.
const NAVIGATION_LEAVES: &[&str] = &["title", "noteId"];

/// Compile a search request into the upstream DSL.
///
/// # Errors
///
/// Returns [`Error::Compile`] for an empty request, a criterion missing its
/// value, an unrecognized note property, a relation comparison without a
/// property access path, or a date value that is not strict ISO-8601.
pub fn compile(request: &SearchRequest) -> Result<CompiledQuery> {
    if request.is_empty() {
        return Err(Error::Compile(
            "empty query: provide a full-text token or at least one criterion".to_string(),
        ));
    }

    let text = request.text.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let mut parts: Vec<String> = Vec::new();
    if let Some(token) = text {
        parts.push(token.to_string());
    }

    let terms: Vec<String> = request
        .criteria
        .iter()
        .map(render_criterion)
        .collect::<Result<_>>()?;

    for group in group_or_runs(&terms, &request.criteria) {
        parts.push(group);
    }

    if let Some(limit) = request.limit {
        parts.push(format!("limit {limit}"));
    }

    let mut query = parts.join(" ");
    // Upstream parser quirk: a leading parenthesis needs an expression
    // separator sign in front of it.
    if query.starts_with('(') {
        query.insert(0, '~');
    }

    let fast_eligible = text.is_some() && request.criteria.is_empty() && request.limit.is_none();

    Ok(CompiledQuery {
        query,
        fast_eligible,
    })
}

/// Collapse consecutive OR-joined criteria into parenthesized groups.
///
/// `criteria[i].logic` binds term `i` to term `i + 1`; the last item's
/// connector has nothing to bind to and is ignored. Single-term groups are
/// emitted bare, multi-term groups as `(a OR b OR c)`.
fn group_or_runs(terms: &[String], criteria: &[SearchCriterion]) -> Vec<String> {
    let mut groups = Vec::new();
    let mut run: Vec<&str> = Vec::new();

    for (i, term) in terms.iter().enumerate() {
        run.push(term);
        let joins_next = i + 1 < terms.len() && criteria[i].logic == JoinLogic::Or;
        if !joins_next {
            groups.push(if run.len() == 1 {
                run[0].to_string()
            } else {
                format!("({})", run.join(" OR "))
            });
            run.clear();
        }
    }

    groups
}

fn render_criterion(criterion: &SearchCriterion) -> Result<String> {
    match criterion.kind {
        CriterionKind::Fulltext => render_fulltext(criterion),
        CriterionKind::Label => render_attribute(criterion, '#'),
        CriterionKind::Relation => render_relation(criterion),
        CriterionKind::NoteProperty => render_note_property(criterion),
    }
}

fn render_fulltext(criterion: &SearchCriterion) -> Result<String> {
    let token = criterion
        .value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| criterion.property.trim());
    if token.is_empty() {
        return Err(Error::Compile(
            "fulltext criterion carries no token".to_string(),
        ));
    }
    Ok(token.to_string())
}

/// Render a `#label` condition. Also the shared shape for relations once the
/// property path has been validated.
fn render_attribute(criterion: &SearchCriterion, sigil: char) -> Result<String> {
    let name = criterion.property.trim();
    if name.is_empty() {
        return Err(Error::Compile(format!(
            "{} criterion requires a non-empty property name",
            kind_name(criterion.kind)
        )));
    }

    match criterion.op {
        CriterionOp::Exists => Ok(format!("{sigil}{name}")),
        CriterionOp::NotExists => Ok(format!("{sigil}!{name}")),
        op => {
            let value = required_value(criterion)?;
            let rendered = format_attribute_value(value)?;
            Ok(format!("{sigil}{name} {} {rendered}", op_token(op)))
        },
    }
}

fn render_relation(criterion: &SearchCriterion) -> Result<String> {
    // Existence checks work on the bare relation name; every comparison must
    // dereference the target note through a property path, since a relation's
    // own value is a note identifier the DSL cannot compare directly.
    if criterion.op.takes_value() && !criterion.property.trim().contains('.') {
        return Err(Error::Compile(format!(
            "relation '{}' cannot be compared directly; use a property access path such as '{}.title'",
            criterion.property.trim(),
            criterion.property.trim()
        )));
    }
    render_attribute(criterion, '~')
}

fn render_note_property(criterion: &SearchCriterion) -> Result<String> {
    let path = criterion.property.trim();
    let class = note_property_class(path).ok_or_else(|| {
        Error::Compile(format!("unrecognized note property '{path}'"))
    })?;

    match criterion.op {
        CriterionOp::Exists | CriterionOp::NotExists => Err(Error::Compile(format!(
            "existence operators do not apply to note property '{path}'"
        ))),
        op => {
            let value = required_value(criterion)?;
            let rendered = format_value(class, value)?;
            Ok(format!("note.{path} {} {rendered}", op_token(op)))
        },
    }
}

/// Look up the value class of a note property path, or `None` when the path
/// is not part of the recognized surface.
fn note_property_class(path: &str) -> Option<ValueClass> {
    if let Some(&(_, class)) = SCALAR_PROPERTIES.iter().find(|(name, _)| *name == path) {
        return Some(class);
    }

    // Navigation paths: <root>(.parents)?.<leaf> where the optional middle
    // segment is a single fixed-depth repetition.
    let segments: Vec<&str> = path.split('.').collect();
    if !(2..=3).contains(&segments.len()) || !NAVIGATION_ROOTS.contains(&segments[0]) {
        return None;
    }
    let leaf = *segments.last()?;
    if !NAVIGATION_LEAVES.contains(&leaf) {
        return None;
    }
    if segments.len() == 3 && segments[1] != "parents" {
        return None;
    }
    Some(ValueClass::Text)
}

fn required_value(criterion: &SearchCriterion) -> Result<&str> {
    criterion
        .value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            Error::Compile(format!(
                "operator '{}' on '{}' requires a value",
                op_token(criterion.op),
                criterion.property.trim()
            ))
        })
}

const fn op_token(op: CriterionOp) -> &'static str {
    match op {
        CriterionOp::Eq => "=",
        CriterionOp::NotEq => "!=",
        CriterionOp::Gte => ">=",
        CriterionOp::Lte => "<=",
        CriterionOp::Gt => ">",
        CriterionOp::Lt => "<",
        CriterionOp::Contains => "*=*",
        CriterionOp::StartsWith => "=*",
        CriterionOp::EndsWith => "*=",
        CriterionOp::Regex => "%=",
        CriterionOp::Exists => "",
        CriterionOp::NotExists => "!",
    }
}

const fn kind_name(kind: CriterionKind) -> &'static str {
    match kind {
        CriterionKind::Label => "label",
        CriterionKind::Relation => "relation",
        CriterionKind::NoteProperty => "noteProperty",
        CriterionKind::Fulltext => "fulltext",
    }
}

/// Render a label/relation comparison value.
///
/// Attribute values have no declared type upstream, so the class is inferred
/// from the literal: booleans and numbers go bare, everything else is
/// quoted.
fn format_attribute_value(value: &str) -> Result<String> {
    if value == "true" || value == "false" || is_numeric_literal(value) {
        return Ok(value.to_string());
    }
    quote(value)
}

fn format_value(class: ValueClass, value: &str) -> Result<String> {
    match class {
        ValueClass::Text => quote(value),
        ValueClass::Date => {
            if !is_strict_iso_date(value) {
                return Err(Error::Compile(format!(
                    "date value '{value}' is not strict ISO-8601 \
                     (expected YYYY-MM-DD or a full timestamp with timezone)"
                )));
            }
            quote(value)
        },
        ValueClass::Number => {
            if !is_numeric_literal(value) {
                return Err(Error::Compile(format!(
                    "numeric property comparison requires a number, got '{value}'"
                )));
            }
            Ok(value.to_string())
        },
        ValueClass::Boolean => {
            if value != "true" && value != "false" {
                return Err(Error::Compile(format!(
                    "boolean property comparison requires 'true' or 'false', got '{value}'"
                )));
            }
            Ok(value.to_string())
        },
    }
}

/// Quote a value with single quotes.
///
/// The upstream DSL has no escape syntax, so a value containing a single
/// quote cannot be represented and is rejected rather than emitted broken.
fn quote(value: &str) -> Result<String> {
    if value.contains('\'') {
        return Err(Error::Compile(format!(
            "value '{value}' contains a single quote, which the search syntax cannot express"
        )));
    }
    Ok(format!("'{value}'"))
}

fn is_numeric_literal(value: &str) -> bool {
    !value.is_empty() && value.parse::<f64>().is_ok()
}

/// Strict ISO-8601 check: a plain calendar date or a full RFC 3339 timestamp
/// with timezone. Relative forms like `TODAY-7` are deliberately rejected.
fn is_strict_iso_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
}
