//! Content classification and preparation for the write paths.
//!
//! Each note kind expects a particular content shape upstream: rich-text
//! notes store HTML, code and mermaid notes store plain text, render and
//! web-view notes store HTML or nothing. This module decides whether a raw
//! blob is HTML, Markdown, or plain text, converts Markdown to HTML where
//! the kind calls for it, and rejects bodies that do not fit the kind.
//!
//! The heuristics are approximate by design and biased towards false
//! negatives on Markdown detection: silently passing a Markdown-looking
//! string through is harmless, converting a non-Markdown string corrupts it.

use once_cell::sync::Lazy;
use pulldown_cmark::{Options, Parser};
use regex::Regex;

use crate::types::NoteKind;
use crate::{Error, Result};

static OPEN_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<[a-zA-Z][a-zA-Z0-9-]*(\s[^<>]*)?>").expect("static regex")
});
static CLOSE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</[a-zA-Z][a-zA-Z0-9-]*\s*>").expect("static regex"));
static SELF_CLOSING_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<[a-zA-Z][a-zA-Z0-9-]*(\s[^<>]*)?/>").expect("static regex")
});
static HTML_ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&([a-zA-Z][a-zA-Z0-9]{1,30}|#[0-9]{1,7}|#x[0-9a-fA-F]{1,6});")
        .expect("static regex")
});

static MD_ATX_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+\S").expect("static regex"));
static MD_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(```|~~~)").expect("static regex"));
static MD_INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`[^`\n]+`").expect("static regex"));
static MD_EMPHASIS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*[^*\n]+\*\*|\*[^*\s][^*\n]*\*|__[^_\n]+__|\b_[^_\s][^_\n]*_\b")
        .expect("static regex")
});
static MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]\n]+\]\([^)\n]+\)").expect("static regex"));
static MD_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[-*+]\s+\S").expect("static regex"));
static MD_BLOCKQUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*>\s").expect("static regex"));
static MD_HRULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(-{3,}|\*{3,}|_{3,})\s*$").expect("static regex"));

/// Whether the blob carries an HTML signal: a matched open/close tag pair, a
/// self-closing tag, or an entity reference.
#[must_use]
pub fn has_html_markup(content: &str) -> bool {
    (OPEN_TAG.is_match(content) && CLOSE_TAG.is_match(content))
        || SELF_CLOSING_TAG.is_match(content)
        || HTML_ENTITY.is_match(content)
}

/// Whether the blob looks like Markdown.
///
/// Requires at least one Markdown construct and the absence of any HTML
/// signal; a blob that shows both is treated as HTML so conversion never
/// runs over markup.
#[must_use]
pub fn looks_like_markdown(content: &str) -> bool {
    if has_html_markup(content) {
        return false;
    }
    MD_ATX_HEADER.is_match(content)
        || MD_FENCE.is_match(content)
        || MD_INLINE_CODE.is_match(content)
        || MD_EMPHASIS.is_match(content)
        || MD_LINK.is_match(content)
        || MD_BULLET.is_match(content)
        || MD_BLOCKQUOTE.is_match(content)
        || MD_HRULE.is_match(content)
}

/// Convert Markdown to HTML, or `None` when the rendering came out empty.
fn markdown_to_html(markdown: &str) -> Option<String> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut html = String::with_capacity(markdown.len() + markdown.len() / 2);
    pulldown_cmark::html::push_html(&mut html, parser);

    let html = html.trim().to_string();
    if html.is_empty() { None } else { Some(html) }
}

/// Wrap plain text in a paragraph, escaping markup-significant characters.
fn wrap_paragraph(content: &str) -> String {
    format!("<p>{}</p>", html_escape::encode_text(content.trim()))
}

/// Prepare a content blob for the upstream, enforcing the shape the note
/// kind requires.
///
/// | Kind | Required shape |
/// |---|---|
/// | text | HTML; Markdown is converted, bare text is wrapped in `<p>` |
/// | code, mermaid | plain text; HTML markup is rejected |
/// | render, webView | HTML, or empty |
/// | book, search, relationMap, noteMap | empty or anything |
///
/// # Errors
///
/// Returns [`Error::ContentShape`] when the body cannot be made admissible
/// for the kind, including the binary kinds that cannot be written through
/// this adapter at all.
pub fn prepare_content(kind: NoteKind, content: &str) -> Result<String> {
    match kind {
        NoteKind::Text => Ok(prepare_text(content)),
        NoteKind::Code | NoteKind::Mermaid => {
            if has_html_markup(content) {
                Err(Error::ContentShape {
                    kind,
                    message: "expected plain text but found HTML markup".to_string(),
                })
            } else {
                Ok(content.to_string())
            }
        },
        NoteKind::Render | NoteKind::WebView => {
            if content.trim().is_empty() {
                Ok(String::new())
            } else if has_html_markup(content) {
                Ok(content.to_string())
            } else {
                Err(Error::ContentShape {
                    kind,
                    message: "expected HTML content (or an empty body)".to_string(),
                })
            }
        },
        NoteKind::Book | NoteKind::Search | NoteKind::RelationMap | NoteKind::NoteMap => {
            Ok(content.to_string())
        },
        NoteKind::File | NoteKind::Image | NoteKind::Canvas => Err(Error::ContentShape {
            kind,
            message: "binary note kinds cannot be written through this adapter".to_string(),
        }),
    }
}

fn prepare_text(content: &str) -> String {
    if content.trim().is_empty() {
        return String::new();
    }
    if looks_like_markdown(content) {
        // Conversion cannot partially fail, but an empty rendering falls
        // back to a wrapped paragraph so the note never loses its body.
        return markdown_to_html(content).unwrap_or_else(|| wrap_paragraph(content));
    }
    if has_html_markup(content) {
        content.to_string()
    } else {
        wrap_paragraph(content)
    }
}
