//! Allow-list HTML sanitizer.
//!
//! `ammonia` parses the body with html5ever and keeps only the tags and
//! attributes the document renderer supports. Everything else is unwrapped:
//! the tag goes, its content stays. A second pass over its output flattens
//! elements nested deeper than [`MAX_NESTING`] and normalizes line breaks.

use std::borrow::Cow;
use std::collections::HashSet;

use ammonia::{Builder, UrlRelative};
use tracing::trace;

use super::style::translate_style;
use super::tokens::{escape_attr, escape_text, tokenize, Token};

/// Tags kept in the sanitized output.
pub const ALLOWED_TAGS: [&str; 20] = [
    "b", "i", "u", "strike", "sub", "sup", "font", "p", "br", "ul", "ol", "li", "a", "center",
    "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Attributes kept on allowed tags. `style` is translated on the way.
const ALLOWED_ATTRS: [&str; 4] = ["href", "name", "target", "style"];

/// Link schemes kept in `href`.
const URL_SCHEMES: [&str; 5] = ["http", "https", "mailto", "ftp", "tel"];

/// Deepest element nesting in sanitized output.
pub const MAX_NESTING: usize = 64;

/// Sanitize `html` down to the renderer-safe subset.
pub fn sanitize_html(html: &str) -> String {
    let cleaned = cleaner().clean(html).to_string();
    let out = flatten(&cleaned);
    trace!(input = html.len(), output = out.len(), "Sanitized HTML body");
    out
}

fn cleaner() -> Builder<'static> {
    let mut builder = Builder::empty();
    builder
        .tags(ALLOWED_TAGS.into_iter().collect())
        .clean_content_tags(HashSet::new())
        .generic_attributes(ALLOWED_ATTRS.into_iter().collect())
        .url_schemes(URL_SCHEMES.into_iter().collect())
        .url_relative(UrlRelative::PassThrough)
        .link_rel(None)
        .strip_comments(true)
        .attribute_filter(filter_attribute);
    builder
}

fn filter_attribute<'u>(element: &str, attribute: &str, value: &'u str) -> Option<Cow<'u, str>> {
    match attribute {
        _ if element == "br" => None,
        "style" => translate_style(value).map(Cow::Owned),
        _ => Some(Cow::Borrowed(value)),
    }
}

/// Re-serialize well-formed markup, unwrapping elements that would open
/// more than [`MAX_NESTING`] levels deep. Line breaks are written `<br/>`.
fn flatten(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    // One entry per open element: whether it was written.
    let mut open: Vec<bool> = Vec::new();
    let mut depth = 0usize;

    for token in tokenize(markup) {
        match token {
            Token::Text(text) => out.push_str(&escape_text(&text)),
            Token::StartTag { name, .. } if name == "br" => out.push_str("<br/>"),
            Token::StartTag { name, attrs, .. } => {
                let kept = depth < MAX_NESTING;
                open.push(kept);
                if !kept {
                    continue;
                }
                depth += 1;
                out.push('<');
                out.push_str(&name);
                for (key, value) in &attrs {
                    out.push_str(&format!(" {key}=\"{}\"", escape_attr(value)));
                }
                out.push('>');
            }
            Token::EndTag { name } => {
                if open.pop() == Some(true) {
                    depth -= 1;
                    out.push_str(&format!("</{name}>"));
                }
            }
            Token::Comment | Token::Doctype | Token::Error(_) => {}
        }
    }
    out
}
