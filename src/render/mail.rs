//! Message documents: the threaded mailbox document and per-message documents.

use humansize::{format_size, BINARY};
use tracing::{debug, warn};

use super::layout::DocumentWriter;
use super::markup::{parse_markup, plain_blocks, Block, MarkupError, SpanStyle};
use crate::error::Result;
use crate::extract::body::extract_body;
use crate::html::sanitize_html;
use crate::model::attachment::SavedAttachment;
use crate::model::mail::{ExtractedBody, Message};
use crate::threading::ThreadMap;

/// Body placeholder in the mailbox document.
pub const NO_CONTENT_MAILBOX: &str = "(No content)";
/// Body placeholder in per-message documents.
pub const NO_CONTENT_MESSAGE: &str = "[No content]";
/// Shown when every body candidate was rejected.
pub const UNRENDERABLE: &str = "[This message could not be rendered]";

pub const NO_DATE: &str = "(No date)";
pub const NO_SUBJECT: &str = "(No subject)";
pub const NO_RECIPIENT: &str = "(No recipient)";
const NO_SENDER: &str = "(Unknown sender)";

/// Maximum characters of the subject used in a file name.
const MAX_SUBJECT_LEN: usize = 100;

/// Characters removed from subjects used in file names.
const UNSAFE_FILENAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

type Candidate<'a> = Box<dyn FnOnce() -> Option<std::result::Result<Vec<Block>, MarkupError>> + 'a>;

/// Blocks for a message body.
///
/// Candidates are tried in order: sanitized HTML, then plain text. The first
/// that is present, accepted by the markup reader and not empty wins. With no
/// textual body at all `empty_placeholder` is used; if candidates existed but
/// none could be read, [`UNRENDERABLE`].
pub fn body_blocks(body: &ExtractedBody, empty_placeholder: &str) -> Vec<Block> {
    let candidates: [(&'static str, Candidate<'_>); 2] = [
        (
            "html",
            Box::new(|| {
                body.html
                    .as_deref()
                    .filter(|html| !html.trim().is_empty())
                    .map(|html| parse_markup(&sanitize_html(html)))
            }),
        ),
        (
            "plain",
            Box::new(|| {
                (!body.plain.trim().is_empty())
                    .then(|| Ok::<_, MarkupError>(plain_blocks(&body.plain)))
            }),
        ),
    ];
    first_renderable(candidates, empty_placeholder)
}

/// Blocks of the first candidate that produces any, or a placeholder.
fn first_renderable<'a>(
    candidates: impl IntoIterator<Item = (&'static str, Candidate<'a>)>,
    empty_placeholder: &str,
) -> Vec<Block> {
    let mut rejected = false;
    for (name, produce) in candidates {
        match produce() {
            Some(Ok(blocks)) if !blocks.is_empty() => return blocks,
            Some(Ok(_)) => debug!(candidate = name, "Body candidate is empty"),
            Some(Err(e)) => {
                warn!(candidate = name, error = %e, "Body candidate could not be rendered");
                rejected = true;
            }
            None => {}
        }
    }

    let fallback = if rejected { UNRENDERABLE } else { empty_placeholder };
    vec![Block::plain(fallback)]
}

fn sender(message: &Message) -> String {
    if message.from.address.is_empty() && message.from.display_name.is_empty() {
        NO_SENDER.to_string()
    } else {
        message.from.display()
    }
}

fn recipients(message: &Message) -> String {
    if message.to.is_empty() {
        return NO_RECIPIENT.to_string();
    }
    message
        .to
        .iter()
        .map(|a| a.display())
        .collect::<Vec<_>>()
        .join(", ")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Sender, recipients, date, subject and labels, `indent` units in.
fn write_header(writer: &mut DocumentWriter, message: &Message, indent: usize) -> Result<()> {
    writer.write_text(&format!("From: {}", sender(message)), SpanStyle::bold(), indent)?;
    writer.write_text(&format!("To: {}", recipients(message)), SpanStyle::default(), indent)?;
    writer.write_text(
        &format!("Date: {}", non_empty(message.date.as_deref()).unwrap_or(NO_DATE)),
        SpanStyle::default(),
        indent,
    )?;
    writer.write_text(
        &format!(
            "Subject: {}",
            non_empty(message.subject.as_deref()).unwrap_or(NO_SUBJECT)
        ),
        SpanStyle::bold(),
        indent,
    )?;
    if let Some(labels) = non_empty(message.labels.as_deref()) {
        writer.write_text(&format!("Labels: {labels}"), SpanStyle::default(), indent)?;
    }
    Ok(())
}

/// Write every thread into one document.
///
/// A message's indent is its position within its thread. Returns the number
/// of messages written; `progress` receives `(done, total)` after each one.
pub fn write_mailbox_document(
    writer: &mut DocumentWriter,
    threads: &ThreadMap,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<usize> {
    let total = threads.message_count() as u64;
    let mut written = 0;

    for thread in threads {
        for (position, message) in thread.messages.iter().enumerate() {
            write_header(writer, message, position)?;
            writer.blank_line()?;
            let body = extract_body(message);
            for block in body_blocks(&body, NO_CONTENT_MAILBOX) {
                writer.write_block(&block, position)?;
            }
            writer.blank_line()?;
            writer.blank_line()?;

            written += 1;
            if let Some(report) = progress {
                report(written as u64, total);
            }
        }
        writer.write_text(&"=".repeat(40), SpanStyle::default(), 0)?;
        writer.blank_line()?;
    }
    Ok(written)
}

/// Write one message as a standalone document.
pub fn write_message_document(
    writer: &mut DocumentWriter,
    message: &Message,
    body: &ExtractedBody,
    attachments: &[SavedAttachment],
) -> Result<()> {
    write_header(writer, message, 0)?;
    writer.write_text(&"-".repeat(72), SpanStyle::default(), 0)?;

    for block in body_blocks(body, NO_CONTENT_MESSAGE) {
        writer.write_block(&block, 0)?;
    }

    if !attachments.is_empty() {
        writer.blank_line()?;
        writer.write_text(
            &format!("Attachments ({}):", attachments.len()),
            SpanStyle::bold(),
            0,
        )?;
        for att in attachments {
            let size = format_size(att.size, BINARY);
            writer.write_text(&format!("- {} ({size})", att.filename), SpanStyle::default(), 1)?;
        }
    }
    Ok(())
}

/// File stem for a per-message document: `0001_2024-01-31_Subject_words`.
pub fn message_file_stem(index: usize, message: &Message) -> String {
    let date = message
        .parsed_date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "NoDate".to_string());
    format!("{index:04}_{date}_{}", subject_slug(message.subject.as_deref()))
}

/// Subject reduced to a file-name component.
fn subject_slug(subject: Option<&str>) -> String {
    let cleaned: String = subject
        .unwrap_or("")
        .chars()
        .filter(|c| !UNSAFE_FILENAME_CHARS.contains(c) && (c.is_whitespace() || !c.is_control()))
        .collect();
    let slug: String = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(MAX_SUBJECT_LEN)
        .collect();

    if slug.is_empty() {
        "NoSubject".to_string()
    } else {
        slug
    }
}
