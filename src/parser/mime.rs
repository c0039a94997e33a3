//! MIME parsing: turns raw message bytes into the crate's [`Message`] / [`Part`] tree.
//!
//! `mail-parser` does the transfer decoding; this module only maps its part
//! arena onto an owned tree carrying the fields document rendering needs.

use mail_parser::{MessageParser, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::model::mail::{Disposition, Message, Part};
use crate::parser::header::parse_header_fields;

/// Maximum depth of the converted part tree (guards against adversarial nesting).
const MAX_PART_DEPTH: usize = 64;

/// Parse one raw message (optionally still carrying its mbox `From ` line).
///
/// Never fails: a message `mail-parser` cannot make sense of becomes a single
/// `text/plain` leaf holding the raw body.
pub fn parse_message(raw_message: &[u8], sequence: u64) -> Message {
    let message_bytes = skip_from_line(raw_message);
    let header_end = find_header_end(message_bytes).unwrap_or(message_bytes.len());
    let fields = parse_header_fields(&message_bytes[..header_end]);

    let root = match MessageParser::default().parse(message_bytes) {
        Some(parsed) => convert_part(&parsed, 0, 0),
        None => {
            warn!(sequence, "MIME structure not parseable, keeping raw body");
            Part::leaf("text/plain", extract_body_fallback(message_bytes))
        }
    };

    Message {
        message_id: fields.message_id,
        in_reply_to: fields.in_reply_to,
        references: fields.references,
        from: fields.from,
        to: fields.to,
        subject: fields.subject,
        date: fields.date,
        labels: fields.labels,
        sequence,
        root,
    }
}

/// Convert part `id` of a parsed message, recursing into multiparts and
/// embedded messages.
fn convert_part(msg: &mail_parser::Message<'_>, id: usize, depth: usize) -> Part {
    let Some(part) = msg.parts.get(id) else {
        return Part::default();
    };
    if depth > MAX_PART_DEPTH {
        warn!(depth, "MIME tree too deep, truncating");
        return Part::default();
    }

    let declared_type = part.content_type().map(|ct| {
        let full = match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        };
        full.to_ascii_lowercase()
    });
    let declared_charset = part
        .content_type()
        .and_then(|ct| ct.attribute("charset"))
        .map(str::to_string);
    let disposition = part.content_disposition().map(|cd| Disposition {
        kind: cd.ctype().to_ascii_lowercase(),
        filename: part.attachment_name().map(str::to_string),
    });
    let content_type = |fallback: &str| declared_type.clone().unwrap_or_else(|| fallback.into());

    let mut converted = match &part.body {
        // mail-parser has already transcoded text bodies to UTF-8.
        PartType::Text(text) => {
            Part::leaf(&content_type("text/plain"), text.as_bytes()).with_charset("utf-8")
        }
        PartType::Html(html) => {
            Part::leaf(&content_type("text/html"), html.as_bytes()).with_charset("utf-8")
        }
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            let mut leaf = Part::leaf(&content_type("application/octet-stream"), bytes.to_vec());
            leaf.charset = declared_charset;
            leaf
        }
        PartType::Message(inner) => Part::container(
            &content_type("message/rfc822"),
            vec![convert_part(inner, 0, depth + 1)],
        ),
        PartType::Multipart(children) => Part::container(
            &content_type("multipart/mixed"),
            children
                .iter()
                .map(|&child| convert_part(msg, child, depth + 1))
                .collect(),
        ),
    };
    converted.disposition = disposition;

    debug!(
        content_type = %converted.content_type,
        children = converted.children.len(),
        "Converted MIME part"
    );
    converted
}

/// Skip the `From ` separator line at the start of MBOX messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    (0..data.len()).find(|&i| data[i..].starts_with(b"\n\n") || data[i..].starts_with(b"\r\n\r\n"))
}

/// Everything after the header block, used when MIME parsing fails.
fn extract_body_fallback(data: &[u8]) -> Vec<u8> {
    match find_header_end(data) {
        Some(pos) if data[pos..].starts_with(b"\r\n\r\n") => data[pos + 4..].to_vec(),
        Some(pos) => data[pos + 2..].to_vec(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        let bare = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(bare), bare);
    }

    #[test]
    fn test_find_header_end() {
        let data = b"From: a@b.com\nSubject: Hi\n\nBody\n";
        assert_eq!(find_header_end(data), Some(25));
        let crlf = b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n";
        assert_eq!(find_header_end(crlf), Some(26));
    }

    #[test]
    fn test_parse_single_part_message() {
        let raw = b"From a@example.com Thu Jan 04 10:00:00 2024\n\
From: Alice <a@example.com>\n\
To: bob@example.com\n\
Subject: Hello\n\
Message-ID: <m1@example.com>\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
Hi Bob\n";
        let msg = parse_message(raw, 3);
        assert_eq!(msg.sequence, 3);
        assert_eq!(msg.message_id, "<m1@example.com>");
        assert_eq!(msg.from.address, "a@example.com");
        assert_eq!(msg.root.content_type, "text/plain");
        assert!(msg.root.children.is_empty());
        assert!(String::from_utf8_lossy(&msg.root.payload).contains("Hi Bob"));
    }

    #[test]
    fn test_parse_multipart_tree() {
        let raw = b"From: a@example.com\n\
Subject: Mixed\n\
MIME-Version: 1.0\n\
Content-Type: multipart/mixed; boundary=\"XX\"\n\
\n\
--XX\n\
Content-Type: multipart/alternative; boundary=\"YY\"\n\
\n\
--YY\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
plain body\n\
--YY\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<p>html body</p>\n\
--YY--\n\
--XX\n\
Content-Type: application/pdf\n\
Content-Disposition: attachment; filename=\"report.pdf\"\n\
Content-Transfer-Encoding: base64\n\
\n\
JVBERi0xLjQ=\n\
--XX--\n";
        let msg = parse_message(raw, 0);
        assert_eq!(msg.root.content_type, "multipart/mixed");
        assert_eq!(msg.root.children.len(), 2);
        let alt = &msg.root.children[0];
        assert_eq!(alt.content_type, "multipart/alternative");
        assert_eq!(alt.children[0].content_type, "text/plain");
        assert_eq!(alt.children[1].content_type, "text/html");
        let pdf = &msg.root.children[1];
        assert!(pdf.is_attachment());
        assert_eq!(
            pdf.disposition.as_ref().and_then(|d| d.filename.as_deref()),
            Some("report.pdf")
        );
        assert_eq!(pdf.payload, b"%PDF-1.4");
    }

    #[test]
    fn test_parse_nested_message() {
        let raw = b"From: a@example.com\n\
Subject: Fwd\n\
MIME-Version: 1.0\n\
Content-Type: multipart/mixed; boundary=\"XX\"\n\
\n\
--XX\n\
Content-Type: text/plain\n\
\n\
see below\n\
--XX\n\
Content-Type: message/rfc822\n\
\n\
From: c@example.com\n\
Subject: Original\n\
Content-Type: text/plain\n\
\n\
original text\n\
--XX--\n";
        let msg = parse_message(raw, 0);
        let nested = &msg.root.children[1];
        assert_eq!(nested.content_type, "message/rfc822");
        assert_eq!(nested.children.len(), 1);
        assert_eq!(nested.children[0].content_type, "text/plain");
    }
}
