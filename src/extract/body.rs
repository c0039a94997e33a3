//! Body extraction: reduce a message's part tree to one HTML candidate and
//! the joined plain text.

use tracing::warn;

use crate::model::mail::{ExtractedBody, Message, Part};
use crate::parser::header::decode_charset;

/// Maximum depth of nested `message/rfc822` parts that are followed.
const MAX_DEPTH: usize = 10;

/// Text appended in place of a `message/delivery-status` part.
pub const DELIVERY_STATUS_PLACEHOLDER: &str = "Delivery Status Message - Not extracting content";

/// Line-break token plain-text bodies are normalized to.
pub const LINE_BREAK: &str = "\n";

/// Extract the HTML candidate and plain text of a message.
///
/// The first `text/html` part in depth-first order wins, even if it is empty.
/// All `text/plain` parts, including those of embedded messages, are joined
/// with [`LINE_BREAK`].
pub fn extract_body(message: &Message) -> ExtractedBody {
    let mut acc = Accumulator::default();
    acc.visit(&message.root, 0);
    ExtractedBody {
        html: acc.html,
        plain: acc.plain.join(LINE_BREAK),
    }
}

#[derive(Default)]
struct Accumulator {
    html: Option<String>,
    plain: Vec<String>,
}

impl Accumulator {
    fn visit(&mut self, part: &Part, depth: usize) {
        if part.is_multipart() {
            for child in &part.children {
                self.visit(child, depth);
            }
            return;
        }

        match part.content_type.as_str() {
            "message/delivery-status" => {
                self.plain.push(DELIVERY_STATUS_PLACEHOLDER.to_string());
            }
            "message/rfc822" => {
                if depth >= MAX_DEPTH {
                    warn!(depth, "Nested message too deep, not extracting its body");
                    return;
                }
                // Extract the embedded message on its own, then merge.
                let mut nested = Accumulator::default();
                if let Some(embedded) = part.children.first() {
                    nested.visit(embedded, depth + 1);
                }
                self.plain.extend(nested.plain);
                if self.html.is_none() {
                    self.html = nested.html;
                }
            }
            "text/plain" => self.plain.push(normalize_newlines(&decode_payload(part))),
            "text/html" => {
                if self.html.is_none() {
                    self.html = Some(decode_payload(part));
                }
            }
            _ => {}
        }
    }
}

/// Decode a part's payload with its declared charset, dropping invalid bytes.
pub fn decode_payload(part: &Part) -> String {
    decode_charset(part.charset.as_deref().unwrap_or("utf-8"), &part.payload)
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", LINE_BREAK).replace('\r', LINE_BREAK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mail::Disposition;

    fn message(root: Part) -> Message {
        Message {
            root,
            ..Message::default()
        }
    }

    #[test]
    fn test_plain_only() {
        let msg = message(Part::leaf("text/plain", "line one\r\nline two\rline three"));
        let body = extract_body(&msg);
        assert_eq!(body.html, None);
        assert_eq!(body.plain, "line one\nline two\nline three");
    }

    #[test]
    fn test_alternative_keeps_both() {
        let msg = message(Part::container(
            "multipart/alternative",
            vec![
                Part::leaf("text/plain", "plain"),
                Part::leaf("text/html", "<p>rich</p>"),
            ],
        ));
        let body = extract_body(&msg);
        assert_eq!(body.html.as_deref(), Some("<p>rich</p>"));
        assert_eq!(body.plain, "plain");
    }

    #[test]
    fn test_first_html_wins_even_if_empty() {
        let msg = message(Part::container(
            "multipart/mixed",
            vec![
                Part::leaf("text/html", ""),
                Part::container(
                    "multipart/alternative",
                    vec![Part::leaf("text/html", "<b>second</b>")],
                ),
            ],
        ));
        assert_eq!(extract_body(&msg).html.as_deref(), Some(""));
    }

    #[test]
    fn test_nested_message_merges() {
        let embedded = Part::container(
            "multipart/alternative",
            vec![
                Part::leaf("text/plain", "forwarded text"),
                Part::leaf("text/html", "<i>forwarded</i>"),
            ],
        );
        let msg = message(Part::container(
            "multipart/mixed",
            vec![
                Part::leaf("text/plain", "see below"),
                Part::container("message/rfc822", vec![embedded]),
            ],
        ));
        let body = extract_body(&msg);
        assert_eq!(body.plain, "see below\nforwarded text");
        assert_eq!(body.html.as_deref(), Some("<i>forwarded</i>"));
    }

    #[test]
    fn test_outer_html_beats_nested_html() {
        let msg = message(Part::container(
            "multipart/mixed",
            vec![
                Part::leaf("text/html", "<p>outer</p>"),
                Part::container("message/rfc822", vec![Part::leaf("text/html", "<p>inner</p>")]),
            ],
        ));
        assert_eq!(extract_body(&msg).html.as_deref(), Some("<p>outer</p>"));
    }

    #[test]
    fn test_delivery_status_placeholder() {
        let msg = message(Part::container(
            "multipart/report",
            vec![
                Part::leaf("text/plain", "Delivery failed"),
                Part::leaf("message/delivery-status", vec![0xFF, 0x00, 0xFE]),
            ],
        ));
        let body = extract_body(&msg);
        assert_eq!(
            body.plain,
            format!("Delivery failed\n{DELIVERY_STATUS_PLACEHOLDER}")
        );
    }

    #[test]
    fn test_declared_charset_is_used() {
        let msg = message(Part::leaf("text/plain", b"caf\xE9".to_vec()).with_charset("iso-8859-1"));
        assert_eq!(extract_body(&msg).plain, "café");
    }

    #[test]
    fn test_undecodable_bytes_are_dropped() {
        let msg = message(Part::leaf("text/plain", b"ok\xFF!".to_vec()));
        assert_eq!(extract_body(&msg).plain, "ok!");
    }

    #[test]
    fn test_binary_parts_are_ignored() {
        let msg = message(Part::container(
            "multipart/mixed",
            vec![
                Part::leaf("text/plain", "hello"),
                Part::leaf("image/png", vec![0x89, 0x50])
                    .with_disposition(Disposition::attachment("a.png")),
            ],
        ));
        let body = extract_body(&msg);
        assert_eq!(body.plain, "hello");
        assert!(body.html.is_none());
    }

    #[test]
    fn test_no_text_is_empty() {
        let msg = message(Part::leaf("image/png", vec![1, 2, 3]));
        let body = extract_body(&msg);
        assert!(body.is_empty());
        assert_eq!(body.plain, "");
    }

    #[test]
    fn test_self_nesting_is_bounded() {
        let mut part = Part::leaf("text/plain", "bottom");
        for _ in 0..(MAX_DEPTH + 5) {
            part = Part::container("message/rfc822", vec![part]);
        }
        let body = extract_body(&message(part));
        assert_eq!(body.plain, "");
    }
}
