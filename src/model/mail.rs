//! Message, MIME part and extracted body types.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use crate::parser::header::parse_date;

/// A single message read from a mailbox.
///
/// Header values are kept as found (after unfolding and RFC 2047 decoding);
/// nothing here is normalized for threading.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// The `Message-ID` header value (may be empty).
    pub message_id: String,

    /// The `In-Reply-To` header value, if present.
    pub in_reply_to: Option<String>,

    /// The raw `References` header value, if present. Never split.
    pub references: Option<String>,

    /// Sender (first `From:` header).
    pub from: EmailAddress,

    /// Recipients (`To:`).
    pub to: Vec<EmailAddress>,

    /// Decoded subject line.
    pub subject: Option<String>,

    /// The `Date:` header as written. Not guaranteed to be parseable.
    pub date: Option<String>,

    /// Gmail labels from the `X-Gmail-Labels` header.
    pub labels: Option<String>,

    /// Sequential index within the mailbox (0, 1, 2, …).
    pub sequence: u64,

    /// Root of the MIME tree. For single-part messages this is the only leaf.
    pub root: Part,
}

impl Message {
    /// Parse the `Date:` header, if any.
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        self.date.as_deref().and_then(parse_date)
    }

    /// The date string with an empty-string fallback, as used for ordering.
    pub fn date_or_empty(&self) -> &str {
        self.date.as_deref().map(str::trim).unwrap_or("")
    }
}

/// `Content-Disposition` of a part.
#[derive(Debug, Clone, PartialEq)]
pub struct Disposition {
    /// Disposition type, lowercased (`attachment`, `inline`).
    pub kind: String,
    /// Filename from the disposition or the content-type `name` parameter.
    pub filename: Option<String>,
}

impl Disposition {
    /// An `attachment` disposition with the given filename.
    pub fn attachment(filename: impl Into<String>) -> Self {
        Self {
            kind: "attachment".to_string(),
            filename: Some(filename.into()),
        }
    }

    pub fn is_attachment(&self) -> bool {
        self.kind == "attachment"
    }
}

/// A node of a message's MIME tree.
#[derive(Debug, Clone, Default)]
pub struct Part {
    /// Lowercased `type/subtype`.
    pub content_type: String,
    /// Declared charset label (`utf-8`, `iso-8859-1`, …).
    pub charset: Option<String>,
    pub disposition: Option<Disposition>,
    /// Transfer-decoded payload. Empty for containers.
    pub payload: Vec<u8>,
    /// Child parts: multipart members, or the embedded message root of a
    /// `message/rfc822` part.
    pub children: Vec<Part>,
}

impl Part {
    /// A leaf part holding `payload`.
    pub fn leaf(content_type: &str, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.to_ascii_lowercase(),
            payload: payload.into(),
            ..Self::default()
        }
    }

    /// A container part (`multipart/*` or `message/rfc822`).
    pub fn container(content_type: &str, children: Vec<Part>) -> Self {
        Self {
            content_type: content_type.to_ascii_lowercase(),
            children,
            ..Self::default()
        }
    }

    pub fn with_charset(mut self, charset: &str) -> Self {
        self.charset = Some(charset.to_string());
        self
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = Some(disposition);
        self
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type.starts_with("multipart/")
    }

    pub fn is_attachment(&self) -> bool {
        self.disposition
            .as_ref()
            .is_some_and(Disposition::is_attachment)
    }
}

/// Best-effort textual body of a message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedBody {
    /// First `text/html` part in depth-first order.
    pub html: Option<String>,
    /// All `text/plain` parts joined with line breaks.
    pub plain: String,
}

impl ExtractedBody {
    /// `true` when neither an HTML nor a non-blank plain body was found.
    pub fn is_empty(&self) -> bool {
        self.html.as_deref().is_none_or(|h| h.trim().is_empty()) && self.plain.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_builders() {
        let part = Part::leaf("Text/Plain", "hi").with_charset("utf-8");
        assert_eq!(part.content_type, "text/plain");
        assert_eq!(part.charset.as_deref(), Some("utf-8"));
        assert!(!part.is_multipart());

        let mixed = Part::container("multipart/mixed", vec![part]);
        assert!(mixed.is_multipart());
        assert_eq!(mixed.children.len(), 1);
    }

    #[test]
    fn test_attachment_flag() {
        let part = Part::leaf("application/pdf", vec![1, 2, 3])
            .with_disposition(Disposition::attachment("report.pdf"));
        assert!(part.is_attachment());
        assert!(!Part::leaf("text/plain", "x").is_attachment());
    }

    #[test]
    fn test_date_or_empty() {
        let mut msg = Message::default();
        assert_eq!(msg.date_or_empty(), "");
        msg.date = Some(" 2024-01-01 ".to_string());
        assert_eq!(msg.date_or_empty(), "2024-01-01");
    }

    #[test]
    fn test_extracted_body_is_empty() {
        assert!(ExtractedBody::default().is_empty());
        let body = ExtractedBody {
            html: Some("  ".into()),
            plain: "\n".into(),
        };
        assert!(body.is_empty());
        let body = ExtractedBody {
            html: None,
            plain: "hello".into(),
        };
        assert!(!body.is_empty());
    }
}
