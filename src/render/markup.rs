//! Strict reader for sanitized markup.
//!
//! Accepts only the sanitizer's tag subset, properly nested, and turns it
//! into styled blocks for the layout engine. Anything else is rejected with a
//! [`MarkupError`] so the caller can fall back to another body candidate.

use thiserror::Error;

use crate::html::sanitize::{ALLOWED_TAGS, MAX_NESTING};
use crate::html::style::parse_style;
use crate::html::tokens::{tokenize, Token};

/// Why markup could not be read.
#[derive(Debug, Error, PartialEq)]
pub enum MarkupError {
    #[error("unsupported tag <{0}>")]
    UnknownTag(String),

    #[error("unexpected closing tag </{0}>")]
    UnmatchedEnd(String),

    #[error("tag <{0}> is never closed")]
    Unclosed(String),

    #[error("malformed markup: {0}")]
    Malformed(String),

    #[error("comments are not allowed")]
    Comment,

    #[error("doctype is not allowed")]
    Doctype,

    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
}

/// Inline text attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub sub: bool,
    pub sup: bool,
}

impl SpanStyle {
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    fn merge(self, other: SpanStyle) -> Self {
        Self {
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            underline: self.underline || other.underline,
            strike: self.strike || other.strike,
            sub: self.sub || other.sub,
            sup: self.sup || other.sup,
        }
    }
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
}

/// A paragraph-level unit: wrapped as a whole by the layout engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub spans: Vec<Span>,
    /// Indent units (list nesting).
    pub indent: usize,
    /// List marker printed before the first line, e.g. `"• "` or `"2. "`.
    pub marker: Option<String>,
    pub heading: bool,
    pub alignment: Alignment,
    /// Leave an empty line after this block.
    pub space_after: bool,
}

impl Block {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::styled(text, SpanStyle::default())
    }

    pub fn styled(text: impl Into<String>, style: SpanStyle) -> Self {
        Self {
            spans: vec![Span {
                text: text.into(),
                style,
            }],
            ..Self::default()
        }
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Concatenated text of all spans.
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    fn is_blank(&self) -> bool {
        self.marker.is_none() && self.spans.iter().all(|s| s.text.trim().is_empty())
    }
}

/// An element currently open in the reader.
struct OpenTag {
    name: String,
    style: SpanStyle,
    center: bool,
}

struct ListState {
    ordered: bool,
    next: usize,
}

#[derive(Default)]
struct Reader {
    blocks: Vec<Block>,
    current: Block,
    started: bool,
    pending_space: bool,
    stack: Vec<OpenTag>,
    lists: Vec<ListState>,
}

/// Read sanitized markup into blocks.
pub fn parse_markup(markup: &str) -> Result<Vec<Block>, MarkupError> {
    let mut reader = Reader::default();

    for token in tokenize(markup) {
        match token {
            Token::Text(text) => reader.text(&text),
            Token::StartTag {
                name,
                attrs,
                self_closing,
            } => reader.start(name, &attrs, self_closing)?,
            Token::EndTag { name } => reader.end(&name)?,
            Token::Comment => return Err(MarkupError::Comment),
            Token::Doctype => return Err(MarkupError::Doctype),
            Token::Error(message) => return Err(MarkupError::Malformed(message)),
        }
    }

    if let Some(open) = reader.stack.last() {
        return Err(MarkupError::Unclosed(open.name.clone()));
    }
    reader.flush();

    let mut blocks = reader.blocks;
    while blocks.last().is_some_and(Block::is_blank) {
        blocks.pop();
    }
    Ok(blocks)
}

/// Plain text as blocks, one per line. Never fails.
pub fn plain_blocks(text: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = text.lines().map(Block::plain).collect();
    while blocks.last().is_some_and(Block::is_blank) {
        blocks.pop();
    }
    blocks
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

impl Reader {
    fn style(&self) -> SpanStyle {
        self.stack
            .iter()
            .fold(SpanStyle::default(), |acc, open| acc.merge(open.style))
    }

    /// Fix the current block's layout from the open elements.
    fn begin_block(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.current.indent = self.lists.len();
        self.current.heading = self.stack.iter().any(|open| is_heading(&open.name));
        if self.stack.iter().any(|open| open.center) {
            self.current.alignment = Alignment::Center;
        }
    }

    /// Close the current block if it has content.
    fn flush(&mut self) {
        if self.started && !self.current.is_blank() {
            self.blocks.push(std::mem::take(&mut self.current));
        }
        self.current = Block::default();
        self.started = false;
        self.pending_space = false;
    }

    /// A forced line break: the current block ends even if empty.
    fn line_break(&mut self) {
        self.begin_block();
        self.blocks.push(std::mem::take(&mut self.current));
        self.started = false;
        self.pending_space = false;
    }

    fn text(&mut self, text: &str) {
        let style = self.style();

        let mut collapsed = String::with_capacity(text.len());
        for c in text.chars() {
            if c.is_whitespace() {
                self.pending_space = true;
                continue;
            }
            let has_content =
                !collapsed.is_empty() || self.current.spans.iter().any(|s| !s.text.is_empty());
            if self.pending_space && has_content {
                collapsed.push(' ');
            }
            self.pending_space = false;
            collapsed.push(c);
        }
        if collapsed.is_empty() {
            return;
        }

        self.begin_block();
        match self.current.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&collapsed),
            _ => self.current.spans.push(Span {
                text: collapsed,
                style,
            }),
        }
    }

    fn start(
        &mut self,
        name: String,
        attrs: &[(String, String)],
        self_closing: bool,
    ) -> Result<(), MarkupError> {
        if !ALLOWED_TAGS.contains(&name.as_str()) {
            return Err(MarkupError::UnknownTag(name));
        }
        if name == "br" {
            self.line_break();
            return Ok(());
        }
        if self_closing {
            return Ok(());
        }
        if self.stack.len() >= MAX_NESTING {
            return Err(MarkupError::TooDeep(MAX_NESTING));
        }

        let mut open = OpenTag {
            name,
            style: SpanStyle::default(),
            center: false,
        };
        for (key, value) in parse_style(attr(attrs, "style").unwrap_or("")) {
            let off = value.eq_ignore_ascii_case("normal") || value.eq_ignore_ascii_case("none");
            match key.as_str() {
                "bold" => open.style.bold = !off,
                "italic" => open.style.italic = !off,
                "underline" if value.contains("line-through") => open.style.strike = true,
                "underline" => open.style.underline = !off,
                "alignment" => open.center = value.eq_ignore_ascii_case("center"),
                _ => {}
            }
        }

        match open.name.as_str() {
            "b" => open.style.bold = true,
            "i" => open.style.italic = true,
            "u" | "a" => open.style.underline = true,
            "strike" => open.style.strike = true,
            "sub" => open.style.sub = true,
            "sup" => open.style.sup = true,
            "center" => {
                open.center = true;
                self.flush();
            }
            "p" => self.flush(),
            "ul" | "ol" => {
                self.flush();
                self.lists.push(ListState {
                    ordered: open.name == "ol",
                    next: 1,
                });
            }
            "li" => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(list) if list.ordered => {
                        list.next += 1;
                        format!("{}. ", list.next - 1)
                    }
                    _ => "• ".to_string(),
                };
                self.stack.push(open);
                self.begin_block();
                self.current.marker = Some(marker);
                return Ok(());
            }
            heading if is_heading(heading) => {
                open.style.bold = true;
                self.flush();
            }
            _ => {}
        }
        self.stack.push(open);
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), MarkupError> {
        if name == "br" {
            return Ok(());
        }
        match self.stack.last() {
            Some(open) if open.name == name => {}
            _ => return Err(MarkupError::UnmatchedEnd(name.to_string())),
        }
        self.stack.pop();

        match name {
            "p" => {
                self.flush();
                if let Some(last) = self.blocks.last_mut() {
                    last.space_after = true;
                }
            }
            "ul" | "ol" => {
                self.flush();
                self.lists.pop();
            }
            "li" | "center" => self.flush(),
            heading if is_heading(heading) => {
                self.flush();
                if let Some(last) = self.blocks.last_mut() {
                    last.space_after = true;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}
