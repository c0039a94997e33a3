//! Line wrapping and pagination.
//!
//! [`DocumentWriter`] turns blocks into wrapped lines and hands each line to
//! a [`PageBackend`] together with its row on the current page. Space is
//! checked before every line, so a long paragraph continues on the next
//! page instead of overflowing.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::markup::{Alignment, Block, Span, SpanStyle};
use crate::error::Result;

/// Narrowest text column the writer will wrap to, whatever the indent.
const MIN_TEXT_COLUMNS: usize = 20;

/// Character grid of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    pub columns: usize,
    pub rows: usize,
}

/// One laid-out line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    /// Leading blank columns.
    pub indent: usize,
    pub segments: Vec<Span>,
    pub heading: bool,
}

impl Line {
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// Display width of the text, excluding the indent.
    pub fn width(&self) -> usize {
        self.segments.iter().map(|s| s.text.width()).sum()
    }

    /// Rows the line occupies. Headings take two.
    pub fn height(&self) -> usize {
        if self.heading {
            2
        } else {
            1
        }
    }
}

/// A drawing surface for pages of lines.
pub trait PageBackend {
    fn geometry(&self) -> PageGeometry;

    /// Start a new, empty page.
    fn begin_page(&mut self) -> Result<()>;

    /// Draw `line` at `row` (0-based) of the current page.
    fn write_line(&mut self, row: usize, line: &Line) -> Result<()>;

    /// Serialize the finished document.
    fn finish(self: Box<Self>) -> Result<Vec<u8>>;
}

/// Writes blocks onto pages, paginating as it goes.
pub struct DocumentWriter {
    backend: Box<dyn PageBackend>,
    geometry: PageGeometry,
    indent_columns: usize,
    row: usize,
    pages: usize,
}

impl DocumentWriter {
    pub fn new(backend: Box<dyn PageBackend>, indent_columns: usize) -> Self {
        let mut geometry = backend.geometry();
        geometry.rows = geometry.rows.max(2);
        geometry.columns = geometry.columns.max(MIN_TEXT_COLUMNS);
        Self {
            backend,
            geometry,
            indent_columns,
            row: 0,
            pages: 0,
        }
    }

    /// Pages started so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Write one line of text in `style`.
    pub fn write_text(&mut self, text: &str, style: SpanStyle, indent: usize) -> Result<()> {
        self.write_block(&Block::styled(text, style), indent)
    }

    /// Wrap and write a block, `indent` units in from the block's own indent.
    pub fn write_block(&mut self, block: &Block, indent: usize) -> Result<()> {
        let max_indent = self.geometry.columns.saturating_sub(MIN_TEXT_COLUMNS);
        let indent_cols = ((indent + block.indent) * self.indent_columns).min(max_indent);
        let marker_width = block.marker.as_deref().map_or(0, UnicodeWidthStr::width);
        let width = self
            .geometry
            .columns
            .saturating_sub(indent_cols + marker_width)
            .max(1);

        let wrapped = wrap_spans(&block.spans, width);
        if wrapped.is_empty() {
            self.blank_line()?;
        }
        for (idx, segments) in wrapped.into_iter().enumerate() {
            let mut line = Line {
                indent: indent_cols,
                segments,
                heading: block.heading,
            };
            if block.alignment == Alignment::Center {
                line.indent += width.saturating_sub(line.width()) / 2;
            }
            match (&block.marker, idx) {
                (Some(marker), 0) => line.segments.insert(
                    0,
                    Span {
                        text: marker.clone(),
                        style: SpanStyle::default(),
                    },
                ),
                _ => line.indent += marker_width,
            }
            self.emit(line)?;
        }

        if block.space_after {
            self.blank_line()?;
        }
        Ok(())
    }

    /// An empty line. Dropped at the top of a page and where it would
    /// start a new one.
    pub fn blank_line(&mut self) -> Result<()> {
        if self.row == 0 || self.row >= self.geometry.rows {
            return Ok(());
        }
        self.emit(Line::default())
    }

    fn emit(&mut self, line: Line) -> Result<()> {
        let height = line.height();
        if self.pages == 0 || self.row + height > self.geometry.rows {
            self.new_page()?;
        }
        self.backend.write_line(self.row, &line)?;
        self.row += height;
        Ok(())
    }

    fn new_page(&mut self) -> Result<()> {
        self.backend.begin_page()?;
        self.pages += 1;
        self.row = 0;
        Ok(())
    }

    /// Finish the document and return its bytes. An empty document still
    /// gets one page.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if self.pages == 0 {
            self.new_page()?;
        }
        self.backend.finish()
    }
}

/// Wrap styled spans into lines no wider than `width` display columns.
///
/// Breaks at whitespace; words wider than a line are split. Leading
/// whitespace is kept on the first line only.
pub fn wrap_spans(spans: &[Span], width: usize) -> Vec<Vec<Span>> {
    let width = width.max(1);
    let mut lines: Vec<Vec<Span>> = Vec::new();
    let mut line: Vec<Span> = Vec::new();
    let mut line_width = 0;
    let mut pending_space: Option<(String, SpanStyle)> = None;

    for span in spans {
        for (piece, is_space) in split_words(&span.text) {
            if is_space {
                let (text, _) = pending_space.get_or_insert_with(|| (String::new(), span.style));
                text.push_str(piece);
                continue;
            }

            let word_width = piece.width();
            let space_width = pending_space.as_ref().map_or(0, |(s, _)| s.width());
            let at_start = line.is_empty() && lines.is_empty();

            if line_width + space_width + word_width <= width {
                if let Some((space, style)) = pending_space.take() {
                    if !line.is_empty() || at_start {
                        push_piece(&mut line, &space, style);
                        line_width += space_width;
                    }
                }
                push_piece(&mut line, piece, span.style);
                line_width += word_width;
                continue;
            }

            pending_space = None;
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_width = 0;
            }
            if word_width <= width {
                push_piece(&mut line, piece, span.style);
                line_width = word_width;
                continue;
            }

            // Hard split of an overlong word.
            let mut chunk = String::new();
            let mut chunk_width = 0;
            for c in piece.chars() {
                let cw = c.width().unwrap_or(0);
                if chunk_width + cw > width && !chunk.is_empty() {
                    push_piece(&mut line, &chunk, span.style);
                    lines.push(std::mem::take(&mut line));
                    chunk.clear();
                    chunk_width = 0;
                }
                chunk.push(c);
                chunk_width += cw;
            }
            push_piece(&mut line, &chunk, span.style);
            line_width = chunk_width;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Alternating runs of whitespace and non-whitespace, flagged `true` for whitespace.
fn split_words(text: &str) -> Vec<(&str, bool)> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (idx, c) in text.char_indices() {
        let is_space = c.is_whitespace();
        match current {
            Some(kind) if kind == is_space => {}
            Some(kind) => {
                pieces.push((&text[start..idx], kind));
                start = idx;
                current = Some(is_space);
            }
            None => current = Some(is_space),
        }
    }
    if let Some(kind) = current {
        pieces.push((&text[start..], kind));
    }
    pieces
}

fn push_piece(line: &mut Vec<Span>, text: &str, style: SpanStyle) {
    match line.last_mut() {
        Some(last) if last.style == style => last.text.push_str(text),
        _ => line.push(Span {
            text: text.to_string(),
            style,
        }),
    }
}
