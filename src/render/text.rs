//! Paginated plain-text backend.
//!
//! Pages are separated by a form feed. Headings are underlined with a row of
//! dashes, which is why they take two rows.

use super::layout::{Line, PageBackend, PageGeometry};
use crate::config::RenderConfig;
use crate::error::Result;

/// Page separator.
pub const FORM_FEED: char = '\u{0C}';

pub struct TextBackend {
    geometry: PageGeometry,
    pages: Vec<Vec<String>>,
}

impl TextBackend {
    pub fn new(layout: &RenderConfig) -> Self {
        Self {
            geometry: PageGeometry {
                columns: layout.text_columns,
                rows: layout.text_rows,
            },
            pages: Vec::new(),
        }
    }

    fn set_row(&mut self, row: usize, text: String) {
        if let Some(page) = self.pages.last_mut() {
            if page.len() <= row {
                page.resize(row + 1, String::new());
            }
            page[row] = text;
        }
    }

    fn render(&self) -> String {
        self.pages
            .iter()
            .map(|page| {
                page.iter()
                    .map(|line| format!("{}\n", line.trim_end()))
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join(&FORM_FEED.to_string())
    }
}

impl PageBackend for TextBackend {
    fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    fn begin_page(&mut self) -> Result<()> {
        self.pages.push(Vec::new());
        Ok(())
    }

    fn write_line(&mut self, row: usize, line: &Line) -> Result<()> {
        let text = line.text();
        self.set_row(row, format!("{}{text}", " ".repeat(line.indent)));
        if line.heading {
            let rule = "-".repeat(line.width().max(1));
            self.set_row(row + 1, format!("{}{rule}", " ".repeat(line.indent)));
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>> {
        Ok(self.render().into_bytes())
    }
}
