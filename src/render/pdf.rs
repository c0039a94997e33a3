//! PDF backend built on `printpdf` with the standard Helvetica faces.

use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerIndex,
    PdfLayerReference, PdfPageIndex,
};
use unicode_width::UnicodeWidthStr;

use super::layout::{Line, PageBackend, PageGeometry};
use super::markup::SpanStyle;
use crate::config::RenderConfig;
use crate::error::{Result, TakeoutError};

/// Points to millimetres.
const PT_TO_MM: f32 = 0.352_778;
/// Line height as a multiple of the font size.
const LINE_SPACING: f32 = 1.35;
/// Average Helvetica glyph advance as a multiple of the font size.
const CHAR_ADVANCE: f32 = 0.5;
const HEADING_SCALE: f32 = 1.4;
const SCRIPT_SCALE: f32 = 0.7;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
    bold_italic: IndirectFontRef,
}

impl Fonts {
    fn pick(&self, style: SpanStyle) -> &IndirectFontRef {
        match (style.bold, style.italic) {
            (true, true) => &self.bold_italic,
            (true, false) => &self.bold,
            (false, true) => &self.italic,
            (false, false) => &self.regular,
        }
    }
}

pub struct PdfBackend {
    doc: PdfDocumentReference,
    fonts: Fonts,
    /// The page `PdfDocument::new` creates, used by the first `begin_page`.
    first_page: Option<(PdfPageIndex, PdfLayerIndex)>,
    layer: Option<PdfLayerReference>,
    width_mm: f32,
    height_mm: f32,
    margin_mm: f32,
    font_size: f32,
}

fn pdf_error(e: printpdf::Error) -> TakeoutError {
    TakeoutError::Render(format!("PDF: {e}"))
}

impl PdfBackend {
    pub fn new(layout: &RenderConfig, title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(
            title,
            Mm(layout.page_width_mm),
            Mm(layout.page_height_mm),
            "Layer 1",
        );
        let fonts = Fonts {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
            bold: doc
                .add_builtin_font(BuiltinFont::HelveticaBold)
                .map_err(pdf_error)?,
            italic: doc
                .add_builtin_font(BuiltinFont::HelveticaOblique)
                .map_err(pdf_error)?,
            bold_italic: doc
                .add_builtin_font(BuiltinFont::HelveticaBoldOblique)
                .map_err(pdf_error)?,
        };
        Ok(Self {
            doc,
            fonts,
            first_page: Some((page, layer)),
            layer: None,
            width_mm: layout.page_width_mm,
            height_mm: layout.page_height_mm,
            margin_mm: layout.margin_mm,
            font_size: layout.font_size.max(4.0),
        })
    }

    fn line_height_mm(&self) -> f32 {
        self.font_size * LINE_SPACING * PT_TO_MM
    }

    fn char_width_mm(&self) -> f32 {
        self.font_size * CHAR_ADVANCE * PT_TO_MM
    }
}

/// Characters the standard fonts cannot show are replaced.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '•' | '–' | '—' => '-',
            '‘' | '’' => '\'',
            '“' | '”' => '"',
            '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => c,
            _ => '?',
        })
        .collect()
}

impl PageBackend for PdfBackend {
    fn geometry(&self) -> PageGeometry {
        let usable_w = (self.width_mm - 2.0 * self.margin_mm).max(0.0);
        let usable_h = (self.height_mm - 2.0 * self.margin_mm).max(0.0);
        PageGeometry {
            columns: (usable_w / self.char_width_mm()) as usize,
            rows: (usable_h / self.line_height_mm()) as usize,
        }
    }

    fn begin_page(&mut self) -> Result<()> {
        let (page, layer) = match self.first_page.take() {
            Some(first) => first,
            None => self
                .doc
                .add_page(Mm(self.width_mm), Mm(self.height_mm), "Layer 1"),
        };
        self.layer = Some(self.doc.get_page(page).get_layer(layer));
        Ok(())
    }

    fn write_line(&mut self, row: usize, line: &Line) -> Result<()> {
        let Some(layer) = self.layer.as_ref() else {
            return Err(TakeoutError::Render("line written before first page".into()));
        };

        let line_h = self.line_height_mm();
        let char_w = self.char_width_mm();
        let baseline = self.height_mm - self.margin_mm - (row + line.height()) as f32 * line_h;
        let mut x = self.margin_mm + line.indent as f32 * char_w;

        for segment in &line.segments {
            let mut size = self.font_size;
            let mut y = baseline;
            if line.heading {
                size *= HEADING_SCALE;
            }
            if segment.style.sub || segment.style.sup {
                size *= SCRIPT_SCALE;
                y += if segment.style.sup { 0.35 } else { -0.2 } * line_h;
            }

            let text = printable(&segment.text);
            layer.use_text(text.as_str(), size, Mm(x), Mm(y), self.fonts.pick(segment.style));
            x += segment.text.width() as f32 * char_w * (size / self.font_size);
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>> {
        self.doc.save_to_bytes().map_err(pdf_error)
    }
}
