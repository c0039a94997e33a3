//! Paginated document output.
//!
//! Sanitized HTML is read into styled blocks ([`markup`]), laid out into
//! wrapped lines and pages ([`layout`]), and drawn by a page backend
//! ([`text`] or [`pdf`]). [`mail`] arranges messages into documents.

pub mod layout;
pub mod mail;
pub mod markup;
pub mod pdf;
pub mod text;

use std::str::FromStr;

use crate::config::RenderConfig;
use crate::error::{Result, TakeoutError};
use layout::PageBackend;

/// Output document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Pdf,
    #[value(name = "txt", alias = "text")]
    Text,
}

impl OutputFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Text => "txt",
        }
    }

    /// A fresh backend for one document.
    pub fn backend(self, layout: &RenderConfig, title: &str) -> Result<Box<dyn PageBackend>> {
        Ok(match self {
            OutputFormat::Pdf => Box::new(pdf::PdfBackend::new(layout, title)?),
            OutputFormat::Text => Box::new(text::TextBackend::new(layout)),
        })
    }
}

impl FromStr for OutputFormat {
    type Err = TakeoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(OutputFormat::Pdf),
            "txt" | "text" => Ok(OutputFormat::Text),
            other => Err(TakeoutError::Render(format!("unknown output format '{other}'"))),
        }
    }
}
