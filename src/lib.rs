//! `takeoutdoc` — turn personal data exports into readable documents.
//!
//! The core reads MBOX mailboxes, groups messages into conversation threads,
//! extracts a textual body from each MIME tree, sanitizes HTML bodies and
//! renders everything into paginated PDF or text documents. Chat exports and
//! ICS calendars are handled by the small converters in [`convert`].

pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod html;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod threading;
