//! Per-message extraction: textual body and attachments.

pub mod attachment;
pub mod body;
