//! Supplementary converters for the non-mail parts of an export.

pub mod calendar;
pub mod chat;
