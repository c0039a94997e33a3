//! HTML handling: allow-list sanitizing of message bodies.

pub mod sanitize;
pub mod style;
pub mod tokens;

pub use sanitize::sanitize_html;
