//! Attachments written to disk.

/// An attachment that was saved next to a per-message document.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedAttachment {
    /// Sanitized filename inside the message's attachment folder.
    pub filename: String,
    /// Decoded size in bytes.
    pub size: u64,
}
