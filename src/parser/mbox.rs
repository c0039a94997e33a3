//! Streaming MBOX reader.
//!
//! Reads MBOX files line-by-line through a large buffer and hands each raw
//! message to a callback. Never loads the entire file into memory. Tolerant
//! of malformed input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Result, TakeoutError};
use crate::model::mail::Message;
use crate::parser::mime;

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Default maximum message size in bytes (256 MB).
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Progress is reported every 4 MB.
const PROGRESS_INTERVAL: u64 = 4 * 1024 * 1024;

/// Streaming MBOX parser.
///
/// Tolerates mixed `\n`/`\r\n` line endings, `From ` lines not preceded by a
/// blank line (logged), truncated messages at EOF, binary bytes in bodies and
/// a UTF-8 BOM at the start of the file.
pub struct MboxParser {
    path: PathBuf,
    file_size: u64,
    max_message_size: usize,
}

impl MboxParser {
    /// Create a parser for the given MBOX file.
    ///
    /// Verifies that the file exists and is readable, but does NOT validate
    /// that it is actually an MBOX.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| TakeoutError::open(&path, e))?;
        Ok(Self {
            path,
            file_size: metadata.len(),
            max_message_size: MAX_MESSAGE_SIZE,
        })
    }

    /// Total size of the underlying file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Parse the full MBOX, calling `message_callback` with `(offset, raw_bytes)`
    /// for each message found. The callback returns `false` to stop early.
    ///
    /// Returns the number of messages delivered.
    pub fn parse(
        &self,
        message_callback: &mut dyn FnMut(u64, &[u8]) -> bool,
        progress_callback: Option<&dyn Fn(u64, u64)>,
    ) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| TakeoutError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count: u64 = 0;
        let mut offset: u64 = 0;
        let mut message_start: u64 = 0;
        let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);
        let mut prev_line_was_empty = true;
        let mut truncated = false;
        let mut last_progress: u64 = 0;

        loop {
            line_buf.clear();
            let line_len = reader
                .read_until(b'\n', &mut line_buf)
                .map_err(|e| TakeoutError::io(&self.path, e))? as u64;
            if line_len == 0 {
                break;
            }

            if is_mbox_separator(&line_buf) {
                if !prev_line_was_empty && offset > 0 {
                    warn!(offset, "Found 'From ' separator without preceding blank line");
                }
                if !message_buf.is_empty() {
                    if !message_callback(message_start, &message_buf) {
                        return Ok(count);
                    }
                    count += 1;
                }
                message_start = offset;
                message_buf.clear();
                truncated = false;
                message_buf.extend_from_slice(&line_buf);
            } else if message_buf.len() + line_buf.len() <= self.max_message_size {
                message_buf.extend_from_slice(&line_buf);
            } else if !truncated {
                warn!(
                    offset = message_start,
                    max_size = self.max_message_size,
                    "Message exceeds maximum size, truncating body"
                );
                truncated = true;
            }

            prev_line_was_empty = is_blank_line(&line_buf);
            offset += line_len;

            if let Some(cb) = progress_callback {
                if offset - last_progress >= PROGRESS_INTERVAL {
                    cb(offset, self.file_size);
                    last_progress = offset;
                }
            }
        }

        if !message_buf.is_empty() && message_callback(message_start, &message_buf) {
            count += 1;
        }

        if let Some(cb) = progress_callback {
            cb(self.file_size, self.file_size);
        }

        Ok(count)
    }
}

/// Read every message of an MBOX file into memory, in mailbox order.
///
/// `progress` receives `(bytes_read, file_size)`.
pub fn read_mailbox(path: &Path, progress: Option<&dyn Fn(u64, u64)>) -> Result<Vec<Message>> {
    let parser = MboxParser::new(path)?;
    let mut messages = Vec::new();
    parser.parse(
        &mut |_offset, raw| {
            let sequence = messages.len() as u64;
            messages.push(mime::parse_message(raw, sequence));
            true
        },
        progress,
    )?;
    info!(path = %path.display(), count = messages.len(), "Read mailbox");
    Ok(messages)
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(
            b"From user@example.com Thu Jan 01 00:00:00 2024\n"
        ));
        assert!(!is_mbox_separator(b"from user@example.com\n"));
        assert!(!is_mbox_separator(b">From user@example.com\n"));
        assert!(!is_mbox_separator(b"Subject: From here\n"));
    }

    #[test]
    fn test_is_mbox_separator_with_bom() {
        let mut line = vec![0xEF, 0xBB, 0xBF];
        line.extend_from_slice(b"From user@example.com Thu Jan 01 00:00:00 2024\n");
        assert!(is_mbox_separator(&line));
    }

    #[test]
    fn test_is_blank_line() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    #[test]
    fn test_parse_counts_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.mbox");
        std::fs::write(
            &path,
            "From a@x Thu Jan 01 00:00:00 2024\r\nSubject: one\r\n\r\n>From the start\r\n\r\n\
From b@x Thu Jan 01 00:00:00 2024\nSubject: two\n\nbody",
        )
        .unwrap();

        let parser = MboxParser::new(&path).unwrap();
        let mut offsets = Vec::new();
        let count = parser
            .parse(
                &mut |offset, _raw| {
                    offsets.push(offset);
                    true
                },
                None,
            )
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(offsets[0], 0);
    }

    #[test]
    fn test_read_mailbox_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box.mbox");
        std::fs::write(
            &path,
            "From a@x Thu Jan 01 00:00:00 2024\nMessage-ID: <1@x>\n\none\n\n\
From b@x Thu Jan 01 00:00:00 2024\nMessage-ID: <2@x>\n\ntwo\n",
        )
        .unwrap();
        let messages = read_mailbox(&path, None).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sequence, 1);
        assert_eq!(messages[1].message_id, "<2@x>");
    }

    #[test]
    fn test_missing_file() {
        let err = MboxParser::new("/no/such/file.mbox").err().unwrap();
        assert!(matches!(err, TakeoutError::FileNotFound(_)));
    }

    #[test]
    fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mbox");
        std::fs::write(&path, "").unwrap();
        assert!(read_mailbox(&path, None).unwrap().is_empty());
    }
}
