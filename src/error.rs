//! Centralized error types for takeoutdoc.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the takeoutdoc library.
#[derive(Error, Debug)]
pub enum TakeoutError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified input file or directory does not exist.
    #[error("Input not found: {0}")]
    FileNotFound(PathBuf),

    /// The document backend failed to lay out or write a page.
    #[error("Render error: {0}")]
    Render(String),

    /// A JSON file from a chat export could not be decoded.
    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// No mailbox, chat root or calendar file was given.
    #[error("Nothing to do: no input was given")]
    NothingToDo,
}

/// Convenience alias for `Result<T, TakeoutError>`.
pub type Result<T> = std::result::Result<T, TakeoutError>;

impl TakeoutError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Map an `io::Error` on `path` to `FileNotFound` when the path is missing.
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path)
        } else {
            Self::Io { path, source }
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `TakeoutError::io`).
impl From<std::io::Error> for TakeoutError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
