//! Sender ignore-list.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

/// Sender addresses whose messages are dropped before threading.
///
/// Loaded once per run and never modified afterwards. Addresses are compared
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    addresses: HashSet<String>,
}

impl IgnoreSet {
    /// Load an ignore-list: one address per line, blank lines and `#` comments skipped.
    ///
    /// A missing or unreadable file is not an error; an empty set is returned.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let set = Self::parse(&contents);
                info!(path = %path.display(), count = set.len(), "Loaded ignore list");
                set
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Ignore list not readable, nothing will be filtered"
                );
                Self::default()
            }
        }
    }

    /// Parse ignore-list contents.
    pub fn parse(contents: &str) -> Self {
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(&address.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for IgnoreSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            addresses: iter
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}
