//! Conversation threading.
//!
//! Messages are grouped by a flat key: `In-Reply-To` if present, otherwise
//! the raw `References` value, otherwise the message's own `Message-ID`.
//! There is no reply-tree reconstruction and no merging between keys.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::ignore::IgnoreSet;
use crate::model::mail::Message;
use crate::parser::header::parse_date;

/// One conversation: its key and messages ordered oldest first.
#[derive(Debug)]
pub struct Thread {
    pub key: String,
    pub messages: Vec<Message>,
}

/// Threads in the order their key was first seen in the mailbox.
#[derive(Debug, Default)]
pub struct ThreadMap {
    threads: Vec<Thread>,
    index: HashMap<String, usize>,
}

impl ThreadMap {
    /// Append `message` to the thread for `key`, creating it if new.
    fn push(&mut self, key: String, message: Message) {
        match self.index.get(&key) {
            Some(&idx) => self.threads[idx].messages.push(message),
            None => {
                self.index.insert(key.clone(), self.threads.len());
                self.threads.push(Thread {
                    key,
                    messages: vec![message],
                });
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Thread> {
        self.index.get(key).map(|&idx| &self.threads[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter()
    }

    /// Number of threads.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Total messages across all threads.
    pub fn message_count(&self) -> usize {
        self.threads.iter().map(|t| t.messages.len()).sum()
    }
}

impl<'a> IntoIterator for &'a ThreadMap {
    type Item = &'a Thread;
    type IntoIter = std::slice::Iter<'a, Thread>;

    fn into_iter(self) -> Self::IntoIter {
        self.threads.iter()
    }
}

/// The thread key: first non-empty of `in_reply_to`, `references`, `message_id`.
pub fn thread_key(in_reply_to: Option<&str>, references: Option<&str>, message_id: &str) -> String {
    [in_reply_to, references]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(message_id.trim())
        .to_string()
}

/// Ordering key for dates inside a thread.
///
/// Variant order is the sort order: missing, then unparseable (by text),
/// then parseable (chronological).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum DateKey {
    Missing,
    Unparsed(String),
    Parsed(DateTime<Utc>),
}

impl DateKey {
    fn of(raw: &str) -> Self {
        if raw.is_empty() {
            return DateKey::Missing;
        }
        match parse_date(raw) {
            Some(dt) => DateKey::Parsed(dt),
            None => DateKey::Unparsed(raw.to_string()),
        }
    }
}

/// Sort messages oldest first. Stable for equal dates.
pub fn sort_by_date(messages: &mut [Message]) {
    messages.sort_by_cached_key(|m| DateKey::of(m.date_or_empty()));
}

/// Group `messages` (mailbox order) into threads, dropping ignored senders.
///
/// Returns the thread map and the number of messages dropped.
pub fn organize_threads(messages: Vec<Message>, ignore: &IgnoreSet) -> (ThreadMap, usize) {
    let mut map = ThreadMap::default();
    let mut ignored = 0;

    for message in messages {
        if ignore.contains(&message.from.key()) {
            debug!(sequence = message.sequence, from = %message.from.address, "Ignoring sender");
            ignored += 1;
            continue;
        }
        let key = thread_key(
            message.in_reply_to.as_deref(),
            message.references.as_deref(),
            &message.message_id,
        );
        map.push(key, message);
    }

    for thread in &mut map.threads {
        sort_by_date(&mut thread.messages);
    }

    debug!(
        threads = map.len(),
        messages = map.message_count(),
        ignored,
        "Threads organized"
    );
    (map, ignored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::EmailAddress;

    fn msg(id: &str, reply_to: Option<&str>, refs: Option<&str>, date: &str, from: &str) -> Message {
        Message {
            message_id: id.to_string(),
            in_reply_to: reply_to.map(String::from),
            references: refs.map(String::from),
            from: EmailAddress::parse(from),
            date: (!date.is_empty()).then(|| date.to_string()),
            ..Message::default()
        }
    }

    #[test]
    fn test_key_precedence() {
        assert_eq!(thread_key(Some("<a>"), Some("<b>"), "<c>"), "<a>");
        assert_eq!(thread_key(None, Some("<b>"), "<c>"), "<b>");
        assert_eq!(thread_key(Some("  "), Some("<b>"), "<c>"), "<b>");
        assert_eq!(thread_key(Some(""), Some(""), "<c>"), "<c>");
        assert_eq!(thread_key(None, None, ""), "");
    }

    #[test]
    fn test_date_order_empty_first() {
        let mut messages = vec![
            msg("1", None, None, "2024-03-01", "a@x"),
            msg("2", None, None, "", "a@x"),
            msg("3", None, None, "2024-01-01", "a@x"),
        ];
        sort_by_date(&mut messages);
        let dates: Vec<_> = messages.iter().map(|m| m.date_or_empty()).collect();
        assert_eq!(dates, vec!["", "2024-01-01", "2024-03-01"]);
    }

    #[test]
    fn test_date_order_is_chronological_not_lexical() {
        let mut messages = vec![
            msg("1", None, None, "Tue, 2 Jan 2024 09:00:00 +0000", "a@x"),
            msg("2", None, None, "Mon, 30 Dec 2023 09:00:00 +0000", "a@x"),
            msg("3", None, None, "sometime last week", "a@x"),
        ];
        sort_by_date(&mut messages);
        let ids: Vec<_> = messages.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut messages = vec![
            msg("first", None, None, "2024-01-01", "a@x"),
            msg("second", None, None, "2024-01-01", "a@x"),
            msg("none-a", None, None, "", "a@x"),
            msg("none-b", None, None, "", "a@x"),
        ];
        sort_by_date(&mut messages);
        let ids: Vec<_> = messages.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["none-a", "none-b", "first", "second"]);
    }

    #[test]
    fn test_three_message_thread() {
        let messages = vec![
            msg("<m1>", None, None, "2024-01-01", "alice@x.com"),
            msg("<m3>", Some("<m1>"), Some("<m1>"), "2024-01-03", "bob@x.com"),
            msg("<m2>", Some("<m1>"), Some("<m1>"), "2024-01-02", "carol@x.com"),
        ];
        let (map, ignored) = organize_threads(messages, &IgnoreSet::default());
        assert_eq!(ignored, 0);
        // The root keys by its own id, the replies by in-reply-to: same key.
        assert_eq!(map.len(), 1);
        let thread = map.get("<m1>").unwrap();
        let ids: Vec<_> = thread.messages.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["<m1>", "<m2>", "<m3>"]);
    }

    #[test]
    fn test_references_used_verbatim() {
        let messages = vec![
            msg("<x1>", None, Some("<a> <b>"), "", "a@x"),
            msg("<x2>", None, Some("<a> <b> <c>"), "", "a@x"),
            msg("<x3>", None, Some("<a> <b>"), "", "a@x"),
        ];
        let (map, _) = organize_threads(messages, &IgnoreSet::default());
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("<a> <b>").unwrap().messages.len(), 2);
    }

    #[test]
    fn test_ignored_sender_absent() {
        let ignore: IgnoreSet = ["Spam@Example.com"].into_iter().collect();
        let messages = vec![
            msg("<1>", None, None, "", "Friend <friend@example.com>"),
            msg("<2>", Some("<1>"), None, "", "Bulk <SPAM@example.com>"),
            msg("<3>", None, None, "", "spam@example.com"),
        ];
        let (map, ignored) = organize_threads(messages, &ignore);
        assert_eq!(ignored, 2);
        assert_eq!(map.message_count(), 1);
        assert!(map
            .iter()
            .flat_map(|t| &t.messages)
            .all(|m| m.from.key() != "spam@example.com"));
    }

    #[test]
    fn test_iteration_follows_first_encounter() {
        let messages = vec![
            msg("<b>", None, None, "", "a@x"),
            msg("<a>", None, None, "", "a@x"),
            msg("<b2>", Some("<b>"), None, "", "a@x"),
        ];
        let (map, _) = organize_threads(messages, &IgnoreSet::default());
        let keys: Vec<_> = map.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["<b>", "<a>"]);
    }
}
