//! Google Chat transcripts.
//!
//! Each folder under `<root>/Groups/` holds a `group_info.json`, a
//! `messages.json` and any files shared in the chat. Every chat becomes
//! `<root>/transcripts/<chat name>.txt`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Result, TakeoutError};
use crate::extract::attachment::sanitize_filename;
use crate::model::ignore::IgnoreSet;

const GROUP_INFO_FILE: &str = "group_info.json";
const MESSAGES_FILE: &str = "messages.json";

/// Name of group chats that were never given one.
const UNNAMED_GROUP: &str = "Group Chat";

#[derive(Debug, Default, Deserialize)]
pub struct GroupInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub members: Vec<Member>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesFile {
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub creator: Option<Member>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub message_state: Option<String>,
    #[serde(default)]
    pub deletion_metadata: Option<DeletionMetadata>,
    #[serde(default)]
    pub attached_files: Option<Vec<AttachedFile>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeletionMetadata {
    #[serde(default)]
    pub deletion_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttachedFile {
    #[serde(default)]
    pub export_name: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
}

/// Counters for one chat export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSummary {
    pub chats_written: usize,
    pub chats_skipped: usize,
    pub messages_written: usize,
    pub messages_ignored: usize,
}

/// Convert every chat under `<root>/Groups/`.
///
/// A chat that cannot be converted is logged and skipped; only a missing
/// `Groups` folder is an error.
pub fn convert_chats(root: &Path, ignore: &IgnoreSet) -> Result<ChatSummary> {
    let groups = root.join("Groups");
    if !groups.is_dir() {
        return Err(TakeoutError::FileNotFound(groups));
    }
    let transcripts = root.join("transcripts");

    let mut folders: Vec<PathBuf> = std::fs::read_dir(&groups)
        .map_err(|e| TakeoutError::io(&groups, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    folders.sort();

    let mut summary = ChatSummary::default();
    for folder in &folders {
        match convert_chat_folder(folder, &transcripts, ignore) {
            Ok(Some((path, written, ignored))) => {
                info!(path = %path.display(), messages = written, "Chat transcript written");
                summary.chats_written += 1;
                summary.messages_written += written;
                summary.messages_ignored += ignored;
            }
            Ok(None) => summary.chats_skipped += 1,
            Err(e) => {
                warn!(folder = %folder.display(), error = %e, "Chat skipped");
                summary.chats_skipped += 1;
            }
        }
    }
    Ok(summary)
}

/// Convert one chat folder. Returns `None` when the folder is not a chat
/// (no `group_info.json`) or has no `messages.json`.
///
/// On success returns the transcript path, the messages written and the
/// messages dropped because their sender is ignored.
pub fn convert_chat_folder(
    folder: &Path,
    transcripts: &Path,
    ignore: &IgnoreSet,
) -> Result<Option<(PathBuf, usize, usize)>> {
    let info_path = folder.join(GROUP_INFO_FILE);
    if !info_path.is_file() {
        warn!(folder = %folder.display(), "No {GROUP_INFO_FILE}, skipping");
        return Ok(None);
    }
    let group: GroupInfo = read_json(&info_path)?;

    let folder_name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = chat_name(&folder_name, &group);

    let messages_path = folder.join(MESSAGES_FILE);
    if !messages_path.is_file() {
        warn!(chat = %name, "No {MESSAGES_FILE}, skipping");
        return Ok(None);
    }
    let messages: MessagesFile = read_json(&messages_path)?;

    let mut shared_files: Vec<String> = std::fs::read_dir(folder)
        .map_err(|e| TakeoutError::io(folder, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|f| f != GROUP_INFO_FILE && f != MESSAGES_FILE)
        .collect();
    shared_files.sort();

    let mut out = String::new();
    out.push_str(&format!("Chat: {name}\n"));
    out.push_str(&format!("{}\n\n", "=".repeat(40)));

    let mut written = 0;
    let mut ignored = 0;
    for message in &messages.messages {
        let creator_email = message.creator.as_ref().and_then(|c| c.email.as_deref());
        if creator_email.is_some_and(|email| ignore.contains(email)) {
            ignored += 1;
            continue;
        }
        out.push_str(&format_message(message));
        out.push('\n');
        written += 1;
    }

    if !shared_files.is_empty() {
        out.push_str("\nAttachments:\n");
        out.push_str(&format!("{}\n", "-".repeat(40)));
        for file in &shared_files {
            out.push_str(&format!("- {file}\n"));
        }
    }

    std::fs::create_dir_all(transcripts).map_err(|e| TakeoutError::io(transcripts, e))?;
    let path = transcripts.join(format!("{}.txt", sanitize_filename(&name)));
    std::fs::write(&path, out).map_err(|e| TakeoutError::io(&path, e))?;
    Ok(Some((path, written, ignored)))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = std::fs::read(path).map_err(|e| TakeoutError::io(path, e))?;
    serde_json::from_slice(&data).map_err(|source| TakeoutError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Display name of a chat.
///
/// Direct messages (`DM …` folders) use the other member's name; spaces
/// (`Space …` folders) use the group name, and an unnamed group gets its
/// members' initials appended. Falls back to the folder name.
pub fn chat_name(folder_name: &str, group: &GroupInfo) -> String {
    let name = if folder_name.starts_with("DM") {
        group
            .members
            .get(1)
            .or(group.members.first())
            .and_then(|m| m.name.clone())
    } else if folder_name.starts_with("Space") {
        let name = group.name.clone().unwrap_or_else(|| folder_name.to_string());
        if name == UNNAMED_GROUP {
            let initials: String = group
                .members
                .iter()
                .filter_map(|m| m.name.as_deref())
                .flat_map(|n| n.split_whitespace().filter_map(|part| part.chars().next()))
                .collect();
            Some(format!("{name} {initials}"))
        } else {
            Some(name)
        }
    } else {
        None
    };

    name.filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| folder_name.to_string())
}

/// One transcript line: `[<date>] <creator>: <text>`.
pub fn format_message(message: &ChatMessage) -> String {
    let creator = message
        .creator
        .as_ref()
        .and_then(|c| c.name.as_deref())
        .unwrap_or("Unknown");
    let timestamp = message.created_date.as_deref().unwrap_or("Unknown time");

    let text = if message.message_state.as_deref() == Some("DELETED") {
        let reason = message
            .deletion_metadata
            .as_ref()
            .and_then(|d| d.deletion_type.as_deref())
            .unwrap_or("Unknown reason");
        format!("[Message deleted by {reason}]")
    } else if let Some(text) = message.text.as_deref().filter(|t| !t.trim().is_empty()) {
        text.to_string()
    } else if let Some(files) = &message.attached_files {
        let names: Vec<&str> = files
            .iter()
            .map(|f| {
                f.export_name
                    .as_deref()
                    .or(f.original_name.as_deref())
                    .unwrap_or("Unknown File")
            })
            .collect();
        format!("Attachment: {}", names.join(", "))
    } else {
        "[No text]".to_string()
    };

    format!("[{timestamp}] {creator}: {text}")
}
