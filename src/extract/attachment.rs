//! Save a message's attachments into a folder.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, TakeoutError};
use crate::model::attachment::SavedAttachment;
use crate::model::mail::{Message, Part};

/// Calendar invitations Gmail attaches to meeting mails.
const CALENDAR_INVITE_NAME: &str = "invite.ics";

/// Characters replaced with `_` in attachment filenames.
const UNSAFE_FILENAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Write every `attachment`-disposition part of `message` into `folder`.
///
/// The folder is created if needed. Returns the attachments actually written,
/// in part order. A part that cannot be written is logged and left out; it
/// never stops the remaining ones. `invite.ics` is skipped unless
/// `include_calendar_invites` is set. Parts sharing a name are written as
/// `name_1.ext`, `name_2.ext`, ...
pub fn extract_attachments(
    message: &Message,
    folder: &Path,
    include_calendar_invites: bool,
) -> Result<Vec<SavedAttachment>> {
    std::fs::create_dir_all(folder).map_err(|e| TakeoutError::io(folder, e))?;

    let mut parts = Vec::new();
    collect_attachments(&message.root, &mut parts);

    let mut saved = Vec::with_capacity(parts.len());
    let mut taken = HashSet::new();
    for (idx, part) in parts.into_iter().enumerate() {
        let raw_name = part
            .disposition
            .as_ref()
            .and_then(|d| d.filename.as_deref())
            .filter(|name| !name.trim().is_empty());
        let filename = match raw_name {
            Some(name) => sanitize_filename(name),
            None => format!("attachment_{idx}"),
        };

        if filename == CALENDAR_INVITE_NAME && !include_calendar_invites {
            debug!(sequence = message.sequence, "Skipping calendar invite");
            continue;
        }

        let filename = unique_name(&filename, &taken);
        taken.insert(filename.clone());
        let path = folder.join(&filename);
        match std::fs::write(&path, &part.payload) {
            Ok(()) => saved.push(SavedAttachment {
                filename,
                size: part.payload.len() as u64,
            }),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "Failed to save attachment"
            ),
        }
    }

    Ok(saved)
}

/// Depth-first list of descendant parts with an `attachment` disposition.
fn collect_attachments<'a>(part: &'a Part, out: &mut Vec<&'a Part>) {
    if part.is_attachment() {
        out.push(part);
    }
    for child in &part.children {
        collect_attachments(child, out);
    }
}

/// `filename`, or the first `{stem}_{n}.{ext}` not in `taken`.
fn unique_name(filename: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(filename) {
        return filename.to_string();
    }

    let path = Path::new(filename);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    (1..)
        .map(|i| {
            if ext.is_empty() {
                format!("{stem}_{i}")
            } else {
                format!("{stem}_{i}.{ext}")
            }
        })
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| filename.to_string())
}

/// Replace path separators, `: * ? " < > |` and control characters with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if UNSAFE_FILENAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mail::Disposition;

    fn message_with(parts: Vec<Part>) -> Message {
        Message {
            root: Part::container("multipart/mixed", parts),
            ..Message::default()
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b:c*d"), "a_b_c_d");
        assert_eq!(sanitize_filename("x\\y?\"z\"<>|"), "x_y__z____");
        assert_eq!(sanitize_filename("tab\there\nnew"), "tab_here_new");
        assert_eq!(sanitize_filename("résumé 2024.pdf"), "résumé 2024.pdf");
    }

    #[test]
    fn test_extracts_nested_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let msg = message_with(vec![
            Part::leaf("text/plain", "body"),
            Part::container(
                "multipart/related",
                vec![Part::leaf("image/png", vec![1, 2, 3])
                    .with_disposition(Disposition::attachment("pic.png"))],
            ),
            Part::leaf("application/pdf", b"%PDF".to_vec())
                .with_disposition(Disposition::attachment("../etc/passwd")),
        ]);

        let saved = extract_attachments(&msg, dir.path(), false).unwrap();
        let names: Vec<_> = saved.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["pic.png", ".._etc_passwd"]);
        assert_eq!(std::fs::read(dir.path().join("pic.png")).unwrap(), vec![1, 2, 3]);
        assert_eq!(saved[1].size, 4);
    }

    #[test]
    fn test_invite_toggle() {
        let msg = message_with(vec![
            Part::leaf("text/calendar", "BEGIN:VCALENDAR")
                .with_disposition(Disposition::attachment("invite.ics")),
            Part::leaf("text/plain", "agenda").with_disposition(Disposition::attachment("notes.txt")),
        ]);

        let off = tempfile::tempdir().unwrap();
        let saved = extract_attachments(&msg, off.path(), false).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].filename, "notes.txt");
        assert!(!off.path().join("invite.ics").exists());

        let on = tempfile::tempdir().unwrap();
        let saved = extract_attachments(&msg, on.path(), true).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].filename, "invite.ics");
    }

    #[test]
    fn test_duplicate_names_are_kept_apart() {
        let dir = tempfile::tempdir().unwrap();
        let msg = message_with(vec![
            Part::leaf("application/pdf", vec![1])
                .with_disposition(Disposition::attachment("scan.pdf")),
            Part::leaf("application/pdf", vec![2, 2])
                .with_disposition(Disposition::attachment("scan.pdf")),
            Part::leaf("text/plain", "x").with_disposition(Disposition::attachment("README")),
            Part::leaf("text/plain", "y").with_disposition(Disposition::attachment("README")),
        ]);

        let saved = extract_attachments(&msg, dir.path(), false).unwrap();
        let names: Vec<_> = saved.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["scan.pdf", "scan_1.pdf", "README", "README_1"]);
        assert_eq!(std::fs::read(dir.path().join("scan.pdf")).unwrap(), vec![1]);
        assert_eq!(std::fs::read(dir.path().join("scan_1.pdf")).unwrap(), vec![2, 2]);
        assert_eq!(saved[1].size, 2);
    }

    #[test]
    fn test_rerun_overwrites_instead_of_renaming() {
        let dir = tempfile::tempdir().unwrap();
        let msg = message_with(vec![Part::leaf("application/pdf", vec![7])
            .with_disposition(Disposition::attachment("scan.pdf"))]);
        extract_attachments(&msg, dir.path(), false).unwrap();
        let saved = extract_attachments(&msg, dir.path(), false).unwrap();
        assert_eq!(saved[0].filename, "scan.pdf");
        assert!(!dir.path().join("scan_1.pdf").exists());
    }

    #[test]
    fn test_unnamed_attachment_gets_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut part = Part::leaf("application/octet-stream", vec![0u8; 2]);
        part.disposition = Some(Disposition {
            kind: "attachment".to_string(),
            filename: None,
        });
        let saved = extract_attachments(&message_with(vec![part]), dir.path(), false).unwrap();
        assert_eq!(saved[0].filename, "attachment_0");
    }

    #[test]
    fn test_folder_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("nested").join("att");
        let msg = message_with(vec![Part::leaf("text/plain", "no attachments")]);
        assert!(extract_attachments(&msg, &folder, false).unwrap().is_empty());
        assert!(extract_attachments(&msg, &folder, false).unwrap().is_empty());
        assert!(folder.is_dir());
    }

    #[test]
    fn test_failed_write_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        // A directory with the attachment's name makes the write fail.
        std::fs::create_dir(dir.path().join("blocked.bin")).unwrap();
        let msg = message_with(vec![
            Part::leaf("application/octet-stream", vec![1])
                .with_disposition(Disposition::attachment("blocked.bin")),
            Part::leaf("application/octet-stream", vec![2])
                .with_disposition(Disposition::attachment("fine.bin")),
        ]);
        let saved = extract_attachments(&msg, dir.path(), false).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].filename, "fine.bin");
    }
}
