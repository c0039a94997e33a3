//! Mailbox conversion: read, filter, thread, render.

use std::path::Path;

use tracing::{info, warn};

use crate::config::RenderConfig;
use crate::error::{Result, TakeoutError};
use crate::extract::attachment::extract_attachments;
use crate::extract::body::extract_body;
use crate::model::ignore::IgnoreSet;
use crate::model::mail::Message;
use crate::parser::mbox::read_mailbox;
use crate::render::layout::DocumentWriter;
use crate::render::mail::{message_file_stem, write_mailbox_document, write_message_document};
use crate::render::OutputFormat;
use crate::threading::organize_threads;

/// One document per mailbox, or one per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Single,
    PerMessage,
}

/// Everything a mailbox conversion needs besides its inputs.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub mode: OutputMode,
    pub format: OutputFormat,
    pub include_calendar_invites: bool,
    pub layout: RenderConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::Single,
            format: OutputFormat::Pdf,
            include_calendar_invites: false,
            layout: RenderConfig::default(),
        }
    }
}

/// What a progress report counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Bytes of the mailbox file read.
    Reading,
    /// Messages rendered.
    Rendering,
}

/// Counters for one mailbox conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub messages_read: usize,
    pub messages_ignored: usize,
    pub threads: usize,
    pub documents_written: usize,
    pub attachments_written: usize,
    pub failures: usize,
}

/// Convert one mbox file into documents under `output_dir`.
///
/// In [`OutputMode::Single`] the result is `<output_dir>/<mbox-stem>.<ext>`.
/// In [`OutputMode::PerMessage`] every retained message gets its own
/// document plus a `<stem>_attachments/` folder; a message that fails is
/// logged, counted in [`RunSummary::failures`] and skipped.
///
/// `progress` only observes; it never changes what is processed.
pub fn convert_mailbox(
    mbox: &Path,
    output_dir: &Path,
    options: &PipelineOptions,
    ignore: &IgnoreSet,
    progress: Option<&dyn Fn(Phase, u64, u64)>,
) -> Result<RunSummary> {
    if !mbox.is_file() {
        return Err(TakeoutError::FileNotFound(mbox.to_path_buf()));
    }
    std::fs::create_dir_all(output_dir).map_err(|e| TakeoutError::io(output_dir, e))?;

    let report = |phase: Phase, current: u64, total: u64| {
        if let Some(callback) = progress {
            callback(phase, current, total);
        }
    };
    let on_read = |current, total| report(Phase::Reading, current, total);
    let messages = read_mailbox(mbox, Some(&on_read))?;

    let mut summary = RunSummary {
        messages_read: messages.len(),
        ..RunSummary::default()
    };
    let (threads, ignored) = organize_threads(messages, ignore);
    summary.messages_ignored = ignored;
    summary.threads = threads.len();
    info!(
        mbox = %mbox.display(),
        messages = summary.messages_read,
        ignored,
        threads = summary.threads,
        "Mailbox loaded"
    );

    let on_render = |current, total| report(Phase::Rendering, current, total);
    let extension = options.format.extension();

    match options.mode {
        OutputMode::Single => {
            let stem = mbox
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "mailbox".to_string());
            let path = output_dir.join(format!("{stem}.{extension}"));

            let backend = options.format.backend(&options.layout, &stem)?;
            let mut writer = DocumentWriter::new(backend, options.layout.indent_columns);
            write_mailbox_document(&mut writer, &threads, Some(&on_render))?;
            let pages = writer.pages();
            let bytes = writer.finish()?;
            std::fs::write(&path, bytes).map_err(|e| TakeoutError::io(&path, e))?;

            info!(path = %path.display(), pages, "Mailbox document written");
            summary.documents_written = 1;
        }
        OutputMode::PerMessage => {
            let total = threads.message_count() as u64;
            let retained = threads.iter().flat_map(|thread| &thread.messages);
            for (idx, message) in retained.enumerate() {
                let index = idx + 1;
                match write_single_message(index, message, output_dir, options) {
                    Ok(attachments) => {
                        summary.documents_written += 1;
                        summary.attachments_written += attachments;
                    }
                    Err(e) => {
                        warn!(index, sequence = message.sequence, error = %e, "Message skipped");
                        summary.failures += 1;
                    }
                }
                on_render(index as u64, total);
            }
        }
    }

    Ok(summary)
}

/// Write one per-message document and its attachments. Returns the number
/// of attachments saved.
fn write_single_message(
    index: usize,
    message: &Message,
    output_dir: &Path,
    options: &PipelineOptions,
) -> Result<usize> {
    let stem = message_file_stem(index, message);
    let folder = output_dir.join(format!("{stem}_attachments"));
    let attachments = extract_attachments(message, &folder, options.include_calendar_invites)?;

    let body = extract_body(message);
    let backend = options.format.backend(&options.layout, &stem)?;
    let mut writer = DocumentWriter::new(backend, options.layout.indent_columns);
    write_message_document(&mut writer, message, &body, &attachments)?;
    let bytes = writer.finish()?;

    let path = output_dir.join(format!("{stem}.{}", options.format.extension()));
    std::fs::write(&path, bytes).map_err(|e| TakeoutError::io(&path, e))?;
    Ok(attachments.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MBOX: &str = "From a@example.com Mon Jan 1 00:00:00 2024\n\
Message-ID: <m1@example.com>\n\
From: Alice <a@example.com>\n\
To: bob@example.com\n\
Subject: Hello\n\
Date: Mon, 1 Jan 2024 10:00:00 +0000\n\
\n\
Hi Bob\n\
\n\
From spam@example.com Mon Jan 1 00:00:00 2024\n\
Message-ID: <s1@example.com>\n\
From: spam@example.com\n\
Subject: Buy now\n\
\n\
Offer\n\
\n\
From b@example.com Tue Jan 2 00:00:00 2024\n\
Message-ID: <m2@example.com>\n\
In-Reply-To: <m1@example.com>\n\
From: Bob <b@example.com>\n\
To: a@example.com\n\
Subject: Re: Hello\n\
Date: Tue, 2 Jan 2024 10:00:00 +0000\n\
\n\
Hi Alice\n";

    fn text_options(mode: OutputMode) -> PipelineOptions {
        PipelineOptions {
            mode,
            format: OutputFormat::Text,
            ..PipelineOptions::default()
        }
    }

    #[test]
    fn test_missing_mailbox() {
        let dir = tempfile::tempdir().unwrap();
        let err = convert_mailbox(
            &dir.path().join("absent.mbox"),
            dir.path(),
            &text_options(OutputMode::Single),
            &IgnoreSet::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TakeoutError::FileNotFound(_)));
    }

    #[test]
    fn test_single_document() {
        let dir = tempfile::tempdir().unwrap();
        let mbox = dir.path().join("Inbox.mbox");
        std::fs::write(&mbox, MBOX).unwrap();
        let out = dir.path().join("out");

        let ignore: IgnoreSet = ["spam@example.com"].into_iter().collect();
        let summary = convert_mailbox(
            &mbox,
            &out,
            &text_options(OutputMode::Single),
            &ignore,
            None,
        )
        .unwrap();

        assert_eq!(summary.messages_read, 3);
        assert_eq!(summary.messages_ignored, 1);
        assert_eq!(summary.threads, 1);
        assert_eq!(summary.documents_written, 1);

        let doc = std::fs::read_to_string(out.join("Inbox.txt")).unwrap();
        assert!(doc.contains("Subject: Hello"));
        assert!(doc.contains("    Subject: Re: Hello"));
        assert!(!doc.contains("Buy now"));
    }

    #[test]
    fn test_per_message_documents() {
        let dir = tempfile::tempdir().unwrap();
        let mbox = dir.path().join("Inbox.mbox");
        std::fs::write(&mbox, MBOX).unwrap();

        let calls = std::cell::RefCell::new(Vec::new());
        let progress = |phase: Phase, current: u64, total: u64| {
            if phase == Phase::Rendering {
                calls.borrow_mut().push((current, total));
            }
        };
        let ignore: IgnoreSet = ["spam@example.com"].into_iter().collect();
        let summary = convert_mailbox(
            &mbox,
            dir.path(),
            &text_options(OutputMode::PerMessage),
            &ignore,
            Some(&progress),
        )
        .unwrap();

        assert_eq!(summary.documents_written, 2);
        assert_eq!(summary.failures, 0);
        assert!(dir.path().join("0001_2024-01-01_Hello.txt").is_file());
        assert!(dir.path().join("0002_2024-01-02_Re_Hello.txt").is_file());
        assert!(dir.path().join("0001_2024-01-01_Hello_attachments").is_dir());
        assert_eq!(*calls.borrow(), vec![(1, 2), (2, 2)]);
    }
}
