//! Calendar (ICS) to CSV.
//!
//! One row per `VEVENT`. Output is UTF-8 with BOM so spreadsheet programs
//! pick the right encoding.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Result, TakeoutError};

const CSV_HEADER: &str = "Summary,Start,End,Location,Organizer,Description";

/// The fields of one calendar event that end up in the spreadsheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarEvent {
    pub summary: String,
    pub start: String,
    pub end: String,
    pub location: String,
    pub organizer: String,
    pub description: String,
}

/// Parse the events of an ICS document. Components nested inside an event
/// (alarms) are skipped; unknown properties are ignored.
pub fn parse_ics(contents: &str) -> Vec<CalendarEvent> {
    let mut events = Vec::new();
    let mut current: Option<CalendarEvent> = None;
    let mut nested = 0usize;

    for line in unfold_lines(contents) {
        let Some((name, value)) = split_property(&line) else {
            continue;
        };
        match (name.as_str(), value) {
            ("BEGIN", v) if v.eq_ignore_ascii_case("VEVENT") => {
                current = Some(CalendarEvent::default());
                nested = 0;
            }
            ("END", v) if v.eq_ignore_ascii_case("VEVENT") => {
                if let Some(event) = current.take() {
                    events.push(event);
                }
            }
            ("BEGIN", _) if current.is_some() => nested += 1,
            ("END", _) if current.is_some() => nested = nested.saturating_sub(1),
            (_, value) if nested == 0 => {
                if let Some(event) = current.as_mut() {
                    let value = unescape(value);
                    match name.as_str() {
                        "SUMMARY" => event.summary = value,
                        "DTSTART" => event.start = value,
                        "DTEND" => event.end = value,
                        "LOCATION" => event.location = value,
                        "ORGANIZER" => event.organizer = strip_mailto(&value).to_string(),
                        "DESCRIPTION" => event.description = value,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    events
}

/// Join continuation lines (starting with a space or tab) onto the previous line.
fn unfold_lines(contents: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in contents.lines() {
        match (raw.strip_prefix([' ', '\t']), lines.last_mut()) {
            (Some(rest), Some(prev)) => prev.push_str(rest),
            _ => lines.push(raw.to_string()),
        }
    }
    lines
}

/// `NAME;PARAM=x:value` → (`NAME`, `value`). Colons inside quoted
/// parameter values do not end the name.
fn split_property(line: &str) -> Option<(String, &str)> {
    let mut in_quotes = false;
    let colon = line.char_indices().find_map(|(idx, c)| match c {
        '"' => {
            in_quotes = !in_quotes;
            None
        }
        ':' if !in_quotes => Some(idx),
        _ => None,
    })?;
    let head = &line[..colon];
    let name = head.split(';').next().unwrap_or(head).trim().to_ascii_uppercase();
    Some((name, &line[colon + 1..]))
}

/// Undo ICS text escaping: `\n`, `\,`, `\;`, `\\`.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn strip_mailto(value: &str) -> &str {
    match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mailto:") => &value[7..],
        _ => value,
    }
}

/// Escape a value for CSV (RFC 4180).
///
/// Wraps in double quotes if the value contains commas, quotes, or newlines.
fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write `events` as CSV to `path`.
pub fn write_events_csv(events: &[CalendarEvent], path: &Path) -> Result<()> {
    let io_err = |e| TakeoutError::io(path, e);
    let mut file = std::io::BufWriter::new(std::fs::File::create(path).map_err(io_err)?);

    // UTF-8 BOM for Excel
    file.write_all(&[0xEF, 0xBB, 0xBF]).map_err(io_err)?;
    writeln!(file, "{CSV_HEADER}").map_err(io_err)?;
    for event in events {
        let row = [
            &event.summary,
            &event.start,
            &event.end,
            &event.location,
            &event.organizer,
            &event.description,
        ]
        .map(|v| csv_escape(v))
        .join(",");
        writeln!(file, "{row}").map_err(io_err)?;
    }
    file.flush().map_err(io_err)
}

/// Convert one ICS file into `<output_dir>/<ics-stem>.csv`.
///
/// Returns the CSV path and the number of events written.
pub fn convert_calendar(ics: &Path, output_dir: &Path) -> Result<(PathBuf, usize)> {
    if !ics.is_file() {
        return Err(TakeoutError::FileNotFound(ics.to_path_buf()));
    }
    let bytes = std::fs::read(ics).map_err(|e| TakeoutError::io(ics, e))?;
    let events = parse_ics(&String::from_utf8_lossy(&bytes));

    std::fs::create_dir_all(output_dir).map_err(|e| TakeoutError::io(output_dir, e))?;
    let stem = ics
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "calendar".to_string());
    let path = output_dir.join(format!("{stem}.csv"));
    write_events_csv(&events, &path)?;

    info!(path = %path.display(), events = events.len(), "Calendar converted");
    Ok((path, events.len()))
}
