//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$TAKEOUTDOC_CONFIG` (environment variable)
//! 2. `~/.config/takeoutdoc/config.toml` (Linux/macOS)
//!    `%APPDATA%\takeoutdoc\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mailbox conversion settings.
    pub mail: MailConfig,
    /// Page layout settings.
    pub render: RenderConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Mailbox conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Write one document per message instead of one per mailbox.
    pub split: bool,
    /// Output format: "pdf" or "txt".
    pub format: String,
    /// Save `invite.ics` attachments (skipped by default).
    pub include_calendar_invites: bool,
    /// File with one sender address per line whose messages are dropped.
    pub ignore_list: Option<PathBuf>,
}

/// Page geometry for generated documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// PDF page width in millimetres.
    pub page_width_mm: f32,
    /// PDF page height in millimetres.
    pub page_height_mm: f32,
    /// PDF margin on every side in millimetres.
    pub margin_mm: f32,
    /// Body font size in points.
    pub font_size: f32,
    /// Columns per indent unit (reply position within a thread, list nesting).
    pub indent_columns: usize,
    /// Characters per line for text documents.
    pub text_columns: usize,
    /// Lines per page for text documents.
    pub text_rows: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            split: false,
            format: "pdf".to_string(),
            include_calendar_invites: false,
            ignore_list: None,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            page_width_mm: 210.0, // A4
            page_height_mm: 297.0,
            margin_mm: 15.0,
            font_size: 10.0,
            indent_columns: 4,
            text_columns: 100,
            text_rows: 66,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("TAKEOUTDOC_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("takeoutdoc").join("config.toml"))
}

/// Return the cache directory used for the log file.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("takeoutdoc")
}
