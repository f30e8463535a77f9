//! Editor configuration
//!
//! All tunables for the grid, the image cache, history and autosave live in
//! [`EditorConfig`]. It serializes to JSON so an embedding application can
//! persist it next to its own settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Image formats accepted by the default path validator
pub const SUPPORTED_IMAGE_FORMATS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "webp", "gif", "tiff"];

/// Upper bound on `rows * cols` for any grid, including recovered ones
pub const MAX_GRID_CELLS: usize = 10_000;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    // ========== Grid ==========
    pub default_rows: usize,
    pub default_cols: usize,
    /// Gap between cells in pixels
    pub default_spacing: u32,

    // ========== Cache ==========
    /// Memory budget for scaled renders, in bytes
    pub cache_budget_bytes: usize,

    // ========== History ==========
    /// Maximum undo depth; oldest entries are dropped beyond this
    pub history_depth: usize,
    /// Idle time after which a live caption edit is committed
    pub caption_commit_idle_ms: u64,

    // ========== Autosave ==========
    pub autosave_interval_secs: u64,
    /// Autosave after this many recorded mutations (0 disables the count trigger)
    pub autosave_every_mutations: u32,
    /// Number of autosave files kept on disk
    pub max_autosave_files: usize,
    pub autosave_write_attempts: u32,
    pub autosave_backoff_ms: u64,
    /// Overrides the platform data directory when set
    pub autosave_dir: Option<PathBuf>,

    // ========== Input ==========
    pub supported_formats: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_rows: 2,
            default_cols: 2,
            default_spacing: 2,
            cache_budget_bytes: 256 * 1024 * 1024,
            history_depth: 30,
            caption_commit_idle_ms: 1500,
            autosave_interval_secs: 5 * 60,
            autosave_every_mutations: 20,
            max_autosave_files: 5,
            autosave_write_attempts: 3,
            autosave_backoff_ms: 200,
            autosave_dir: None,
            supported_formats: SUPPORTED_IMAGE_FORMATS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EditorConfig {
    /// Convert to a JSON string
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from a JSON string; missing fields take their defaults
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    pub fn autosave_backoff(&self) -> Duration {
        Duration::from_millis(self.autosave_backoff_ms)
    }

    pub fn caption_commit_idle(&self) -> Duration {
        Duration::from_millis(self.caption_commit_idle_ms)
    }

    /// Directory holding autosave records.
    ///
    /// Defaults to the user's data directory:
    /// - Linux: ~/.local/share/collage-editor/autosave
    /// - macOS: ~/Library/Application Support/collage-editor/autosave
    /// - Windows: %APPDATA%\collage-editor\autosave
    pub fn autosave_dir(&self) -> PathBuf {
        if let Some(dir) = &self.autosave_dir {
            return dir.clone();
        }

        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        path.push("collage-editor");
        path.push("autosave");
        path
    }
}
