//! On-disk autosave record
//!
//! A record stores grid structure, captions and image *source paths*. Pixels
//! are never written; images are re-resolved through the loader on recovery.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CollageError, Result};
use crate::state::{Caption, CaptionStyle};

pub const RECORD_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecoveryRecord {
    pub version: u32,
    pub rows: usize,
    pub cols: usize,
    pub spacing: u32,

    /// Style applied to newly created captions
    #[serde(default)]
    pub caption_defaults: CaptionStyle,

    /// One entry per anchor cell
    pub cells: Vec<CellRecord>,

    pub saved_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CellRecord {
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_source_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_caption: Option<Caption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_caption: Option<Caption>,

    #[serde(default)]
    pub selected: bool,
}

impl RecoveryRecord {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a record. Anything unparseable is reported as corrupt.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CollageError::RecoveryCorrupt(e.to_string()))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CollageError::RecoveryCorrupt(e.to_string()))
    }
}
