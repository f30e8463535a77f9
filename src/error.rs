//! Error types for the collage engine

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A decode or scale failure for one image asset.
///
/// Kept separate from [`CollageError`] and `Clone` so that one failed load can
/// be handed to every caller waiting on the same cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    /// Source path of the asset, when known
    pub source: Option<PathBuf>,
    /// Human-readable reason from the decoder
    pub reason: String,
}

impl DecodeFailure {
    pub fn new(source: Option<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            source,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(path) => write!(f, "failed to decode {}: {}", path.display(), self.reason),
            None => write!(f, "failed to decode image: {}", self.reason),
        }
    }
}

impl std::error::Error for DecodeFailure {}

#[derive(Error, Debug)]
pub enum CollageError {
    #[error("{0}")]
    Decode(#[from] DecodeFailure),

    #[error("position ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("position ({row}, {col}) is covered by the merged cell anchored at ({anchor_row}, {anchor_col})")]
    PositionCovered {
        row: usize,
        col: usize,
        anchor_row: usize,
        anchor_col: usize,
    },

    #[error("incompatible span: {0}")]
    IncompatibleSpan(String),

    #[error("grid dimensions must be at least 1x1, got {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("snapshot rejected: {0}")]
    InvalidSnapshot(String),

    #[error("recovery record is corrupt: {0}")]
    RecoveryCorrupt(String),

    #[error("failed to write {} after {attempts} attempt(s): {source}", path.display())]
    StorageWriteFailure {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("path rejected: {0}")]
    PathRejected(String),

    #[error("no caption edit in progress")]
    NoCaptionEdit,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, CollageError>;

/// Outcome of a single decode/scale
pub type DecodeResult<T> = std::result::Result<T, DecodeFailure>;
