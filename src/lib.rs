//! Grid state engine for an image collage editor
//!
//! A collage is a rectangular grid of mergeable cells, each holding an
//! image reference and optional top/bottom captions. This crate owns that
//! state and the machinery around it:
//!
//! - [`asset`]: image identity, loading and path policy
//! - [`cache`]: the size-keyed, single-flight LRU image cache
//! - [`state`]: cells, the grid, commands and undo/redo history
//! - [`recovery`]: autosave records, atomic storage and startup recovery
//! - [`editor`]: the editing session a UI drives
//!
//! Windowing, drag-and-drop and export encoding live outside the crate.

pub mod asset;
pub mod cache;
pub mod config;
pub mod editor;
pub mod error;
pub mod logging;
pub mod recovery;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::EditorConfig;
pub use editor::CollageEditor;
pub use error::{CollageError, DecodeFailure, Result};
