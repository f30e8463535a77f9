//! # Undo/Redo History
//!
//! Stores grid snapshots, one per logical user mutation.
//!
//! ## Design
//!
//! - The top of the undo stack is always the live state
//! - Undo moves the top to the redo stack and returns the new top
//! - Redo moves it back and returns it
//! - Recording clears the redo stack
//! - Exceeding the depth drops the oldest entry
//!
//! The manager never touches the grid. Callers hand returned snapshots to
//! `GridModel::restore`.

use std::sync::Arc;

use tracing::debug;

use super::snapshot::HistorySnapshot;

#[derive(Debug, Clone)]
struct HistoryEntry {
    snapshot: Arc<HistorySnapshot>,
    label: Option<String>,
}

#[derive(Debug)]
pub struct HistoryManager {
    /// Applied states, live state last
    undo_stack: Vec<HistoryEntry>,

    /// Undone states, most recently undone last
    redo_stack: Vec<HistoryEntry>,

    /// Maximum undo levels (0 = unlimited)
    depth: usize,
}

impl HistoryManager {
    pub fn new(depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            depth,
        }
    }

    /// History whose first entry is `baseline`, so the first recorded
    /// mutation can be undone back to it
    pub fn with_baseline(depth: usize, baseline: HistorySnapshot) -> Self {
        let mut history = Self::new(depth);
        history.undo_stack.push(HistoryEntry {
            snapshot: Arc::new(baseline),
            label: None,
        });
        history
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn record(&mut self, snapshot: HistorySnapshot) {
        self.push(snapshot, None);
    }

    pub fn record_labeled(&mut self, snapshot: HistorySnapshot, label: impl Into<String>) {
        self.push(snapshot, Some(label.into()));
    }

    fn push(&mut self, snapshot: HistorySnapshot, label: Option<String>) {
        self.undo_stack.push(HistoryEntry {
            snapshot: Arc::new(snapshot),
            label,
        });

        // one extra entry holds the state the oldest undo returns to
        if self.depth > 0 && self.undo_stack.len() > self.depth + 1 {
            self.undo_stack.remove(0);
        }

        self.redo_stack.clear();
    }

    /// Step back; returns the snapshot to restore
    pub fn undo(&mut self) -> Option<Arc<HistorySnapshot>> {
        if !self.can_undo() {
            return None;
        }
        let entry = self.undo_stack.pop()?;
        debug!(label = entry.label.as_deref().unwrap_or("change"), "undo");
        self.redo_stack.push(entry);
        self.undo_stack.last().map(|entry| Arc::clone(&entry.snapshot))
    }

    /// Step forward again after an undo
    pub fn redo(&mut self) -> Option<Arc<HistorySnapshot>> {
        let entry = self.redo_stack.pop()?;
        debug!(label = entry.label.as_deref().unwrap_or("change"), "redo");
        let snapshot = Arc::clone(&entry.snapshot);
        self.undo_stack.push(entry);
        Some(snapshot)
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len().saturating_sub(1)
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    /// Snapshot mirroring the live state, if any was recorded
    pub fn current(&self) -> Option<&Arc<HistorySnapshot>> {
        self.undo_stack.last().map(|entry| &entry.snapshot)
    }

    /// Drop all history, keeping the live state as the new baseline
    pub fn clear(&mut self) {
        let current = self.undo_stack.pop();
        self.undo_stack.clear();
        self.redo_stack.clear();
        if let Some(mut entry) = current {
            entry.label = None;
            self.undo_stack.push(entry);
        }
    }

    pub fn undo_label(&self) -> Option<&str> {
        if !self.can_undo() {
            return None;
        }
        self.undo_stack.last().and_then(|entry| entry.label.as_deref())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().and_then(|entry| entry.label.as_deref())
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(30)
    }
}
