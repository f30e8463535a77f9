//! Immutable copies of grid state for undo/redo and autosave

use chrono::{DateTime, Utc};

use super::cell::Cell;
use super::geometry::{Footprint, Position};
use super::grid::{GridState, Slot};

/// Deep structural copy of a grid at one point in time.
///
/// Cells carry image handles (identity and source path), never pixels, so
/// snapshots stay small. Mutating the grid afterwards cannot affect a
/// snapshot: it owns its own allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pub(crate) state: GridState,
    taken_at: DateTime<Utc>,
}

impl HistorySnapshot {
    pub(crate) fn new(state: GridState) -> Self {
        Self {
            state,
            taken_at: Utc::now(),
        }
    }

    pub fn rows(&self) -> usize {
        self.state.rows
    }

    pub fn cols(&self) -> usize {
        self.state.cols
    }

    pub fn spacing(&self) -> u32 {
        self.state.spacing
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Cell anchored at `pos`, if `pos` is an anchor
    pub fn anchor(&self, pos: Position) -> Option<&Cell> {
        match self.state.slot(pos)? {
            Slot::Anchor(cell) => Some(cell),
            Slot::Covered(_) => None,
        }
    }

    /// Anchors in row-major order
    pub fn anchors(&self) -> impl Iterator<Item = (Footprint, &Cell)> {
        self.state.anchors()
    }

    /// Same grid content, ignoring when the snapshots were taken
    pub fn same_content(&self, other: &HistorySnapshot) -> bool {
        self.state == other.state
    }
}
