//! Grid <-> recovery record conversion

use chrono::Utc;
use tracing::{info, warn};

use super::record::{CellRecord, RecoveryRecord, RECORD_VERSION};
use crate::error::{CollageError, Result};
use crate::state::grid::GridState;
use crate::state::{CaptionStyle, Cell, GridModel, HistorySnapshot, Position, RenderContext};

/// Capture the editable state of `grid`
pub fn serialize(grid: &GridModel, captions: &CaptionStyle) -> RecoveryRecord {
    record_from_state(grid.state(), captions)
}

/// Capture a snapshot taken earlier, e.g. for a background write
pub fn serialize_snapshot(snapshot: &HistorySnapshot, captions: &CaptionStyle) -> RecoveryRecord {
    record_from_state(&snapshot.state, captions)
}

fn record_from_state(state: &GridState, captions: &CaptionStyle) -> RecoveryRecord {
    let cells = state
        .anchors()
        .map(|(footprint, cell)| CellRecord {
            row: footprint.origin.row,
            col: footprint.origin.col,
            row_span: footprint.row_span,
            col_span: footprint.col_span,
            image_source_path: cell.source_path().map(|p| p.to_path_buf()),
            top_caption: cell.top_caption.clone(),
            bottom_caption: cell.bottom_caption.clone(),
            selected: cell.selected,
        })
        .collect();

    RecoveryRecord {
        version: RECORD_VERSION,
        rows: state.rows,
        cols: state.cols,
        spacing: state.spacing,
        caption_defaults: captions.clone(),
        cells,
        saved_at: Utc::now(),
    }
}

/// Rebuild a grid and the caption defaults from `record`.
///
/// Structural problems fail with `RecoveryCorrupt`. An image whose source
/// can no longer be loaded leaves its cell holding a broken reference.
pub fn deserialize(record: &RecoveryRecord, ctx: RenderContext) -> Result<(GridModel, CaptionStyle)> {
    if record.version != RECORD_VERSION {
        return Err(CollageError::RecoveryCorrupt(format!(
            "unsupported record version {}",
            record.version
        )));
    }

    let mut anchors = Vec::with_capacity(record.cells.len());
    for entry in &record.cells {
        let mut cell = Cell::with_span(entry.row_span, entry.col_span)
            .map_err(|e| CollageError::RecoveryCorrupt(e.to_string()))?;
        cell.top_caption = entry.top_caption.clone();
        cell.bottom_caption = entry.bottom_caption.clone();
        cell.selected = entry.selected;
        // resolved below, once the structure is known to be sound
        if let Some(path) = &entry.image_source_path {
            cell.mark_broken(path.clone());
        }
        anchors.push((Position::new(entry.row, entry.col), cell));
    }

    let state = GridState::from_anchors(record.rows, record.cols, record.spacing, anchors)
        .map_err(CollageError::RecoveryCorrupt)?;
    let mut grid = GridModel::from_state(state, ctx);

    let mut broken = 0;
    for entry in &record.cells {
        let Some(path) = &entry.image_source_path else {
            continue;
        };
        match grid.context().loader().load(path) {
            Ok(handle) => grid.place_image(Position::new(entry.row, entry.col), handle)?,
            Err(e) => {
                warn!(path = %path.display(), reason = %e.reason, "broken image reference");
                broken += 1;
            }
        }
    }

    info!(
        rows = record.rows,
        cols = record.cols,
        saved_at = %record.saved_at,
        broken,
        "recovered grid"
    );
    Ok((grid, record.caption_defaults.clone()))
}
