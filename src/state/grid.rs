//! The collage grid
//!
//! Positions are stored in a row-major slot vector. A slot is either an
//! anchor owning a [`Cell`] or a marker pointing back at the anchor whose
//! merged footprint covers it. Every position resolves to exactly one
//! anchor and footprints never overlap.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::caption::{Caption, CaptionSlot};
use super::cell::{Cell, CellImage};
use super::command::GridCommand;
use super::geometry::{self, Footprint, Placement, Position};
use super::render::{RenderContext, RenderJob};
use super::snapshot::HistorySnapshot;
use crate::asset::{Bitmap, ImageHandle};
use crate::config::{EditorConfig, MAX_GRID_CELLS};
use crate::error::{CollageError, DecodeResult, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    Anchor(Cell),
    Covered(Position),
}

/// Structural grid content: everything a snapshot must capture
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GridState {
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    pub(crate) spacing: u32,
    slots: Vec<Slot>,
}

/// Number of positions in a `rows` x `cols` grid, if the size is allowed
fn grid_area(rows: usize, cols: usize) -> Option<usize> {
    if rows == 0 || cols == 0 {
        return None;
    }
    rows.checked_mul(cols).filter(|&area| area <= MAX_GRID_CELLS)
}

fn check_dimensions(rows: usize, cols: usize) -> Result<usize> {
    grid_area(rows, cols).ok_or(CollageError::InvalidDimensions { rows, cols })
}

impl GridState {
    pub(crate) fn empty(rows: usize, cols: usize, spacing: u32) -> Result<Self> {
        let area = check_dimensions(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            spacing,
            slots: (0..area).map(|_| Slot::Anchor(Cell::new())).collect(),
        })
    }

    /// Build from explicit anchors. Positions no anchor covers become empty
    /// unit cells; out-of-range or overlapping anchors are an error.
    pub(crate) fn from_anchors(
        rows: usize,
        cols: usize,
        spacing: u32,
        anchors: impl IntoIterator<Item = (Position, Cell)>,
    ) -> std::result::Result<Self, String> {
        let area = grid_area(rows, cols)
            .ok_or_else(|| format!("invalid grid dimensions {}x{}", rows, cols))?;
        let mut slots: Vec<Option<Slot>> = vec![None; area];

        for (origin, cell) in anchors {
            let (row_span, col_span) = cell.span();
            let footprint = Footprint::new(origin, row_span, col_span);
            if !footprint.fits(rows, cols) {
                return Err(format!(
                    "cell at ({}, {}) spanning {}x{} exceeds the {}x{} grid",
                    origin.row, origin.col, row_span, col_span, rows, cols
                ));
            }
            for pos in footprint.positions() {
                if slots[pos.row * cols + pos.col].is_some() {
                    return Err(format!(
                        "cell at ({}, {}) overlaps position ({}, {})",
                        origin.row, origin.col, pos.row, pos.col
                    ));
                }
            }
            for pos in footprint.positions().skip(1) {
                slots[pos.row * cols + pos.col] = Some(Slot::Covered(origin));
            }
            slots[origin.row * cols + origin.col] = Some(Slot::Anchor(cell));
        }

        Ok(Self {
            rows,
            cols,
            spacing,
            slots: slots
                .into_iter()
                .map(|slot| slot.unwrap_or_else(|| Slot::Anchor(Cell::new())))
                .collect(),
        })
    }

    fn index(&self, pos: Position) -> Option<usize> {
        (pos.row < self.rows && pos.col < self.cols).then(|| pos.row * self.cols + pos.col)
    }

    fn position_of(&self, index: usize) -> Position {
        Position::new(index / self.cols, index % self.cols)
    }

    pub(crate) fn slot(&self, pos: Position) -> Option<&Slot> {
        self.index(pos).map(|i| &self.slots[i])
    }

    fn out_of_bounds(&self, pos: Position) -> CollageError {
        CollageError::OutOfBounds {
            row: pos.row,
            col: pos.col,
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Anchors with their footprints, in row-major order
    pub(crate) fn anchors(&self) -> impl Iterator<Item = (Footprint, &Cell)> + '_ {
        self.slots.iter().enumerate().filter_map(move |(i, slot)| match slot {
            Slot::Anchor(cell) => {
                let (row_span, col_span) = cell.span();
                Some((Footprint::new(self.position_of(i), row_span, col_span), cell))
            }
            Slot::Covered(_) => None,
        })
    }

    fn anchors_mut(&mut self) -> impl Iterator<Item = &mut Cell> + '_ {
        self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Anchor(cell) => Some(cell),
            Slot::Covered(_) => None,
        })
    }

    /// Anchor position owning `pos`
    pub(crate) fn anchor_of(&self, pos: Position) -> Result<Position> {
        match self.slot(pos) {
            None => Err(self.out_of_bounds(pos)),
            Some(Slot::Anchor(_)) => Ok(pos),
            Some(Slot::Covered(anchor)) => Ok(*anchor),
        }
    }

    /// The cell anchored exactly at `pos`
    pub(crate) fn anchor(&self, pos: Position) -> Result<&Cell> {
        match self.slot(pos) {
            None => Err(self.out_of_bounds(pos)),
            Some(Slot::Anchor(cell)) => Ok(cell),
            Some(Slot::Covered(anchor)) => Err(covered(pos, *anchor)),
        }
    }

    fn anchor_mut(&mut self, pos: Position) -> Result<&mut Cell> {
        let index = self.index(pos).ok_or_else(|| self.out_of_bounds(pos))?;
        match &mut self.slots[index] {
            Slot::Anchor(cell) => Ok(cell),
            Slot::Covered(anchor) => Err(covered(pos, *anchor)),
        }
    }

    /// Footprint of the anchor owning `pos`
    fn footprint(&self, pos: Position) -> Result<Footprint> {
        let origin = self.anchor_of(pos)?;
        let (row_span, col_span) = self.anchor(origin)?.span();
        Ok(Footprint::new(origin, row_span, col_span))
    }

    /// Write `cell` at `origin` and mark the rest of its footprint covered.
    /// The footprint must fit.
    fn install(&mut self, origin: Position, cell: Cell) {
        let (row_span, col_span) = cell.span();
        let footprint = Footprint::new(origin, row_span, col_span);
        for pos in footprint.positions().skip(1) {
            if let Some(i) = self.index(pos) {
                self.slots[i] = Slot::Covered(origin);
            }
        }
        if let Some(i) = self.index(origin) {
            self.slots[i] = Slot::Anchor(cell);
        }
    }

    /// Check the tiling invariant
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        let area = grid_area(self.rows, self.cols)
            .ok_or_else(|| format!("invalid grid dimensions {}x{}", self.rows, self.cols))?;
        if self.slots.len() != area {
            return Err(format!(
                "{} slots for a {}x{} grid",
                self.slots.len(),
                self.rows,
                self.cols
            ));
        }

        for (i, slot) in self.slots.iter().enumerate() {
            let pos = self.position_of(i);
            match slot {
                Slot::Anchor(cell) => {
                    let (row_span, col_span) = cell.span();
                    let footprint = Footprint::new(pos, row_span, col_span);
                    if !footprint.fits(self.rows, self.cols) {
                        return Err(format!("cell at ({}, {}) extends past the grid", pos.row, pos.col));
                    }
                    for inner in footprint.positions().skip(1) {
                        if self.slot(inner) != Some(&Slot::Covered(pos)) {
                            return Err(format!(
                                "position ({}, {}) is not covered by its anchor ({}, {})",
                                inner.row, inner.col, pos.row, pos.col
                            ));
                        }
                    }
                }
                Slot::Covered(anchor) => {
                    let owned = match self.slot(*anchor) {
                        Some(Slot::Anchor(cell)) => {
                            let (row_span, col_span) = cell.span();
                            *anchor != pos && Footprint::new(*anchor, row_span, col_span).contains(pos)
                        }
                        _ => false,
                    };
                    if !owned {
                        return Err(format!(
                            "position ({}, {}) points at ({}, {}), which does not cover it",
                            pos.row, pos.col, anchor.row, anchor.col
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn covered(pos: Position, anchor: Position) -> CollageError {
    CollageError::PositionCovered {
        row: pos.row,
        col: pos.col,
        anchor_row: anchor.row,
        anchor_col: anchor.col,
    }
}

/// Bounding rectangle of `footprints` if they tile it exactly
fn tiling_rectangle(footprints: &[Footprint]) -> Option<Footprint> {
    let top = footprints.iter().map(|f| f.origin.row).min()?;
    let left = footprints.iter().map(|f| f.origin.col).min()?;
    let bottom = footprints.iter().map(|f| f.origin.row + f.row_span).max()?;
    let right = footprints.iter().map(|f| f.origin.col + f.col_span).max()?;

    let bounds = Footprint::new(Position::new(top, left), bottom - top, right - left);
    // footprints are disjoint, so equal area means no holes
    let area: usize = footprints.iter().map(Footprint::area).sum();
    (area == bounds.area()).then_some(bounds)
}

/// The collage grid: cells, merges, spacing and derived pixel layout
#[derive(Debug)]
pub struct GridModel {
    state: GridState,
    ctx: RenderContext,
    canvas: Option<(u32, u32)>,
    placements: Vec<Placement>,
    layout_generation: u64,
}

impl GridModel {
    /// Empty `rows x cols` grid rendering through `ctx`
    pub fn new(rows: usize, cols: usize, spacing: u32, ctx: RenderContext) -> Result<Self> {
        Ok(Self::from_state(GridState::empty(rows, cols, spacing)?, ctx))
    }

    pub fn from_config(config: &EditorConfig, ctx: RenderContext) -> Result<Self> {
        Self::new(config.default_rows, config.default_cols, config.default_spacing, ctx)
    }

    /// Wrap an already validated state
    pub(crate) fn from_state(state: GridState, ctx: RenderContext) -> Self {
        Self {
            state,
            ctx,
            canvas: None,
            placements: Vec::new(),
            layout_generation: 0,
        }
    }

    pub(crate) fn state(&self) -> &GridState {
        &self.state
    }

    pub fn rows(&self) -> usize {
        self.state.rows
    }

    pub fn cols(&self) -> usize {
        self.state.cols
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.state.rows, self.state.cols)
    }

    pub fn spacing(&self) -> u32 {
        self.state.spacing
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    /// The cell anchored at `pos`; covered positions are an error
    pub fn cell(&self, pos: Position) -> Result<&Cell> {
        self.state.anchor(pos)
    }

    /// Anchor position owning `pos`
    pub fn anchor_of(&self, pos: Position) -> Result<Position> {
        self.state.anchor_of(pos)
    }

    pub fn footprint(&self, pos: Position) -> Result<Footprint> {
        self.state.footprint(pos)
    }

    /// Anchors in reading order
    pub fn cells(&self) -> impl Iterator<Item = (Footprint, &Cell)> + '_ {
        self.state.anchors()
    }

    pub fn image_count(&self) -> usize {
        self.cells().filter(|(_, cell)| !cell.is_empty()).count()
    }

    // ========== Images ==========

    pub fn place_image(&mut self, pos: Position, handle: ImageHandle) -> Result<()> {
        self.state.anchor_mut(pos)?.set_image(handle);
        Ok(())
    }

    pub fn clear_image(&mut self, pos: Position) -> Result<()> {
        self.state.anchor_mut(pos)?.clear_image();
        Ok(())
    }

    /// Exchange images and captions between two anchors
    pub fn swap_images(&mut self, a: Position, b: Position) -> Result<()> {
        self.state.anchor(a)?;
        self.state.anchor(b)?;
        if a == b {
            return Ok(());
        }

        let take = |cell: &mut Cell| (cell.take_image(), cell.top_caption.take(), cell.bottom_caption.take());
        let (image_a, top_a, bottom_a) = take(self.state.anchor_mut(a)?);
        let (image_b, top_b, bottom_b) = take(self.state.anchor_mut(b)?);

        let cell = self.state.anchor_mut(a)?;
        cell.put_image(image_b);
        cell.top_caption = top_b;
        cell.bottom_caption = bottom_b;

        let cell = self.state.anchor_mut(b)?;
        cell.put_image(image_a);
        cell.top_caption = top_a;
        cell.bottom_caption = bottom_a;
        Ok(())
    }

    /// Place handles into empty anchors in reading order. Returns how many
    /// were placed; leftovers are ignored.
    pub fn fill_empty(&mut self, handles: impl IntoIterator<Item = ImageHandle>) -> usize {
        let mut handles = handles.into_iter();
        let mut placed = 0;
        for cell in self.state.anchors_mut() {
            if *cell.image_state() != CellImage::Empty {
                continue;
            }
            match handles.next() {
                Some(handle) => {
                    cell.set_image(handle);
                    placed += 1;
                }
                None => break,
            }
        }
        placed
    }

    // ========== Captions ==========

    pub fn set_caption(&mut self, pos: Position, slot: CaptionSlot, caption: Option<Caption>) -> Result<()> {
        self.state.anchor_mut(pos)?.set_caption(slot, caption);
        Ok(())
    }

    /// Show or hide an existing caption; a missing caption is left alone
    pub fn set_caption_visible(&mut self, pos: Position, slot: CaptionSlot, visible: bool) -> Result<()> {
        if let Some(caption) = self.state.anchor_mut(pos)?.caption_mut(slot) {
            caption.visible = visible;
        }
        Ok(())
    }

    // ========== Selection ==========

    /// Select the anchor owning `pos`
    pub fn select(&mut self, pos: Position, selected: bool) -> Result<()> {
        let anchor = self.state.anchor_of(pos)?;
        self.state.anchor_mut(anchor)?.selected = selected;
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        for cell in self.state.anchors_mut() {
            cell.selected = false;
        }
    }

    pub fn selected(&self) -> Vec<Position> {
        self.cells()
            .filter(|(_, cell)| cell.selected)
            .map(|(footprint, _)| footprint.origin)
            .collect()
    }

    /// The selection's bounding rectangle, if the selection fills it
    pub fn selected_rectangle(&self) -> Option<Footprint> {
        let footprints: Vec<Footprint> = self
            .cells()
            .filter(|(_, cell)| cell.selected)
            .map(|(footprint, _)| footprint)
            .collect();
        tiling_rectangle(&footprints)
    }

    // ========== Merge / split ==========

    /// Merge the anchors owning `positions` into one anchor at the top-left
    /// of their bounding rectangle. The top-left cell keeps its image and
    /// captions; the others are discarded. Returns the new anchor position.
    pub fn merge(&mut self, positions: &[Position]) -> Result<Position> {
        let mut footprints = BTreeMap::new();
        for &pos in positions {
            let footprint = self.state.footprint(pos)?;
            footprints.insert(footprint.origin, footprint);
        }
        if footprints.len() < 2 {
            return Err(CollageError::IncompatibleSpan(
                "select at least two cells to merge".to_string(),
            ));
        }

        let footprints: Vec<Footprint> = footprints.into_values().collect();
        let bounds = tiling_rectangle(&footprints).ok_or_else(|| {
            CollageError::IncompatibleSpan("selected cells do not form a rectangle".to_string())
        })?;

        let mut keeper = self.state.anchor(bounds.origin)?.clone();
        keeper.merge_with(bounds.row_span, bounds.col_span)?;
        keeper.selected = false;

        let discarded = footprints
            .iter()
            .filter(|f| f.origin != bounds.origin)
            .filter_map(|f| self.state.anchor(f.origin).ok())
            .filter(|cell| !cell.is_empty())
            .count();
        if discarded > 0 {
            debug!(discarded, "merge discarded images");
        }

        self.state.install(bounds.origin, keeper);
        self.relayout();
        Ok(bounds.origin)
    }

    pub fn merge_selected(&mut self) -> Result<Position> {
        let selected = self.selected();
        self.merge(&selected)
    }

    /// Restore the merged block owning `pos` to empty unit cells
    pub fn split(&mut self, pos: Position) -> Result<()> {
        let footprint = self.state.footprint(pos)?;
        if footprint.area() == 1 {
            return Err(CollageError::IncompatibleSpan(format!(
                "cell at ({}, {}) is not merged",
                footprint.origin.row, footprint.origin.col
            )));
        }

        let pieces = self.state.anchor(footprint.origin)?.split();
        for (pos, cell) in footprint.positions().zip(pieces) {
            self.state.install(pos, cell);
        }
        self.relayout();
        Ok(())
    }

    // ========== Structure ==========

    /// Change dimensions, keeping every cell whose anchor still exists at the
    /// same position. Merges that no longer fit collapse to a unit cell that
    /// keeps its content.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<()> {
        let mut next = GridState::empty(rows, cols, self.state.spacing)?;
        let mut dropped = 0;

        for (footprint, cell) in self.state.anchors() {
            let origin = footprint.origin;
            if footprint.fits(rows, cols) {
                next.install(origin, cell.clone());
            } else if origin.row < rows && origin.col < cols {
                let mut cell = cell.clone();
                cell.set_span(1, 1)?;
                next.install(origin, cell);
            } else if cell.source_path().is_some() {
                dropped += 1;
            }
        }

        info!(
            from_rows = self.state.rows,
            from_cols = self.state.cols,
            rows,
            cols,
            dropped,
            "resized grid"
        );
        self.state = next;
        self.relayout();
        Ok(())
    }

    pub fn set_spacing(&mut self, px: u32) {
        self.state.spacing = px;
        self.relayout();
    }

    /// Empty every cell and remove all merges, keeping dimensions and spacing
    pub fn clear(&mut self) -> Result<()> {
        self.state = GridState::empty(self.state.rows, self.state.cols, self.state.spacing)?;
        self.relayout();
        Ok(())
    }

    // ========== Layout ==========

    pub fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.canvas = Some((width, height));
        self.relayout();
    }

    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.canvas
    }

    /// Pixel rectangles of all anchors; empty until a canvas size is set
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn placement(&self, pos: Position) -> Option<&Placement> {
        let anchor = self.state.anchor_of(pos).ok()?;
        self.placements.iter().find(|p| p.footprint.origin == anchor)
    }

    /// Bumped every time placements are recomputed
    pub fn layout_generation(&self) -> u64 {
        self.layout_generation
    }

    fn relayout(&mut self) {
        self.layout_generation += 1;
        self.placements = match self.canvas {
            Some(canvas) => {
                let spacing = self.state.spacing;
                let unit = geometry::unit_cell_size(canvas, self.state.rows, self.state.cols, spacing);
                self.state
                    .anchors()
                    .map(|(footprint, _)| geometry::place(footprint, unit, spacing))
                    .collect()
            }
            None => Vec::new(),
        };
    }

    // ========== Rendering ==========

    pub fn render_cell(&self, pos: Position, width: u32, height: u32) -> Result<Option<Bitmap>> {
        self.state.anchor(pos)?.render_at(&self.ctx, width, height)
    }

    pub fn render_job(&self, pos: Position, width: u32, height: u32) -> Result<Option<RenderJob>> {
        Ok(self.state.anchor(pos)?.render_job(&self.ctx, width, height))
    }

    /// Render jobs for every placed cell with an image, at its layout size
    pub fn layout_jobs(&self) -> Vec<(Placement, RenderJob)> {
        self.placements
            .iter()
            .filter_map(|placement| {
                let cell = self.state.anchor(placement.footprint.origin).ok()?;
                let job = cell.render_job(&self.ctx, placement.width, placement.height)?;
                Some((*placement, job))
            })
            .collect()
    }

    /// Full-resolution originals of every cell with an image, for export.
    /// A failed decode is reported per cell and does not stop the others.
    pub fn export_originals(&self) -> Vec<(Footprint, DecodeResult<Bitmap>)> {
        self.cells()
            .filter_map(|(footprint, cell)| {
                cell.image().map(|handle| (footprint, self.ctx.original(handle)))
            })
            .collect()
    }

    // ========== History ==========

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot::new(self.state.clone())
    }

    /// Replace the whole grid with `snapshot`, or nothing on a structural error
    pub fn restore(&mut self, snapshot: &HistorySnapshot) -> Result<()> {
        snapshot.state.validate().map_err(CollageError::InvalidSnapshot)?;
        self.state = snapshot.state.clone();
        self.relayout();
        Ok(())
    }

    /// Apply a command; on error the grid is unchanged
    pub fn apply(&mut self, command: GridCommand) -> Result<()> {
        match command {
            GridCommand::PlaceImage { pos, handle } => self.place_image(pos, handle),
            GridCommand::ClearImage { pos } => self.clear_image(pos),
            GridCommand::SwapImages { a, b } => self.swap_images(a, b),
            GridCommand::Merge { positions } => self.merge(&positions).map(|_| ()),
            GridCommand::MergeSelected => self.merge_selected().map(|_| ()),
            GridCommand::Split { pos } => self.split(pos),
            GridCommand::Resize { rows, cols } => self.resize(rows, cols),
            GridCommand::SetSpacing { px } => {
                self.set_spacing(px);
                Ok(())
            }
            GridCommand::SetCaption { pos, slot, caption } => self.set_caption(pos, slot, caption),
            GridCommand::SetCaptionVisible { pos, slot, visible } => {
                self.set_caption_visible(pos, slot, visible)
            }
            GridCommand::Select { pos, selected } => self.select(pos, selected),
            GridCommand::ClearSelection => {
                self.clear_selection();
                Ok(())
            }
            GridCommand::Clear => self.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::state::CaptionStyle;
    use crate::testing::{context, context_with, handle, FakeLoader};

    fn p(row: usize, col: usize) -> Position {
        Position::new(row, col)
    }

    fn grid(rows: usize, cols: usize) -> GridModel {
        GridModel::new(rows, cols, 2, context()).unwrap()
    }

    fn image_name(grid: &GridModel, pos: Position) -> Option<String> {
        grid.cell(pos)
            .ok()?
            .image()
            .map(|h| h.id().as_str().to_string())
    }

    #[test]
    fn test_new_grid_is_all_empty_unit_cells() {
        let grid = grid(2, 3);
        assert_eq!(grid.dimensions(), (2, 3));
        assert_eq!(grid.cells().count(), 6);
        assert!(grid.cells().all(|(f, c)| f.area() == 1 && c.is_empty()));
        assert!(grid.state().validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            GridModel::new(0, 2, 0, context()),
            Err(CollageError::InvalidDimensions { rows: 0, cols: 2 })
        ));
        let mut grid = grid(2, 2);
        assert!(grid.resize(3, 0).is_err());
        assert_eq!(grid.dimensions(), (2, 2));
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        assert!(matches!(
            GridModel::new(usize::MAX, 2, 0, context()),
            Err(CollageError::InvalidDimensions { .. })
        ));
        assert!(GridModel::new(1, MAX_GRID_CELLS + 1, 0, context()).is_err());
        assert!(GridModel::new(1, MAX_GRID_CELLS, 0, context()).is_ok());

        let mut grid = grid(2, 2);
        assert!(matches!(
            grid.resize(usize::MAX, usize::MAX),
            Err(CollageError::InvalidDimensions { .. })
        ));
        assert_eq!(grid.dimensions(), (2, 2));
    }

    #[test]
    fn test_place_image_out_of_bounds() {
        let mut grid = grid(2, 2);
        let err = grid.place_image(p(2, 0), handle("A.jpg", 10, 10)).unwrap_err();
        assert!(matches!(err, CollageError::OutOfBounds { row: 2, col: 0, rows: 2, cols: 2 }));
    }

    #[test]
    fn test_merge_keeps_top_left_content() {
        let mut grid = grid(2, 2);
        grid.place_image(p(0, 0), handle("A.jpg", 10, 10)).unwrap();
        grid.place_image(p(1, 1), handle("D.jpg", 10, 10)).unwrap();

        let anchor = grid.merge(&[p(0, 0), p(0, 1), p(1, 0), p(1, 1)]).unwrap();

        assert_eq!(anchor, p(0, 0));
        assert_eq!(grid.cells().count(), 1);
        assert_eq!(grid.cell(p(0, 0)).unwrap().span(), (2, 2));
        assert_eq!(image_name(&grid, p(0, 0)).as_deref(), Some("A.jpg"));
        assert_eq!(grid.anchor_of(p(1, 1)).unwrap(), p(0, 0));
        assert!(grid.state().validate().is_ok());
    }

    #[test]
    fn test_covered_position_rejects_placement() {
        let mut grid = grid(2, 2);
        grid.merge(&[p(0, 0), p(0, 1)]).unwrap();

        let err = grid.place_image(p(0, 1), handle("A.jpg", 10, 10)).unwrap_err();
        assert!(matches!(
            err,
            CollageError::PositionCovered { row: 0, col: 1, anchor_row: 0, anchor_col: 0 }
        ));
        assert!(grid.cell(p(0, 1)).is_err());
    }

    #[test]
    fn test_merge_rejects_non_rectangle() {
        let mut grid = grid(2, 2);
        grid.place_image(p(1, 1), handle("D.jpg", 10, 10)).unwrap();
        let before = grid.snapshot();

        let err = grid.merge(&[p(0, 0), p(0, 1), p(1, 0)]).unwrap_err();
        assert!(matches!(err, CollageError::IncompatibleSpan(_)));
        assert!(grid.snapshot().same_content(&before));

        assert!(matches!(grid.merge(&[p(0, 0)]), Err(CollageError::IncompatibleSpan(_))));
        assert!(matches!(grid.merge(&[p(0, 0), p(1, 1)]), Err(CollageError::IncompatibleSpan(_))));
    }

    #[test]
    fn test_merge_absorbs_existing_block() {
        let mut grid = grid(2, 2);
        grid.merge(&[p(0, 0), p(0, 1)]).unwrap();
        // (0, 1) names the existing block
        grid.merge(&[p(0, 1), p(1, 0), p(1, 1)]).unwrap();

        assert_eq!(grid.cell(p(0, 0)).unwrap().span(), (2, 2));
        assert!(grid.state().validate().is_ok());
    }

    #[test]
    fn test_merge_split_round_trip() {
        let mut grid = grid(3, 3);
        grid.place_image(p(1, 1), handle("A.jpg", 10, 10)).unwrap();
        grid.merge(&[p(1, 1), p(1, 2), p(2, 1), p(2, 2)]).unwrap();

        grid.split(p(2, 2)).unwrap();

        assert_eq!(grid.cells().count(), 9);
        for pos in [p(1, 1), p(1, 2), p(2, 1), p(2, 2)] {
            let cell = grid.cell(pos).unwrap();
            assert_eq!(cell.span(), (1, 1));
            assert!(cell.is_empty());
        }
    }

    #[test]
    fn test_split_unit_cell_fails() {
        let mut grid = grid(2, 2);
        assert!(matches!(grid.split(p(0, 0)), Err(CollageError::IncompatibleSpan(_))));
    }

    #[test]
    fn test_resize_grow_keeps_all_images() {
        let mut grid = grid(2, 2);
        for (i, pos) in [p(0, 0), p(0, 1), p(1, 0), p(1, 1)].into_iter().enumerate() {
            grid.place_image(pos, handle(&format!("{}.jpg", i), 10, 10)).unwrap();
        }

        grid.resize(3, 3).unwrap();

        assert_eq!(grid.dimensions(), (3, 3));
        assert_eq!(image_name(&grid, p(0, 0)).as_deref(), Some("0.jpg"));
        assert_eq!(image_name(&grid, p(0, 1)).as_deref(), Some("1.jpg"));
        assert_eq!(image_name(&grid, p(1, 0)).as_deref(), Some("2.jpg"));
        assert_eq!(image_name(&grid, p(1, 1)).as_deref(), Some("3.jpg"));
        assert_eq!(grid.image_count(), 4);
        assert!(grid.cell(p(2, 2)).unwrap().is_empty());
    }

    #[test]
    fn test_resize_shrink_drops_only_lost_positions() {
        let mut grid = grid(3, 3);
        grid.place_image(p(0, 1), handle("keep.jpg", 10, 10)).unwrap();
        grid.place_image(p(2, 2), handle("lost.jpg", 10, 10)).unwrap();
        grid.set_caption(p(0, 1), CaptionSlot::Top, Some(Caption::new("hi", CaptionStyle::default())))
            .unwrap();

        grid.resize(2, 2).unwrap();

        assert_eq!(image_name(&grid, p(0, 1)).as_deref(), Some("keep.jpg"));
        assert_eq!(grid.cell(p(0, 1)).unwrap().caption(CaptionSlot::Top).unwrap().text, "hi");
        assert_eq!(grid.image_count(), 1);
    }

    #[test]
    fn test_resize_keeps_fitting_merge_and_collapses_the_rest() {
        let mut grid = grid(3, 3);
        grid.merge(&[p(0, 0), p(0, 1)]).unwrap();
        grid.place_image(p(1, 1), handle("B.jpg", 10, 10)).unwrap();
        grid.merge(&[p(1, 1), p(1, 2), p(2, 1), p(2, 2)]).unwrap();

        grid.resize(2, 2).unwrap();

        assert_eq!(grid.cell(p(0, 0)).unwrap().span(), (1, 2));
        let collapsed = grid.cell(p(1, 1)).unwrap();
        assert_eq!(collapsed.span(), (1, 1));
        assert_eq!(image_name(&grid, p(1, 1)).as_deref(), Some("B.jpg"));
        assert!(grid.state().validate().is_ok());
    }

    #[test]
    fn test_spacing_change_recomputes_layout() {
        let mut grid = grid(2, 2);
        grid.set_canvas_size(210, 210);
        let generation = grid.layout_generation();
        // (210 - 2) / 2 = 104 per cell, second column starts after one gap
        assert_eq!(grid.placement(p(1, 1)).unwrap().x, 106);

        grid.set_spacing(10);

        assert!(grid.layout_generation() > generation);
        let placement = grid.placement(p(1, 1)).unwrap();
        assert_eq!((placement.x, placement.y), (110, 110));
        assert_eq!((placement.width, placement.height), (100, 100));
    }

    #[test]
    fn test_merged_placement_spans_gap() {
        let mut grid = GridModel::new(2, 2, 10, context()).unwrap();
        grid.set_canvas_size(210, 210);
        grid.merge(&[p(0, 0), p(0, 1)]).unwrap();

        assert_eq!(grid.placements().len(), 3);
        assert_eq!(grid.placement(p(0, 1)).unwrap().width, 210);
    }

    #[test]
    fn test_swap_images_moves_captions() {
        let mut grid = grid(1, 2);
        grid.place_image(p(0, 0), handle("A.jpg", 10, 10)).unwrap();
        grid.set_caption(p(0, 0), CaptionSlot::Bottom, Some(Caption::new("a", CaptionStyle::default())))
            .unwrap();

        grid.swap_images(p(0, 0), p(0, 1)).unwrap();

        assert!(grid.cell(p(0, 0)).unwrap().is_empty());
        assert!(grid.cell(p(0, 0)).unwrap().caption(CaptionSlot::Bottom).is_none());
        assert_eq!(image_name(&grid, p(0, 1)).as_deref(), Some("A.jpg"));
        assert_eq!(grid.cell(p(0, 1)).unwrap().caption(CaptionSlot::Bottom).unwrap().text, "a");
    }

    #[test]
    fn test_selection_rectangle_and_merge_selected() {
        let mut grid = grid(3, 3);
        grid.select(p(0, 1), true).unwrap();
        grid.select(p(1, 1), true).unwrap();
        assert_eq!(grid.selected_rectangle(), Some(Footprint::new(p(0, 1), 2, 1)));

        grid.select(p(2, 2), true).unwrap();
        assert_eq!(grid.selected_rectangle(), None);
        grid.select(p(2, 2), false).unwrap();

        assert_eq!(grid.merge_selected().unwrap(), p(0, 1));
        assert!(grid.selected().is_empty());
        assert_eq!(grid.cell(p(0, 1)).unwrap().span(), (2, 1));
    }

    #[test]
    fn test_snapshot_is_isolated_and_restorable() {
        let mut grid = grid(2, 2);
        grid.place_image(p(0, 0), handle("A.jpg", 10, 10)).unwrap();
        let snapshot = grid.snapshot();

        grid.clear_image(p(0, 0)).unwrap();
        grid.resize(4, 4).unwrap();
        assert_eq!(snapshot.rows(), 2);
        assert!(snapshot.anchor(p(0, 0)).unwrap().image().is_some());

        grid.restore(&snapshot).unwrap();
        assert_eq!(grid.dimensions(), (2, 2));
        assert_eq!(image_name(&grid, p(0, 0)).as_deref(), Some("A.jpg"));
    }

    #[test]
    fn test_restore_rejects_broken_snapshot() {
        let mut grid = grid(2, 2);
        grid.place_image(p(0, 0), handle("A.jpg", 10, 10)).unwrap();
        let before = grid.snapshot();

        let mut bad = grid.snapshot();
        bad.state.slots[3] = Slot::Covered(p(0, 0));

        assert!(matches!(grid.restore(&bad), Err(CollageError::InvalidSnapshot(_))));
        assert!(grid.snapshot().same_content(&before));
    }

    #[test]
    fn test_from_anchors_fills_gaps_and_rejects_overlap() {
        let mut wide = Cell::with_span(1, 2).unwrap();
        wide.set_image(handle("A.jpg", 10, 10));
        let state = GridState::from_anchors(2, 2, 0, vec![(p(0, 0), wide)]).unwrap();
        assert!(state.validate().is_ok());
        assert_eq!(state.anchors().count(), 3);

        let overlap = vec![(p(0, 0), Cell::with_span(1, 2).unwrap()), (p(0, 1), Cell::new())];
        assert!(GridState::from_anchors(2, 2, 0, overlap).is_err());
        assert!(GridState::from_anchors(2, 2, 0, vec![(p(1, 1), Cell::with_span(2, 1).unwrap())]).is_err());
    }

    #[test]
    fn test_fill_empty_reading_order() {
        let mut grid = grid(2, 2);
        grid.place_image(p(0, 1), handle("X.jpg", 10, 10)).unwrap();

        let placed = grid.fill_empty(vec![handle("A.jpg", 10, 10), handle("B.jpg", 10, 10)]);

        assert_eq!(placed, 2);
        assert_eq!(image_name(&grid, p(0, 0)).as_deref(), Some("A.jpg"));
        assert_eq!(image_name(&grid, p(0, 1)).as_deref(), Some("X.jpg"));
        assert_eq!(image_name(&grid, p(1, 0)).as_deref(), Some("B.jpg"));
        assert!(grid.cell(p(1, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_export_originals_bypass_cache() {
        let loader = Arc::new(FakeLoader::new());
        let mut grid = GridModel::new(1, 2, 0, context_with(Arc::clone(&loader))).unwrap();
        grid.place_image(p(0, 0), handle("A.jpg", 1600, 1200)).unwrap();
        grid.render_cell(p(0, 0), 160, 120).unwrap();

        let originals = grid.export_originals();

        assert_eq!(originals.len(), 1);
        assert_eq!(originals[0].1.as_ref().unwrap().dimensions(), (1600, 1200));
        assert_eq!(loader.original_calls(), 1);
        assert_eq!(loader.scale_calls(), 1);
    }

    #[test]
    fn test_layout_jobs_use_placement_size() {
        let mut grid = GridModel::new(1, 2, 0, context()).unwrap();
        grid.place_image(p(0, 0), handle("A.jpg", 100, 100)).unwrap();
        grid.set_canvas_size(200, 100);

        let jobs = grid.layout_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].1.size(), (100, 100));
    }

    #[test]
    fn test_apply_failure_leaves_grid_unchanged() {
        let mut grid = grid(2, 2);
        let before = grid.snapshot();

        let result = grid.apply(GridCommand::Split { pos: p(5, 5) });
        assert!(matches!(result, Err(CollageError::OutOfBounds { .. })));
        assert!(grid.snapshot().same_content(&before));

        grid.apply(GridCommand::Resize { rows: 1, cols: 3 }).unwrap();
        grid.apply(GridCommand::SetSpacing { px: 8 }).unwrap();
        assert_eq!(grid.dimensions(), (1, 3));
        assert_eq!(grid.spacing(), 8);
    }
}
