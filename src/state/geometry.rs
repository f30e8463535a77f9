//! Grid coordinates and pixel layout

use serde::{Deserialize, Serialize};

/// A grid coordinate
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for Position {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

/// Footprint of an anchor cell: top-left position plus span
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub origin: Position,
    pub row_span: usize,
    pub col_span: usize,
}

impl Footprint {
    pub fn new(origin: Position, row_span: usize, col_span: usize) -> Self {
        Self {
            origin,
            row_span,
            col_span,
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        (self.origin.row..self.origin.row.saturating_add(self.row_span)).contains(&pos.row)
            && (self.origin.col..self.origin.col.saturating_add(self.col_span)).contains(&pos.col)
    }

    /// Every position covered, in row-major order
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (self.origin.row..self.origin.row + self.row_span).flat_map(move |row| {
            (self.origin.col..self.origin.col + self.col_span).map(move |col| Position::new(row, col))
        })
    }

    pub fn area(&self) -> usize {
        self.row_span.saturating_mul(self.col_span)
    }

    /// Whether the footprint lies inside a `rows` x `cols` grid.
    /// Coordinates that overflow never fit.
    pub fn fits(&self, rows: usize, cols: usize) -> bool {
        let bottom = self.origin.row.checked_add(self.row_span);
        let right = self.origin.col.checked_add(self.col_span);
        matches!((bottom, right), (Some(bottom), Some(right)) if bottom <= rows && right <= cols)
    }
}

/// Pixel rectangle of one anchor cell on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub footprint: Footprint,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Per-axis unit cell size for a canvas, leaving `spacing` between cells
pub fn unit_cell_size(canvas: (u32, u32), rows: usize, cols: usize, spacing: u32) -> (u32, u32) {
    let axis = |total: u32, count: usize| {
        let count = count.max(1) as u32;
        let gaps = spacing.saturating_mul(count - 1);
        (total.saturating_sub(gaps) / count).max(1)
    };
    (axis(canvas.0, cols), axis(canvas.1, rows))
}

/// Pixel rectangle of a footprint; spans include the inner gaps
pub fn place(footprint: Footprint, unit: (u32, u32), spacing: u32) -> Placement {
    let offset = |index: usize, size: u32| index as u32 * (size + spacing);
    let extent = |span: usize, size: u32| span as u32 * size + (span as u32 - 1) * spacing;

    Placement {
        footprint,
        x: offset(footprint.origin.col, unit.0),
        y: offset(footprint.origin.row, unit.1),
        width: extent(footprint.col_span, unit.0),
        height: extent(footprint.row_span, unit.1),
    }
}
