/// Editable collage state
///
/// This module holds everything a collage edit touches:
/// - Grid coordinates and pixel layout (geometry.rs)
/// - Captions and their styling (caption.rs)
/// - Cells and the grid that arranges them (cell.rs, grid.rs)
/// - Commands that mutate the grid (command.rs)
/// - Render plumbing into the image cache (render.rs)
/// - Snapshots and undo/redo history (snapshot.rs, history.rs)
/// - Caption edit sessions (edit.rs)

pub mod caption;
pub mod cell;
pub mod command;
pub mod edit;
pub mod geometry;
pub mod grid;
pub mod history;
pub mod render;
pub mod snapshot;

pub use caption::{Caption, CaptionSlot, CaptionStyle, Color};
pub use cell::{Cell, CellImage};
pub use command::GridCommand;
pub use edit::CaptionEdit;
pub use geometry::{Footprint, Placement, Position};
pub use grid::GridModel;
pub use history::HistoryManager;
pub use render::{RenderContext, RenderJob};
pub use snapshot::HistorySnapshot;
