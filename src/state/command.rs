//! Grid edits as explicit commands
//!
//! UI layers translate their events into [`GridCommand`]s instead of poking
//! at cells directly. `GridModel::apply` validates each command before it
//! mutates anything.

use super::caption::{Caption, CaptionSlot};
use super::geometry::Position;
use crate::asset::ImageHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum GridCommand {
    PlaceImage {
        pos: Position,
        handle: ImageHandle,
    },
    ClearImage {
        pos: Position,
    },
    /// Exchange images and captions between two anchors
    SwapImages {
        a: Position,
        b: Position,
    },
    Merge {
        positions: Vec<Position>,
    },
    MergeSelected,
    Split {
        pos: Position,
    },
    Resize {
        rows: usize,
        cols: usize,
    },
    SetSpacing {
        px: u32,
    },
    SetCaption {
        pos: Position,
        slot: CaptionSlot,
        caption: Option<Caption>,
    },
    SetCaptionVisible {
        pos: Position,
        slot: CaptionSlot,
        visible: bool,
    },
    Select {
        pos: Position,
        selected: bool,
    },
    ClearSelection,
    /// Reset every cell to empty and remove all merges
    Clear,
}

impl GridCommand {
    /// Whether this is a logical user mutation that belongs in undo history.
    /// Selection changes are not.
    pub fn records_history(&self) -> bool {
        !matches!(self, GridCommand::Select { .. } | GridCommand::ClearSelection)
    }

    /// Short human-readable name, used as the undo label
    pub fn label(&self) -> &'static str {
        match self {
            GridCommand::PlaceImage { .. } => "Place image",
            GridCommand::ClearImage { .. } => "Clear image",
            GridCommand::SwapImages { .. } => "Swap images",
            GridCommand::Merge { .. } | GridCommand::MergeSelected => "Merge cells",
            GridCommand::Split { .. } => "Split cell",
            GridCommand::Resize { .. } => "Resize grid",
            GridCommand::SetSpacing { .. } => "Change spacing",
            GridCommand::SetCaption { .. } => "Edit caption",
            GridCommand::SetCaptionVisible { .. } => "Toggle caption",
            GridCommand::Select { .. } | GridCommand::ClearSelection => "Select",
            GridCommand::Clear => "Clear collage",
        }
    }
}
