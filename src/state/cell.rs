//! One grid slot
//!
//! A cell references the original, full-resolution [`ImageHandle`] and
//! nothing else. Display renders live in the image cache keyed by size, and
//! export reads the original through the loader, so a downscaled render can
//! never be mistaken for the source.

use std::path::{Path, PathBuf};

use super::caption::{Caption, CaptionSlot};
use super::render::{RenderContext, RenderJob};
use crate::asset::{Bitmap, ImageHandle};
use crate::error::{CollageError, Result};

/// Image state of a cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellImage {
    #[default]
    Empty,
    Loaded(ImageHandle),
    /// A recovered reference whose source could not be re-resolved.
    /// Renders as a placeholder; the path is kept so the user can relink it.
    Broken { source: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    row_span: usize,
    col_span: usize,
    image: CellImage,
    pub top_caption: Option<Caption>,
    pub bottom_caption: Option<Caption>,
    pub selected: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self::new()
    }
}

impl Cell {
    /// Empty 1x1 cell
    pub fn new() -> Self {
        Self {
            row_span: 1,
            col_span: 1,
            image: CellImage::Empty,
            top_caption: None,
            bottom_caption: None,
            selected: false,
        }
    }

    pub fn with_span(row_span: usize, col_span: usize) -> Result<Self> {
        let mut cell = Self::new();
        cell.set_span(row_span, col_span)?;
        Ok(cell)
    }

    pub fn span(&self) -> (usize, usize) {
        (self.row_span, self.col_span)
    }

    pub fn is_merged(&self) -> bool {
        self.row_span > 1 || self.col_span > 1
    }

    pub(crate) fn set_span(&mut self, row_span: usize, col_span: usize) -> Result<()> {
        if row_span == 0 || col_span == 0 {
            return Err(CollageError::IncompatibleSpan(format!(
                "span must be at least 1x1, got {}x{}",
                row_span, col_span
            )));
        }
        self.row_span = row_span;
        self.col_span = col_span;
        Ok(())
    }

    // ========== Image ==========

    /// Replace the image with an original, full-resolution handle
    pub fn set_image(&mut self, handle: ImageHandle) {
        self.image = CellImage::Loaded(handle);
    }

    pub fn clear_image(&mut self) {
        self.image = CellImage::Empty;
    }

    /// Keep a reference to a source that could not be loaded
    pub fn mark_broken(&mut self, source: impl Into<PathBuf>) {
        self.image = CellImage::Broken {
            source: source.into(),
        };
    }

    pub fn image(&self) -> Option<&ImageHandle> {
        match &self.image {
            CellImage::Loaded(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn image_state(&self) -> &CellImage {
        &self.image
    }

    pub(crate) fn take_image(&mut self) -> CellImage {
        std::mem::take(&mut self.image)
    }

    pub(crate) fn put_image(&mut self, image: CellImage) {
        self.image = image;
    }

    /// Source path of the image, loaded or broken
    pub fn source_path(&self) -> Option<&Path> {
        match &self.image {
            CellImage::Empty => None,
            CellImage::Loaded(handle) => Some(handle.source()),
            CellImage::Broken { source } => Some(source),
        }
    }

    /// No usable image (a broken reference counts as empty)
    pub fn is_empty(&self) -> bool {
        self.image().is_none()
    }

    pub fn is_broken(&self) -> bool {
        matches!(self.image, CellImage::Broken { .. })
    }

    /// Display render at `width x height`, served from the cache
    pub fn render_at(&self, ctx: &RenderContext, width: u32, height: u32) -> Result<Option<Bitmap>> {
        match self.image() {
            Some(handle) => Ok(Some(ctx.render(handle, width, height)?)),
            None => Ok(None),
        }
    }

    /// Render request to run on a worker thread
    pub fn render_job(&self, ctx: &RenderContext, width: u32, height: u32) -> Option<RenderJob> {
        self.image()
            .map(|handle| RenderJob::new(ctx.clone(), handle.clone(), width, height))
    }

    /// Full-resolution pixels for export; never read from the cache
    pub fn original(&self, ctx: &RenderContext) -> Result<Option<Bitmap>> {
        match self.image() {
            Some(handle) => Ok(Some(ctx.original(handle)?)),
            None => Ok(None),
        }
    }

    // ========== Captions ==========

    pub fn caption(&self, slot: CaptionSlot) -> Option<&Caption> {
        match slot {
            CaptionSlot::Top => self.top_caption.as_ref(),
            CaptionSlot::Bottom => self.bottom_caption.as_ref(),
        }
    }

    pub fn caption_mut(&mut self, slot: CaptionSlot) -> &mut Option<Caption> {
        match slot {
            CaptionSlot::Top => &mut self.top_caption,
            CaptionSlot::Bottom => &mut self.bottom_caption,
        }
    }

    pub fn set_caption(&mut self, slot: CaptionSlot, caption: Option<Caption>) {
        *self.caption_mut(slot) = caption;
    }

    // ========== Merge / split ==========

    /// Become the anchor of a merged `row_span x col_span` block, keeping this
    /// cell's image and captions. The grid checks that the block is a
    /// rectangle before calling this.
    pub fn merge_with(&mut self, row_span: usize, col_span: usize) -> Result<()> {
        if row_span < self.row_span || col_span < self.col_span {
            return Err(CollageError::IncompatibleSpan(format!(
                "cannot merge a {}x{} cell into a smaller {}x{} block",
                self.row_span, self.col_span, row_span, col_span
            )));
        }
        self.set_span(row_span, col_span)
    }

    /// Unit cells replacing this anchor, in row-major order. All start empty.
    pub fn split(&self) -> Vec<Cell> {
        (0..self.row_span * self.col_span).map(|_| Cell::new()).collect()
    }
}
