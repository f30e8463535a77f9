//! Editing session over one collage
//!
//! [`CollageEditor`] is the entry point a UI drives. It owns the grid, the
//! undo history, the open caption edit (if any) and the autosave trigger,
//! and makes sure each logical change is recorded exactly once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::asset::import::collect_images;
use crate::asset::{ExtensionValidator, ImageHandle, PathValidator};
use crate::config::EditorConfig;
use crate::error::{CollageError, Result};
use crate::recovery::{serializer, AutosaveTrigger, Autosaver, RecoveryRecord};
use crate::state::{
    Caption, CaptionEdit, CaptionSlot, CaptionStyle, GridCommand, GridModel, HistoryManager, Position,
    RenderContext,
};

pub struct CollageEditor {
    config: EditorConfig,
    grid: GridModel,
    history: HistoryManager,
    caption_defaults: CaptionStyle,
    caption_edit: Option<CaptionEdit>,
    autosave: AutosaveTrigger,
    validator: Arc<dyn PathValidator>,
}

impl CollageEditor {
    /// Fresh editor with an empty grid sized from `config`
    pub fn new(config: EditorConfig, ctx: RenderContext) -> Result<Self> {
        let grid = GridModel::from_config(&config, ctx)?;
        Ok(Self::with_grid(config, grid, CaptionStyle::default()))
    }

    /// Editor over an existing grid, e.g. one rebuilt from a recovery record.
    /// The grid becomes the history baseline.
    pub fn with_grid(config: EditorConfig, grid: GridModel, caption_defaults: CaptionStyle) -> Self {
        let history = HistoryManager::with_baseline(config.history_depth, grid.snapshot());
        let autosave = AutosaveTrigger::from_config(&config, Instant::now());
        let validator = Arc::new(ExtensionValidator::new(&config.supported_formats));
        Self {
            config,
            grid,
            history,
            caption_defaults,
            caption_edit: None,
            autosave,
            validator,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn PathValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    /// Canvas size is layout, not content, so it bypasses history
    pub fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.grid.set_canvas_size(width, height);
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn caption_defaults(&self) -> &CaptionStyle {
        &self.caption_defaults
    }

    pub fn set_caption_defaults(&mut self, style: CaptionStyle) {
        self.caption_defaults = style;
        self.autosave.note_mutation();
    }

    fn record(&mut self, label: &str) {
        self.history.record_labeled(self.grid.snapshot(), label);
        self.autosave.note_mutation();
    }

    /// Apply a command. History-worthy commands are recorded once; any open
    /// caption edit is committed first so it stays a separate undo step.
    pub fn apply(&mut self, command: GridCommand) -> Result<()> {
        self.finish_caption_edit()?;

        let label = command.label();
        let records = command.records_history();
        self.grid.apply(command)?;
        if records {
            self.record(label);
        }
        Ok(())
    }

    pub fn undo(&mut self) -> Result<bool> {
        self.finish_caption_edit()?;
        match self.history.undo() {
            Some(snapshot) => {
                self.grid.restore(&snapshot)?;
                self.autosave.note_mutation();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn redo(&mut self) -> Result<bool> {
        self.finish_caption_edit()?;
        match self.history.redo() {
            Some(snapshot) => {
                self.grid.restore(&snapshot)?;
                self.autosave.note_mutation();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ========== Caption editing ==========

    pub fn caption_edit(&self) -> Option<&CaptionEdit> {
        self.caption_edit.as_ref()
    }

    /// Start live-editing the caption in `slot` of the anchor at `pos`
    pub fn begin_caption_edit(&mut self, pos: Position, slot: CaptionSlot, now: Instant) -> Result<()> {
        self.finish_caption_edit()?;
        let original = self.grid.cell(pos)?.caption(slot).cloned();
        self.caption_edit = Some(CaptionEdit::begin(pos, slot, original, now));
        Ok(())
    }

    /// Show `text` immediately without recording history
    pub fn update_caption_text(&mut self, text: &str, now: Instant) -> Result<()> {
        let (pos, slot) = match &self.caption_edit {
            Some(edit) => (edit.pos(), edit.slot()),
            None => return Err(CollageError::NoCaptionEdit),
        };

        let caption = match self.grid.cell(pos)?.caption(slot) {
            Some(existing) => Caption {
                text: text.to_string(),
                ..existing.clone()
            },
            None => Caption::new(text, self.caption_defaults.clone()),
        };
        self.grid.set_caption(pos, slot, Some(caption))?;

        if let Some(edit) = self.caption_edit.as_mut() {
            edit.touch(now);
        }
        Ok(())
    }

    /// End the session, recording one history entry if the caption changed
    pub fn commit_caption_edit(&mut self) -> Result<bool> {
        let edit = self.caption_edit.take().ok_or(CollageError::NoCaptionEdit)?;
        let current = self.grid.cell(edit.pos())?.caption(edit.slot());
        if !edit.changed(current) {
            return Ok(false);
        }
        self.record("Edit caption");
        Ok(true)
    }

    /// End the session and put the original caption back
    pub fn cancel_caption_edit(&mut self) -> Result<()> {
        let edit = self.caption_edit.take().ok_or(CollageError::NoCaptionEdit)?;
        self.grid
            .set_caption(edit.pos(), edit.slot(), edit.original().cloned())
    }

    fn finish_caption_edit(&mut self) -> Result<()> {
        if self.caption_edit.is_some() {
            self.commit_caption_edit()?;
        }
        Ok(())
    }

    /// Periodic tick: commits a caption edit that has gone idle.
    /// Returns whether a commit was recorded.
    pub fn poll(&mut self, now: Instant) -> Result<bool> {
        let idle = self
            .caption_edit
            .as_ref()
            .is_some_and(|edit| edit.is_idle(now, self.config.caption_commit_idle()));
        if idle {
            return self.commit_caption_edit();
        }
        Ok(false)
    }

    // ========== Images ==========

    /// Validate, load and place one image
    pub fn load_into(&mut self, pos: Position, path: &Path) -> Result<ImageHandle> {
        let resolved = self.validator.validate_input(path)?;
        let handle = self.grid.context().loader().load(&resolved)?;
        self.apply(GridCommand::PlaceImage {
            pos,
            handle: handle.clone(),
        })?;
        Ok(handle)
    }

    /// Load every image under `folder` into empty cells in reading order,
    /// as one undo step. Returns how many were placed.
    pub fn import_folder(&mut self, folder: &Path) -> Result<usize> {
        self.finish_caption_edit()?;

        let scan = collect_images(folder, self.validator.as_ref());
        let loader = Arc::clone(self.grid.context().loader());
        let handles: Vec<ImageHandle> = scan
            .accepted
            .iter()
            .filter_map(|path| match loader.load(path) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable image");
                    None
                }
            })
            .collect();

        let placed = self.grid.fill_empty(handles);
        if placed > 0 {
            self.record("Import images");
        }
        info!(folder = %folder.display(), placed, "imported images");
        Ok(placed)
    }

    // ========== Autosave ==========

    pub fn autosave_due(&self, now: Instant) -> bool {
        self.autosave.is_due(now)
    }

    pub fn recovery_record(&self) -> RecoveryRecord {
        serializer::serialize(&self.grid, &self.caption_defaults)
    }

    pub fn mark_autosaved(&mut self, now: Instant) {
        self.autosave.mark_saved(now);
    }

    /// Re-arm the autosave trigger after a background write reported an
    /// error, so the next poll tries again.
    pub fn mark_autosave_failed(&mut self) {
        self.autosave.mark_failed();
    }

    /// If an autosave is due, capture the record now and write it on the
    /// blocking pool. The trigger counts the changes as saved from here on;
    /// when the handle reports an error, call [`Self::mark_autosave_failed`].
    /// The in-memory grid is unaffected either way.
    pub fn autosave_in_background(
        &mut self,
        saver: &Autosaver,
        now: Instant,
    ) -> Option<JoinHandle<Result<PathBuf>>> {
        if !self.autosave_due(now) {
            return None;
        }
        let record = self.recovery_record();
        self.autosave.mark_saved(now);
        Some(saver.save_in_background(record))
    }
}

impl std::fmt::Debug for CollageEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollageEditor")
            .field("grid", &self.grid)
            .field("history", &self.history)
            .field("caption_edit", &self.caption_edit)
            .finish_non_exhaustive()
    }
}
