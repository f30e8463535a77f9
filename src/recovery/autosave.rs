//! Autosave scheduling, writing and startup recovery

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::record::RecoveryRecord;
use super::serializer;
use super::store::{FsRecoveryStore, RecoveryStore};
use crate::config::EditorConfig;
use crate::error::{CollageError, Result};
use crate::state::{CaptionStyle, GridModel, RenderContext};

/// Decides when an autosave is due: after `interval` or after
/// `every_mutations` changes, whichever comes first. Nothing is due while
/// there are no unsaved changes.
#[derive(Debug, Clone)]
pub struct AutosaveTrigger {
    interval: Duration,
    every_mutations: u32,
    last_save: Instant,
    pending: u32,
    /// State before the last `mark_saved`, restored if that save fails
    last_flush: Option<(Instant, u32)>,
}

impl AutosaveTrigger {
    /// `every_mutations == 0` disables the count trigger
    pub fn new(interval: Duration, every_mutations: u32, now: Instant) -> Self {
        Self {
            interval,
            every_mutations,
            last_save: now,
            pending: 0,
            last_flush: None,
        }
    }

    pub fn from_config(config: &EditorConfig, now: Instant) -> Self {
        Self::new(config.autosave_interval(), config.autosave_every_mutations, now)
    }

    pub fn note_mutation(&mut self) {
        self.pending = self.pending.saturating_add(1);
    }

    pub fn pending_mutations(&self) -> u32 {
        self.pending
    }

    pub fn is_due(&self, now: Instant) -> bool {
        if self.pending == 0 {
            return false;
        }
        let by_count = self.every_mutations > 0 && self.pending >= self.every_mutations;
        let by_time = now.saturating_duration_since(self.last_save) >= self.interval;
        by_count || by_time
    }

    pub fn mark_saved(&mut self, now: Instant) {
        self.last_flush = Some((self.last_save, self.pending));
        self.last_save = now;
        self.pending = 0;
    }

    /// Undo the last `mark_saved` after its write failed. Changes made since
    /// then stay counted, so the trigger is due again right away.
    pub fn mark_failed(&mut self) {
        if let Some((last_save, pending)) = self.last_flush.take() {
            self.last_save = last_save;
            self.pending = self.pending.saturating_add(pending.max(1));
        }
    }
}

/// Outcome of looking for a record at startup
#[derive(Debug)]
pub enum Recovery {
    Recovered {
        grid: GridModel,
        captions: CaptionStyle,
        source: PathBuf,
    },
    NoRecord,
    /// The newest record was unreadable. It was moved to `backup` and an
    /// empty grid built from the config stands in.
    Corrupt {
        backup: PathBuf,
        reason: String,
        grid: GridModel,
    },
}

/// Writes records with bounded retries and recovers the newest one
#[derive(Clone)]
pub struct Autosaver {
    store: Arc<dyn RecoveryStore>,
    keep: usize,
    attempts: u32,
    backoff: Duration,
}

impl Autosaver {
    pub fn new(store: Arc<dyn RecoveryStore>, config: &EditorConfig) -> Self {
        Self {
            store,
            keep: config.max_autosave_files,
            attempts: config.autosave_write_attempts.max(1),
            backoff: config.autosave_backoff(),
        }
    }

    /// Filesystem store in the configured autosave directory
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(Arc::new(FsRecoveryStore::new(config.autosave_dir())), config)
    }

    pub fn with_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecoveryStore> {
        &self.store
    }

    /// Write `record` now, retrying with exponential backoff. Blocks for the
    /// backoff; use [`Autosaver::save_in_background`] from the editing thread.
    pub fn save_now(&self, record: &RecoveryRecord) -> Result<PathBuf> {
        let bytes = record.to_json()?.into_bytes();
        let mut attempt = 1;
        loop {
            match self.store.write(&bytes) {
                Ok(path) => {
                    info!(path = %path.display(), "autosaved state");
                    if self.keep > 0 {
                        if let Err(e) = self.store.prune(self.keep) {
                            warn!(error = %e, "autosave cleanup failed");
                        }
                    }
                    return Ok(path);
                }
                Err(e) if attempt < self.attempts => {
                    let delay = self.backoff.saturating_mul(1 << (attempt - 1).min(16));
                    warn!(
                        attempt,
                        attempts = self.attempts,
                        error = %e,
                        retry_in = ?delay,
                        "autosave attempt failed"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts = attempt, error = %e, "autosave failed");
                    return Err(CollageError::StorageWriteFailure {
                        path: self.store.location().to_path_buf(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// Write on tokio's blocking pool. The record was captured synchronously,
    /// so the grid can keep changing while this runs. Must be called from
    /// within a tokio runtime.
    pub fn save_in_background(&self, record: RecoveryRecord) -> JoinHandle<Result<PathBuf>> {
        let saver = self.clone();
        tokio::task::spawn_blocking(move || saver.save_now(&record))
    }

    /// Load the newest record, if any
    pub fn recover_latest(&self, ctx: RenderContext, config: &EditorConfig) -> Result<Recovery> {
        let Some(path) = self.store.latest()? else {
            return Ok(Recovery::NoRecord);
        };
        let bytes = self.store.read(&path)?;

        let parsed = RecoveryRecord::from_slice(&bytes)
            .and_then(|record| serializer::deserialize(&record, ctx.clone()));
        match parsed {
            Ok((grid, captions)) => Ok(Recovery::Recovered {
                grid,
                captions,
                source: path,
            }),
            Err(CollageError::RecoveryCorrupt(reason)) => {
                warn!(path = %path.display(), %reason, "recovery record is corrupt");
                let backup = self.store.backup_corrupt(&path)?;
                Ok(Recovery::Corrupt {
                    backup,
                    reason,
                    grid: GridModel::from_config(config, ctx)?,
                })
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for Autosaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autosaver")
            .field("location", &self.store.location())
            .field("keep", &self.keep)
            .field("attempts", &self.attempts)
            .field("backoff", &self.backoff)
            .finish()
    }
}
