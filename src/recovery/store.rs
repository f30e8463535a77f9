//! Durable storage for autosave records

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

const FILE_PREFIX: &str = "collage_autosave_";
const FILE_SUFFIX: &str = ".json";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Where autosave bytes live
pub trait RecoveryStore: Send + Sync {
    /// Directory or URI shown in error messages
    fn location(&self) -> &Path;

    /// Persist a new record atomically; returns where it landed
    fn write(&self, bytes: &[u8]) -> io::Result<PathBuf>;

    /// Newest record, if any
    fn latest(&self) -> io::Result<Option<PathBuf>>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Delete all but the `keep` newest records; returns how many went
    fn prune(&self, keep: usize) -> io::Result<usize>;

    /// Move an unreadable record aside so it is kept but never loaded again
    fn backup_corrupt(&self, path: &Path) -> io::Result<PathBuf>;
}

/// Timestamped JSON files in one directory
#[derive(Debug, Clone)]
pub struct FsRecoveryStore {
    dir: PathBuf,
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl FsRecoveryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&self) -> PathBuf {
        self.free_path(&Utc::now().format(TIMESTAMP_FORMAT).to_string())
    }

    /// First unused name for `stamp`. Collision counters are zero padded so
    /// names keep sorting in write order.
    fn free_path(&self, stamp: &str) -> PathBuf {
        let mut path = self.dir.join(format!("{}{}{}", FILE_PREFIX, stamp, FILE_SUFFIX));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}{}_{:03}{}", FILE_PREFIX, stamp, n, FILE_SUFFIX));
            n += 1;
        }
        path
    }

    /// Record files, oldest first. Names embed the timestamp so they sort.
    pub fn records(&self) -> io::Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut records: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_SUFFIX))
                        .unwrap_or(false)
            })
            .collect();
        records.sort();
        Ok(records)
    }
}

impl RecoveryStore for FsRecoveryStore {
    fn location(&self) -> &Path {
        &self.dir
    }

    fn write(&self, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.next_path();
        let tmp = append_suffix(&path, ".tmp");

        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        debug!(path = %path.display(), "wrote recovery record");
        Ok(path)
    }

    fn latest(&self) -> io::Result<Option<PathBuf>> {
        Ok(self.records()?.pop())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn prune(&self, keep: usize) -> io::Result<usize> {
        let records = self.records()?;
        let excess = records.len().saturating_sub(keep);
        let mut removed = 0;
        for old in &records[..excess] {
            match fs::remove_file(old) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %old.display(), error = %e, "could not remove old autosave"),
            }
        }
        Ok(removed)
    }

    fn backup_corrupt(&self, path: &Path) -> io::Result<PathBuf> {
        let backup = append_suffix(path, ".corrupt");
        fs::rename(path, &backup)?;
        warn!(backup = %backup.display(), "moved corrupt recovery record aside");
        Ok(backup)
    }
}
