use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opaque identity of one loaded image asset.
///
/// Two handles with equal ids are interchangeable: they name the same file
/// with the same content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(Arc<str>);

impl ImageId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Derive an id from a canonical source path and a content fingerprint
    pub fn derive(canonical_path: &Path, fingerprint: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(canonical_path.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(fingerprint.as_bytes());
        Self::new(hasher.finalize().to_hex().as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable identity and metadata for one loaded image.
///
/// Handles carry no pixels. Cells hold handles; pixels come from the cache
/// (display renders) or straight from the loader (originals for export).
#[derive(Debug, Clone)]
pub struct ImageHandle {
    id: ImageId,
    source: Arc<PathBuf>,
    fingerprint: Arc<str>,
    native_width: u32,
    native_height: u32,
    loaded_at: DateTime<Utc>,
}

impl ImageHandle {
    pub fn new(
        id: ImageId,
        source: PathBuf,
        fingerprint: impl Into<Arc<str>>,
        native_width: u32,
        native_height: u32,
    ) -> Self {
        Self {
            id,
            source: Arc::new(source),
            fingerprint: fingerprint.into(),
            native_width,
            native_height,
            loaded_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &ImageId {
        &self.id
    }

    /// Canonical path the image was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Content hash of the file at load time
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn native_size(&self) -> (u32, u32) {
        (self.native_width, self.native_height)
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ImageHandle {}
