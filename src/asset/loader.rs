//! Image loading and scaling
//!
//! [`ImageLoader`] is the seam between the grid engine and the codec stack.
//! The engine never decodes pixels itself: display renders go through the
//! image cache, which calls [`ImageLoader::decode_and_scale`] on a miss, and
//! export of originals calls [`ImageLoader::decode_original`] directly.

use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{Bitmap, ImageHandle, ImageId};
use crate::error::DecodeFailure;

pub trait ImageLoader: Send + Sync {
    /// Resolve a file into a handle (identity + metadata, no pixels kept)
    fn load(&self, path: &Path) -> Result<ImageHandle, DecodeFailure>;

    /// Decode the asset and scale it to fit within `width x height`,
    /// preserving its aspect ratio
    fn decode_and_scale(
        &self,
        handle: &ImageHandle,
        width: u32,
        height: u32,
    ) -> Result<Bitmap, DecodeFailure>;

    /// Decode the asset at its native resolution
    fn decode_original(&self, handle: &ImageHandle) -> Result<Bitmap, DecodeFailure>;
}

/// Loader backed by the filesystem and the `image` crate
#[derive(Debug, Clone)]
pub struct FsImageLoader {
    filter: FilterType,
}

impl Default for FsImageLoader {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }
}

impl FsImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a cheaper resampling filter (e.g. `Triangle` for quick previews)
    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }

    fn open(&self, handle: &ImageHandle) -> Result<DynamicImage, DecodeFailure> {
        image::open(handle.source())
            .map_err(|e| DecodeFailure::new(Some(handle.source().to_path_buf()), e.to_string()))
    }
}

impl ImageLoader for FsImageLoader {
    fn load(&self, path: &Path) -> Result<ImageHandle, DecodeFailure> {
        let failure = |reason: String| DecodeFailure::new(Some(path.to_path_buf()), reason);

        let canonical: PathBuf = path.canonicalize().map_err(|e| failure(e.to_string()))?;
        let bytes = std::fs::read(&canonical).map_err(|e| failure(e.to_string()))?;

        // Header-only read; full decode happens lazily per render size
        let (width, height) = image::image_dimensions(&canonical).map_err(|e| failure(e.to_string()))?;

        let fingerprint = blake3::hash(&bytes).to_hex().to_string();
        let id = ImageId::derive(&canonical, &fingerprint);

        debug!(path = %canonical.display(), width, height, %id, "loaded image handle");

        Ok(ImageHandle::new(id, canonical, fingerprint, width, height))
    }

    fn decode_and_scale(
        &self,
        handle: &ImageHandle,
        width: u32,
        height: u32,
    ) -> Result<Bitmap, DecodeFailure> {
        if width == 0 || height == 0 {
            return Err(DecodeFailure::new(
                Some(handle.source().to_path_buf()),
                format!("cannot scale to an empty target {}x{}", width, height),
            ));
        }

        let img = self.open(handle)?;

        // Resize maintaining aspect ratio (fits within the target box)
        let scaled = img.resize(width, height, self.filter);
        Ok(Bitmap::new(scaled.to_rgba8()))
    }

    fn decode_original(&self, handle: &ImageHandle) -> Result<Bitmap, DecodeFailure> {
        let img = self.open(handle)?;
        Ok(Bitmap::new(img.to_rgba8()))
    }
}
