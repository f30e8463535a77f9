//! Test doubles shared by unit tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::asset::{Bitmap, ImageHandle, ImageId, ImageLoader, PathValidator};
use crate::cache::ImageCache;
use crate::error::{DecodeFailure, DecodeResult, Result};
use crate::state::RenderContext;

/// Handle for an in-memory image named `name`
pub fn handle(name: &str, width: u32, height: u32) -> ImageHandle {
    ImageHandle::new(
        ImageId::new(name),
        Path::new("/fake").join(name),
        format!("fp-{}", name),
        width,
        height,
    )
}

/// Largest size with the native aspect ratio that fits the target box
pub fn fit(native: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (nw, nh) = (native.0.max(1) as u64, native.1.max(1) as u64);
    let (tw, th) = (target.0 as u64, target.1 as u64);
    if nw * th > nh * tw {
        (tw as u32, (nh * tw / nw).max(1) as u32)
    } else {
        ((nw * th / nh).max(1) as u32, th as u32)
    }
}

/// Loader that synthesizes solid bitmaps and counts decode calls.
///
/// `load` succeeds for paths registered with [`FakeLoader::with_file`].
#[derive(Default)]
pub struct FakeLoader {
    files: Mutex<HashMap<PathBuf, (u32, u32)>>,
    failing: Mutex<HashSet<ImageId>>,
    scale_calls: AtomicUsize,
    original_calls: AtomicUsize,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        self.files.lock().unwrap().insert(path.into(), (width, height));
        self
    }

    pub fn fail(&self, id: &ImageId) {
        self.failing.lock().unwrap().insert(id.clone());
    }

    pub fn scale_calls(&self) -> usize {
        self.scale_calls.load(Ordering::SeqCst)
    }

    pub fn original_calls(&self) -> usize {
        self.original_calls.load(Ordering::SeqCst)
    }

    fn check(&self, handle: &ImageHandle) -> DecodeResult<()> {
        if self.failing.lock().unwrap().contains(handle.id()) {
            return Err(DecodeFailure::new(Some(handle.source().to_path_buf()), "corrupt"));
        }
        Ok(())
    }
}

impl ImageLoader for FakeLoader {
    fn load(&self, path: &Path) -> DecodeResult<ImageHandle> {
        let files = self.files.lock().unwrap();
        let (width, height) = files
            .get(path)
            .copied()
            .ok_or_else(|| DecodeFailure::new(Some(path.to_path_buf()), "no such file"))?;
        let name = path.to_string_lossy().to_string();
        Ok(ImageHandle::new(ImageId::new(name.as_str()), path.to_path_buf(), name, width, height))
    }

    fn decode_and_scale(&self, handle: &ImageHandle, width: u32, height: u32) -> DecodeResult<Bitmap> {
        self.scale_calls.fetch_add(1, Ordering::SeqCst);
        self.check(handle)?;
        let (w, h) = fit(handle.native_size(), (width, height));
        Ok(Bitmap::filled(w, h, [128, 64, 32, 255]))
    }

    fn decode_original(&self, handle: &ImageHandle) -> DecodeResult<Bitmap> {
        self.original_calls.fetch_add(1, Ordering::SeqCst);
        self.check(handle)?;
        let (w, h) = handle.native_size();
        Ok(Bitmap::filled(w, h, [128, 64, 32, 255]))
    }
}

/// Render context over a fresh cache and the given fake loader
pub fn context_with(loader: Arc<FakeLoader>) -> RenderContext {
    RenderContext::new(Arc::new(ImageCache::new(64 << 20)), loader)
}

pub fn context() -> RenderContext {
    context_with(Arc::new(FakeLoader::new()))
}

/// Validator that accepts every path unchanged
pub struct AcceptAll;

impl PathValidator for AcceptAll {
    fn validate_input(&self, path: &Path) -> Result<PathBuf> {
        Ok(path.to_path_buf())
    }

    fn validate_output(&self, path: &Path) -> Result<PathBuf> {
        Ok(path.to_path_buf())
    }
}
