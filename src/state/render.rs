//! Render plumbing shared by cells and the grid
//!
//! A [`RenderContext`] bundles the cache and the loader a grid was built
//! with. Cells never scale pixels themselves; every display render goes
//! through `ImageCache::get_or_create` so concurrent requests for the same
//! size are de-duplicated.

use std::sync::Arc;

use crate::asset::{Bitmap, ImageHandle, ImageLoader};
use crate::cache::ImageCache;
use crate::error::{CollageError, DecodeResult, Result};

#[derive(Clone)]
pub struct RenderContext {
    cache: Arc<ImageCache>,
    loader: Arc<dyn ImageLoader>,
}

impl RenderContext {
    pub fn new(cache: Arc<ImageCache>, loader: Arc<dyn ImageLoader>) -> Self {
        Self { cache, loader }
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    pub fn loader(&self) -> &Arc<dyn ImageLoader> {
        &self.loader
    }

    /// Cached display render of `handle` fitting `width x height`
    pub fn render(&self, handle: &ImageHandle, width: u32, height: u32) -> DecodeResult<Bitmap> {
        self.cache.get_or_create(handle.id(), width, height, || {
            self.loader.decode_and_scale(handle, width, height)
        })
    }

    /// Full-resolution pixels, bypassing the cache
    pub fn original(&self, handle: &ImageHandle) -> DecodeResult<Bitmap> {
        self.loader.decode_original(handle)
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// A render request that can be carried to a worker thread.
///
/// The job owns everything it needs, so it completes (and populates the
/// cache) even if the requesting cell was merged away or cleared meanwhile.
#[derive(Debug, Clone)]
pub struct RenderJob {
    ctx: RenderContext,
    handle: ImageHandle,
    width: u32,
    height: u32,
}

impl RenderJob {
    pub fn new(ctx: RenderContext, handle: ImageHandle, width: u32, height: u32) -> Self {
        Self {
            ctx,
            handle,
            width,
            height,
        }
    }

    pub fn handle(&self) -> &ImageHandle {
        &self.handle
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Run on the current thread
    pub fn run(&self) -> DecodeResult<Bitmap> {
        self.ctx.render(&self.handle, self.width, self.height)
    }

    /// Run on tokio's blocking pool so the editing thread stays responsive
    pub async fn spawn(self) -> Result<Bitmap> {
        tokio::task::spawn_blocking(move || self.run())
            .await
            .map_err(|e| CollageError::Task(format!("render task join error: {}", e)))?
            .map_err(CollageError::from)
    }
}
