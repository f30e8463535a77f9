/// Image asset module
///
/// This module handles:
/// - Image identity and metadata (handle.rs)
/// - Shared read-only pixel buffers (bitmap.rs)
/// - Loading, decoding and scaling from disk (loader.rs)
/// - Input/output path policy (validate.rs)
/// - Bulk folder import (import.rs)

pub mod bitmap;
pub mod handle;
pub mod import;
pub mod loader;
pub mod validate;

pub use bitmap::Bitmap;
pub use handle::{ImageHandle, ImageId};
pub use loader::{FsImageLoader, ImageLoader};
pub use validate::{ExtensionValidator, PathValidator};
