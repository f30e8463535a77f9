/// In-memory render cache
///
/// Scaled renders are keyed by `(image identity, target width, target height)`
/// so a cell never receives a bitmap computed for a different size.
/// - LRU eviction under a byte budget (image_cache.rs)
/// - Single-flight coordination of concurrent loads (flight.rs)

pub mod flight;
pub mod image_cache;

pub use image_cache::{CacheEntry, CacheKey, CacheStats, ImageCache};

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Cache state is only mutated in short critical sections that leave it
/// consistent, so a poisoned lock carries no torn data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
