//! Thread-safe LRU cache of scaled renders
//!
//! The cache is an explicitly constructed instance shared through an `Arc`;
//! there is no global cache. Loaders run outside the state lock, so decoding
//! one image never blocks lookups or inserts for other keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::{debug, info, warn};

use super::flight::{FlightResult, InFlight};
use super::lock;
use crate::asset::{Bitmap, ImageId};
use crate::error::DecodeFailure;

/// Composite key: image identity plus the target render box
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub image: ImageId,
    pub width: u32,
    pub height: u32,
}

impl CacheKey {
    pub fn new(image: ImageId, width: u32, height: u32) -> Self {
        Self {
            image,
            width,
            height,
        }
    }
}

/// One cached render. Owned by the cache; callers only get `Bitmap` clones,
/// which are read-only.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub bitmap: Bitmap,
    pub byte_size: usize,
    pub last_access_sequence: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Callers that waited on another caller's in-flight load
    pub coalesced: u64,
    pub evictions: u64,
    pub entries: usize,
    pub bytes: usize,
}

struct CacheState {
    /// Recency order lives in the LRU list; byte accounting is ours
    entries: LruCache<CacheKey, CacheEntry>,
    next_sequence: u64,
    total_bytes: usize,
    /// Bumped by `invalidate` so loads started before it are not inserted
    epochs: HashMap<ImageId, u64>,
    stats: CacheStats,
}

impl CacheState {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            next_sequence: 0,
            total_bytes: 0,
            epochs: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    fn epoch(&self, image: &ImageId) -> u64 {
        self.epochs.get(image).copied().unwrap_or(0)
    }

    /// Mark `key` most recently used and return its bitmap
    fn touch(&mut self, key: &CacheKey) -> Option<Bitmap> {
        let sequence = self.bump();
        let entry = self.entries.get_mut(key)?;
        entry.last_access_sequence = sequence;
        Some(entry.bitmap.clone())
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.byte_size);
        Some(entry)
    }

    fn insert(&mut self, key: CacheKey, bitmap: Bitmap) {
        self.remove(&key);

        let sequence = self.bump();
        let byte_size = bitmap.byte_size();
        self.total_bytes = self.total_bytes.saturating_add(byte_size);
        self.entries.put(
            key.clone(),
            CacheEntry {
                key,
                bitmap,
                byte_size,
                last_access_sequence: sequence,
            },
        );
    }

    /// Evict least-recently-used entries until `total_bytes <= budget`.
    /// `keep` is never evicted; eviction stops when it is the only entry left.
    fn evict_to(&mut self, budget: usize, keep: Option<&CacheKey>) -> usize {
        let mut evicted = 0;
        let mut kept = None;

        while self.total_bytes > budget {
            let Some((key, entry)) = self.entries.pop_lru() else {
                break;
            };

            if Some(&key) == keep {
                kept = Some((key, entry));
                continue;
            }

            self.total_bytes = self.total_bytes.saturating_sub(entry.byte_size);
            debug!(
                image = %key.image,
                width = key.width,
                height = key.height,
                bytes = entry.byte_size,
                "evicted cached render"
            );
            evicted += 1;
        }

        // `keep` is the newest entry, so it goes back at the head
        if let Some((key, entry)) = kept {
            self.entries.put(key, entry);
        }

        self.stats.evictions += evicted as u64;
        evicted
    }
}

pub struct ImageCache {
    budget_bytes: usize,
    state: Mutex<CacheState>,
    in_flight: Mutex<HashMap<CacheKey, Arc<InFlight>>>,
}

impl ImageCache {
    /// Create a cache bounded by `budget_bytes` of pixel data
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            budget_bytes,
            state: Mutex::new(CacheState::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget_bytes
    }

    /// Return the render for `(image, width, height)`, loading it on a miss.
    ///
    /// Concurrent callers for the same key share a single `loader` call; the
    /// loser callers block until the winner's result is available. A failed
    /// load is returned to every waiter and nothing is cached.
    pub fn get_or_create<F>(
        &self,
        image: &ImageId,
        width: u32,
        height: u32,
        loader: F,
    ) -> Result<Bitmap, DecodeFailure>
    where
        F: FnOnce() -> Result<Bitmap, DecodeFailure>,
    {
        let key = CacheKey::new(image.clone(), width, height);

        if let Some(bitmap) = self.lookup(&key) {
            return Ok(bitmap);
        }

        let (flight, is_owner) = self.join_in_flight(&key);
        if !is_owner {
            lock(&self.state).stats.coalesced += 1;
            return flight.wait();
        }

        let guard = FlightGuard {
            cache: self,
            key: &key,
            flight,
            done: false,
        };

        // A previous owner may have inserted between our lookup and join
        if let Some(bitmap) = self.lookup(&key) {
            guard.complete(Ok(bitmap.clone()));
            return Ok(bitmap);
        }

        let epoch = {
            let mut state = lock(&self.state);
            state.stats.misses += 1;
            state.epoch(image)
        };

        let result = loader().and_then(|bitmap| {
            if bitmap.fits_within(width, height) {
                Ok(bitmap)
            } else {
                Err(DecodeFailure::new(
                    None,
                    format!(
                        "loader produced {}x{} for a {}x{} target",
                        bitmap.width(),
                        bitmap.height(),
                        width,
                        height
                    ),
                ))
            }
        });

        match &result {
            Ok(bitmap) => self.store(key.clone(), bitmap.clone(), epoch),
            Err(e) => warn!(image = %image, error = %e, "render failed, nothing cached"),
        }

        guard.complete(result.clone());
        result
    }

    /// Cached render for `key`, marking it most recently used
    pub fn get(&self, key: &CacheKey) -> Option<Bitmap> {
        self.lookup(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        lock(&self.state).entries.contains(key)
    }

    /// Drop every render of `image`, whatever its size
    pub fn invalidate(&self, image: &ImageId) -> usize {
        let mut state = lock(&self.state);
        *state.epochs.entry(image.clone()).or_insert(0) += 1;

        let doomed: Vec<CacheKey> = state
            .entries
            .iter()
            .map(|(key, _)| key)
            .filter(|key| key.image == *image)
            .cloned()
            .collect();

        for key in &doomed {
            state.remove(key);
        }

        debug!(image = %image, removed = doomed.len(), "invalidated cached renders");
        doomed.len()
    }

    /// Evict down to the configured budget. Returns the number of evictions.
    pub fn cleanup(&self) -> usize {
        self.cleanup_to(self.budget_bytes)
    }

    /// Evict down to an arbitrary byte target (e.g. under memory pressure)
    pub fn cleanup_to(&self, target_bytes: usize) -> usize {
        let evicted = lock(&self.state).evict_to(target_bytes, None);
        if evicted > 0 {
            info!(evicted, target_bytes, "cache cleanup");
        }
        evicted
    }

    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.entries.clear();
        state.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> usize {
        lock(&self.state).total_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let state = lock(&self.state);
        CacheStats {
            entries: state.entries.len(),
            bytes: state.total_bytes,
            ..state.stats
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<Bitmap> {
        let mut state = lock(&self.state);
        let bitmap = state.touch(key);
        if bitmap.is_some() {
            state.stats.hits += 1;
        }
        bitmap
    }

    fn store(&self, key: CacheKey, bitmap: Bitmap, epoch: u64) {
        let mut state = lock(&self.state);

        if state.epoch(&key.image) != epoch {
            debug!(image = %key.image, "discarding render invalidated while loading");
            return;
        }

        state.insert(key.clone(), bitmap);
        state.evict_to(self.budget_bytes, Some(&key));
    }

    fn join_in_flight(&self, key: &CacheKey) -> (Arc<InFlight>, bool) {
        let mut map = lock(&self.in_flight);
        if let Some(existing) = map.get(key) {
            return (Arc::clone(existing), false);
        }

        let flight = Arc::new(InFlight::new());
        map.insert(key.clone(), Arc::clone(&flight));
        (flight, true)
    }

    fn finish_in_flight(&self, key: &CacheKey, flight: &InFlight, result: FlightResult) {
        flight.set(result);
        lock(&self.in_flight).remove(key);
    }
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("budget_bytes", &self.budget_bytes)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Releases waiters even if the loader panics
struct FlightGuard<'a> {
    cache: &'a ImageCache,
    key: &'a CacheKey,
    flight: Arc<InFlight>,
    done: bool,
}

impl FlightGuard<'_> {
    fn complete(mut self, result: FlightResult) {
        self.done = true;
        self.cache.finish_in_flight(self.key, &self.flight, result);
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            let failure = DecodeFailure::new(None, "loader panicked");
            self.cache.finish_in_flight(self.key, &self.flight, Err(failure));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn id(name: &str) -> ImageId {
        ImageId::new(name)
    }

    /// 10x10 RGBA = 400 bytes
    fn small() -> Result<Bitmap, DecodeFailure> {
        Ok(Bitmap::filled(10, 10, [9, 9, 9, 255]))
    }

    #[test]
    fn test_hit_does_not_reload() {
        let cache = ImageCache::new(1 << 20);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let bitmap = cache
                .get_or_create(&id("A.jpg"), 10, 10, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    small()
                })
                .unwrap();
            assert_eq!(bitmap.dimensions(), (10, 10));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (2, 1));
    }

    #[test]
    fn test_sizes_are_separate_entries() {
        let cache = ImageCache::new(64 << 20);

        let small = cache
            .get_or_create(&id("A.jpg"), 800, 600, || Ok(Bitmap::filled(800, 600, [0; 4])))
            .unwrap();
        let large = cache
            .get_or_create(&id("A.jpg"), 1920, 1080, || Ok(Bitmap::filled(1920, 1080, [0; 4])))
            .unwrap();

        assert_eq!(small.dimensions(), (800, 600));
        assert_eq!(large.dimensions(), (1920, 1080));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&CacheKey::new(id("A.jpg"), 800, 600)));
        assert!(cache.contains(&CacheKey::new(id("A.jpg"), 1920, 1080)));
    }

    #[test]
    fn test_oversized_loader_result_rejected() {
        let cache = ImageCache::new(1 << 20);
        let result = cache.get_or_create(&id("A.jpg"), 5, 5, small);
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_load_not_cached() {
        let cache = ImageCache::new(1 << 20);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = cache.get_or_create(&id("broken.jpg"), 10, 10, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DecodeFailure::new(None, "corrupt"))
            });
            assert!(result.is_err());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_evicts_oldest_first() {
        // Room for exactly two 400-byte renders
        let cache = ImageCache::new(800);
        cache.get_or_create(&id("a"), 10, 10, small).unwrap();
        cache.get_or_create(&id("b"), 10, 10, small).unwrap();
        cache.get_or_create(&id("c"), 10, 10, small).unwrap();

        assert!(!cache.contains(&CacheKey::new(id("a"), 10, 10)));
        assert!(cache.contains(&CacheKey::new(id("b"), 10, 10)));
        assert!(cache.contains(&CacheKey::new(id("c"), 10, 10)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_access_resets_recency() {
        let cache = ImageCache::new(800);
        cache.get_or_create(&id("a"), 10, 10, small).unwrap();
        cache.get_or_create(&id("b"), 10, 10, small).unwrap();

        // Touch "a" so "b" becomes the oldest
        assert!(cache.get(&CacheKey::new(id("a"), 10, 10)).is_some());
        cache.get_or_create(&id("c"), 10, 10, small).unwrap();

        assert!(cache.contains(&CacheKey::new(id("a"), 10, 10)));
        assert!(!cache.contains(&CacheKey::new(id("b"), 10, 10)));
    }

    #[test]
    fn test_oversized_entry_survives_alone() {
        let cache = ImageCache::new(100);
        cache.get_or_create(&id("a"), 10, 10, small).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), 400);

        // An explicit cleanup pass honours the budget strictly
        assert_eq!(cache.cleanup(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_large_insert_evicts_everything_older() {
        let cache = ImageCache::new(1000);
        cache.get_or_create(&id("a"), 10, 10, small).unwrap();
        cache.get_or_create(&id("b"), 10, 10, small).unwrap();

        // 20x20 = 1600 bytes, over budget on its own
        cache
            .get_or_create(&id("big"), 20, 20, || Ok(Bitmap::filled(20, 20, [0; 4])))
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&CacheKey::new(id("big"), 20, 20)));
        assert_eq!(cache.total_bytes(), 1600);
        assert_eq!(cache.stats().evictions, 2);

        // the survivor is still the most recent entry
        cache.get_or_create(&id("c"), 10, 10, small).unwrap();
        assert!(!cache.contains(&CacheKey::new(id("big"), 20, 20)));
        assert!(cache.contains(&CacheKey::new(id("c"), 10, 10)));
    }

    #[test]
    fn test_cleanup_to_target() {
        let cache = ImageCache::new(10_000);
        for name in ["a", "b", "c", "d"] {
            cache.get_or_create(&id(name), 10, 10, small).unwrap();
        }

        assert_eq!(cache.cleanup_to(800), 2);
        assert!(cache.contains(&CacheKey::new(id("c"), 10, 10)));
        assert!(cache.contains(&CacheKey::new(id("d"), 10, 10)));
    }

    #[test]
    fn test_invalidate_removes_all_sizes() {
        let cache = ImageCache::new(1 << 20);
        cache.get_or_create(&id("a"), 10, 10, small).unwrap();
        cache
            .get_or_create(&id("a"), 20, 20, || Ok(Bitmap::filled(20, 20, [0; 4])))
            .unwrap();
        cache.get_or_create(&id("b"), 10, 10, small).unwrap();

        assert_eq!(cache.invalidate(&id("a")), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), 400);
    }

    #[test]
    fn test_invalidate_during_load_discards_result() {
        let cache = ImageCache::new(1 << 20);
        cache
            .get_or_create(&id("a"), 10, 10, || {
                cache.invalidate(&id("a"));
                small()
            })
            .unwrap();

        assert!(cache.is_empty());
    }

    #[test]
    fn test_single_flight_under_concurrency() {
        let cache = Arc::new(ImageCache::new(1 << 20));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_create(&id("A.jpg"), 10, 10, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        small()
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn test_loader_runs_outside_lock() {
        let cache = Arc::new(ImageCache::new(1 << 20));
        cache.get_or_create(&id("ready"), 10, 10, small).unwrap();

        // While "slow" is loading, other keys stay reachable
        let result = cache.get_or_create(&id("slow"), 10, 10, || {
            let other = Arc::clone(&cache);
            let lookup = thread::spawn(move || other.get(&CacheKey::new(id("ready"), 10, 10)));
            assert!(lookup.join().unwrap().is_some());
            small()
        });

        assert!(result.is_ok());
    }

    #[test]
    fn test_loaders_for_different_keys_run_concurrently() {
        let cache = Arc::new(ImageCache::new(1 << 20));
        // Each loader only returns once the other one has started
        let both_loading = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["a.jpg", "b.jpg"]
            .into_iter()
            .map(|name| {
                let cache = Arc::clone(&cache);
                let both_loading = Arc::clone(&both_loading);
                thread::spawn(move || {
                    cache.get_or_create(&id(name), 10, 10, || {
                        both_loading.wait();
                        small()
                    })
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_panicking_loader_releases_waiters() {
        let cache = Arc::new(ImageCache::new(1 << 20));

        let panicking = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let _ = cache.get_or_create(&id("a"), 10, 10, || -> Result<Bitmap, DecodeFailure> {
                    panic!("decoder bug")
                });
            })
        };
        assert!(panicking.join().is_err());

        // The key is free again and can be loaded normally
        assert!(cache.get_or_create(&id("a"), 10, 10, small).is_ok());
    }
}
