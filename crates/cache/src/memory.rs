//! In-memory raster cache with a byte budget and swappable eviction.
//!
//! The cache maps memory cache keys (resource identifier + target size) to
//! decoded rasters. When an insert would exceed the configured byte limit,
//! victims are evicted one at a time according to the configured policy
//! until the new entry fits or the cache is empty.

use crate::key;
use crate::raster::SharedRaster;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

/// Common interface over memory caches and their wrappers.
///
/// Implementations are internally synchronized; all methods take `&self`
/// and are safe to call from any thread.
pub trait MemoryCache: Send + Sync {
    /// Store a raster under `mem_key`.
    ///
    /// Returns `false` if the raster alone exceeds the cache's capacity.
    /// In that case nothing is stored and nothing is evicted; the caller's
    /// handle remains valid and usable.
    fn put(&self, mem_key: &str, image: SharedRaster) -> bool;

    /// Retrieve a raster, refreshing its usage bookkeeping.
    fn get(&self, mem_key: &str) -> Option<SharedRaster>;

    /// Remove a single entry, returning it if present.
    fn remove(&self, mem_key: &str) -> Option<SharedRaster>;

    /// Check for presence without refreshing usage bookkeeping.
    fn contains(&self, mem_key: &str) -> bool;

    /// Snapshot of all keys currently stored.
    ///
    /// Used by collaborators for prefix-based bulk invalidation (removing
    /// every cached size of one resource).
    fn keys(&self) -> Vec<String>;

    /// Remove every entry and reset all eviction bookkeeping.
    fn clear(&self);
}

/// Victim-selection policy for [`BoundedMemoryCache`].
///
/// Ties on the selection metric are broken by insertion order (earliest
/// inserted wins), which keeps eviction deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Evict the entry least recently touched by `get` or `put`.
    Lru,

    /// Evict the earliest-inserted entry, ignoring access order.
    Fifo,

    /// Evict the entry with the fewest `get` hits. The counter starts at
    /// zero when the entry is stored and increments on every `get`.
    LeastFrequentlyUsed,

    /// Evict the entry with the largest individual byte size.
    LargestFirst,

    /// Evict the entry with the oldest last-touched wall-clock timestamp.
    OldestUsed,
}

/// Statistics about memory cache usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryCacheStats {
    /// Number of entries currently stored
    pub entry_count: usize,

    /// Total decoded bytes currently stored
    pub bytes_used: usize,

    /// Configured byte limit
    pub bytes_limit: usize,

    /// Number of cache hits
    pub hits: u64,

    /// Number of cache misses
    pub misses: u64,

    /// Number of entries evicted to make room
    pub evictions: u64,
}

impl MemoryCacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Per-entry bookkeeping.
///
/// All auxiliary eviction data lives next to the raster in one struct so
/// the primary map and the policy metadata can never drift apart.
struct Entry {
    image: SharedRaster,
    size: usize,
    inserted_seq: u64,
    touched_seq: u64,
    touched_at: SystemTime,
    hits: u64,
}

struct CacheState {
    entries: HashMap<String, Entry>,
    bytes_used: usize,
    bytes_limit: usize,
    policy: EvictionPolicy,
    seq: u64,
    stats: MemoryCacheStats,
}

impl CacheState {
    fn new(bytes_limit: usize, policy: EvictionPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            bytes_used: 0,
            bytes_limit,
            policy,
            seq: 0,
            stats: MemoryCacheStats {
                bytes_limit,
                ..Default::default()
            },
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Pick the next victim key under the current policy.
    fn select_victim(&self) -> Option<String> {
        let mut best: Option<(&String, &Entry)> = None;

        for (k, e) in &self.entries {
            let better = match best {
                None => true,
                Some((_, b)) => match self.policy {
                    EvictionPolicy::Lru => {
                        (e.touched_seq, e.inserted_seq) < (b.touched_seq, b.inserted_seq)
                    }
                    EvictionPolicy::Fifo => e.inserted_seq < b.inserted_seq,
                    EvictionPolicy::LeastFrequentlyUsed => {
                        (e.hits, e.inserted_seq) < (b.hits, b.inserted_seq)
                    }
                    EvictionPolicy::LargestFirst => {
                        (e.size, std::cmp::Reverse(e.inserted_seq))
                            > (b.size, std::cmp::Reverse(b.inserted_seq))
                    }
                    EvictionPolicy::OldestUsed => {
                        (e.touched_at, e.inserted_seq) < (b.touched_at, b.inserted_seq)
                    }
                },
            };
            if better {
                best = Some((k, e));
            }
        }

        best.map(|(k, _)| k.clone())
    }

    /// Remove an entry and keep usage and stats in step.
    fn remove_entry(&mut self, mem_key: &str) -> Option<Entry> {
        let entry = self.entries.remove(mem_key)?;
        self.bytes_used = self.bytes_used.saturating_sub(entry.size);
        self.stats.entry_count = self.entries.len();
        self.stats.bytes_used = self.bytes_used;
        Some(entry)
    }

    /// Evict victims until `required` bytes fit within the limit.
    ///
    /// Stops as soon as the cache empties, even if the target was not
    /// reached.
    fn evict_to_fit(&mut self, required: usize) {
        while self.bytes_used + required > self.bytes_limit && !self.entries.is_empty() {
            let Some(victim) = self.select_victim() else {
                break;
            };
            if self.remove_entry(&victim).is_some() {
                self.stats.evictions += 1;
            }
        }
    }
}

/// Byte-bounded memory cache with a configurable eviction policy.
///
/// Thread-safe; all mutations are serialized on an internal lock, so the
/// eviction scan-and-remove sequence is never observable in a half-applied
/// state from outside.
///
/// # Example
///
/// ```
/// use pixload_cache::{BoundedMemoryCache, EvictionPolicy, MemoryCache, Raster};
/// use std::sync::Arc;
///
/// let cache = BoundedMemoryCache::new(32 * 1024 * 1024, EvictionPolicy::Lru);
/// let image = Arc::new(Raster::filled(64, 64, [255, 0, 0, 255]));
///
/// assert!(cache.put("https://example.com/a.png_64x64", image));
/// assert!(cache.get("https://example.com/a.png_64x64").is_some());
/// ```
pub struct BoundedMemoryCache {
    state: Arc<Mutex<CacheState>>,
}

impl BoundedMemoryCache {
    /// Create a cache with the given byte limit and eviction policy.
    pub fn new(bytes_limit: usize, policy: EvictionPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::new(bytes_limit, policy))),
        }
    }

    /// Create a cache with a limit in megabytes.
    pub fn with_mb_limit(megabytes: usize, policy: EvictionPolicy) -> Self {
        Self::new(megabytes * 1024 * 1024, policy)
    }

    /// Get current cache statistics.
    pub fn stats(&self) -> MemoryCacheStats {
        let state = self.state.lock().unwrap();
        state.stats
    }

    /// Current tracked byte usage.
    pub fn bytes_used(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.bytes_used
    }

    /// Configured byte limit.
    pub fn bytes_limit(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.bytes_limit
    }

    /// Number of entries currently stored.
    pub fn entry_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.entries.len()
    }
}

impl MemoryCache for BoundedMemoryCache {
    fn put(&self, mem_key: &str, image: SharedRaster) -> bool {
        let mut state = self.state.lock().unwrap();
        let size = image.byte_size();

        // A single oversized item is never stored; the caller still holds
        // a usable handle.
        if size > state.bytes_limit {
            return false;
        }

        state.remove_entry(mem_key);
        state.evict_to_fit(size);

        let seq = state.next_seq();
        state.bytes_used += size;
        state.entries.insert(
            mem_key.to_string(),
            Entry {
                image,
                size,
                inserted_seq: seq,
                touched_seq: seq,
                touched_at: SystemTime::now(),
                hits: 0,
            },
        );
        state.stats.entry_count = state.entries.len();
        state.stats.bytes_used = state.bytes_used;
        true
    }

    fn get(&self, mem_key: &str) -> Option<SharedRaster> {
        let mut state = self.state.lock().unwrap();
        let seq = state.next_seq();

        if let Some(entry) = state.entries.get_mut(mem_key) {
            entry.touched_seq = seq;
            entry.touched_at = SystemTime::now();
            entry.hits += 1;
            let image = entry.image.clone();
            state.stats.hits += 1;
            Some(image)
        } else {
            state.stats.misses += 1;
            None
        }
    }

    fn remove(&self, mem_key: &str) -> Option<SharedRaster> {
        let mut state = self.state.lock().unwrap();
        state.remove_entry(mem_key).map(|e| e.image)
    }

    fn contains(&self, mem_key: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.entries.contains_key(mem_key)
    }

    fn keys(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.entries.keys().cloned().collect()
    }

    fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.entries.clear();
        state.bytes_used = 0;
        state.stats.entry_count = 0;
        state.stats.bytes_used = 0;
    }
}

/// Age-limit wrapper: entries older than `max_age` are evicted on `get`,
/// forcing a miss and a reload.
///
/// Wraps any [`MemoryCache`]; composition happens at construction time.
pub struct AgeLimitedCache {
    inner: Box<dyn MemoryCache>,
    max_age: Duration,
    inserted_at: Mutex<HashMap<String, Instant>>,
}

impl AgeLimitedCache {
    /// Wrap `inner`, expiring entries `max_age` after insertion.
    pub fn new(inner: Box<dyn MemoryCache>, max_age: Duration) -> Self {
        Self {
            inner,
            max_age,
            inserted_at: Mutex::new(HashMap::new()),
        }
    }
}

impl MemoryCache for AgeLimitedCache {
    fn put(&self, mem_key: &str, image: SharedRaster) -> bool {
        let stored = self.inner.put(mem_key, image);
        let mut ages = self.inserted_at.lock().unwrap();
        if stored {
            ages.insert(mem_key.to_string(), Instant::now());
        } else {
            ages.remove(mem_key);
        }
        stored
    }

    fn get(&self, mem_key: &str) -> Option<SharedRaster> {
        let expired = {
            let mut ages = self.inserted_at.lock().unwrap();
            match ages.get(mem_key) {
                Some(at) if at.elapsed() > self.max_age => {
                    ages.remove(mem_key);
                    true
                }
                Some(_) => false,
                // Entry present in the inner cache but unknown to us
                // (e.g. inserted behind our back): adopt it as fresh.
                None => {
                    if self.inner.contains(mem_key) {
                        ages.insert(mem_key.to_string(), Instant::now());
                    }
                    false
                }
            }
        };

        if expired {
            self.inner.remove(mem_key);
            return None;
        }
        self.inner.get(mem_key)
    }

    fn remove(&self, mem_key: &str) -> Option<SharedRaster> {
        self.inserted_at.lock().unwrap().remove(mem_key);
        self.inner.remove(mem_key)
    }

    fn contains(&self, mem_key: &str) -> bool {
        self.inner.contains(mem_key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    fn clear(&self) {
        self.inserted_at.lock().unwrap().clear();
        self.inner.clear();
    }
}

/// Fuzzy-key wrapper enforcing "one cached size per resource".
///
/// On `put`, any existing entry for the same resource identifier (at any
/// target size) is removed before the new entry is stored.
pub struct SingleSizeCache {
    inner: Box<dyn MemoryCache>,
}

impl SingleSizeCache {
    /// Wrap `inner` with single-size-per-resource semantics.
    pub fn new(inner: Box<dyn MemoryCache>) -> Self {
        Self { inner }
    }
}

impl MemoryCache for SingleSizeCache {
    fn put(&self, mem_key: &str, image: SharedRaster) -> bool {
        for existing in self.inner.keys() {
            if existing != mem_key && key::same_resource(&existing, mem_key) {
                self.inner.remove(&existing);
            }
        }
        self.inner.put(mem_key, image)
    }

    fn get(&self, mem_key: &str) -> Option<SharedRaster> {
        self.inner.get(mem_key)
    }

    fn remove(&self, mem_key: &str) -> Option<SharedRaster> {
        self.inner.remove(mem_key)
    }

    fn contains(&self, mem_key: &str) -> bool {
        self.inner.contains(mem_key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    fn clear(&self) {
        self.inner.clear();
    }
}

/// Remove every cached size of one resource identifier.
///
/// Returns the number of entries removed.
pub fn remove_for_resource(cache: &dyn MemoryCache, resource: &str) -> usize {
    let mut removed = 0;
    for k in cache.keys() {
        if key::resource_of(&k) == resource && cache.remove(&k).is_some() {
            removed += 1;
        }
    }
    removed
}
