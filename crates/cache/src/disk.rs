//! Disk cache over a flat directory of files with swappable limit
//! strategies.
//!
//! Files are named by a deterministic hash of the resource key; there is no
//! index file. Existence and mtime on disk are the only persisted metadata.
//! The in-memory timestamp map is a performance cache for entries touched
//! in the current process lifetime, never a source of truth, and tolerates
//! being empty after a restart.

use crate::raster::Raster;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, SystemTime};

/// Extension for cached files, used to skip foreign files when scanning.
const FILE_EXT: &str = "img";

/// Copy buffer size for streaming saves.
const COPY_BUF: usize = 32 * 1024;

/// Common interface over disk caches.
///
/// `get` always returns the deterministic path for a key, whether or not a
/// file exists there; callers check existence themselves.
pub trait DiskCache: Send + Sync {
    /// Deterministic path for a resource key, without touching anything.
    fn path_for(&self, resource_key: &str) -> PathBuf;

    /// Path for a resource key, refreshing its usage timestamp when the
    /// file exists (and applying any lazy expiry).
    fn get(&self, resource_key: &str) -> PathBuf;

    /// Cheap existence check; does not refresh usage.
    fn contains(&self, resource_key: &str) -> bool;

    /// Persist a byte stream under a resource key.
    ///
    /// Returns `Ok(true)` on success. A failed save never leaves a partial
    /// file behind or counted in the usage ledger.
    fn save(&self, resource_key: &str, source: &mut dyn Read) -> io::Result<bool>;

    /// Persist a decoded raster under a resource key (raw RGBA with an
    /// 8-byte width/height header).
    fn save_raster(&self, resource_key: &str, raster: &Raster) -> io::Result<bool>;

    /// Remove the file for a resource key. Returns `true` if one existed.
    fn remove(&self, resource_key: &str) -> bool;

    /// Remove every cached file and reset all bookkeeping.
    fn clear(&self);
}

/// Statistics for monitoring disk cache behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskCacheStats {
    /// Number of `get` calls that found a file
    pub hits: u64,

    /// Number of `get` calls that found nothing
    pub misses: u64,

    /// Number of files evicted to stay within the limit
    pub evictions: u64,

    /// Tracked number of cached files
    pub file_count: usize,

    /// Tracked usage under the configured mode (bytes, or files)
    pub usage: u64,
}

impl DiskCacheStats {
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

/// Deterministic file name for a resource key: truncated SHA-256 hex.
pub fn file_name_for(resource_key: &str) -> String {
    let digest = Sha256::digest(resource_key.as_bytes());
    let mut name = String::with_capacity(32 + 1 + FILE_EXT.len());
    for byte in &digest[..16] {
        name.push_str(&format!("{byte:02x}"));
    }
    name.push('.');
    name.push_str(FILE_EXT);
    name
}

/// Write a stream to `path`, removing the file again on any failure so a
/// truncated write is never left behind.
fn write_stream(path: &Path, source: &mut dyn Read) -> io::Result<u64> {
    let result = (|| {
        let mut file = File::create(path)?;
        let mut buf = [0u8; COPY_BUF];
        let mut written = 0u64;
        loop {
            let n = source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            written += n as u64;
        }
        file.sync_all()?;
        Ok(written)
    })();

    if result.is_err() {
        let _ = fs::remove_file(path);
    }
    result
}

/// Write a raster to `path` in raw form: width/height header + RGBA bytes.
fn write_raster(path: &Path, raster: &Raster) -> io::Result<u64> {
    let result = (|| {
        let mut file = File::create(path)?;
        file.write_all(&raster.width.to_le_bytes())?;
        file.write_all(&raster.height.to_le_bytes())?;
        file.write_all(&raster.pixels)?;
        file.sync_all()?;
        Ok(8 + raster.pixels.len() as u64)
    })();

    if result.is_err() {
        let _ = fs::remove_file(path);
    }
    result
}

/// Read back a raster written by [`DiskCache::save_raster`].
pub fn read_raster(path: &Path) -> io::Result<Raster> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 4];
    file.read_exact(&mut header)?;
    let width = u32::from_le_bytes(header);
    file.read_exact(&mut header)?;
    let height = u32::from_le_bytes(header);

    let expected = width as usize * height as usize * Raster::BYTES_PER_PIXEL;
    let mut pixels = Vec::with_capacity(expected);
    file.read_to_end(&mut pixels)?;
    if pixels.len() != expected {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "raster file payload does not match header dimensions",
        ));
    }
    Ok(Raster::new(width, height, pixels))
}

/// Refresh a file's mtime to now, ignoring failures (the in-memory
/// timestamp map still records the touch for this process lifetime).
fn touch_file(path: &Path) {
    if let Ok(file) = OpenOptions::new().write(true).open(path) {
        let _ = file.set_modified(SystemTime::now());
    }
}

fn remove_dir_files(dir: &Path) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(FILE_EXT) {
                let _ = fs::remove_file(path);
            }
        }
    }
}

/// Disk cache without any limit: files accumulate until removed or cleared.
pub struct UnboundedDiskCache {
    dir: PathBuf,
}

impl UnboundedDiskCache {
    /// Create the cache, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the cached files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DiskCache for UnboundedDiskCache {
    fn path_for(&self, resource_key: &str) -> PathBuf {
        self.dir.join(file_name_for(resource_key))
    }

    fn get(&self, resource_key: &str) -> PathBuf {
        let path = self.path_for(resource_key);
        if path.exists() {
            touch_file(&path);
        }
        path
    }

    fn contains(&self, resource_key: &str) -> bool {
        self.path_for(resource_key).exists()
    }

    fn save(&self, resource_key: &str, source: &mut dyn Read) -> io::Result<bool> {
        write_stream(&self.path_for(resource_key), source)?;
        Ok(true)
    }

    fn save_raster(&self, resource_key: &str, raster: &Raster) -> io::Result<bool> {
        write_raster(&self.path_for(resource_key), raster)?;
        Ok(true)
    }

    fn remove(&self, resource_key: &str) -> bool {
        fs::remove_file(self.path_for(resource_key)).is_ok()
    }

    fn clear(&self) {
        remove_dir_files(&self.dir);
    }
}

/// Which quantity a [`LimitedDiskCache`] bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskLimitMode {
    /// Bound the total bytes on disk.
    TotalSize,

    /// Bound the number of cached files (each file counts as 1).
    FileCount,
}

/// Per-file usage ledger for the limited cache.
struct UsageState {
    /// file name -> last usage timestamp (mtime mirror)
    last_used: HashMap<String, SystemTime>,

    /// file name -> charged size (bytes, or 1 in file-count mode)
    sizes: HashMap<String, u64>,

    stats: DiskCacheStats,
}

/// Size- or count-limited disk cache evicting by oldest usage timestamp.
///
/// The usage ledger is populated by a background directory scan started at
/// construction, so creating the cache does not block on I/O. Until that
/// scan completes the running total may under-report and eviction is held
/// off; [`LimitedDiskCache::wait_ready`] blocks until the scan is done.
pub struct LimitedDiskCache {
    dir: PathBuf,
    limit: u64,
    mode: DiskLimitMode,
    state: Arc<Mutex<UsageState>>,
    total: Arc<AtomicU64>,
    ready: Arc<(Mutex<bool>, Condvar)>,
}

impl LimitedDiskCache {
    /// Create a cache bounding total bytes on disk.
    pub fn with_size_limit<P: AsRef<Path>>(dir: P, max_bytes: u64) -> io::Result<Self> {
        Self::new(dir, max_bytes, DiskLimitMode::TotalSize)
    }

    /// Create a cache bounding the number of files.
    pub fn with_file_count_limit<P: AsRef<Path>>(dir: P, max_files: u64) -> io::Result<Self> {
        Self::new(dir, max_files, DiskLimitMode::FileCount)
    }

    fn new<P: AsRef<Path>>(dir: P, limit: u64, mode: DiskLimitMode) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let cache = Self {
            dir: dir.clone(),
            limit,
            mode,
            state: Arc::new(Mutex::new(UsageState {
                last_used: HashMap::new(),
                sizes: HashMap::new(),
                stats: DiskCacheStats::default(),
            })),
            total: Arc::new(AtomicU64::new(0)),
            ready: Arc::new((Mutex::new(false), Condvar::new())),
        };

        cache.spawn_initial_scan(dir);
        Ok(cache)
    }

    /// Populate the usage ledger from the directory on a background thread.
    fn spawn_initial_scan(&self, dir: PathBuf) {
        let state = Arc::clone(&self.state);
        let total = Arc::clone(&self.total);
        let ready = Arc::clone(&self.ready);
        let mode = self.mode;

        let builder = thread::Builder::new().name("pixload-disk-scan".to_string());
        let spawned = builder.spawn(move || {
            let mut found: Vec<(String, u64, SystemTime)> = Vec::new();
            if let Ok(entries) = fs::read_dir(&dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXT) {
                        continue;
                    }
                    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    if let Ok(meta) = entry.metadata() {
                        let size = match mode {
                            DiskLimitMode::TotalSize => meta.len(),
                            DiskLimitMode::FileCount => 1,
                        };
                        let mtime = meta.modified().unwrap_or_else(|_| SystemTime::now());
                        found.push((name.to_string(), size, mtime));
                    }
                }
            }

            {
                let mut state = state.lock().unwrap();
                for (name, size, mtime) in found {
                    // Files saved while the scan ran are already tracked
                    // with fresher timestamps; keep those.
                    state.sizes.entry(name.clone()).or_insert(size);
                    state.last_used.entry(name).or_insert(mtime);
                }
                let sum: u64 = state.sizes.values().sum();
                total.store(sum, Ordering::SeqCst);
                state.stats.file_count = state.sizes.len();
                state.stats.usage = sum;
            }

            let (lock, cvar) = &*ready;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        });
        // If the thread cannot be spawned the ledger starts empty; the
        // cache still works and re-learns files as they are touched.
        if spawned.is_err() {
            let (lock, cvar) = &*self.ready;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }
    }

    /// Block until the initial directory scan has completed.
    pub fn wait_ready(&self) {
        let (lock, cvar) = &*self.ready;
        let mut done = lock.lock().unwrap();
        while !*done {
            done = cvar.wait(done).unwrap();
        }
    }

    fn is_ready(&self) -> bool {
        *self.ready.0.lock().unwrap()
    }

    /// Tracked usage under the configured mode (bytes or files).
    pub fn tracked_usage(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Get current cache statistics.
    pub fn stats(&self) -> DiskCacheStats {
        let state = self.state.lock().unwrap();
        let mut stats = state.stats;
        stats.usage = self.total.load(Ordering::SeqCst);
        stats.file_count = state.sizes.len();
        stats
    }

    fn charge(&self, bytes: u64) -> u64 {
        match self.mode {
            DiskLimitMode::TotalSize => bytes,
            DiskLimitMode::FileCount => 1,
        }
    }

    /// Record a successful save in the ledger.
    fn record(&self, name: &str, charged: u64) {
        let mut state = self.state.lock().unwrap();
        let old = state.sizes.insert(name.to_string(), charged);
        state.last_used.insert(name.to_string(), SystemTime::now());
        if let Some(old) = old {
            self.total.fetch_sub(old, Ordering::SeqCst);
        }
        self.total.fetch_add(charged, Ordering::SeqCst);
        state.stats.file_count = state.sizes.len();
        state.stats.usage = self.total.load(Ordering::SeqCst);
    }

    /// Drop any ledger entry for a file that no longer exists.
    fn forget(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.last_used.remove(name);
        if let Some(charged) = state.sizes.remove(name) {
            self.total.fetch_sub(charged, Ordering::SeqCst);
        }
        state.stats.file_count = state.sizes.len();
        state.stats.usage = self.total.load(Ordering::SeqCst);
    }

    /// Evict oldest-used files until usage is within the limit.
    ///
    /// Held off until the initial scan completes, since the ledger may
    /// under-report before then. A victim already removed out-of-band has
    /// its bookkeeping dropped silently and the loop continues.
    fn evict_to_limit(&self) {
        if !self.is_ready() {
            return;
        }

        while self.total.load(Ordering::SeqCst) > self.limit {
            let victim = {
                let state = self.state.lock().unwrap();
                state
                    .last_used
                    .iter()
                    .min_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
                    .map(|(name, _)| name.clone())
            };
            let Some(name) = victim else {
                break;
            };

            let path = self.dir.join(&name);
            let existed = path.exists();
            if existed {
                let _ = fs::remove_file(&path);
            }

            self.forget(&name);
            if existed {
                let mut state = self.state.lock().unwrap();
                state.stats.evictions += 1;
            }
        }
    }
}

impl DiskCache for LimitedDiskCache {
    fn path_for(&self, resource_key: &str) -> PathBuf {
        self.dir.join(file_name_for(resource_key))
    }

    fn get(&self, resource_key: &str) -> PathBuf {
        let name = file_name_for(resource_key);
        let path = self.dir.join(&name);

        if path.exists() {
            touch_file(&path);
            let mut state = self.state.lock().unwrap();
            state.last_used.insert(name, SystemTime::now());
            state.stats.hits += 1;
        } else {
            let mut state = self.state.lock().unwrap();
            state.stats.misses += 1;
        }
        path
    }

    fn contains(&self, resource_key: &str) -> bool {
        self.path_for(resource_key).exists()
    }

    fn save(&self, resource_key: &str, source: &mut dyn Read) -> io::Result<bool> {
        let name = file_name_for(resource_key);
        match write_stream(&self.dir.join(&name), source) {
            Ok(written) => {
                self.record(&name, self.charge(written));
                self.evict_to_limit();
                Ok(true)
            }
            Err(e) => {
                // The partial file is already gone; a stale ledger entry
                // for an earlier version must go too.
                self.forget(&name);
                Err(e)
            }
        }
    }

    fn save_raster(&self, resource_key: &str, raster: &Raster) -> io::Result<bool> {
        let name = file_name_for(resource_key);
        match write_raster(&self.dir.join(&name), raster) {
            Ok(written) => {
                self.record(&name, self.charge(written));
                self.evict_to_limit();
                Ok(true)
            }
            Err(e) => {
                self.forget(&name);
                Err(e)
            }
        }
    }

    fn remove(&self, resource_key: &str) -> bool {
        let name = file_name_for(resource_key);
        let removed = fs::remove_file(self.dir.join(&name)).is_ok();
        self.forget(&name);
        removed
    }

    fn clear(&self) {
        remove_dir_files(&self.dir);
        let mut state = self.state.lock().unwrap();
        state.last_used.clear();
        state.sizes.clear();
        self.total.store(0, Ordering::SeqCst);
        state.stats.file_count = 0;
        state.stats.usage = 0;
    }
}

/// Disk cache that expires files by age instead of bounding usage.
///
/// Expiry is lazy: a file older than `max_age` is deleted during `get`,
/// which then behaves like a miss (the returned path does not exist).
pub struct AgeLimitedDiskCache {
    dir: PathBuf,
    max_age: Duration,
}

impl AgeLimitedDiskCache {
    /// Create the cache, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P, max_age: Duration) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_age })
    }
}

impl DiskCache for AgeLimitedDiskCache {
    fn path_for(&self, resource_key: &str) -> PathBuf {
        self.dir.join(file_name_for(resource_key))
    }

    fn get(&self, resource_key: &str) -> PathBuf {
        let path = self.path_for(resource_key);
        if let Ok(meta) = fs::metadata(&path) {
            let expired = meta
                .modified()
                .ok()
                .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
                .map(|age| age > self.max_age)
                .unwrap_or(false);
            if expired {
                let _ = fs::remove_file(&path);
            } else {
                touch_file(&path);
            }
        }
        path
    }

    fn contains(&self, resource_key: &str) -> bool {
        self.path_for(resource_key).exists()
    }

    fn save(&self, resource_key: &str, source: &mut dyn Read) -> io::Result<bool> {
        write_stream(&self.path_for(resource_key), source)?;
        Ok(true)
    }

    fn save_raster(&self, resource_key: &str, raster: &Raster) -> io::Result<bool> {
        write_raster(&self.path_for(resource_key), raster)?;
        Ok(true)
    }

    fn remove(&self, resource_key: &str) -> bool {
        fs::remove_file(self.path_for(resource_key)).is_ok()
    }

    fn clear(&self) {
        remove_dir_files(&self.dir);
    }
}
