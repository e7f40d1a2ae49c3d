//! End-to-end engine behavior with injected collaborators.

use pixload_cache::{
    BoundedMemoryCache, EvictionPolicy, MemoryCache, Raster, SharedRaster, UnboundedDiskCache,
};
use pixload_core::{
    DecodeOptions, Decoder, DisplayTarget, Downloader, EngineConfig, LoadEngine, LoadError,
    LoadListener, LoadOptions, RetryPolicy,
};
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pixload-engine-{tag}-{}", rand::random::<u32>()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Target recording every raster applied to it.
struct TestTarget {
    id: u64,
    images: Mutex<Vec<SharedRaster>>,
}

impl TestTarget {
    fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            images: Mutex::new(Vec::new()),
        })
    }

    fn image_count(&self) -> usize {
        self.images.lock().unwrap().len()
    }
}

impl DisplayTarget for TestTarget {
    fn id(&self) -> u64 {
        self.id
    }
    fn requested_width(&self) -> Option<u32> {
        Some(100)
    }
    fn requested_height(&self) -> Option<u32> {
        Some(100)
    }
    fn set_image(&self, image: SharedRaster) {
        self.images.lock().unwrap().push(image);
    }
}

/// Downloader returning the resource identifier itself as the payload,
/// optionally sleeping first to model a slow network.
struct TestDownloader {
    calls: AtomicUsize,
    delay: Duration,
    slow_prefix: Option<&'static str>,
}

impl TestDownloader {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            slow_prefix: None,
        }
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    /// Only resources starting with `prefix` get the delay.
    fn with_slow_prefix(prefix: &'static str, delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            slow_prefix: Some(prefix),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Downloader for TestDownloader {
    fn open_stream(&self, resource: &str) -> Result<Box<dyn Read + Send>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let slow = match self.slow_prefix {
            Some(prefix) => resource.starts_with(prefix),
            None => !self.delay.is_zero(),
        };
        if slow {
            thread::sleep(self.delay);
        }
        Ok(Box::new(Cursor::new(resource.as_bytes().to_vec())))
    }
}

/// Decoder producing an 8x8 raster filled with the payload's first byte.
struct ByteDecoder;

impl Decoder for ByteDecoder {
    fn decode(&self, bytes: &[u8], _options: &DecodeOptions) -> Result<Raster, LoadError> {
        let fill = *bytes.first().ok_or_else(|| {
            LoadError::Decode("empty payload".to_string())
        })?;
        Ok(Raster::filled(8, 8, [fill, fill, fill, 255]))
    }
}

/// Decoder that reports resource exhaustion a fixed number of times
/// before succeeding.
struct FlakyDecoder {
    failures_remaining: AtomicU32,
}

impl FlakyDecoder {
    fn failing(times: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(times),
        }
    }
}

impl Decoder for FlakyDecoder {
    fn decode(&self, _bytes: &[u8], _options: &DecodeOptions) -> Result<Raster, LoadError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(LoadError::ResourceExhausted("simulated".to_string()));
        }
        Ok(Raster::filled(4, 4, [1, 2, 3, 255]))
    }
}

/// Decoder panicking on payloads that start with `p`, succeeding on
/// everything else.
struct PanickyDecoder;

impl Decoder for PanickyDecoder {
    fn decode(&self, bytes: &[u8], _options: &DecodeOptions) -> Result<Raster, LoadError> {
        if bytes.first() == Some(&b'p') {
            panic!("decoder blew up");
        }
        Ok(Raster::filled(4, 4, [9, 9, 9, 255]))
    }
}

/// Listener that stalls the callback thread in `on_started`, delegating
/// everything to an inner recorder.
struct SlowStartListener {
    inner: Arc<RecordingListener>,
    delay: Duration,
}

impl LoadListener for SlowStartListener {
    fn on_started(&self, resource: &str) {
        thread::sleep(self.delay);
        self.inner.on_started(resource);
    }
    fn on_complete(&self, resource: &str, image: SharedRaster) {
        self.inner.on_complete(resource, image);
    }
    fn on_failed(&self, resource: &str, error: &LoadError) {
        self.inner.on_failed(resource, error);
    }
    fn on_cancelled(&self, resource: &str) {
        self.inner.on_cancelled(resource);
    }
}

/// Memory cache wrapper counting `clear` calls.
struct ClearCountingCache {
    inner: BoundedMemoryCache,
    clears: AtomicUsize,
}

impl ClearCountingCache {
    fn new() -> Self {
        Self {
            inner: BoundedMemoryCache::with_mb_limit(16, EvictionPolicy::Lru),
            clears: AtomicUsize::new(0),
        }
    }
}

impl MemoryCache for ClearCountingCache {
    fn put(&self, key: &str, image: SharedRaster) -> bool {
        self.inner.put(key, image)
    }
    fn get(&self, key: &str) -> Option<SharedRaster> {
        self.inner.get(key)
    }
    fn remove(&self, key: &str) -> Option<SharedRaster> {
        self.inner.remove(key)
    }
    fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }
    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear();
    }
}

#[derive(Default)]
struct RecordingListener {
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    exhausted: AtomicUsize,
    unknown: AtomicUsize,
}

impl RecordingListener {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
    fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
    fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
    fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl LoadListener for RecordingListener {
    fn on_started(&self, _resource: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_complete(&self, _resource: &str, _image: SharedRaster) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_failed(&self, _resource: &str, error: &LoadError) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        if matches!(error, LoadError::ResourceExhausted(_)) {
            self.exhausted.fetch_add(1, Ordering::SeqCst);
        }
        if matches!(error, LoadError::Unknown(_)) {
            self.unknown.fetch_add(1, Ordering::SeqCst);
        }
    }
    fn on_cancelled(&self, _resource: &str) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

fn engine_with(
    tag: &str,
    downloader: Arc<dyn Downloader>,
    decoder: Arc<dyn Decoder>,
) -> (LoadEngine, PathBuf) {
    let dir = temp_dir(tag);
    let engine = LoadEngine::builder()
        .disk_cache(Arc::new(UnboundedDiskCache::new(&dir).unwrap()))
        .downloader(downloader)
        .decoder(decoder)
        .retry_policy(RetryPolicy::default().with_delay(|_| {}))
        .build()
        .unwrap();
    (engine, dir)
}

fn cleanup(dir: PathBuf) {
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn test_load_completes_and_applies_image() {
    let downloader = Arc::new(TestDownloader::new());
    let (engine, dir) = engine_with("basic", downloader.clone(), Arc::new(ByteDecoder));

    let target = TestTarget::new(1);
    let listener = RecordingListener::new();
    engine.submit(
        "res://photo",
        target.clone(),
        LoadOptions::default(),
        listener.clone(),
    );

    assert!(wait_until(Duration::from_secs(2), || listener.completed() == 1));
    assert_eq!(target.image_count(), 1);
    assert_eq!(downloader.call_count(), 1);
    assert_eq!(listener.failed(), 0);
    assert_eq!(listener.cancelled(), 0);

    engine.shutdown();
    cleanup(dir);
}

#[test]
fn test_concurrent_same_resource_downloads_once() {
    let downloader = Arc::new(TestDownloader::with_delay(Duration::from_millis(50)));
    let (engine, dir) = engine_with("dedup", downloader.clone(), Arc::new(ByteDecoder));

    let target_a = TestTarget::new(1);
    let target_b = TestTarget::new(2);
    let listener_a = RecordingListener::new();
    let listener_b = RecordingListener::new();

    engine.submit(
        "res://shared",
        target_a.clone(),
        LoadOptions::default(),
        listener_a.clone(),
    );
    engine.submit(
        "res://shared",
        target_b.clone(),
        LoadOptions::default(),
        listener_b.clone(),
    );

    assert!(wait_until(Duration::from_secs(2), || {
        listener_a.completed() == 1 && listener_b.completed() == 1
    }));

    // Both targets got the raster, but only one download happened; the
    // second task found it in the memory cache after taking the lock.
    assert_eq!(target_a.image_count(), 1);
    assert_eq!(target_b.image_count(), 1);
    assert_eq!(downloader.call_count(), 1);

    engine.shutdown();
    cleanup(dir);
}

#[test]
fn test_newer_request_supersedes_older() {
    let downloader = Arc::new(TestDownloader::with_slow_prefix(
        "slow",
        Duration::from_millis(150),
    ));
    let (engine, dir) = engine_with("stale", downloader.clone(), Arc::new(ByteDecoder));

    let target = TestTarget::new(1);
    let listener_old = RecordingListener::new();
    let listener_new = RecordingListener::new();

    engine.submit(
        "slow://old",
        target.clone(),
        LoadOptions::default(),
        listener_old.clone(),
    );
    // Let the first task get past its early staleness check and into the
    // slow download.
    thread::sleep(Duration::from_millis(40));
    engine.submit(
        "fast://new",
        target.clone(),
        LoadOptions::default(),
        listener_new.clone(),
    );

    assert!(wait_until(Duration::from_secs(2), || {
        listener_new.completed() == 1 && listener_old.cancelled() == 1
    }));
    thread::sleep(Duration::from_millis(50));

    // The superseded request never touched the target and fired its
    // cancellation exactly once.
    assert_eq!(listener_old.completed(), 0);
    assert_eq!(listener_old.cancelled(), 1);
    let images = target.images.lock().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].pixels[0], b'f');
    drop(images);

    engine.shutdown();
    cleanup(dir);
}

#[test]
fn test_retry_recovers_from_transient_exhaustion() {
    let downloader = Arc::new(TestDownloader::new());
    let (engine, dir) = engine_with(
        "retry-ok",
        downloader,
        Arc::new(FlakyDecoder::failing(2)),
    );

    let target = TestTarget::new(1);
    let listener = RecordingListener::new();
    engine.submit(
        "res://flaky",
        target.clone(),
        LoadOptions::default(),
        listener.clone(),
    );

    assert!(wait_until(Duration::from_secs(2), || listener.completed() == 1));
    assert_eq!(listener.failed(), 0);
    assert_eq!(target.image_count(), 1);

    engine.shutdown();
    cleanup(dir);
}

#[test]
fn test_exhaustion_clears_memory_cache_exactly_once() {
    let memory = Arc::new(ClearCountingCache::new());
    let dir = temp_dir("retry-fail");
    let engine = LoadEngine::builder()
        .memory_cache(memory.clone())
        .disk_cache(Arc::new(UnboundedDiskCache::new(&dir).unwrap()))
        .downloader(Arc::new(TestDownloader::new()))
        .decoder(Arc::new(FlakyDecoder::failing(u32::MAX)))
        .retry_policy(RetryPolicy::default().with_delay(|_| {}))
        .build()
        .unwrap();

    let target = TestTarget::new(1);
    let listener = RecordingListener::new();
    engine.submit(
        "res://doomed",
        target.clone(),
        LoadOptions::default(),
        listener.clone(),
    );

    assert!(wait_until(Duration::from_secs(2), || listener.failed() == 1));
    assert_eq!(listener.exhausted.load(Ordering::SeqCst), 1);
    assert_eq!(memory.clears.load(Ordering::SeqCst), 1);
    assert_eq!(target.image_count(), 0);
    assert_eq!(listener.cancelled(), 0);

    engine.shutdown();
    cleanup(dir);
}

#[test]
fn test_second_load_served_from_memory_cache() {
    let downloader = Arc::new(TestDownloader::new());
    let (engine, dir) = engine_with("memhit", downloader.clone(), Arc::new(ByteDecoder));

    let target = TestTarget::new(1);
    let listener = RecordingListener::new();
    engine.submit(
        "res://once",
        target.clone(),
        LoadOptions::default(),
        listener.clone(),
    );
    assert!(wait_until(Duration::from_secs(2), || listener.completed() == 1));

    engine.submit(
        "res://once",
        target.clone(),
        LoadOptions::default(),
        listener.clone(),
    );
    assert!(wait_until(Duration::from_secs(2), || listener.completed() == 2));

    assert_eq!(downloader.call_count(), 1);
    assert_eq!(target.image_count(), 2);

    engine.shutdown();
    cleanup(dir);
}

#[test]
fn test_pause_defers_work_until_resume() {
    let downloader = Arc::new(TestDownloader::new());
    let (engine, dir) = engine_with("pause", downloader, Arc::new(ByteDecoder));

    engine.pause();
    assert!(engine.is_paused());

    let target = TestTarget::new(1);
    let listener = RecordingListener::new();
    engine.submit(
        "res://held",
        target.clone(),
        LoadOptions::default(),
        listener.clone(),
    );

    thread::sleep(Duration::from_millis(100));
    assert_eq!(listener.completed(), 0);

    engine.resume();
    assert!(wait_until(Duration::from_secs(2), || listener.completed() == 1));

    engine.shutdown();
    cleanup(dir);
}

#[test]
fn test_cancel_for_reports_cancellation_without_applying() {
    let downloader = Arc::new(TestDownloader::new());
    let (engine, dir) = engine_with("cancel", downloader, Arc::new(ByteDecoder));

    // Hold the task at the pause gate so the cancellation lands first.
    engine.pause();

    let target = TestTarget::new(1);
    let listener = RecordingListener::new();
    engine.submit(
        "res://dropped",
        target.clone(),
        LoadOptions::default(),
        listener.clone(),
    );

    assert!(engine.cancel_for(target.id()));
    engine.resume();

    assert!(wait_until(Duration::from_secs(2), || listener.cancelled() == 1));
    assert_eq!(listener.completed(), 0);
    assert_eq!(target.image_count(), 0);

    engine.shutdown();
    cleanup(dir);
}

#[test]
fn test_cache_on_disk_option() {
    let downloader = Arc::new(TestDownloader::new());
    let dir = temp_dir("disk-opt");
    let disk = Arc::new(UnboundedDiskCache::new(&dir).unwrap());
    let engine = LoadEngine::builder()
        .disk_cache(disk.clone())
        .downloader(downloader)
        .decoder(Arc::new(ByteDecoder))
        .build()
        .unwrap();

    let listener_on = RecordingListener::new();
    engine.submit(
        "res://persisted",
        TestTarget::new(1),
        LoadOptions::default(),
        listener_on.clone(),
    );
    let listener_off = RecordingListener::new();
    engine.submit(
        "res://ephemeral",
        TestTarget::new(2),
        LoadOptions::default().with_cache_on_disk(false),
        listener_off.clone(),
    );

    assert!(wait_until(Duration::from_secs(2), || {
        listener_on.completed() == 1 && listener_off.completed() == 1
    }));

    use pixload_cache::DiskCache;
    assert!(disk.contains("res://persisted"));
    assert!(!disk.contains("res://ephemeral"));

    engine.shutdown();
    cleanup(dir);
}

#[test]
fn test_panicking_decoder_reports_unknown_and_worker_survives() {
    let dir = temp_dir("panic");
    // One worker per tier so a lost thread would be unmissable.
    let engine = LoadEngine::builder()
        .config(EngineConfig::new().with_warm_workers(1).with_cold_workers(1))
        .disk_cache(Arc::new(UnboundedDiskCache::new(&dir).unwrap()))
        .downloader(Arc::new(TestDownloader::new()))
        .decoder(Arc::new(PanickyDecoder))
        .build()
        .unwrap();

    let target = TestTarget::new(1);
    let listener = RecordingListener::new();
    engine.submit(
        "panic://boom",
        target.clone(),
        LoadOptions::default(),
        listener.clone(),
    );

    assert!(wait_until(Duration::from_secs(2), || listener.failed() == 1));
    assert_eq!(listener.unknown.load(Ordering::SeqCst), 1);
    assert_eq!(listener.completed(), 0);
    assert_eq!(target.image_count(), 0);

    // The same worker must still be serving after the panic.
    let target_ok = TestTarget::new(2);
    let listener_ok = RecordingListener::new();
    engine.submit(
        "res://ok",
        target_ok.clone(),
        LoadOptions::default(),
        listener_ok.clone(),
    );
    assert!(wait_until(Duration::from_secs(2), || listener_ok.completed() == 1));
    assert_eq!(target_ok.image_count(), 1);

    // Must not hit a join panic from a dead worker.
    engine.shutdown();
    cleanup(dir);
}

#[test]
fn test_cancellation_between_staleness_gate_and_delivery() {
    let downloader = Arc::new(TestDownloader::new());
    let (engine, dir) = engine_with("late-cancel", downloader, Arc::new(ByteDecoder));

    // Warm the memory cache so the next submit takes the synchronous hit
    // path.
    let target = TestTarget::new(1);
    let warmer = RecordingListener::new();
    engine.submit(
        "res://a",
        target.clone(),
        LoadOptions::default(),
        warmer.clone(),
    );
    assert!(wait_until(Duration::from_secs(2), || warmer.completed() == 1));

    // The stalled on_started occupies the callback thread, so the queued
    // delivery runs only after the cancellation below has landed.
    let recorder = RecordingListener::new();
    let listener = Arc::new(SlowStartListener {
        inner: recorder.clone(),
        delay: Duration::from_millis(150),
    });
    engine.submit("res://a", target.clone(), LoadOptions::default(), listener);
    assert!(engine.cancel_for(target.id()));

    assert!(wait_until(Duration::from_secs(2), || recorder.cancelled() == 1));
    assert_eq!(recorder.completed(), 0);
    // Only the warming load touched the target.
    assert_eq!(target.image_count(), 1);

    engine.shutdown();
    cleanup(dir);
}

#[test]
fn test_shutdown_completes_with_queued_work() {
    let downloader = Arc::new(TestDownloader::with_delay(Duration::from_millis(20)));
    let (engine, dir) = engine_with("shutdown", downloader, Arc::new(ByteDecoder));

    for i in 0..10 {
        engine.submit(
            &format!("res://{i}"),
            TestTarget::new(i),
            LoadOptions::default(),
            RecordingListener::new(),
        );
    }

    // Must not hang regardless of how much work is still queued.
    engine.shutdown();
    cleanup(dir);
}
