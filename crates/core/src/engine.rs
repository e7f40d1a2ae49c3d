//! The load engine: two-tier task dispatch over the caches.
//!
//! Requests already present in the disk cache go to the warm pool,
//! everything else to the cold pool, so cache hits never queue behind
//! slow network fetches. All listener callbacks run serialized, in FIFO
//! order, on a dedicated callback thread.

use crate::config::EngineConfig;
use crate::decode::{DecodeOptions, Decoder, ImageDecoder};
use crate::download::{Downloader, HttpDownloader};
use crate::error::LoadError;
use crate::request::{LoadListener, LoadOptions};
use crate::retry::RetryPolicy;
use crate::target::{self, DisplayTarget};
use pixload_cache::{
    memory_key, BoundedMemoryCache, CacheConfig, DiskCache, EvictionPolicy, LimitedDiskCache,
    MemoryCache, SharedRaster,
};
use pixload_scheduler::{
    DisplayCoordinator, KeyLockTable, PauseGate, TargetId, WorkerPool, WorkerPoolConfig,
};
use std::any::Any;
use std::fs;
use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Pieces of the engine shared with in-flight tasks.
struct Shared {
    memory: Arc<dyn MemoryCache>,
    disk: Arc<dyn DiskCache>,
    decoder: Arc<dyn Decoder>,
    downloader: Arc<dyn Downloader>,
    locks: KeyLockTable,
    // Behind its own Arc so delivery closures can re-check staleness on
    // the callback thread without keeping the whole engine state alive.
    coordinator: Arc<DisplayCoordinator>,
    pause: PauseGate,
    retry: RetryPolicy,
    callbacks: WorkerPool,
    default_size: (u32, u32),
}

/// Asynchronous image load engine.
///
/// Constructed once by the host application via [`LoadEngine::builder`]
/// and shared wherever loads are issued; there is no global instance.
pub struct LoadEngine {
    shared: Arc<Shared>,
    warm: WorkerPool,
    cold: WorkerPool,
}

impl LoadEngine {
    /// Start building an engine.
    pub fn builder() -> LoadEngineBuilder {
        LoadEngineBuilder::new()
    }

    /// Submit a load request for a display target.
    ///
    /// Synchronously checks the memory cache; on a miss the work is queued
    /// on the warm or cold pool depending on disk cache presence. All
    /// listener callbacks, including for synchronous hits, run on the
    /// callback thread.
    pub fn submit(
        &self,
        resource: &str,
        target: Arc<dyn DisplayTarget>,
        options: LoadOptions,
        listener: Arc<dyn LoadListener>,
    ) {
        let shared = &self.shared;
        let (width, height) = target::resolve_size(&*target, shared.default_size);
        let mem_key = memory_key(resource, width, height);

        // Recording the binding first is what marks any older in-flight
        // request for this target as stale.
        shared.coordinator.prepare(target.id(), &mem_key);

        {
            let listener = listener.clone();
            let resource = resource.to_string();
            shared.callbacks.submit(Box::new(move || {
                listener.on_started(&resource);
            }));
        }

        if let Some(image) = shared.memory.get(&mem_key) {
            debug!(resource, "memory cache hit");
            let resource = resource.to_string();
            let coordinator = Arc::clone(&shared.coordinator);
            shared.callbacks.submit(Box::new(move || {
                // The binding may have moved on while this closure sat in
                // the callback queue.
                if coordinator.is_current(target.id(), &mem_key) && target.is_attached() {
                    target.set_image(image.clone());
                    listener.on_complete(&resource, image);
                } else {
                    listener.on_cancelled(&resource);
                }
            }));
            return;
        }

        let task = TaskContext {
            shared: Arc::clone(shared),
            resource: resource.to_string(),
            mem_key,
            decode_options: DecodeOptions {
                target_width: width,
                target_height: height,
                sample_policy: options.sample_policy,
                scale_kind: options.scale_kind,
                exact: options.exact_scale,
            },
            options,
            target,
            listener,
        };

        // Cheap existence check decides the tier.
        if shared.disk.contains(resource) {
            debug!(resource, "dispatching to warm pool");
            self.warm.submit(Box::new(move || task.run()));
        } else {
            debug!(resource, "dispatching to cold pool");
            self.cold.submit(Box::new(move || task.run()));
        }
    }

    /// Forget the binding for a target.
    ///
    /// Any in-flight load for it observes this as staleness and reports
    /// cancellation. Returns `true` if the target had a binding.
    pub fn cancel_for(&self, target: TargetId) -> bool {
        self.shared.coordinator.cancel(target)
    }

    /// Hold back tasks that have not started their body yet. Running
    /// tasks finish normally.
    pub fn pause(&self) {
        self.shared.pause.pause();
    }

    /// Release the pause gate.
    pub fn resume(&self) {
        self.shared.pause.resume();
    }

    /// Whether the engine is currently paused.
    pub fn is_paused(&self) -> bool {
        self.shared.pause.is_paused()
    }

    /// Cancel all queued work and forget all target bindings.
    ///
    /// Queued tasks that have not started are dropped without callbacks;
    /// in-flight tasks finish their cache work and report cancellation.
    pub fn stop(&self) {
        self.warm.clear_queue();
        self.cold.clear_queue();
        self.shared.coordinator.clear();
    }

    /// Remove every entry from the memory cache.
    pub fn clear_memory_cache(&self) {
        self.shared.memory.clear();
    }

    /// Remove every file from the disk cache.
    pub fn clear_disk_cache(&self) {
        self.shared.disk.clear();
    }

    /// Stop accepting work and wait for all workers to exit.
    pub fn shutdown(self) {
        self.stop();
        self.warm.shutdown();
        self.cold.shutdown();
        // In-flight tasks have finished, so this is the last handle.
        if let Some(shared) = Arc::into_inner(self.shared) {
            shared.callbacks.shutdown();
        }
    }
}

/// Builder assembling an engine from its collaborators.
///
/// Any collaborator not supplied gets a production default: an LRU memory
/// cache, a size-limited disk cache, the `image`-backed decoder, and the
/// HTTP downloader.
pub struct LoadEngineBuilder {
    config: EngineConfig,
    cache_config: CacheConfig,
    memory: Option<Arc<dyn MemoryCache>>,
    disk: Option<Arc<dyn DiskCache>>,
    decoder: Option<Arc<dyn Decoder>>,
    downloader: Option<Arc<dyn Downloader>>,
    retry: RetryPolicy,
}

impl LoadEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            cache_config: CacheConfig::default(),
            memory: None,
            disk: None,
            decoder: None,
            downloader: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the cache configuration used when building default caches.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Use a specific memory cache instance.
    pub fn memory_cache(mut self, cache: Arc<dyn MemoryCache>) -> Self {
        self.memory = Some(cache);
        self
    }

    /// Use a specific disk cache instance.
    pub fn disk_cache(mut self, cache: Arc<dyn DiskCache>) -> Self {
        self.disk = Some(cache);
        self
    }

    /// Use a specific decoder.
    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Use a specific downloader.
    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Replace the resource-exhaustion retry policy.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build and start the engine.
    ///
    /// # Errors
    /// Fails if the default disk cache directory cannot be created.
    pub fn build(self) -> std::io::Result<LoadEngine> {
        let memory = match self.memory {
            Some(cache) => cache,
            None => Arc::new(BoundedMemoryCache::new(
                self.cache_config.memory_cache_size,
                EvictionPolicy::Lru,
            )),
        };
        let disk = match self.disk {
            Some(cache) => cache,
            None => Arc::new(LimitedDiskCache::with_size_limit(
                &self.cache_config.disk_cache_dir,
                self.cache_config.disk_cache_size,
            )?),
        };
        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(ImageDecoder::new()));
        let downloader = self.downloader.unwrap_or_else(|| {
            Arc::new(HttpDownloader::new(
                self.config.connect_timeout,
                self.config.read_timeout,
            ))
        });

        let shared = Arc::new(Shared {
            memory,
            disk,
            decoder,
            downloader,
            locks: KeyLockTable::new(),
            coordinator: Arc::new(DisplayCoordinator::new()),
            pause: PauseGate::new(),
            retry: self.retry,
            callbacks: WorkerPool::new(WorkerPoolConfig::new("pixload-callback", 1)),
            default_size: self.config.default_size,
        });

        let warm = WorkerPool::new(
            WorkerPoolConfig::new("pixload-warm", self.config.warm_workers)
                .with_discipline(self.config.discipline),
        );
        let cold = WorkerPool::new(
            WorkerPoolConfig::new("pixload-cold", self.config.cold_workers)
                .with_discipline(self.config.discipline),
        );

        Ok(LoadEngine { shared, warm, cold })
    }
}

impl Default for LoadEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything one queued task needs to run to completion.
struct TaskContext {
    shared: Arc<Shared>,
    resource: String,
    mem_key: String,
    decode_options: DecodeOptions,
    options: LoadOptions,
    target: Arc<dyn DisplayTarget>,
    listener: Arc<dyn LoadListener>,
}

impl TaskContext {
    fn run(self) {
        if let Some(delay) = self.options.delay_before_start {
            thread::sleep(delay);
        }

        self.shared.pause.wait_if_paused();

        // Early staleness exit, before any expensive work.
        if !self
            .shared
            .coordinator
            .is_current(self.target.id(), &self.mem_key)
        {
            debug!(resource = %self.resource, "request stale before start");
            self.deliver_cancelled();
            return;
        }

        // Decoder, downloader, and target are caller-supplied; a panic in
        // any of them must surface as a failure instead of unwinding
        // through the worker thread.
        match panic::catch_unwind(AssertUnwindSafe(|| self.load())) {
            Ok(Ok(image)) => {
                // Final gate before touching shared display state. The
                // cache was still warmed above for the next requester.
                if self
                    .shared
                    .coordinator
                    .is_current(self.target.id(), &self.mem_key)
                {
                    self.deliver_complete(image);
                } else {
                    debug!(resource = %self.resource, "request stale after load");
                    self.deliver_cancelled();
                }
            }
            Ok(Err(error)) => {
                warn!(resource = %self.resource, error = %error, "load failed");
                self.deliver_failed(error);
            }
            Err(payload) => {
                let reason = panic_message(&payload);
                warn!(resource = %self.resource, reason = %reason, "task body panicked");
                self.deliver_failed(LoadError::Unknown(reason));
            }
        }
    }

    /// The lock-protected fetch/decode/store sequence.
    fn load(&self) -> Result<SharedRaster, LoadError> {
        let lock = self.shared.locks.acquire(&self.resource);
        let _guard = lock.lock().unwrap();

        // Another task for this resource may have finished while this one
        // waited on the lock.
        if let Some(image) = self.shared.memory.get(&self.mem_key) {
            debug!(resource = %self.resource, "memory cache hit after lock");
            return Ok(image);
        }

        let bytes = self.fetch_bytes()?;
        let raster = self.decode_with_retry(&bytes)?;
        let image: SharedRaster = Arc::new(raster);

        if self.options.cache_in_memory {
            self.shared.memory.put(&self.mem_key, image.clone());
        }

        Ok(image)
    }

    fn fetch_bytes(&self) -> Result<Vec<u8>, LoadError> {
        let path = self.shared.disk.get(&self.resource);
        if path.exists() {
            debug!(resource = %self.resource, "disk cache hit");
            return Ok(fs::read(path)?);
        }

        let mut stream = self.shared.downloader.open_stream(&self.resource)?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;

        if self.options.cache_on_disk {
            // A failed persist does not fail the load; the cache itself
            // guarantees no partial file is left behind.
            if let Err(error) = self
                .shared
                .disk
                .save(&self.resource, &mut Cursor::new(&bytes))
            {
                warn!(resource = %self.resource, error = %error, "disk cache save failed");
            }
        }

        Ok(bytes)
    }

    fn decode_with_retry(&self, bytes: &[u8]) -> Result<pixload_cache::Raster, LoadError> {
        let retry = if self.options.retry_on_exhaustion {
            self.shared.retry.clone()
        } else {
            RetryPolicy::disabled()
        };

        retry.run(
            || self.shared.decoder.decode(bytes, &self.decode_options),
            || {
                warn!(resource = %self.resource, "decode exhausted memory, clearing memory cache");
                self.shared.memory.clear();
            },
        )
    }

    fn deliver_complete(self, image: SharedRaster) {
        let Self {
            shared,
            resource,
            mem_key,
            target,
            listener,
            ..
        } = self;
        let coordinator = Arc::clone(&shared.coordinator);
        shared.callbacks.submit(Box::new(move || {
            // A newer request for this target may have been prepared while
            // this closure waited in the callback queue.
            if coordinator.is_current(target.id(), &mem_key) && target.is_attached() {
                target.set_image(image.clone());
                listener.on_complete(&resource, image);
            } else {
                listener.on_cancelled(&resource);
            }
        }));
    }

    fn deliver_cancelled(self) {
        let Self {
            shared,
            resource,
            listener,
            ..
        } = self;
        shared.callbacks.submit(Box::new(move || {
            listener.on_cancelled(&resource);
        }));
    }

    fn deliver_failed(self, error: LoadError) {
        let Self {
            shared,
            resource,
            listener,
            ..
        } = self;
        shared.callbacks.submit(Box::new(move || {
            listener.on_failed(&resource, &error);
        }));
    }
}

/// Best-effort human-readable text from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
