//! Per-request options and result listener.

use crate::error::LoadError;
use crate::scale::{SamplePolicy, ScaleKind};
use pixload_cache::SharedRaster;
use std::time::Duration;

/// Options applying to one load request.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Store the decoded raster in the memory cache.
    pub cache_in_memory: bool,

    /// Persist the fetched bytes in the disk cache.
    pub cache_on_disk: bool,

    /// Retry the decode on resource exhaustion.
    pub retry_on_exhaustion: bool,

    /// How the decode subsample factor is chosen.
    pub sample_policy: SamplePolicy,

    /// How the result relates to the target box.
    pub scale_kind: ScaleKind,

    /// Scale the raster to the exact target box after subsampling.
    pub exact_scale: bool,

    /// Sleep before the task body starts. Useful to let fast scrolling
    /// settle before any work happens.
    pub delay_before_start: Option<Duration>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            cache_in_memory: true,
            cache_on_disk: true,
            retry_on_exhaustion: true,
            sample_policy: SamplePolicy::PowerOfTwo,
            scale_kind: ScaleKind::FitInside,
            exact_scale: false,
            delay_before_start: None,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_in_memory(mut self, enabled: bool) -> Self {
        self.cache_in_memory = enabled;
        self
    }

    pub fn with_cache_on_disk(mut self, enabled: bool) -> Self {
        self.cache_on_disk = enabled;
        self
    }

    pub fn with_retry_on_exhaustion(mut self, enabled: bool) -> Self {
        self.retry_on_exhaustion = enabled;
        self
    }

    pub fn with_sample_policy(mut self, policy: SamplePolicy) -> Self {
        self.sample_policy = policy;
        self
    }

    pub fn with_scale_kind(mut self, kind: ScaleKind) -> Self {
        self.scale_kind = kind;
        self
    }

    pub fn with_exact_scale(mut self, enabled: bool) -> Self {
        self.exact_scale = enabled;
        self
    }

    pub fn with_delay_before_start(mut self, delay: Duration) -> Self {
        self.delay_before_start = Some(delay);
        self
    }
}

/// Receives the outcome of a load request.
///
/// Every callback runs on the engine's serialized callback context. A
/// request fires `on_started` once, then exactly one of `on_complete`,
/// `on_failed`, or `on_cancelled`.
pub trait LoadListener: Send + Sync {
    /// The request was accepted and work is about to be scheduled.
    fn on_started(&self, _resource: &str) {}

    /// The raster was produced and applied to the target.
    fn on_complete(&self, _resource: &str, _image: SharedRaster) {}

    /// The task failed; the target was not touched.
    fn on_failed(&self, _resource: &str, _error: &LoadError) {}

    /// The target moved on to a newer request before this one finished.
    /// Not a failure.
    fn on_cancelled(&self, _resource: &str) {}
}

/// Listener that ignores every event.
pub struct NoopListener;

impl LoadListener for NoopListener {}
