//! Engine configuration.

use pixload_scheduler::QueueDiscipline;
use std::time::Duration;

/// Configuration for the load engine's pools and defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Workers serving requests already present in the disk cache.
    /// Default: 2.
    pub warm_workers: usize,

    /// Workers serving cold (network/uncached) requests. Default: 3.
    pub cold_workers: usize,

    /// Queue ordering for both pools. LIFO favors the most recently
    /// requested items when the pools are saturated. Default: FIFO.
    pub discipline: QueueDiscipline,

    /// Decode target size used when a display target cannot report its
    /// own. Default: 1024x1024.
    pub default_size: (u32, u32),

    /// Downloader connect timeout. Default: 5s.
    pub connect_timeout: Duration,

    /// Downloader read timeout. Default: 30s.
    pub read_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            warm_workers: 2,
            cold_workers: 3,
            discipline: QueueDiscipline::Fifo,
            default_size: (1024, 1024),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the warm pool size.
    pub fn with_warm_workers(mut self, workers: usize) -> Self {
        self.warm_workers = workers.max(1);
        self
    }

    /// Set the cold pool size.
    pub fn with_cold_workers(mut self, workers: usize) -> Self {
        self.cold_workers = workers.max(1);
        self
    }

    /// Set the queue discipline for both pools.
    pub fn with_discipline(mut self, discipline: QueueDiscipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Set the fallback decode target size.
    pub fn with_default_size(mut self, width: u32, height: u32) -> Self {
        self.default_size = (width, height);
        self
    }

    /// Set the downloader timeouts.
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }
}
