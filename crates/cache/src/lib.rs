//! Pixload Cache Library
//!
//! Memory and disk caches for decoded images, with swappable eviction
//! policies and limit strategies.

pub mod config;
pub mod disk;
pub mod key;
pub mod memory;
pub mod raster;

pub use config::{CacheConfig, ConfigError};
pub use disk::{
    read_raster, AgeLimitedDiskCache, DiskCache, DiskCacheStats, DiskLimitMode, LimitedDiskCache,
    UnboundedDiskCache,
};
pub use key::{memory_key, resource_of, same_resource};
pub use memory::{
    remove_for_resource, AgeLimitedCache, BoundedMemoryCache, EvictionPolicy, MemoryCache,
    MemoryCacheStats, SingleSizeCache,
};
pub use raster::{Raster, SharedRaster};
