//! Pixload Core Library
//!
//! Asynchronous image loading engine: fetch, decode, scale, cache, and
//! deliver rasters to display targets, guaranteeing a target only ever
//! shows the result of its most recent request.
//!
//! # Example
//!
//! ```no_run
//! use pixload_core::{LoadEngine, LoadOptions, NoopListener};
//! use std::sync::Arc;
//!
//! let engine = LoadEngine::builder().build().unwrap();
//!
//! // `target` is anything implementing DisplayTarget
//! # struct T;
//! # impl pixload_core::DisplayTarget for T {
//! #     fn id(&self) -> u64 { 1 }
//! #     fn requested_width(&self) -> Option<u32> { Some(100) }
//! #     fn requested_height(&self) -> Option<u32> { Some(100) }
//! #     fn set_image(&self, _: pixload_cache::SharedRaster) {}
//! # }
//! # let target = Arc::new(T);
//! engine.submit(
//!     "https://example.com/photo.jpg",
//!     target,
//!     LoadOptions::default(),
//!     Arc::new(NoopListener),
//! );
//! ```

pub mod config;
pub mod decode;
pub mod download;
pub mod engine;
pub mod error;
pub mod request;
pub mod retry;
pub mod scale;
pub mod target;

pub use config::EngineConfig;
pub use decode::{DecodeOptions, Decoder, ImageDecoder};
pub use download::{Downloader, HttpDownloader};
pub use engine::{LoadEngine, LoadEngineBuilder};
pub use error::LoadError;
pub use request::{LoadListener, LoadOptions, NoopListener};
pub use retry::RetryPolicy;
pub use scale::{SamplePolicy, ScaleKind};
pub use target::{resolve_size, DisplayTarget};

// Collaborator types callers need alongside the engine
pub use pixload_cache::{CacheConfig, MemoryCache, Raster, SharedRaster};
pub use pixload_scheduler::{QueueDiscipline, TargetId};
