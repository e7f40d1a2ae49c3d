//! Pixload Scheduler Library
//!
//! Execution primitives for the image loading engine: worker pools with
//! configurable queue discipline, per-key locks, a pause gate, and the
//! display target coordinator used for staleness detection.
//!
//! # Example
//!
//! ```
//! use pixload_scheduler::{QueueDiscipline, WorkerPool, WorkerPoolConfig};
//!
//! let pool = WorkerPool::new(
//!     WorkerPoolConfig::new("loader", 3).with_discipline(QueueDiscipline::Lifo),
//! );
//!
//! pool.submit(Box::new(|| {
//!     // fetch, decode, display...
//! }));
//!
//! pool.shutdown();
//! ```

mod display;
mod locks;
mod pause;
mod worker;

// Re-export public API
pub use display::{DisplayCoordinator, TargetId};
pub use locks::KeyLockTable;
pub use pause::PauseGate;
pub use worker::{QueueDiscipline, Task, WorkerPool, WorkerPoolConfig};
