//! Error taxonomy for load tasks.
//!
//! Staleness is deliberately absent here: a stale task is reported through
//! the listener's cancellation callback, never as an error.

use thiserror::Error;

/// Failure modes of an image load task.
///
/// All task-body failures are caught at the task boundary and delivered
/// through the listener on the callback context; nothing propagates to the
/// submitting thread.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Network or filesystem failure while fetching or persisting bytes.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream could not be decoded into a raster.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Decode-time allocation failure. Retried internally; surfaced only
    /// after every attempt fails.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Anything else that escaped the task body.
    #[error("{0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, LoadError>;
