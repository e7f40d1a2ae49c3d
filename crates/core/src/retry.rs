//! Bounded retry for decode-time allocation failures.
//!
//! Only [`LoadError::ResourceExhausted`] is retried; every other error
//! propagates immediately. Before the final attempt the caller-supplied
//! relief action runs (the engine clears the whole memory cache there).
//! The inter-attempt delay is injectable so tests run without sleeping.

use crate::error::LoadError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Base delay multiplied by the attempt number between retries.
const DEFAULT_DELAY_STEP_MS: u64 = 100;

/// Retry policy for resource-exhaustion failures.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Arc<dyn Fn(u32) + Send + Sync>,
}

impl RetryPolicy {
    /// Create a policy allowing up to `max_attempts` attempts (minimum 1),
    /// sleeping `attempt * 100ms` before each retry.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Arc::new(|attempt| {
                thread::sleep(Duration::from_millis(
                    DEFAULT_DELAY_STEP_MS * attempt as u64,
                ));
            }),
        }
    }

    /// Policy that never retries.
    pub fn disabled() -> Self {
        Self::new(1)
    }

    /// Replace the inter-attempt delay function.
    ///
    /// The function receives the attempt number that just failed.
    pub fn with_delay(mut self, delay: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.delay = Arc::new(delay);
        self
    }

    /// Maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// exhausts the attempt budget.
    ///
    /// `relief` runs exactly once, before the final attempt, and only when
    /// that final attempt is actually reached.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, LoadError>,
        mut relief: impl FnMut(),
    ) -> Result<T, LoadError> {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(LoadError::ResourceExhausted(reason)) => {
                    if attempt >= self.max_attempts {
                        return Err(LoadError::ResourceExhausted(reason));
                    }
                    if attempt + 1 == self.max_attempts {
                        relief();
                    }
                    (self.delay)(attempt);
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
