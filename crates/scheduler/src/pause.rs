//! Pause gate for holding back task execution.
//!
//! Provides a shared flag that workers check before starting a task. While
//! the gate is paused, workers block at the gate; resuming wakes them all.
//! Tasks already past the gate run to completion.

use std::sync::{Arc, Condvar, Mutex};

/// Shared pause flag with blocking wait support.
///
/// # Example
///
/// ```
/// use pixload_scheduler::PauseGate;
///
/// let gate = PauseGate::new();
/// gate.pause();
///
/// // In worker thread, before starting a task:
/// // gate.wait_if_paused();
///
/// gate.resume(); // wakes all blocked workers
/// ```
#[derive(Clone)]
pub struct PauseGate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl PauseGate {
    /// Create a new gate in the running (not paused) state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Pause the gate.
    ///
    /// Workers calling [`PauseGate::wait_if_paused`] after this will block.
    /// Idempotent.
    pub fn pause(&self) {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap() = true;
    }

    /// Resume the gate, waking every blocked worker. Idempotent.
    pub fn resume(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = false;
        cvar.notify_all();
    }

    /// Check whether the gate is currently paused.
    pub fn is_paused(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap()
    }

    /// Block until the gate is not paused.
    ///
    /// Returns immediately when the gate is running.
    pub fn wait_if_paused(&self) {
        let (lock, cvar) = &*self.inner;
        let mut paused = lock.lock().unwrap();
        while *paused {
            paused = cvar.wait(paused).unwrap();
        }
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}
