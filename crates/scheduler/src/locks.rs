//! Per-key mutual exclusion for concurrent tasks.
//!
//! Tasks loading the same resource must serialize so that only the first
//! does the expensive work and the rest observe its result. The table
//! hands out one shared lock per key, held only while tasks for that key
//! are alive: entries are weak references, so a key's lock is reclaimed
//! as soon as the last task holding it finishes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// Table of per-key locks, weakly retained.
///
/// # Example
///
/// ```
/// use pixload_scheduler::KeyLockTable;
///
/// let table = KeyLockTable::new();
/// let lock = table.acquire("https://example.com/a.png");
/// let _guard = lock.lock().unwrap();
/// // other tasks calling acquire() for the same key get the same lock
/// ```
pub struct KeyLockTable {
    locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl KeyLockTable {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get the shared lock for a key, creating one if no live lock exists.
    ///
    /// Two concurrent calls with the same key return the same underlying
    /// lock as long as at least one strong handle to it is still alive.
    pub fn acquire(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();

        if let Some(existing) = locks.get(key).and_then(Weak::upgrade) {
            return existing;
        }

        let lock = Arc::new(Mutex::new(()));
        locks.insert(key.to_string(), Arc::downgrade(&lock));

        // Drop entries whose locks have died; keeps the table bounded by
        // the number of in-flight keys.
        locks.retain(|_, weak| weak.strong_count() > 0);

        lock
    }

    /// Number of keys with a live lock.
    pub fn live_count(&self) -> usize {
        let locks = self.locks.lock().unwrap();
        locks.values().filter(|w| w.strong_count() > 0).count()
    }
}

impl Default for KeyLockTable {
    fn default() -> Self {
        Self::new()
    }
}
