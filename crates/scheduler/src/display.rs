//! Tracking which load each display target is currently waiting for.
//!
//! A display target (an image view, a tile slot) can be reused for a new
//! resource while an older load for it is still in flight. The coordinator
//! records, per target, the cache key of the most recently requested load;
//! in-flight tasks compare their own key against this record to detect that
//! they have gone stale and should abandon their work.

use std::collections::HashMap;
use std::sync::Mutex;

/// Stable identity of a display target across reuse.
pub type TargetId = u64;

/// Maps display targets to the cache key they currently expect.
///
/// All methods take `&self`; the map is guarded internally.
pub struct DisplayCoordinator {
    expected: Mutex<HashMap<TargetId, String>>,
}

impl DisplayCoordinator {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self {
            expected: Mutex::new(HashMap::new()),
        }
    }

    /// Record that a target now expects the given cache key.
    ///
    /// Overwrites any previous expectation, which is what marks older
    /// in-flight loads for that target as stale.
    pub fn prepare(&self, target: TargetId, cache_key: &str) {
        let mut expected = self.expected.lock().unwrap();
        expected.insert(target, cache_key.to_string());
    }

    /// The cache key a target currently expects, if any.
    pub fn expected_key(&self, target: TargetId) -> Option<String> {
        let expected = self.expected.lock().unwrap();
        expected.get(&target).cloned()
    }

    /// Check whether `cache_key` is still what the target expects.
    ///
    /// Returns `false` both when the target has been re-prepared for a
    /// different key and when it has been cancelled outright.
    pub fn is_current(&self, target: TargetId, cache_key: &str) -> bool {
        let expected = self.expected.lock().unwrap();
        expected.get(&target).map(String::as_str) == Some(cache_key)
    }

    /// Forget a target's expectation entirely.
    ///
    /// Any in-flight load for the target observes this as staleness.
    /// Returns `true` if the target had an expectation.
    pub fn cancel(&self, target: TargetId) -> bool {
        let mut expected = self.expected.lock().unwrap();
        expected.remove(&target).is_some()
    }

    /// Number of targets with a recorded expectation.
    pub fn len(&self) -> usize {
        let expected = self.expected.lock().unwrap();
        expected.len()
    }

    /// Check if no target has a recorded expectation.
    pub fn is_empty(&self) -> bool {
        let expected = self.expected.lock().unwrap();
        expected.is_empty()
    }

    /// Drop all expectations.
    pub fn clear(&self) {
        let mut expected = self.expected.lock().unwrap();
        expected.clear();
    }
}

impl Default for DisplayCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
