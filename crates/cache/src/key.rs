//! Cache key derivation.
//!
//! Two distinct key spaces exist:
//!
//! - the **resource key** (the resource identifier itself), used for
//!   per-resource locking and disk cache lookups, and
//! - the **memory cache key**, which combines the resource identifier with
//!   the requested target size so that distinct sizes of the same resource
//!   are distinct memory entries.

/// Separator between the resource identifier and the size suffix in a
/// memory cache key.
const SIZE_SEPARATOR: &str = "_";

/// Build the memory cache key for a resource at a specific target size.
///
/// Format: `<resource identifier>_<width>x<height>`.
pub fn memory_key(resource: &str, width: u32, height: u32) -> String {
    format!("{resource}{SIZE_SEPARATOR}{width}x{height}")
}

/// Extract the resource identifier from a memory cache key.
///
/// Returns the full key unchanged if it does not carry a size suffix,
/// so callers can safely feed arbitrary keys through it.
pub fn resource_of(memory_key: &str) -> &str {
    match memory_key.rfind(SIZE_SEPARATOR) {
        Some(idx) if is_size_suffix(&memory_key[idx + 1..]) => &memory_key[..idx],
        _ => memory_key,
    }
}

/// Check whether two memory cache keys refer to the same resource,
/// regardless of target size.
pub fn same_resource(a: &str, b: &str) -> bool {
    resource_of(a) == resource_of(b)
}

fn is_size_suffix(s: &str) -> bool {
    match s.split_once('x') {
        Some((w, h)) => {
            !w.is_empty()
                && !h.is_empty()
                && w.bytes().all(|b| b.is_ascii_digit())
                && h.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}
