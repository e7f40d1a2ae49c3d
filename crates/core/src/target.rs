//! Display target abstraction.
//!
//! The engine never inspects UI internals; everything it needs from the
//! displaying side comes through this capability interface.

use pixload_cache::SharedRaster;
use pixload_scheduler::TargetId;

/// The UI-side object that ultimately shows a raster.
///
/// Implementations must be safe to call from worker and callback threads.
/// `id` must be stable across reuse of the same slot, since it is the key
/// for staleness detection.
pub trait DisplayTarget: Send + Sync {
    /// Stable identity of this target.
    fn id(&self) -> TargetId;

    /// The width this target wants, if it knows it yet.
    fn requested_width(&self) -> Option<u32>;

    /// The height this target wants, if it knows it yet.
    fn requested_height(&self) -> Option<u32>;

    /// Apply a finished raster. Only ever called for the target's current
    /// request, on the callback context.
    fn set_image(&self, image: SharedRaster);

    /// Whether the target is still live. A detached target's result is
    /// discarded.
    fn is_attached(&self) -> bool {
        true
    }
}

/// Resolve the size to decode for, falling back per axis from the target's
/// requested size to the configured default.
pub fn resolve_size(target: &dyn DisplayTarget, default_size: (u32, u32)) -> (u32, u32) {
    let width = target.requested_width().unwrap_or(default_size.0);
    let height = target.requested_height().unwrap_or(default_size.1);
    (width, height)
}
