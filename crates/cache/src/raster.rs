//! Decoded raster value type shared by the memory and disk caches.

use std::sync::Arc;

/// A fully decoded, uncompressed RGBA pixel buffer.
///
/// This is the value stored in the memory cache and (in raw form) on disk.
/// Size accounting everywhere in the cache system uses the decoded byte
/// size (`row stride * height`), never the compressed source size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Raw pixel data (RGBA format, 4 bytes per pixel)
    pub pixels: Vec<u8>,
}

impl Raster {
    /// Bytes per pixel for RGBA data.
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Create a raster from pre-filled RGBA pixel data.
    ///
    /// # Panics
    ///
    /// Panics if `pixels.len()` does not match `width * height * 4`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(
            pixels.len(),
            width as usize * height as usize * Self::BYTES_PER_PIXEL,
            "pixel buffer length does not match dimensions"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create a raster filled with a single RGBA color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize * Self::BYTES_PER_PIXEL
    }

    /// Decoded size in bytes (row stride times height).
    pub fn byte_size(&self) -> usize {
        self.stride() * self.height as usize
    }
}

/// Shared handle to a decoded raster.
///
/// The caches hand out clones of this handle; eviction drops the cache's
/// reference but never invalidates a handle a caller already holds.
pub type SharedRaster = Arc<Raster>;
