//! Decoding byte streams into rasters.
//!
//! The subsample factor is computed from the encoded dimensions and applied
//! as the first resize so the full-resolution raster is short-lived. When
//! exact sizing is requested a second pass scales to the precise target box
//! and the intermediate raster is released.

use crate::error::LoadError;
use crate::scale::{self, SamplePolicy, ScaleKind};
use image::imageops::FilterType;
use image::GenericImageView;
use pixload_cache::Raster;

/// Sizing parameters for a single decode.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Target width in pixels
    pub target_width: u32,

    /// Target height in pixels
    pub target_height: u32,

    /// How the subsample factor is chosen
    pub sample_policy: SamplePolicy,

    /// How the result relates to the target box
    pub scale_kind: ScaleKind,

    /// Apply a second exact-scaling pass down to the target box
    pub exact: bool,
}

/// Decodes encoded image bytes into an RGBA raster at a bounded size.
pub trait Decoder: Send + Sync {
    fn decode(&self, bytes: &[u8], options: &DecodeOptions) -> Result<Raster, LoadError>;
}

/// Decoder backed by the `image` crate.
///
/// Format detection is by content, not file extension.
pub struct ImageDecoder;

impl ImageDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ImageDecoder {
    fn decode(&self, bytes: &[u8], options: &DecodeOptions) -> Result<Raster, LoadError> {
        let mut decoded = image::load_from_memory(bytes).map_err(map_image_error)?;
        let (src_width, src_height) = decoded.dimensions();

        let sample = scale::sample_size(
            src_width,
            src_height,
            options.target_width,
            options.target_height,
            options.sample_policy,
            options.scale_kind,
        );
        if sample > 1 {
            decoded = decoded.resize_exact(
                scale::scaled_down(src_width, sample),
                scale::scaled_down(src_height, sample),
                FilterType::Nearest,
            );
        }

        if options.exact {
            let (width, height) = decoded.dimensions();
            let factor = scale::exact_scale(
                width,
                height,
                options.target_width,
                options.target_height,
                options.scale_kind,
            );
            // Never upscale; the subsampled raster is already at or above
            // the target.
            if factor < 1.0 {
                decoded = decoded.resize_exact(
                    ((width as f32 * factor).round() as u32).max(1),
                    ((height as f32 * factor).round() as u32).max(1),
                    FilterType::Triangle,
                );
            }
        }

        let rgba = decoded.into_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Raster::new(width, height, rgba.into_raw()))
    }
}

fn map_image_error(error: image::ImageError) -> LoadError {
    match error {
        image::ImageError::Limits(e) => LoadError::ResourceExhausted(e.to_string()),
        image::ImageError::IoError(e) => LoadError::Io(e),
        other => LoadError::Decode(other.to_string()),
    }
}
