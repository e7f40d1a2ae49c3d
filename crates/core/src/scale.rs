//! Pure scale math for decode-time downscaling.
//!
//! Two policies compute an integer subsample factor applied before the
//! decoded raster is allocated, bounding peak memory. An optional second
//! pass (see [`exact_scale`]) then scales the subsampled raster to the
//! precise target box.

/// How the scaled image relates to the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleKind {
    /// Both scaled dimensions end up within the target box.
    FitInside,
    /// The scaled image covers the whole target box, overflowing one axis.
    CropToFill,
}

/// How the subsample factor is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePolicy {
    /// Repeatedly halve the source dimensions. Cheapest to decode.
    PowerOfTwo,
    /// Integer ratio of source to target dimensions.
    ExactInteger,
}

/// Compute the integer subsample factor for decoding.
///
/// Always returns at least 1. `FitInside` downscales more aggressively
/// than `CropToFill`: it keeps halving while either halved dimension would
/// still reach the target, while `CropToFill` stops as soon as one axis
/// would drop below it.
pub fn sample_size(
    src_width: u32,
    src_height: u32,
    target_width: u32,
    target_height: u32,
    policy: SamplePolicy,
    kind: ScaleKind,
) -> u32 {
    let target_width = target_width.max(1);
    let target_height = target_height.max(1);

    match policy {
        SamplePolicy::PowerOfTwo => {
            let mut width = src_width;
            let mut height = src_height;
            let mut sample = 1;
            loop {
                let proceed = match kind {
                    ScaleKind::FitInside => {
                        width / 2 >= target_width || height / 2 >= target_height
                    }
                    ScaleKind::CropToFill => {
                        width / 2 >= target_width && height / 2 >= target_height
                    }
                };
                if !proceed {
                    break;
                }
                width /= 2;
                height /= 2;
                sample *= 2;
            }
            sample
        }
        SamplePolicy::ExactInteger => {
            let sample = match kind {
                ScaleKind::FitInside => {
                    (src_width / target_width).max(src_height / target_height)
                }
                ScaleKind::CropToFill => {
                    (src_width / target_width).min(src_height / target_height)
                }
            };
            sample.max(1)
        }
    }
}

/// Floating-point factor scaling a raster to the exact target box.
///
/// `FitInside` takes the smaller ratio so both axes fit; `CropToFill`
/// takes the larger so both axes cover. Callers typically apply this only
/// when it is below 1 (never upscale).
pub fn exact_scale(
    src_width: u32,
    src_height: u32,
    target_width: u32,
    target_height: u32,
    kind: ScaleKind,
) -> f32 {
    let width_ratio = target_width as f32 / src_width.max(1) as f32;
    let height_ratio = target_height as f32 / src_height.max(1) as f32;
    match kind {
        ScaleKind::FitInside => width_ratio.min(height_ratio),
        ScaleKind::CropToFill => width_ratio.max(height_ratio),
    }
}

/// Divide a dimension by a subsample factor, never dropping below 1 pixel.
pub fn scaled_down(dimension: u32, sample: u32) -> u32 {
    (dimension / sample.max(1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_of_two_fit_inside() {
        // 1000x800 into 200x200: halving stops at 250x200 (factor 4)
        let sample = sample_size(
            1000,
            800,
            200,
            200,
            SamplePolicy::PowerOfTwo,
            ScaleKind::FitInside,
        );
        assert_eq!(sample, 4);
    }

    #[test]
    fn test_power_of_two_fit_vs_crop_asymmetric() {
        // 1000x400 into 200x200: fit keeps halving while either axis can,
        // crop stops as soon as the short axis would underflow.
        let fit = sample_size(
            1000,
            400,
            200,
            200,
            SamplePolicy::PowerOfTwo,
            ScaleKind::FitInside,
        );
        let crop = sample_size(
            1000,
            400,
            200,
            200,
            SamplePolicy::PowerOfTwo,
            ScaleKind::CropToFill,
        );
        assert_eq!(fit, 4);
        assert_eq!(crop, 2);
    }

    #[test]
    fn test_source_smaller_than_target() {
        let sample = sample_size(
            100,
            100,
            200,
            200,
            SamplePolicy::PowerOfTwo,
            ScaleKind::FitInside,
        );
        assert_eq!(sample, 1);
    }

    #[test]
    fn test_exact_integer() {
        let fit = sample_size(
            1000,
            400,
            200,
            200,
            SamplePolicy::ExactInteger,
            ScaleKind::FitInside,
        );
        let crop = sample_size(
            1000,
            400,
            200,
            200,
            SamplePolicy::ExactInteger,
            ScaleKind::CropToFill,
        );
        assert_eq!(fit, 5); // max(1000/200, 400/200)
        assert_eq!(crop, 2); // min(1000/200, 400/200)
    }

    #[test]
    fn test_exact_integer_never_zero() {
        let sample = sample_size(
            50,
            50,
            200,
            200,
            SamplePolicy::ExactInteger,
            ScaleKind::FitInside,
        );
        assert_eq!(sample, 1);
    }

    #[test]
    fn test_zero_target_is_clamped() {
        let sample = sample_size(
            1000,
            1000,
            0,
            0,
            SamplePolicy::ExactInteger,
            ScaleKind::FitInside,
        );
        assert_eq!(sample, 1000);
    }

    #[test]
    fn test_exact_scale_fit_and_crop() {
        let fit = exact_scale(400, 200, 100, 100, ScaleKind::FitInside);
        let crop = exact_scale(400, 200, 100, 100, ScaleKind::CropToFill);
        assert!((fit - 0.25).abs() < 1e-6);
        assert!((crop - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_scaled_down_floor_is_one() {
        assert_eq!(scaled_down(3, 8), 1);
        assert_eq!(scaled_down(1000, 4), 250);
    }
}
