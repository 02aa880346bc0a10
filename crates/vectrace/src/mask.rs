//! Binary shape masks from alpha or luminance.
//!
//! Images with significant transparency use the alpha channel directly.
//! Everything else is split by an Otsu threshold on integer luminance,
//! with the darker class as foreground.
//!
//! This is step 3 in the pipeline for the alpha, logo and illustration
//! strategies.

use crate::raster::{luminance, uses_alpha};
use crate::types::{BinaryMask, RgbaImage};

/// Alpha above which a pixel belongs to the shape.
const OPAQUE_ALPHA: u8 = 128;

/// Threshold used when the histogram has no two-class split.
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Build the foreground mask for a raster.
///
/// Never fails. A uniform image keeps [`DEFAULT_THRESHOLD`], so it is
/// entirely foreground or entirely background.
#[must_use = "returns the binary mask"]
pub fn to_mask(image: &RgbaImage) -> BinaryMask {
    if uses_alpha(image) {
        log::debug!("mask: alpha channel > {OPAQUE_ALPHA}");
        return BinaryMask::from_fn(image.width(), image.height(), |x, y| {
            image.get_pixel(x, y).0[3] > OPAQUE_ALPHA
        });
    }

    let threshold = otsu_threshold(&luminance_histogram(image));
    log::debug!("mask: otsu threshold {threshold}");
    BinaryMask::from_fn(image.width(), image.height(), |x, y| {
        integer_luminance(*image.get_pixel(x, y)) < threshold
    })
}

/// 256-bin histogram of rounded luminance.
#[must_use]
pub fn luminance_histogram(image: &RgbaImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for &p in image.pixels() {
        histogram[usize::from(integer_luminance(p))] += 1;
    }
    histogram
}

/// Otsu's threshold: the level that maximizes between-class variance
/// `wB · wF · (mB − mF)²`, where the background class is every level up to
/// and including the candidate.
///
/// Ties resolve to the highest level. Returns [`DEFAULT_THRESHOLD`] when
/// no level separates two non-empty classes.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn otsu_threshold(histogram: &[u64; 256]) -> u8 {
    let total: u64 = histogram.iter().sum();
    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut weight_bg = 0u64;
    let mut sum_bg = 0.0;
    let mut best_variance = 0.0;
    let mut threshold = DEFAULT_THRESHOLD;

    for (level, &count) in histogram.iter().enumerate() {
        weight_bg += count;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }

        sum_bg += level as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;
        let diff = mean_bg - mean_fg;
        let between = weight_bg as f64 * weight_fg as f64 * diff * diff;

        if between >= best_variance && between > 0.0 {
            best_variance = between;
            threshold = level as u8;
        }
    }

    threshold
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn integer_luminance(pixel: image::Rgba<u8>) -> u8 {
    luminance(pixel).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn gray(v: u8) -> Rgba<u8> {
        Rgba([v, v, v, 255])
    }

    /// Left third at 40, the rest at 210.
    fn bimodal() -> RgbaImage {
        RgbaImage::from_fn(30, 20, |x, _| if x < 10 { gray(40) } else { gray(210) })
    }

    #[test]
    fn bimodal_threshold_separates_modes() {
        let t = otsu_threshold(&luminance_histogram(&bimodal()));
        assert!(t > 40 && t < 210, "threshold {t} should lie strictly between 40 and 210");
    }

    #[test]
    fn bimodal_mask_selects_dark_class() {
        let mask = to_mask(&bimodal());
        assert_eq!((mask.width(), mask.height()), (30, 20));
        assert_eq!(mask.count_foreground(), 200);
        assert!(mask.get(0, 0));
        assert!(!mask.get(29, 19));
    }

    #[test]
    fn threshold_is_deterministic() {
        let hist = luminance_histogram(&bimodal());
        assert_eq!(otsu_threshold(&hist), otsu_threshold(&hist));
    }

    #[test]
    fn partition_matches_imageproc_otsu() {
        let img = bimodal();
        let ours = otsu_threshold(&luminance_histogram(&img));
        let gray_img = image::GrayImage::from_fn(img.width(), img.height(), |x, y| {
            image::Luma([integer_luminance(*img.get_pixel(x, y))])
        });
        let theirs = imageproc::contrast::otsu_level(&gray_img);
        // imageproc puts `level` in the dark class, we exclude `threshold`.
        for v in [40u8, 210] {
            assert_eq!(v < ours, v <= theirs, "level {v} classified differently");
        }
    }

    #[test]
    fn uniform_image_keeps_default() {
        let hist = luminance_histogram(&RgbaImage::from_pixel(8, 8, gray(90)));
        assert_eq!(otsu_threshold(&hist), DEFAULT_THRESHOLD);
        assert_eq!(to_mask(&RgbaImage::from_pixel(8, 8, gray(90))).count_foreground(), 64);
        assert!(to_mask(&RgbaImage::from_pixel(8, 8, gray(200))).is_empty());
    }

    #[test]
    fn empty_histogram_keeps_default() {
        assert_eq!(otsu_threshold(&[0; 256]), DEFAULT_THRESHOLD);
    }

    #[test]
    fn alpha_mask_follows_alpha_channel() {
        let img = RgbaImage::from_fn(16, 16, |x, y| {
            let a = if x < 8 { 0 } else if y < 8 { 129 } else { 128 };
            // Color deliberately dark everywhere; only alpha decides.
            Rgba([0, 0, 0, a])
        });
        let mask = to_mask(&img);
        for (x, y, p) in img.enumerate_pixels() {
            assert_eq!(mask.get(x, y), p.0[3] > 128, "pixel ({x}, {y})");
        }
        assert_eq!(mask.count_foreground(), 64);
    }

    #[test]
    fn empty_raster_gives_empty_mask() {
        let mask = to_mask(&RgbaImage::new(0, 0));
        assert_eq!((mask.width(), mask.height()), (0, 0));
        assert!(mask.is_empty());
    }
}
