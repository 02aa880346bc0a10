//! Canny edge detection.
//!
//! Grayscale conversion, Gaussian blur, Sobel gradients, non-maximum
//! suppression and hysteresis, producing a one-pixel-wide binary edge
//! mask. Hysteresis thresholds are ratios of the strongest surviving
//! gradient, so the detector adapts to image contrast.
//!
//! This is step 3 in the pipeline for the photo strategy, between
//! resampling and contour tracing.

use std::collections::VecDeque;

use image::Luma;
use imageproc::filter::filter_clamped;
use imageproc::kernel::Kernel;

use crate::blur::gaussian_blur;
use crate::raster::luminance;
use crate::types::{BinaryMask, GrayF32, RgbaImage};

/// Detect edges using the Canny algorithm.
///
/// Pixels whose suppressed gradient magnitude is at least
/// `max · high_ratio` seed edges; pixels at least `max · low_ratio` join
/// an edge when 8-connected to a seed. An image without any gradient
/// yields an empty mask.
#[must_use = "returns the binary edge mask"]
pub fn detect_edges(
    image: &RgbaImage,
    sigma: f32,
    low_ratio: f32,
    high_ratio: f32,
) -> BinaryMask {
    let gray = grayscale_f32(image);
    let blurred = gaussian_blur(&gray, sigma);
    let (magnitude, direction) = sobel(&blurred);
    let thinned = non_maximum_suppression(&magnitude, &direction);

    let max = thinned.pixels().map(|p| p.0[0]).fold(0.0f32, f32::max);
    if max <= 0.0 {
        log::debug!("edge: no gradient");
        return BinaryMask::new(image.width(), image.height());
    }

    let mask = hysteresis(&thinned, max * low_ratio, max * high_ratio);
    log::debug!(
        "edge: max gradient {max:.1}, {} edge pixels",
        mask.count_foreground()
    );
    mask
}

/// Luminance plane in floating point.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn grayscale_f32(image: &RgbaImage) -> GrayF32 {
    GrayF32::from_fn(image.width(), image.height(), |x, y| {
        Luma([luminance(*image.get_pixel(x, y)) as f32])
    })
}

/// [`imageproc::kernel::SOBEL_HORIZONTAL_3X3`] with `f32` taps, so it
/// applies to a floating-point plane.
const SOBEL_HORIZONTAL: Kernel<'static, f32> =
    Kernel::new(&[-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0], 3, 3);

/// [`imageproc::kernel::SOBEL_VERTICAL_3X3`] with `f32` taps.
const SOBEL_VERTICAL: Kernel<'static, f32> =
    Kernel::new(&[-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0], 3, 3);

/// Sobel magnitude and direction (radians). Both are zero on the
/// one-pixel border, where the clamped gradients are not meaningful.
fn sobel(image: &GrayF32) -> (GrayF32, GrayF32) {
    let gx = filter_clamped::<_, f32, f32>(image, SOBEL_HORIZONTAL);
    let gy = filter_clamped::<_, f32, f32>(image, SOBEL_VERTICAL);

    let (w, h) = (image.width(), image.height());
    let interior = |x: u32, y: u32| x > 0 && y > 0 && x + 1 < w && y + 1 < h;
    let component = |plane: &GrayF32, x: u32, y: u32| {
        if interior(x, y) {
            plane.get_pixel(x, y).0[0]
        } else {
            0.0
        }
    };

    let magnitude = GrayF32::from_fn(w, h, |x, y| {
        Luma([component(&gx, x, y).hypot(component(&gy, x, y))])
    });
    let direction = GrayF32::from_fn(w, h, |x, y| {
        Luma([component(&gy, x, y).atan2(component(&gx, x, y))])
    });
    (magnitude, direction)
}

/// Keep only pixels that are local maxima along the gradient direction,
/// quantized to 0°, 45°, 90° or 135°.
fn non_maximum_suppression(magnitude: &GrayF32, direction: &GrayF32) -> GrayF32 {
    let (w, h) = (magnitude.width(), magnitude.height());
    let mut out = GrayF32::new(w, h);
    let at = |x: u32, y: u32| magnitude.get_pixel(x, y).0[0];

    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let m = at(x, y);
            if m <= 0.0 {
                continue;
            }
            let mut angle = direction.get_pixel(x, y).0[0].to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }
            let (a, b) = if !(22.5..157.5).contains(&angle) {
                (at(x - 1, y), at(x + 1, y))
            } else if angle < 67.5 {
                (at(x + 1, y + 1), at(x - 1, y - 1))
            } else if angle < 112.5 {
                (at(x, y - 1), at(x, y + 1))
            } else {
                (at(x - 1, y + 1), at(x + 1, y - 1))
            };
            if m >= a && m >= b {
                out.put_pixel(x, y, Luma([m]));
            }
        }
    }
    out
}

/// Double-threshold the thinned magnitudes, then grow strong seeds
/// through 8-connected weak pixels (breadth-first).
fn hysteresis(thinned: &GrayF32, low: f32, high: f32) -> BinaryMask {
    let (w, h) = (thinned.width(), thinned.height());
    let mut mask = BinaryMask::new(w, h);
    let mut queue = VecDeque::new();
    let at = |x: u32, y: u32| thinned.get_pixel(x, y).0[0];

    for y in 0..h {
        for x in 0..w {
            let m = at(x, y);
            if m > 0.0 && m >= high {
                mask.set(x, y, true);
                queue.push_back((x, y));
            }
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in neighbors8(x, y, w, h) {
            let m = at(nx, ny);
            if !mask.get(nx, ny) && m > 0.0 && m >= low {
                mask.set(nx, ny, true);
                queue.push_back((nx, ny));
            }
        }
    }
    mask
}

/// In-bounds 8-connected neighbours of `(x, y)`.
fn neighbors8(x: u32, y: u32, w: u32, h: u32) -> impl Iterator<Item = (u32, u32)> {
    (-1i64..=1)
        .flat_map(|dy| (-1i64..=1).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| dx != 0 || dy != 0)
        .filter_map(move |(dx, dy)| {
            let nx = u32::try_from(i64::from(x) + dx).ok()?;
            let ny = u32::try_from(i64::from(y) + dy).ok()?;
            (nx < w && ny < h).then_some((nx, ny))
        })
}
