//! Gaussian blur for noise reduction before edge detection.
//!
//! Wraps [`imageproc::filter::separable_filter_equal`] with a Gaussian
//! kernel of radius `ceil(3 σ)`. Samples past the border are clamped to
//! the nearest valid pixel.

use crate::types::GrayF32;

/// Normalized 1-D Gaussian kernel of radius `ceil(3 σ)`.
///
/// The kernel has `2 · radius + 1` taps summing to 1. Non-positive sigma
/// yields the identity kernel `[1.0]`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 {
        return vec![1.0];
    }

    let radius = (3.0 * sigma).ceil() as i32;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| {
            let d = i as f32;
            (-(d * d) / two_sigma_sq).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Apply a separable Gaussian blur.
///
/// Higher `sigma` values produce more smoothing. Non-positive sigma
/// values return the image unchanged.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayF32, sigma: f32) -> GrayF32 {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::separable_filter_equal(image, &gaussian_kernel(sigma))
}
