//! Image decoding and resampling.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces an RGBA
//! raster, then reduces it so the longest axis fits a target size. This
//! is the first step in the pipeline: both the classifier preview and the
//! traced working raster come from here.
//!
//! Rasters are never upscaled. If the image already fits, it is returned
//! unchanged.

use std::fmt;

use image::{DynamicImage, Rgba};
use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, RgbaImage};

/// Alpha values below this count as transparent for [`uses_alpha`].
const TRANSPARENT_ALPHA: u8 = 10;

/// Resampling filter used when shrinking a raster.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality,
/// with a `Disabled` variant to skip resampling entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Skip resampling regardless of image size.
    Disabled,
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    ///
    /// Returns `None` for [`ResampleFilter::Disabled`].
    const fn to_image_filter(self) -> Option<image::imageops::FilterType> {
        match self {
            Self::Disabled => None,
            Self::Nearest => Some(image::imageops::FilterType::Nearest),
            Self::Triangle => Some(image::imageops::FilterType::Triangle),
            Self::CatmullRom => Some(image::imageops::FilterType::CatmullRom),
            Self::Gaussian => Some(image::imageops::FilterType::Gaussian),
            Self::Lanczos3 => Some(image::imageops::FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "Disabled",
            Self::Nearest => "Nearest",
            Self::Triangle => "Triangle",
            Self::CatmullRom => "CatmullRom",
            Self::Gaussian => "Gaussian",
            Self::Lanczos3 => "Lanczos3",
        })
    }
}

/// Decode raw image bytes into an RGBA raster.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded raster"]
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Shrink a raster so the longest axis is at most `max_dimension`
/// pixels, preserving the aspect ratio.
///
/// Returns the (possibly unchanged) raster and whether resampling was
/// actually applied.
#[must_use]
pub fn fit_within(
    image: &RgbaImage,
    max_dimension: u32,
    filter: ResampleFilter,
) -> (RgbaImage, bool) {
    let Some(image_filter) = filter.to_image_filter() else {
        return (image.clone(), false);
    };

    if image.width().max(image.height()) <= max_dimension {
        return (image.clone(), false);
    }

    let resized = DynamicImage::ImageRgba8(image.clone())
        .resize(max_dimension, max_dimension, image_filter)
        .to_rgba8();
    (resized, true)
}

/// Perceptual luminance `0.299 R + 0.587 G + 0.114 B` in `[0, 255]`.
#[must_use]
pub fn luminance(pixel: Rgba<u8>) -> f64 {
    let [r, g, b, _] = pixel.0;
    0.114f64.mul_add(
        f64::from(b),
        0.299f64.mul_add(f64::from(r), 0.587 * f64::from(g)),
    )
}

/// Whether more than 10% of the pixels are (nearly) fully transparent.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn uses_alpha(image: &RgbaImage) -> bool {
    let total = u64::from(image.width()) * u64::from(image.height());
    let transparent = image
        .pixels()
        .filter(|p| p.0[3] < TRANSPARENT_ALPHA)
        .count() as u64;
    transparent as f64 > total as f64 * 0.1
}
