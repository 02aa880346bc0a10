//! Image classification from a small preview raster.
//!
//! Scores tonal entropy, color variety, edge density and contrast, then
//! assigns one of four categories that decide how the orchestrator
//! extracts shapes. Also recommends Canny parameters for the category.
//!
//! This is step 2 in the pipeline, run on a preview no larger than
//! [`TraceConfig::preview_size`](crate::TraceConfig::preview_size).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::raster::{luminance, uses_alpha};
use crate::types::RgbaImage;

/// Number of luminance bins for the entropy histogram.
const ENTROPY_BINS: usize = 64;

/// Central-difference gradient magnitude above which a sampled pixel
/// counts as an edge.
const EDGE_GRADIENT_THRESHOLD: f64 = 20.0;

/// Edge density above which photo blur is increased.
const NOISY_EDGE_DENSITY: f64 = 0.25;

/// Image category assigned by [`analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageCategory {
    /// Significant transparency: the alpha channel is the shape.
    Alpha,
    /// Few flat colors.
    Logo,
    /// Limited tonal range or few colors with soft detail.
    Illustration,
    /// Everything else.
    Photo,
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Alpha => "alpha",
            Self::Logo => "logo",
            Self::Illustration => "illustration",
            Self::Photo => "photo",
        })
    }
}

/// Canny edge detector parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CannyParams {
    /// Gaussian blur sigma applied before gradient computation.
    pub sigma: f32,
    /// Low hysteresis threshold as a fraction of the strongest gradient.
    pub low_ratio: f32,
    /// High hysteresis threshold as a fraction of the strongest gradient.
    pub high_ratio: f32,
}

impl CannyParams {
    /// Create a parameter set.
    #[must_use]
    pub const fn new(sigma: f32, low_ratio: f32, high_ratio: f32) -> Self {
        Self {
            sigma,
            low_ratio,
            high_ratio,
        }
    }

    /// Fixed per-category recommendation. Noisy photos get extra blur.
    #[must_use]
    pub fn recommended(category: ImageCategory, edge_density: f64) -> Self {
        match category {
            ImageCategory::Alpha => Self::new(1.0, 0.05, 0.15),
            ImageCategory::Logo => Self::new(1.0, 0.08, 0.2),
            ImageCategory::Illustration => Self::new(1.4, 0.06, 0.18),
            ImageCategory::Photo => {
                let sigma = if edge_density > NOISY_EDGE_DENSITY {
                    2.5
                } else {
                    2.0
                };
                Self::new(sigma, 0.05, 0.15)
            }
        }
    }
}

/// Statistics and category of a preview raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    /// Assigned category.
    pub category: ImageCategory,
    /// More than 10% of pixels are transparent.
    pub uses_alpha: bool,
    /// Occupied cells of the 4×4×4 quantized color cube (0-64).
    pub unique_colors: u32,
    /// Normalized Shannon entropy of the luminance histogram (0-1).
    pub entropy: f64,
    /// Fraction of sampled pixels with a strong gradient (0-1).
    pub edge_density: f64,
    /// Luminance standard deviation over mean (0 when the mean is 0).
    pub contrast_ratio: f64,
    /// Recommended edge detector parameters.
    pub canny: CannyParams,
}

/// Classify a raster.
///
/// Deterministic and infallible. An empty raster has all-zero
/// statistics and falls through the same rules as any other image.
#[must_use = "returns the image analysis"]
pub fn analyze(image: &RgbaImage) -> ImageAnalysis {
    let uses_alpha = uses_alpha(image);
    let lum: Vec<f64> = image.pixels().map(|&p| luminance(p)).collect();
    let contrast_ratio = contrast_ratio(&lum);
    let entropy = tonal_entropy(&lum);
    let unique_colors = unique_colors(image);
    let edge_density = edge_density(&lum, image.width() as usize, image.height() as usize);

    let category = if uses_alpha {
        ImageCategory::Alpha
    } else if unique_colors <= 12 && entropy < 0.55 {
        ImageCategory::Logo
    } else if entropy < 0.7 || (unique_colors <= 24 && edge_density < 0.15) {
        ImageCategory::Illustration
    } else {
        ImageCategory::Photo
    };

    ImageAnalysis {
        category,
        uses_alpha,
        unique_colors,
        entropy,
        edge_density,
        contrast_ratio,
        canny: CannyParams::recommended(category, edge_density),
    }
}

#[allow(clippy::cast_precision_loss)]
fn contrast_ratio(lum: &[f64]) -> f64 {
    if lum.is_empty() {
        return 0.0;
    }
    let n = lum.len() as f64;
    let mean = lum.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = lum.iter().map(|l| (l - mean) * (l - mean)).sum::<f64>() / n;
    variance.sqrt() / mean
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn tonal_entropy(lum: &[f64]) -> f64 {
    if lum.is_empty() {
        return 0.0;
    }
    let mut histogram = [0u64; ENTROPY_BINS];
    for &l in lum {
        let bin = ((l / 4.0) as usize).min(ENTROPY_BINS - 1);
        histogram[bin] += 1;
    }
    let n = lum.len() as f64;
    let bits: f64 = histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / n;
            -p * p.log2()
        })
        .sum();
    bits / (ENTROPY_BINS as f64).log2()
}

fn unique_colors(image: &RgbaImage) -> u32 {
    let mut occupied = [false; 64];
    for p in image.pixels() {
        let [r, g, b, _] = p.0;
        occupied[usize::from(r >> 6) * 16 + usize::from(g >> 6) * 4 + usize::from(b >> 6)] = true;
    }
    occupied.iter().map(|&o| u32::from(o)).sum()
}

/// Every second interior pixel on both axes, central differences.
#[allow(clippy::cast_precision_loss)]
fn edge_density(lum: &[f64], width: usize, height: usize) -> f64 {
    let mut sampled = 0u64;
    let mut edges = 0u64;
    for y in (1..height.saturating_sub(1)).step_by(2) {
        for x in (1..width.saturating_sub(1)).step_by(2) {
            let gx = lum[y * width + x + 1] - lum[y * width + x - 1];
            let gy = lum[(y + 1) * width + x] - lum[(y - 1) * width + x];
            sampled += 1;
            if gx.hypot(gy) > EDGE_GRADIENT_THRESHOLD {
                edges += 1;
            }
        }
    }
    if sampled == 0 {
        0.0
    } else {
        edges as f64 / sampled as f64
    }
}
