//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the entire pipeline in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use vectrace::{Pipeline, PipelineError, TraceConfig};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let classified = Pipeline::new(png, TraceConfig::default())
//!     .decode()?
//!     .classify();
//! println!("category: {}", classified.analysis().category);
//!
//! let result = classified.prepare().extract().fit().into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying the previously computed intermediates the later stages need.
//! Only decoding is fallible; every later stage degrades to empty output
//! instead of failing.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::classify::{CannyParams, ImageAnalysis, ImageCategory};
use crate::contour::{ContourMode, ContourTracer};
use crate::diagnostics::StageMetrics;
use crate::types::{
    BinaryMask, Dimensions, PipelineError, Point, Polyline, RgbaImage, Stroke, TraceConfig,
    TraceResult,
};

/// Photo contour cap: `clamp(round(5 + 250 · edge_fraction), 5, 30)`.
const PHOTO_MIN_CONTOURS: f64 = 5.0;
const PHOTO_MAX_CONTOURS: f64 = 30.0;
const PHOTO_CONTOURS_PER_EDGE_FRACTION: f64 = 250.0;

/// Photo curves are fitted more loosely than shape outlines.
const PHOTO_TOLERANCE_SCALE: f64 = 1.2;

/// RDP epsilon as a fraction of the fitting tolerance.
const SIMPLIFY_TOLERANCE_RATIO: f64 = 0.5;

/// How shapes are extracted from the working raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Strategy {
    /// Alpha-channel mask, longest contour only.
    AlphaMask,
    /// Otsu luminance mask, up to `max_contours` contours.
    ThresholdMask {
        /// Contour cap.
        max_contours: usize,
    },
    /// Canny edge mask; the contour cap follows the detected edge
    /// fraction.
    Edges {
        /// Edge detector parameters.
        canny: CannyParams,
    },
}

impl Strategy {
    /// Pick the strategy for a classified image.
    #[must_use]
    pub const fn select(analysis: &ImageAnalysis, config: &TraceConfig) -> Self {
        match analysis.category {
            ImageCategory::Alpha => Self::AlphaMask,
            ImageCategory::Logo => Self::ThresholdMask {
                max_contours: config.logo_max_contours,
            },
            ImageCategory::Illustration => Self::ThresholdMask {
                max_contours: config.illustration_max_contours,
            },
            ImageCategory::Photo => Self::Edges {
                canny: analysis.canny,
            },
        }
    }

    /// Multiplier applied to the caller's tolerance before fitting.
    #[must_use]
    pub const fn tolerance_scale(&self) -> f64 {
        match self {
            Self::Edges { .. } => PHOTO_TOLERANCE_SCALE,
            Self::AlphaMask | Self::ThresholdMask { .. } => 1.0,
        }
    }
}

/// Contour cap for an edge mask: more edges allow more contours.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn photo_contour_cap(edges: &BinaryMask) -> usize {
    let total = u64::from(edges.width()) * u64::from(edges.height());
    let fraction = if total == 0 {
        0.0
    } else {
        edges.count_foreground() as f64 / total as f64
    };
    PHOTO_CONTOURS_PER_EDGE_FRACTION
        .mul_add(fraction, PHOTO_MIN_CONTOURS)
        .round()
        .clamp(PHOTO_MIN_CONTOURS, PHOTO_MAX_CONTOURS) as usize
}

/// Hash of the source bytes and every configuration field.
#[must_use]
pub fn fingerprint(source: &[u8], config: &TraceConfig) -> u64 {
    let mut hasher = SipHasher13::new();
    source.hash(&mut hasher);
    config.error_tolerance.to_bits().hash(&mut hasher);
    config.resolution.hash(&mut hasher);
    config.preview_size.hash(&mut hasher);
    config.photo_resolution.hash(&mut hasher);
    config.shape_resolution.hash(&mut hasher);
    config.min_contour_length.hash(&mut hasher);
    config.logo_max_contours.hash(&mut hasher);
    config.illustration_max_contours.hash(&mut hasher);
    config.resample_filter.hash(&mut hasher);
    hasher.finish()
}

fn dimensions_of(image: &RgbaImage) -> Dimensions {
    Dimensions {
        width: image.width(),
        height: image.height(),
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .decode() to continue"]
pub struct Pending {
    config: TraceConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the config, decode the source image and advance to the
    /// [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config is out of
    /// range, [`PipelineError::EmptyInput`] if the source bytes are
    /// empty, and [`PipelineError::ImageDecode`] if the image format is
    /// unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let original = crate::raster::decode(&self.source)?;
        log::debug!(
            "decoded {}x{} image from {} bytes",
            original.width(),
            original.height(),
            self.source.len()
        );
        Ok(Decoded {
            fingerprint: fingerprint(&self.source, &self.config),
            source_len: self.source.len(),
            config: self.config,
            original,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
///
/// Call [`classify`](Self::classify) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .classify() to continue"]
pub struct Decoded {
    config: TraceConfig,
    fingerprint: u64,
    source_len: usize,
    original: RgbaImage,
}

impl Decoded {
    /// The decoded RGBA image.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Classify a small preview and choose an extraction strategy.
    pub fn classify(self) -> Classified {
        let (preview, _) = crate::raster::fit_within(
            &self.original,
            self.config.preview_size,
            self.config.resample_filter,
        );
        let analysis = crate::classify::analyze(&preview);
        let strategy = Strategy::select(&analysis, &self.config);
        log::debug!(
            "classified as {} (entropy {:.3}, {} colors, edge density {:.3}): {strategy:?}",
            analysis.category,
            analysis.entropy,
            analysis.unique_colors,
            analysis.edge_density
        );
        Classified {
            config: self.config,
            fingerprint: self.fingerprint,
            original: self.original,
            preview: dimensions_of(&preview),
            analysis,
            strategy,
        }
    }
}

// ───────────────────────── Stage 2: Classified ───────────────────────

/// Pipeline state after classification.
///
/// Call [`prepare`](Self::prepare) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .prepare() to continue"]
pub struct Classified {
    config: TraceConfig,
    fingerprint: u64,
    original: RgbaImage,
    preview: Dimensions,
    analysis: ImageAnalysis,
    strategy: Strategy,
}

impl Classified {
    /// Statistics and category of the preview.
    #[must_use]
    pub const fn analysis(&self) -> &ImageAnalysis {
        &self.analysis
    }

    /// The chosen extraction strategy.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Dimensions of the raster that was classified.
    #[must_use]
    pub const fn preview_dimensions(&self) -> Dimensions {
        self.preview
    }

    /// Trace resolution: the caller's choice, else a per-category default.
    #[must_use]
    pub const fn resolution(&self) -> u32 {
        match self.config.resolution {
            Some(resolution) => resolution,
            None => match self.analysis.category {
                ImageCategory::Photo => self.config.photo_resolution,
                ImageCategory::Alpha | ImageCategory::Logo | ImageCategory::Illustration => {
                    self.config.shape_resolution
                }
            },
        }
    }

    /// Shrink the original to the trace resolution.
    pub fn prepare(self) -> Prepared {
        let resolution = self.resolution();
        let (working, resampled) =
            crate::raster::fit_within(&self.original, resolution, self.config.resample_filter);
        let original = dimensions_of(&self.original);
        let scale = (
            f64::from(original.width) / f64::from(working.width().max(1)),
            f64::from(original.height) / f64::from(working.height().max(1)),
        );
        log::debug!(
            "working raster {}x{} (resolution {resolution}, scale {:.3}x{:.3})",
            working.width(),
            working.height(),
            scale.0,
            scale.1
        );
        Prepared {
            config: self.config,
            fingerprint: self.fingerprint,
            original,
            analysis: self.analysis,
            strategy: self.strategy,
            resolution,
            resampled,
            scale,
            working,
        }
    }
}

// ───────────────────────── Stage 3: Prepared ─────────────────────────

/// Pipeline state after resampling to the trace resolution.
///
/// Call [`extract`](Self::extract) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .extract() to continue"]
pub struct Prepared {
    config: TraceConfig,
    fingerprint: u64,
    original: Dimensions,
    analysis: ImageAnalysis,
    strategy: Strategy,
    resolution: u32,
    resampled: bool,
    scale: (f64, f64),
    working: RgbaImage,
}

impl Prepared {
    /// The raster that will be traced.
    #[must_use]
    pub const fn working(&self) -> &RgbaImage {
        &self.working
    }

    /// Whether resampling was applied.
    #[must_use]
    pub const fn resampled(&self) -> bool {
        self.resampled
    }

    /// Per-axis factors from working to original coordinates.
    #[must_use]
    pub const fn scale(&self) -> (f64, f64) {
        self.scale
    }

    /// Build the shape or edge mask and trace its contours.
    pub fn extract(self) -> Extracted {
        let (mask, mode) = match self.strategy {
            Strategy::AlphaMask => (crate::mask::to_mask(&self.working), ContourMode::Single),
            Strategy::ThresholdMask { max_contours } => (
                crate::mask::to_mask(&self.working),
                ContourMode::Multi { max_contours },
            ),
            Strategy::Edges { canny } => {
                let edges = crate::edge::detect_edges(
                    &self.working,
                    canny.sigma,
                    canny.low_ratio,
                    canny.high_ratio,
                );
                let max_contours = photo_contour_cap(&edges);
                (edges, ContourMode::Multi { max_contours })
            }
        };
        let contours = mode.trace(&mask, self.config.min_contour_length);
        log::debug!(
            "{} foreground pixels, {} contours kept ({mode:?})",
            mask.count_foreground(),
            contours.len()
        );
        Extracted {
            config: self.config,
            fingerprint: self.fingerprint,
            original: self.original,
            analysis: self.analysis,
            strategy: self.strategy,
            scale: self.scale,
            working: dimensions_of(&self.working),
            mask,
            mode,
            contours,
        }
    }
}

// ───────────────────────── Stage 4: Extracted ────────────────────────

/// Pipeline state after contour tracing.
///
/// Call [`fit`](Self::fit) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing — call .fit() to continue"]
pub struct Extracted {
    config: TraceConfig,
    fingerprint: u64,
    original: Dimensions,
    analysis: ImageAnalysis,
    strategy: Strategy,
    scale: (f64, f64),
    working: Dimensions,
    mask: BinaryMask,
    mode: ContourMode,
    contours: Vec<Polyline>,
}

impl Extracted {
    /// The binary mask that was traced.
    #[must_use]
    pub const fn mask(&self) -> &BinaryMask {
        &self.mask
    }

    /// The contour mode used, including the effective cap.
    #[must_use]
    pub const fn mode(&self) -> ContourMode {
        self.mode
    }

    /// Traced contours in working-raster coordinates, longest first.
    #[must_use]
    pub fn contours(&self) -> &[Polyline] {
        &self.contours
    }

    /// Map each contour to original coordinates, simplify and fit it.
    pub fn fit(self) -> Fitted {
        let (sx, sy) = self.scale;
        let epsilon = self.config.error_tolerance * SIMPLIFY_TOLERANCE_RATIO;
        let tolerance = self.config.error_tolerance * self.strategy.tolerance_scale();

        let contour_count = self.contours.len();
        let mut simplified_points = 0;
        let mut strokes = Vec::with_capacity(contour_count);
        for contour in self.contours {
            // Contour points sit on pixel centres; shift to pixel edges.
            let mapped = Polyline::new(
                contour
                    .into_points()
                    .into_iter()
                    .map(|p| Point::new((p.x + 0.5) * sx, (p.y + 0.5) * sy))
                    .collect(),
            );
            let simplified = crate::simplify::simplify(&mapped, epsilon);
            if simplified.len() < 2 {
                continue;
            }
            simplified_points += simplified.len();
            let segments = crate::fit::fit_curve(simplified.points(), tolerance);
            if !segments.is_empty() {
                strokes.push(Stroke::new(segments));
            }
        }
        log::debug!(
            "fitted {} strokes, {} segments (tolerance {tolerance:.2})",
            strokes.len(),
            strokes.iter().map(Stroke::len).sum::<usize>()
        );

        Fitted {
            fingerprint: self.fingerprint,
            original: self.original,
            analysis: self.analysis,
            strategy: self.strategy,
            working: self.working,
            contour_count,
            simplified_points,
            strokes,
        }
    }
}

// ───────────────────────── Stage 5: Fitted ───────────────────────────

/// Final pipeline state.
///
/// Call [`into_result`](Self::into_result) to take the output.
#[must_use = "call .into_result() to take the traced strokes"]
pub struct Fitted {
    fingerprint: u64,
    original: Dimensions,
    analysis: ImageAnalysis,
    strategy: Strategy,
    working: Dimensions,
    contour_count: usize,
    simplified_points: usize,
    strokes: Vec<Stroke>,
}

impl Fitted {
    /// The fitted strokes in original-image coordinates.
    #[must_use]
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Consume the final stage and produce the [`TraceResult`].
    #[must_use]
    pub fn into_result(self) -> TraceResult {
        TraceResult {
            strokes: self.strokes,
            analysis: self.analysis,
            strategy: self.strategy,
            dimensions: self.original,
            working_dimensions: self.working,
            fingerprint: self.fingerprint,
        }
    }
}

// ──────────────────────────── Stage metrics ──────────────────────────

/// Trait implemented by every processed pipeline stage so diagnostics
/// can be collected uniformly.
pub trait PipelineStage: Sized {
    /// Human-readable name of the work that produced this stage.
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `5` for
    /// Fitted).
    const INDEX: usize;

    /// Stage-specific metrics. `None` for [`Pending`], which has not yet
    /// performed any processing.
    fn metrics(&self) -> Option<StageMetrics>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Decode {
            input_bytes: self.source_len,
            width: self.original.width(),
            height: self.original.height(),
        })
    }
}

impl PipelineStage for Classified {
    const NAME: &str = "classify";
    const INDEX: usize = 2;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Classify {
            preview_width: self.preview.width,
            preview_height: self.preview.height,
            category: self.analysis.category,
            unique_colors: self.analysis.unique_colors,
            entropy: self.analysis.entropy,
            edge_density: self.analysis.edge_density,
        })
    }
}

impl PipelineStage for Prepared {
    const NAME: &str = "prepare";
    const INDEX: usize = 3;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Prepare {
            resolution: self.resolution,
            width: self.working.width(),
            height: self.working.height(),
            resampled: self.resampled,
        })
    }
}

impl PipelineStage for Extracted {
    const NAME: &str = "extract";
    const INDEX: usize = 4;

    fn metrics(&self) -> Option<StageMetrics> {
        let stats = crate::diagnostics::contour_stats(&self.contours);
        Some(StageMetrics::Extract {
            foreground_pixels: self.mask.count_foreground(),
            contour_count: stats.count,
            total_point_count: stats.total_points,
            max_contour_points: stats.max_points,
        })
    }
}

impl PipelineStage for Fitted {
    const NAME: &str = "fit";
    const INDEX: usize = 5;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Fit {
            contour_count: self.contour_count,
            simplified_point_count: self.simplified_points,
            stroke_count: self.strokes.len(),
            segment_count: self.strokes.iter().map(Stroke::len).sum(),
        })
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental tracing pipeline.
///
/// Created via [`Pipeline::new`], which stores the source image and
/// config without doing any processing. Each stage method consumes the
/// current state and returns the next, making it a compile-time error to
/// skip stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    ///
    /// No processing is performed. Call [`.decode()`](Pending::decode) to
    /// begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: TraceConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn encode_png(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    /// Black square on white, 64x64.
    fn logo_png() -> Vec<u8> {
        encode_png(&RgbaImage::from_fn(64, 64, |x, y| {
            if (16..48).contains(&x) && (16..48).contains(&y) {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        }))
    }

    fn analysis(category: ImageCategory) -> ImageAnalysis {
        ImageAnalysis {
            category,
            uses_alpha: false,
            unique_colors: 0,
            entropy: 0.0,
            edge_density: 0.0,
            contrast_ratio: 0.0,
            canny: CannyParams::recommended(category, 0.0),
        }
    }

    #[test]
    fn dimensions_of_reports_raster_size() {
        assert_eq!(
            dimensions_of(&RgbaImage::new(7, 3)),
            Dimensions {
                width: 7,
                height: 3
            }
        );
        assert_eq!(
            dimensions_of(&RgbaImage::new(0, 0)),
            Dimensions {
                width: 0,
                height: 0
            }
        );
    }

    // ─────────── Strategy ────────────────────────────────────────

    #[test]
    fn strategy_follows_category() {
        let config = TraceConfig::default();
        assert_eq!(
            Strategy::select(&analysis(ImageCategory::Alpha), &config),
            Strategy::AlphaMask
        );
        assert_eq!(
            Strategy::select(&analysis(ImageCategory::Logo), &config),
            Strategy::ThresholdMask {
                max_contours: config.logo_max_contours
            }
        );
        assert_eq!(
            Strategy::select(&analysis(ImageCategory::Illustration), &config),
            Strategy::ThresholdMask {
                max_contours: config.illustration_max_contours
            }
        );
        assert_eq!(
            Strategy::select(&analysis(ImageCategory::Photo), &config),
            Strategy::Edges {
                canny: CannyParams::new(2.0, 0.05, 0.15)
            }
        );
    }

    #[test]
    fn only_photos_loosen_tolerance() {
        assert!((Strategy::AlphaMask.tolerance_scale() - 1.0).abs() < f64::EPSILON);
        let edges = Strategy::Edges {
            canny: CannyParams::new(2.0, 0.05, 0.15),
        };
        assert!((edges.tolerance_scale() - 1.2).abs() < f64::EPSILON);
    }

    #[test]
    fn photo_contour_cap_is_clamped() {
        assert_eq!(photo_contour_cap(&BinaryMask::new(10, 10)), 5);
        assert_eq!(photo_contour_cap(&BinaryMask::new(0, 0)), 5);
        // 4% edges: 5 + 10 = 15.
        let some = BinaryMask::from_fn(10, 10, |x, y| y == 0 && x < 4);
        assert_eq!(photo_contour_cap(&some), 15);
        let dense = BinaryMask::from_fn(10, 10, |x, _| x < 5);
        assert_eq!(photo_contour_cap(&dense), 30);
    }

    #[test]
    fn fingerprint_tracks_bytes_and_config() {
        let config = TraceConfig::default();
        let a = fingerprint(b"abc", &config);
        assert_eq!(a, fingerprint(b"abc", &config));
        assert_ne!(a, fingerprint(b"abd", &config));
        assert_ne!(a, fingerprint(b"abc", &TraceConfig::with_tolerance(2.0, None)));
        assert_ne!(
            a,
            fingerprint(b"abc", &TraceConfig::with_tolerance(4.0, Some(256)))
        );
    }

    // ─────────── Typed API ───────────────────────────────────────

    #[test]
    fn pending_exposes_source_bytes() {
        let png = logo_png();
        let len = png.len();
        assert_eq!(Pipeline::new(png, TraceConfig::default()).source().len(), len);
    }

    #[test]
    fn decode_errors_propagate() {
        let empty = Pipeline::new(vec![], TraceConfig::default()).decode();
        assert!(matches!(empty, Err(PipelineError::EmptyInput)));

        let corrupt = Pipeline::new(vec![0xFF, 0x00], TraceConfig::default()).decode();
        assert!(matches!(corrupt, Err(PipelineError::ImageDecode(_))));

        let invalid = Pipeline::new(logo_png(), TraceConfig::with_tolerance(-1.0, None)).decode();
        assert!(matches!(invalid, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn stages_expose_intermediates() {
        let decoded = Pipeline::new(logo_png(), TraceConfig::default())
            .decode()
            .unwrap();
        assert_eq!(decoded.original().dimensions(), (64, 64));

        let classified = decoded.classify();
        assert_eq!(classified.analysis().category, ImageCategory::Logo);
        assert_eq!(classified.preview_dimensions().width, 64);
        assert_eq!(classified.resolution(), TraceConfig::DEFAULT_SHAPE_RESOLUTION);

        let prepared = classified.prepare();
        assert!(!prepared.resampled(), "64 px is below the trace resolution");
        assert_eq!(prepared.scale(), (1.0, 1.0));

        let extracted = prepared.extract();
        assert_eq!(extracted.mask().count_foreground(), 32 * 32);
        assert_eq!(extracted.contours().len(), 1);
        assert_eq!(
            extracted.mode(),
            ContourMode::Multi {
                max_contours: TraceConfig::DEFAULT_LOGO_MAX_CONTOURS
            }
        );

        let fitted = extracted.fit();
        assert_eq!(fitted.strokes().len(), 1);

        let result = fitted.into_result();
        assert_eq!(result.dimensions.width, 64);
        assert_eq!(result.working_dimensions.height, 64);
        assert_eq!(result.strategy, Strategy::ThresholdMask { max_contours: 4 });
    }

    #[test]
    fn explicit_resolution_shrinks_and_rescales() {
        let config = TraceConfig::with_tolerance(2.0, Some(32));
        let prepared = Pipeline::new(logo_png(), config)
            .decode()
            .unwrap()
            .classify()
            .prepare();
        assert!(prepared.resampled());
        assert_eq!(prepared.working().dimensions(), (32, 32));
        assert_eq!(prepared.scale(), (2.0, 2.0));

        let result = prepared.extract().fit().into_result();
        assert_eq!(result.working_dimensions.width, 32);
        // Anchors come back in original coordinates on the 16..48 square.
        let anchors: Vec<Point> = result.strokes[0].segments().iter().map(|b| b.p0).collect();
        let (min, max) = Polyline::new(anchors).bounding_box().unwrap();
        assert!((min.x - 16.0).abs() < 3.0 && (min.y - 16.0).abs() < 3.0, "{min:?}");
        assert!((max.x - 48.0).abs() < 3.0 && (max.y - 48.0).abs() < 3.0, "{max:?}");
    }

    #[test]
    fn stage_metrics_are_reported() {
        let pending = Pipeline::new(logo_png(), TraceConfig::default());
        assert!(pending.metrics().is_none());
        let decoded = pending.decode().unwrap();
        assert!(matches!(
            decoded.metrics(),
            Some(StageMetrics::Decode {
                width: 64,
                height: 64,
                ..
            })
        ));
        let fitted = decoded.classify().prepare().extract().fit();
        assert!(matches!(
            fitted.metrics(),
            Some(StageMetrics::Fit { stroke_count: 1, .. })
        ));
        assert_eq!(<Fitted as PipelineStage>::INDEX, 5);
    }
}
