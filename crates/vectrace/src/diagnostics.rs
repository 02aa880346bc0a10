//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for tuning
//! the per-category defaults. [`process_with_diagnostics`] drives the
//! staged [`Pipeline`] and records a [`StageDiagnostics`] entry as each
//! stage completes.
//!
//! The crate never reads the system clock itself: callers pass a
//! [`Clock`] so the library stays sans-IO and tests can use a fake one.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::ImageCategory;
use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{PipelineError, Polyline, TraceConfig, TraceResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: preview classification and strategy selection.
    pub classify: StageDiagnostics,
    /// Stage 3: resampling to the trace resolution.
    pub prepare: StageDiagnostics,
    /// Stage 4: mask or edge extraction and contour tracing.
    pub extract: StageDiagnostics,
    /// Stage 5: simplification and Bézier fitting.
    pub fit: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.). `None` only for a
    /// stage that reports nothing.
    pub metrics: Option<StageMetrics>,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
    },
    /// Classification metrics.
    Classify {
        /// Preview width in pixels.
        preview_width: u32,
        /// Preview height in pixels.
        preview_height: u32,
        /// Chosen category.
        category: ImageCategory,
        /// Distinct opaque colors in the preview.
        unique_colors: u32,
        /// Normalized luminance entropy.
        entropy: f64,
        /// Fraction of strong-gradient pixels.
        edge_density: f64,
    },
    /// Resampling metrics.
    Prepare {
        /// Target longest axis.
        resolution: u32,
        /// Working raster width in pixels.
        width: u32,
        /// Working raster height in pixels.
        height: u32,
        /// Whether the raster was actually resampled.
        resampled: bool,
    },
    /// Mask extraction and contour tracing metrics.
    Extract {
        /// Foreground (or edge) pixels in the traced mask.
        foreground_pixels: usize,
        /// Number of contours kept.
        contour_count: usize,
        /// Total number of points across kept contours.
        total_point_count: usize,
        /// Maximum points in any single contour.
        max_contour_points: usize,
    },
    /// Simplification and fitting metrics.
    Fit {
        /// Contours handed to the fitter.
        contour_count: usize,
        /// Points remaining after simplification.
        simplified_point_count: usize,
        /// Strokes produced.
        stroke_count: usize,
        /// Bézier segments across all strokes.
        segment_count: usize,
    },
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Trace Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());
        lines.push(format!(
            "{:<12} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Decode", &self.decode),
            ("Classify", &self.classify),
            ("Prepare", &self.prepare),
            ("Extract", &self.extract),
            ("Fit", &self.fit),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = diag
                .metrics
                .as_ref()
                .map_or_else(|| "-".to_string(), format_metrics);
            lines.push(format!("{name:<12} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
#[must_use]
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Classify {
            preview_width,
            preview_height,
            category,
            unique_colors,
            entropy,
            edge_density,
        } => format!(
            "{preview_width}x{preview_height} {category} colors={unique_colors} entropy={entropy:.3} edges={edge_density:.3}",
        ),
        StageMetrics::Prepare {
            resolution,
            width,
            height,
            resampled,
        } => {
            let note = if *resampled { "" } else { " (unchanged)" };
            format!("res={resolution} -> {width}x{height}{note}")
        }
        StageMetrics::Extract {
            foreground_pixels,
            contour_count,
            total_point_count,
            max_contour_points,
        } => format!(
            "fg={foreground_pixels} {contour_count} contours, {total_point_count} pts (max={max_contour_points})",
        ),
        StageMetrics::Fit {
            contour_count,
            simplified_point_count,
            stroke_count,
            segment_count,
        } => format!(
            "{contour_count} contours, {simplified_point_count} pts -> {stroke_count} strokes, {segment_count} segments",
        ),
    }
}

/// Statistics for a set of contour polylines.
pub(crate) struct ContourStats {
    /// Number of contours.
    pub count: usize,
    /// Total number of points across all contours.
    pub total_points: usize,
    /// Maximum number of points in any single contour.
    pub max_points: usize,
}

/// Compute contour statistics from a set of polylines.
pub(crate) fn contour_stats(contours: &[Polyline]) -> ContourStats {
    ContourStats {
        count: contours.len(),
        total_points: contours.iter().map(Polyline::len).sum(),
        max_points: contours.iter().map(Polyline::len).max().unwrap_or(0),
    }
}

/// Time one stage transition and record its metrics.
fn timed<C: Clock, S: PipelineStage>(
    clock: &C,
    advance: impl FnOnce() -> Result<S, PipelineError>,
) -> Result<(S, StageDiagnostics), PipelineError> {
    let start = clock.now();
    let stage = advance()?;
    let duration = clock.elapsed(&start);
    log::debug!("{} took {:.3}ms", S::NAME, duration_ms(duration));
    let diagnostics = StageDiagnostics {
        duration,
        metrics: stage.metrics(),
    };
    Ok((stage, diagnostics))
}

/// Run the full pipeline, timing each stage with `clock`.
///
/// # Errors
///
/// Same as [`crate::process`].
pub fn process_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &TraceConfig,
    clock: &C,
) -> Result<(TraceResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let pending = Pipeline::new(image_bytes.to_vec(), config.clone());

    let (decoded, decode) = timed(clock, || pending.decode())?;
    let (classified, classify) = timed(clock, || Ok(decoded.classify()))?;
    let (prepared, prepare) = timed(clock, || Ok(classified.prepare()))?;
    let (extracted, extract) = timed(clock, || Ok(prepared.extract()))?;
    let (fitted, fit) = timed(clock, || Ok(extracted.fit()))?;

    let diagnostics = PipelineDiagnostics {
        decode,
        classify,
        prepare,
        extract,
        fit,
        total_duration: clock.elapsed(&start),
    };
    Ok((fitted.into_result(), diagnostics))
}
