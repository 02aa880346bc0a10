//! Shared types for the vectrace tracing pipeline.

use std::ops::{Add, Mul, Neg, Sub};

use geo::{Area, BoundingRect};
use serde::{Deserialize, Serialize};

use crate::classify::ImageAnalysis;
use crate::pipeline::Strategy;
use crate::raster::ResampleFilter;

/// Re-export `RgbaImage` so downstream crates can reference decoded
/// rasters without depending on `image` directly.
pub use image::RgbaImage;

/// Single-channel floating-point image used by the edge detector.
pub type GrayF32 = image::ImageBuffer<image::Luma<f32>, Vec<f32>>;

/// A 2D point (or vector) in raster or output coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// The origin / zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Dot product, treating both points as vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y * other.y)
    }

    /// Vector length.
    #[must_use]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unit vector in the same direction, or the zero vector when the
    /// length is zero.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Convert a pipeline `Point` to a `geo::Coord`.
const fn point_to_coord(p: Point) -> geo::Coord<f64> {
    geo::Coord { x: p.x, y: p.y }
}

/// A sequence of connected points: a traced contour or its simplified form.
///
/// A polyline whose first and last points coincide is a closed loop.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

/// Contours are polylines produced by the tracer.
pub type Contour = Polyline;

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Whether the polyline is a closed loop (at least three points, first
    /// equal to last).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.0.len() >= 3 && self.0.first() == self.0.last()
    }

    /// Axis-aligned bounding box as `(min, max)` corners, or `None` for an
    /// empty polyline.
    #[must_use]
    pub fn bounding_box(&self) -> Option<(Point, Point)> {
        let line: geo::LineString<f64> = self.0.iter().copied().map(point_to_coord).collect();
        line.bounding_rect()
            .map(|r| (Point::new(r.min().x, r.min().y), Point::new(r.max().x, r.max().y)))
    }
}

/// A width × height grid of foreground/background flags, row-major.
///
/// Produced by the mask builder and the edge detector, consumed by the
/// contour tracer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl BinaryMask {
    /// Create an all-background mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Create a mask by evaluating `f(x, y)` for every cell.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                bits.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    /// Wrap an existing row-major buffer. Returns `None` if its length is
    /// not `width * height`.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, bits: Vec<bool>) -> Option<Self> {
        (bits.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            bits,
        })
    }

    /// Mask width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Whether the cell at `(x, y)` is foreground. Out-of-range
    /// coordinates read as background.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[y as usize * self.width as usize + x as usize]
    }

    /// Set the cell at `(x, y)`. Out-of-range coordinates are ignored.
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            self.bits[y as usize * self.width as usize + x as usize] = value;
        }
    }

    /// The underlying row-major flags.
    #[must_use]
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Number of foreground cells.
    #[must_use]
    pub fn count_foreground(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// `true` when no cell is foreground.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.bits.contains(&true)
    }
}

/// A cubic Bezier segment: anchor, two control points, anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    /// Start anchor.
    pub p0: Point,
    /// Control point attached to `p0`.
    pub c1: Point,
    /// Control point attached to `p3`.
    pub c2: Point,
    /// End anchor.
    pub p3: Point,
}

impl CubicBezier {
    /// Create a new segment.
    #[must_use]
    pub const fn new(p0: Point, c1: Point, c2: Point, p3: Point) -> Self {
        Self { p0, c1, c2, p3 }
    }

    /// Evaluate the curve at parameter `t`.
    #[must_use]
    pub fn eval(&self, t: f64) -> Point {
        let mt = 1.0 - t;
        self.p0 * (mt * mt * mt)
            + self.c1 * (3.0 * mt * mt * t)
            + self.c2 * (3.0 * mt * t * t)
            + self.p3 * (t * t * t)
    }

    /// First derivative with respect to `t`.
    #[must_use]
    pub fn derivative(&self, t: f64) -> Point {
        let mt = 1.0 - t;
        (self.c1 - self.p0) * (3.0 * mt * mt)
            + (self.c2 - self.c1) * (6.0 * mt * t)
            + (self.p3 - self.c2) * (3.0 * t * t)
    }

    /// Second derivative with respect to `t`.
    #[must_use]
    pub fn second_derivative(&self, t: f64) -> Point {
        (self.c2 - self.c1 * 2.0 + self.p0) * (6.0 * (1.0 - t))
            + (self.p3 - self.c2 * 2.0 + self.c1) * (6.0 * t)
    }
}

/// A piecewise cubic curve: segment `i`'s `p3` is segment `i + 1`'s `p0`.
///
/// The pipeline emits one stroke per retained contour.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stroke(Vec<CubicBezier>);

impl Stroke {
    /// Create a stroke from chained segments.
    #[must_use]
    pub const fn new(segments: Vec<CubicBezier>) -> Self {
        Self(segments)
    }

    /// Returns `true` if the stroke has no segments.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// The segments in drawing order.
    #[must_use]
    pub fn segments(&self) -> &[CubicBezier] {
        &self.0
    }

    /// Sample the stroke into a polyline with `samples_per_segment` points
    /// per segment plus the final end anchor.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sample(&self, samples_per_segment: usize) -> Vec<Point> {
        let n = samples_per_segment.max(1);
        let mut points = Vec::with_capacity(self.0.len() * n + 1);
        for seg in &self.0 {
            for i in 0..n {
                points.push(seg.eval(i as f64 / n as f64));
            }
        }
        if let Some(last) = self.0.last() {
            points.push(last.p3);
        }
        points
    }

    /// Area enclosed by the sampled stroke (shoelace formula), treating it
    /// as closed.
    #[must_use]
    pub fn enclosed_area(&self, samples_per_segment: usize) -> f64 {
        let ring: geo::LineString<f64> = self
            .sample(samples_per_segment)
            .into_iter()
            .map(point_to_coord)
            .collect();
        geo::Polygon::new(ring, Vec::new()).unsigned_area()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Configuration for the tracing pipeline.
///
/// Only `error_tolerance` and `resolution` are meant to be exposed to end
/// users; the remaining fields tune the orchestrator's per-category
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Maximum allowed deviation, in output pixels, between a fitted curve
    /// and the contour it approximates. Typical range 1-20.
    pub error_tolerance: f64,

    /// Trace resolution (longest working axis in pixels). `None` picks a
    /// default from the image category.
    pub resolution: Option<u32>,

    /// Longest axis of the preview raster used for classification.
    pub preview_size: u32,

    /// Default trace resolution for photographic images.
    pub photo_resolution: u32,

    /// Default trace resolution for alpha, logo and illustration images.
    pub shape_resolution: u32,

    /// Contours with fewer points than this are discarded.
    pub min_contour_length: usize,

    /// Contour cap for logo images.
    pub logo_max_contours: usize,

    /// Contour cap for illustrations.
    pub illustration_max_contours: usize,

    /// Resampling filter for the preview and working rasters.
    pub resample_filter: ResampleFilter,
}

impl TraceConfig {
    /// Default fitting tolerance in pixels.
    pub const DEFAULT_ERROR_TOLERANCE: f64 = 4.0;
    /// Default preview size in pixels.
    pub const DEFAULT_PREVIEW_SIZE: u32 = 128;
    /// Default trace resolution for photos.
    pub const DEFAULT_PHOTO_RESOLUTION: u32 = 1024;
    /// Default trace resolution for every other category.
    pub const DEFAULT_SHAPE_RESOLUTION: u32 = 512;
    /// Default minimum contour length in points.
    pub const DEFAULT_MIN_CONTOUR_LENGTH: usize = 8;
    /// Default contour cap for logos.
    pub const DEFAULT_LOGO_MAX_CONTOURS: usize = 4;
    /// Default contour cap for illustrations.
    pub const DEFAULT_ILLUSTRATION_MAX_CONTOURS: usize = 12;
    /// Default resampling filter.
    pub const DEFAULT_RESAMPLE_FILTER: ResampleFilter = ResampleFilter::Triangle;

    /// Config with the given tolerance and resolution, defaults elsewhere.
    #[must_use]
    pub fn with_tolerance(error_tolerance: f64, resolution: Option<u32>) -> Self {
        Self {
            error_tolerance,
            resolution,
            ..Self::default()
        }
    }

    /// Check the invariants the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.error_tolerance.is_finite() || self.error_tolerance <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "error_tolerance must be a positive finite number, got {}",
                self.error_tolerance
            )));
        }
        if self.resolution == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "resolution must be at least 1 pixel".to_string(),
            ));
        }
        for (name, value) in [
            ("preview_size", self.preview_size),
            ("photo_resolution", self.photo_resolution),
            ("shape_resolution", self.shape_resolution),
        ] {
            if value == 0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be at least 1 pixel"
                )));
            }
        }
        if self.min_contour_length < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "min_contour_length must be at least 2, got {}",
                self.min_contour_length
            )));
        }
        Ok(())
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            error_tolerance: Self::DEFAULT_ERROR_TOLERANCE,
            resolution: None,
            preview_size: Self::DEFAULT_PREVIEW_SIZE,
            photo_resolution: Self::DEFAULT_PHOTO_RESOLUTION,
            shape_resolution: Self::DEFAULT_SHAPE_RESOLUTION,
            min_contour_length: Self::DEFAULT_MIN_CONTOUR_LENGTH,
            logo_max_contours: Self::DEFAULT_LOGO_MAX_CONTOURS,
            illustration_max_contours: Self::DEFAULT_ILLUSTRATION_MAX_CONTOURS,
            resample_filter: Self::DEFAULT_RESAMPLE_FILTER,
        }
    }
}

/// Result of a full tracing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    /// One stroke per retained contour, in original-image coordinates.
    /// Empty when nothing traceable was found.
    pub strokes: Vec<Stroke>,

    /// Classification of the preview raster.
    pub analysis: ImageAnalysis,

    /// Extraction strategy chosen from the analysis.
    pub strategy: Strategy,

    /// Dimensions of the decoded source image.
    pub dimensions: Dimensions,

    /// Dimensions of the raster that was actually traced.
    pub working_dimensions: Dimensions,

    /// Hash of the source bytes and effective configuration. Hosts that
    /// start a new trace before a previous one finishes compare this value
    /// to drop superseded results.
    pub fingerprint: u64,
}

/// Errors that can occur during pipeline processing.
///
/// Degenerate data (no edges, empty masks, contours that simplify away) is
/// not an error: those runs return an empty stroke list.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `PipelineError`.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidConfig(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed image error cannot be rebuilt; keep its message.
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}
