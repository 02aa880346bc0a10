//! vectrace: pure image-to-Bézier tracing pipeline (sans-IO).
//!
//! Converts raster images into cubic Bézier strokes through:
//! decode -> classify -> resample -> mask or edges -> contour tracing ->
//! simplification -> curve fitting.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory byte
//! slices and returns structured data. Reading files, timing with a real
//! clock and printing results live in `vectrace-bench`.

pub mod blur;
pub mod classify;
pub mod contour;
pub mod diagnostics;
pub mod edge;
pub mod fit;
pub mod mask;
pub mod pipeline;
pub mod raster;
pub mod simplify;
pub mod types;

pub use classify::{CannyParams, ImageAnalysis, ImageCategory};
pub use contour::{ContourMode, ContourTracer};
pub use diagnostics::{Clock, PipelineDiagnostics, process_with_diagnostics};
pub use pipeline::{Pipeline, PipelineStage, Strategy};
pub use raster::ResampleFilter;
pub use types::{
    BinaryMask, Contour, CubicBezier, Dimensions, PipelineError, Point, Polyline, RgbaImage,
    Stroke, TraceConfig, TraceResult,
};

/// Run the full tracing pipeline.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration,
/// then produces a [`TraceResult`] holding one [`Stroke`] per retained
/// contour in original-image coordinates, plus the classification that
/// drove the run.
///
/// # Pipeline steps
///
/// 1. Decode the image to RGBA
/// 2. Classify a small preview and pick a strategy
/// 3. Shrink to the trace resolution
/// 4. Build an alpha/Otsu mask or a Canny edge map and trace contours
/// 5. Simplify each contour (Ramer-Douglas-Peucker)
/// 6. Fit cubic Béziers to each simplified contour
///
/// An image with nothing traceable yields an empty stroke list.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// validation.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized.
pub fn process(image_bytes: &[u8], config: &TraceConfig) -> Result<TraceResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .classify()
        .prepare()
        .extract()
        .fit()
        .into_result())
}

/// Trace an image with the given tolerance and optional resolution,
/// returning only the strokes.
///
/// # Errors
///
/// Same as [`process`].
pub fn trace(
    image_bytes: &[u8],
    error_tolerance: f64,
    resolution: Option<u32>,
) -> Result<Vec<Stroke>, PipelineError> {
    let config = TraceConfig::with_tolerance(error_tolerance, resolution);
    process(image_bytes, &config).map(|result| result.strokes)
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

    /// Dark rectangle on a light background.
    fn rectangle_png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_fn(width, height, |x, y| {
            if (width / 4..3 * width / 4).contains(&x) && (height / 4..3 * height / 4).contains(&y)
            {
                Rgba([20, 20, 20, 255])
            } else {
                Rgba([240, 240, 240, 255])
            }
        }))
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &TraceConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(&[0xFF, 0x00], &TraceConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_rejects_invalid_config() {
        let result = trace(&rectangle_png(40, 40), 0.0, None);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
        let result = trace(&rectangle_png(40, 40), 2.0, Some(0));
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn uniform_image_yields_no_strokes() {
        let png = encode_png(&RgbaImage::from_pixel(20, 20, Rgba([128, 128, 128, 255])));
        let result = process(&png, &TraceConfig::default()).unwrap();
        assert!(result.strokes.is_empty());
        assert_eq!(
            result.dimensions,
            Dimensions {
                width: 20,
                height: 20
            }
        );
    }

    #[test]
    fn rectangle_traces_to_one_stroke() {
        let strokes = trace(&rectangle_png(60, 40), 2.0, None).unwrap();
        assert_eq!(strokes.len(), 1);
        let stroke = &strokes[0];
        assert!(!stroke.is_empty());
        // The stroke is a closed outline.
        let first = stroke.segments()[0].p0;
        let last = stroke.segments()[stroke.len() - 1].p3;
        assert!(first.distance(last) < 1e-9);
    }

    #[test]
    fn process_is_deterministic() {
        let png = rectangle_png(50, 50);
        let a = process(&png, &TraceConfig::default()).unwrap();
        let b = process(&png, &TraceConfig::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn trace_result_serializes() {
        let result = process(&rectangle_png(32, 32), &TraceConfig::default()).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: TraceResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.strokes.len(), result.strokes.len());
        assert_eq!(back.strategy, result.strategy);
    }
}
