//! Integration tests: synthesized images through the full tracing pipeline.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::f64::consts::PI;

use image::{Rgba, RgbaImage};
use vectrace::{
    BinaryMask, ImageCategory, Pipeline, PipelineError, Point, Polyline, Strategy, TraceConfig,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

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

/// Opaque disc of radius `r` centred in a transparent square.
fn disc_png(size: u32, r: f64) -> Vec<u8> {
    let c = f64::from(size) / 2.0;
    encode_png(&RgbaImage::from_fn(size, size, |x, y| {
        let dx = f64::from(x) + 0.5 - c;
        let dy = f64::from(y) + 0.5 - c;
        if dx.hypot(dy) <= r {
            Rgba([30, 90, 200, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    }))
}

/// Segment endpoints, which lie on the traced contour.
fn anchors(stroke: &vectrace::Stroke) -> Vec<Point> {
    stroke.segments().iter().map(|b| b.p0).collect()
}

fn all_points(strokes: &[vectrace::Stroke]) -> Vec<Point> {
    strokes
        .iter()
        .flat_map(|s| s.segments().iter().flat_map(|b| [b.p0, b.c1, b.c2, b.p3]))
        .collect()
}

#[test]
fn alpha_circle_becomes_one_compact_stroke() {
    init_logging();
    let result = vectrace::process(&disc_png(64, 24.0), &TraceConfig::with_tolerance(3.0, None))
        .expect("pipeline should succeed");

    assert_eq!(result.analysis.category, ImageCategory::Alpha);
    assert_eq!(result.strategy, Strategy::AlphaMask);
    assert_eq!(result.strokes.len(), 1);

    let stroke = &result.strokes[0];
    eprintln!("circle: {} segments", stroke.len());
    assert!((1..10).contains(&stroke.len()), "{} segments", stroke.len());

    let expected = PI * 24.0 * 24.0;
    let area = stroke.enclosed_area(32);
    assert!(
        (area - expected).abs() / expected < 0.05,
        "area {area:.1} vs {expected:.1}"
    );

    for p in anchors(stroke) {
        let r = p.distance(Point::new(32.0, 32.0));
        assert!((r - 24.0).abs() < 1.5, "{p:?} at radius {r:.2}");
    }
}

#[test]
fn square_outline_fits_four_segments() {
    init_logging();
    let mask = BinaryMask::from_fn(20, 20, |x, y| (5..15).contains(&x) && (5..15).contains(&y));
    let contour = vectrace::contour::trace_longest(&mask, 8).unwrap();
    let simplified = vectrace::simplify::simplify(&contour, 1.0);
    assert_eq!(simplified.len(), 5);
    assert!(simplified.is_closed());

    let segments = vectrace::fit::fit_curve(simplified.points(), 1.5);
    assert_eq!(segments.len(), 4);
    for (segment, &corner) in segments.iter().zip(simplified.points()) {
        assert_eq!(segment.p0, corner);
    }
    assert_eq!(segments[3].p3, segments[0].p0);
}

#[test]
fn empty_inputs_yield_no_strokes() {
    init_logging();
    let transparent = encode_png(&RgbaImage::new(32, 32));
    let result = vectrace::process(&transparent, &TraceConfig::default()).unwrap();
    assert_eq!(result.analysis.category, ImageCategory::Alpha);
    assert!(result.strokes.is_empty());

    let flat = encode_png(&RgbaImage::from_pixel(32, 32, Rgba([250, 250, 250, 255])));
    assert!(vectrace::trace(&flat, 4.0, None).unwrap().is_empty());

    let single_pixel = encode_png(&RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255])));
    assert!(vectrace::trace(&single_pixel, 4.0, None).unwrap().is_empty());
}

#[test]
fn errors_surface_before_any_work() {
    init_logging();
    assert!(matches!(
        vectrace::trace(&[], 4.0, None),
        Err(PipelineError::EmptyInput)
    ));
    assert!(matches!(
        vectrace::trace(b"not an image", 4.0, None),
        Err(PipelineError::ImageDecode(_))
    ));
    assert!(matches!(
        vectrace::trace(&disc_png(16, 4.0), f64::NAN, None),
        Err(PipelineError::InvalidConfig(_))
    ));
}

#[test]
fn large_logo_is_traced_at_shape_resolution() {
    init_logging();
    let (w, h) = (1200u32, 800u32);
    let png = encode_png(&RgbaImage::from_fn(w, h, |x, y| {
        if (300..900).contains(&x) && (200..600).contains(&y) {
            Rgba([10, 10, 10, 255])
        } else {
            Rgba([245, 245, 245, 255])
        }
    }));
    let result = vectrace::process(&png, &TraceConfig::default()).unwrap();

    assert_eq!(result.dimensions.width, w);
    assert_eq!(result.working_dimensions.width, 512);
    assert!(result.working_dimensions.height < 512);
    assert_eq!(result.strokes.len(), 1);

    // Coordinates come back in original pixels.
    let (min, max) = Polyline::new(anchors(&result.strokes[0]))
        .bounding_box()
        .unwrap();
    assert!((min.x - 300.0).abs() < 12.0, "{min:?}");
    assert!((min.y - 200.0).abs() < 12.0, "{min:?}");
    assert!((max.x - 900.0).abs() < 12.0, "{max:?}");
    assert!((max.y - 600.0).abs() < 12.0, "{max:?}");
}

#[test]
fn noisy_photo_uses_edges_and_caps_contours() {
    init_logging();
    let mut state = 12345u32;
    let png = encode_png(&RgbaImage::from_fn(96, 96, |_, _| {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
        let [a, b, c, _] = state.to_le_bytes();
        Rgba([a, b, c, 255])
    }));

    let extracted = Pipeline::new(png, TraceConfig::default())
        .decode()
        .unwrap()
        .classify()
        .prepare()
        .extract();
    let result = extracted.fit().into_result();

    assert_eq!(result.analysis.category, ImageCategory::Photo);
    assert!(matches!(result.strategy, Strategy::Edges { .. }));
    assert!(result.strokes.len() <= 30);
    for p in all_points(&result.strokes) {
        assert!(p.x.is_finite() && p.y.is_finite(), "{p:?}");
    }
}

#[test]
fn fingerprint_changes_with_config() {
    init_logging();
    let png = disc_png(32, 10.0);
    let a = vectrace::process(&png, &TraceConfig::with_tolerance(2.0, None)).unwrap();
    let b = vectrace::process(&png, &TraceConfig::with_tolerance(5.0, None)).unwrap();
    assert_ne!(a.fingerprint, b.fingerprint);
    let again = vectrace::process(&png, &TraceConfig::with_tolerance(2.0, None)).unwrap();
    assert_eq!(a.fingerprint, again.fingerprint);
}
