//! Piecewise cubic Bezier fitting (Schneider's algorithm).
//!
//! Fits one cubic to a run of points by least squares with fixed end
//! tangents, measures the worst deviation, and either accepts the cubic,
//! refines the parameterization with Newton-Raphson, or splits the run at
//! the worst point and recurses on both halves. The halves share the
//! split point and a common tangent there, so the result is a
//! tangent-continuous chain.
//!
//! This is step 6 in the pipeline, after simplification.

use crate::types::{CubicBezier, Point};

/// Recursion depth past which a run is closed with a straight-tangent
/// cubic instead of being split further.
const MAX_DEPTH: u32 = 50;

/// Newton-Raphson reparameterization rounds before splitting.
const REPARAMETERIZE_ROUNDS: usize = 5;

/// Normal-equation determinant below which the system is singular.
const SINGULAR_DET: f64 = 1e-6;

/// Control-leg length below which the least-squares solution is rejected.
const MIN_ALPHA: f64 = 1e-6;

/// Newton denominator below which the parameter is left unchanged.
const NEWTON_EPSILON: f64 = 1e-12;

/// Fit a chain of cubic Bezier segments to `points`.
///
/// Every input point lies within `error_tolerance` of the segment that
/// covers it (measured at its fitted parameter). Segment `i`'s end anchor
/// is segment `i + 1`'s start anchor. Fewer than two points yield no
/// segments.
#[must_use = "returns the fitted segments"]
pub fn fit_curve(points: &[Point], error_tolerance: f64) -> Vec<CubicBezier> {
    let n = points.len();
    if n < 2 {
        return Vec::new();
    }

    let left_tangent = (points[1] - points[0]).normalized();
    let right_tangent = (points[n - 2] - points[n - 1]).normalized();

    let mut segments = Vec::new();
    fit_cubic(
        points,
        left_tangent,
        right_tangent,
        error_tolerance,
        0,
        &mut segments,
    );
    segments
}

/// Fit `points` with fixed unit tangents at both ends, appending the
/// resulting segments to `out`.
fn fit_cubic(
    points: &[Point],
    left_tangent: Point,
    right_tangent: Point,
    error: f64,
    depth: u32,
    out: &mut Vec<CubicBezier>,
) {
    let n = points.len();
    if n == 2 || depth > MAX_DEPTH {
        let first = points[0];
        let last = points[n - 1];
        let leg = first.distance(last) / 3.0;
        out.push(CubicBezier::new(
            first,
            first + left_tangent * leg,
            last + right_tangent * leg,
            last,
        ));
        return;
    }

    let mut u = chord_length_parameters(points);
    let mut bezier = generate_bezier(points, &u, left_tangent, right_tangent);
    let (mut worst, mut split) = max_error(points, &bezier, &u);
    if worst < error {
        out.push(bezier);
        return;
    }

    // Close misses get a few rounds of reparameterization first.
    if worst < error * error {
        for _ in 0..REPARAMETERIZE_ROUNDS {
            u = reparameterize(&bezier, points, &u);
            bezier = generate_bezier(points, &u, left_tangent, right_tangent);
            (worst, split) = max_error(points, &bezier, &u);
            if worst < error {
                out.push(bezier);
                return;
            }
        }
    }

    let split = split.clamp(1, n - 2);
    let center_tangent = (points[split - 1] - points[split + 1]).normalized();
    fit_cubic(
        &points[..=split],
        left_tangent,
        center_tangent,
        error,
        depth + 1,
        out,
    );
    fit_cubic(
        &points[split..],
        -center_tangent,
        right_tangent,
        error,
        depth + 1,
        out,
    );
}

/// Cumulative chord length normalized to `[0, 1]`. All zeros when every
/// point coincides.
fn chord_length_parameters(points: &[Point]) -> Vec<f64> {
    let mut u = Vec::with_capacity(points.len());
    let mut total = 0.0;
    u.push(0.0);
    for pair in points.windows(2) {
        total += pair[0].distance(pair[1]);
        u.push(total);
    }
    if total == 0.0 {
        return vec![0.0; points.len()];
    }
    for t in &mut u {
        *t /= total;
    }
    u
}

/// Least-squares control legs along the given tangents.
///
/// Falls back to legs of one third of the chord when the normal
/// equations are singular or give a non-positive leg.
fn generate_bezier(
    points: &[Point],
    u: &[f64],
    left_tangent: Point,
    right_tangent: Point,
) -> CubicBezier {
    let first = points[0];
    let last = points[points.len() - 1];

    let mut c = [[0.0f64; 2]; 2];
    let mut x = [0.0f64; 2];
    for (&p, &t) in points.iter().zip(u) {
        let mt = 1.0 - t;
        let b0 = mt * mt * mt;
        let b1 = 3.0 * mt * mt * t;
        let b2 = 3.0 * mt * t * t;
        let b3 = t * t * t;

        let a1 = left_tangent * b1;
        let a2 = right_tangent * b2;
        c[0][0] += a1.dot(a1);
        c[0][1] += a1.dot(a2);
        c[1][1] += a2.dot(a2);

        let residual = p - (first * (b0 + b1) + last * (b2 + b3));
        x[0] += a1.dot(residual);
        x[1] += a2.dot(residual);
    }
    c[1][0] = c[0][1];

    let det = c[0][0].mul_add(c[1][1], -(c[0][1] * c[1][0]));
    let fallback = first.distance(last) / 3.0;
    let (alpha_left, alpha_right) = if det.abs() < SINGULAR_DET {
        (fallback, fallback)
    } else {
        let l = x[0].mul_add(c[1][1], -(x[1] * c[0][1])) / det;
        let r = c[0][0].mul_add(x[1], -(c[1][0] * x[0])) / det;
        if l < MIN_ALPHA || r < MIN_ALPHA {
            (fallback, fallback)
        } else {
            (l, r)
        }
    };

    CubicBezier::new(
        first,
        first + left_tangent * alpha_left,
        last + right_tangent * alpha_right,
        last,
    )
}

/// Largest distance between an interior point and the curve at its
/// parameter, with the index where it occurs. The index defaults to the
/// middle point when every interior point fits exactly.
fn max_error(points: &[Point], bezier: &CubicBezier, u: &[f64]) -> (f64, usize) {
    let mut max = 0.0;
    let mut split = points.len() / 2;
    for i in 1..points.len().saturating_sub(1) {
        let d = bezier.eval(u[i]).distance(points[i]);
        if d > max {
            max = d;
            split = i;
        }
    }
    (max, split)
}

fn reparameterize(bezier: &CubicBezier, points: &[Point], u: &[f64]) -> Vec<f64> {
    points
        .iter()
        .zip(u)
        .map(|(&p, &t)| newton_raphson_root(bezier, p, t))
        .collect()
}

/// One Newton step towards the parameter of the curve point nearest `p`.
fn newton_raphson_root(bezier: &CubicBezier, p: Point, t: f64) -> f64 {
    let diff = bezier.eval(t) - p;
    let d1 = bezier.derivative(t);
    let d2 = bezier.second_derivative(t);
    let numerator = diff.dot(d1);
    let denominator = d1.dot(d1) + diff.dot(d2);
    if denominator.abs() < NEWTON_EPSILON {
        t
    } else {
        t - numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    /// Simplified outline of a 10x10 square traced from a mask.
    fn simplified_square() -> Vec<Point> {
        pts(&[(5.0, 4.5), (4.5, 14.0), (14.0, 14.5), (14.5, 5.0), (5.0, 4.5)])
    }

    fn sine_wave() -> Vec<Point> {
        (0..80)
            .map(|i| {
                let x = f64::from(i) * 0.5;
                Point::new(x, (x * 0.3).sin() * 8.0)
            })
            .collect()
    }

    /// Smallest distance from `p` to a densely sampled segment.
    fn distance_to_segment(p: Point, bezier: &CubicBezier) -> f64 {
        (0..=400)
            .map(|i| bezier.eval(f64::from(i) / 400.0).distance(p))
            .fold(f64::INFINITY, f64::min)
    }

    fn assert_chained(segments: &[CubicBezier]) {
        for pair in segments.windows(2) {
            assert_eq!(pair[0].p3, pair[1].p0);
        }
    }

    #[test]
    fn fewer_than_two_points_gives_nothing() {
        assert!(fit_curve(&[], 1.0).is_empty());
        assert!(fit_curve(&pts(&[(1.0, 1.0)]), 1.0).is_empty());
    }

    #[test]
    fn two_points_give_straight_segment() {
        let segments = fit_curve(&pts(&[(0.0, 0.0), (9.0, 0.0)]), 1.0);
        assert_eq!(
            segments,
            vec![CubicBezier::new(
                Point::new(0.0, 0.0),
                Point::new(3.0, 0.0),
                Point::new(6.0, 0.0),
                Point::new(9.0, 0.0),
            )]
        );
    }

    #[test]
    fn collinear_points_fit_one_segment() {
        let line: Vec<Point> = (0..10).map(|i| Point::new(f64::from(i), 2.0)).collect();
        let segments = fit_curve(&line, 0.5);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].p0, line[0]);
        assert_eq!(segments[0].p3, line[9]);
    }

    #[test]
    fn endpoints_are_preserved() {
        let wave = sine_wave();
        let segments = fit_curve(&wave, 1.0);
        assert_eq!(segments.first().map(|s| s.p0), wave.first().copied());
        assert_eq!(segments.last().map(|s| s.p3), wave.last().copied());
    }

    #[test]
    fn every_point_within_tolerance() {
        let wave = sine_wave();
        for tolerance in [0.25, 0.5, 1.0, 2.0] {
            let segments = fit_curve(&wave, tolerance);
            assert_chained(&segments);
            for &p in &wave {
                let d = segments
                    .iter()
                    .map(|s| distance_to_segment(p, s))
                    .fold(f64::INFINITY, f64::min);
                assert!(d < tolerance, "tolerance {tolerance}: {p:?} is {d} away");
            }
        }
    }

    #[test]
    fn tighter_tolerance_needs_more_segments() {
        let wave = sine_wave();
        assert!(fit_curve(&wave, 0.25).len() >= fit_curve(&wave, 2.0).len());
    }

    #[test]
    fn square_corners_split_into_four_segments() {
        let square = simplified_square();
        let segments = fit_curve(&square, 1.5);
        assert_eq!(segments.len(), 4);
        assert_chained(&segments);
        let anchors: Vec<Point> = segments.iter().map(|s| s.p0).collect();
        assert_eq!(anchors, square[..4]);
    }

    #[test]
    fn square_absorbed_by_reparameterization_at_tolerance_two() {
        // The initial fit misses by ~3.2 px, below 2², so Newton-Raphson
        // refinement runs and squeezes the whole loop into one cubic.
        let segments = fit_curve(&simplified_square(), 2.0);
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn coincident_points_do_not_produce_nan() {
        let same = vec![Point::new(3.0, 3.0); 6];
        let segments = fit_curve(&same, 1.0);
        assert!(!segments.is_empty());
        for s in &segments {
            for p in [s.p0, s.c1, s.c2, s.p3] {
                assert!(p.x.is_finite() && p.y.is_finite());
            }
        }
    }

    #[test]
    fn noisy_path_with_tiny_tolerance_terminates() {
        let mut state: u32 = 7;
        let noisy: Vec<Point> = (0..200)
            .map(|i| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let jitter = f64::from(state >> 16) / 65_536.0;
                Point::new(f64::from(i), jitter * 4.0)
            })
            .collect();
        let segments = fit_curve(&noisy, 1e-6);
        assert_chained(&segments);
        assert_eq!(segments.first().map(|s| s.p0), Some(noisy[0]));
        assert_eq!(segments.last().map(|s| s.p3), Some(noisy[199]));
    }

    /// Zigzag no single cubic can follow.
    fn zigzag() -> Vec<Point> {
        (0..9)
            .map(|i| Point::new(f64::from(i), if i % 2 == 0 { 0.0 } else { 3.0 }))
            .collect()
    }

    fn end_tangents(points: &[Point]) -> (Point, Point) {
        let n = points.len();
        (
            (points[1] - points[0]).normalized(),
            (points[n - 2] - points[n - 1]).normalized(),
        )
    }

    #[test]
    fn past_depth_cap_run_closes_with_one_third_legs() {
        let points = zigzag();
        let (left, right) = end_tangents(&points);
        let mut out = Vec::new();
        fit_cubic(&points, left, right, 1e-6, MAX_DEPTH + 1, &mut out);

        let (first, last) = (points[0], points[8]);
        let leg = first.distance(last) / 3.0;
        assert_eq!(
            out,
            vec![CubicBezier::new(
                first,
                first + left * leg,
                last + right * leg,
                last
            )]
        );
    }

    #[test]
    fn split_at_depth_cap_yields_two_capped_halves() {
        let points = zigzag();
        let (left, right) = end_tangents(&points);
        let mut out = Vec::new();
        // Depth 50 still splits; both halves recurse past the cap.
        fit_cubic(&points, left, right, 1e-6, MAX_DEPTH, &mut out);

        assert_eq!(out.len(), 2);
        assert_chained(&out);
        assert_eq!(out[0].p0, points[0]);
        assert_eq!(out[1].p3, points[8]);
        assert!(points.contains(&out[0].p3));
        for segment in &out {
            let leg = segment.p0.distance(segment.p3) / 3.0;
            assert!((segment.p0.distance(segment.c1) - leg).abs() < 1e-9);
            assert!((segment.p3.distance(segment.c2) - leg).abs() < 1e-9);
        }
    }

    #[test]
    fn chord_parameters_span_unit_interval() {
        let u = chord_length_parameters(&pts(&[(0.0, 0.0), (3.0, 4.0), (3.0, 9.0)]));
        assert_eq!(u, vec![0.0, 0.5, 1.0]);
        assert_eq!(chord_length_parameters(&[Point::ZERO; 3]), vec![0.0; 3]);
    }

    #[test]
    fn newton_step_moves_towards_nearest_point() {
        let line = CubicBezier::new(
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.0),
        );
        // Uniform parameterization: x = 3t, so (1.5, 1) is nearest t = 0.5.
        let t = newton_raphson_root(&line, Point::new(1.5, 1.0), 0.2);
        assert!((t - 0.5).abs() < 1e-9, "got {t}");
    }
}
