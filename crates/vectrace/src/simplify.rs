//! Polyline simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! Drops contour points that lie within `epsilon` of the segment joining
//! the points kept around them, so the curve fitter sees only the
//! vertices that shape the outline. Distances are measured to the
//! segment, not the infinite line, so closed contours whose endpoints
//! coincide simplify correctly.
//!
//! This is step 5 in the pipeline, between contour tracing and curve
//! fitting.

use crate::types::{Point, Polyline};

/// Simplify a single polyline.
///
/// Every removed point lies within `epsilon` of the simplified polyline,
/// and the endpoints are always kept. Polylines with fewer than 3 points
/// are returned unchanged.
#[must_use = "returns the simplified polyline"]
pub fn simplify(polyline: &Polyline, epsilon: f64) -> Polyline {
    let points = polyline.points();
    if points.len() < 3 {
        return polyline.clone();
    }

    Polyline::new(
        points
            .iter()
            .zip(kept_flags(points, epsilon))
            .filter_map(|(&p, k)| k.then_some(p))
            .collect(),
    )
}

/// Simplify multiple polylines independently.
#[must_use = "returns the simplified polylines"]
pub fn simplify_paths(polylines: &[Polyline], epsilon: f64) -> Vec<Polyline> {
    polylines.iter().map(|pl| simplify(pl, epsilon)).collect()
}

/// Which points survive simplification. Requires at least two points.
fn kept_flags(points: &[Point], epsilon: f64) -> Vec<bool> {
    let last = points.len() - 1;
    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[last] = true;
    mark_kept(points, 0, last, epsilon, &mut kept);
    kept
}

/// Keep the farthest interior point of `start..=end` if it is more than
/// `epsilon` from the chord, then recurse on both halves. Ties go to the
/// first farthest point.
fn mark_kept(points: &[Point], start: usize, end: usize, epsilon: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let (a, b) = (points[start], points[end]);
    let (split, max_dist) = ((start + 1)..end)
        .map(|i| (i, segment_distance(points[i], a, b)))
        .fold((start, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

    if max_dist > epsilon {
        kept[split] = true;
        mark_kept(points, start, split, epsilon, kept);
        mark_kept(points, split, end, epsilon, kept);
    }
}

/// Distance from `p` to the segment `a`-`b` (projection clamped to the
/// segment). Degenerate segments measure to `a`.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let length_sq = ab.dot(ab);
    if length_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / length_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}
