//! Contour tracing: extract ordered polylines from a binary mask.
//!
//! Marching squares emits one or two boundary segments per 2×2 cell,
//! with endpoints at the midpoints of the cell sides whose corners
//! disagree. Endpoints are deduplicated into an undirected `petgraph`
//! graph, and walks over that graph stitch the segments into polylines.
//!
//! This module also defines the [`ContourTracer`] trait and the
//! [`ContourMode`] enum for selecting a single- or multi-contour trace
//! at runtime.
//!
//! This is step 4 in the pipeline, between mask/edge extraction and
//! simplification.

use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::types::{BinaryMask, Point, Polyline};

/// Scale of the fixed-point key used to merge coincident endpoints.
const KEY_SCALE: f64 = 1000.0;

/// Selects how many contours a trace keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContourMode {
    /// Only the longest contour.
    Single,
    /// Up to `max_contours` contours, longest first.
    Multi {
        /// Upper bound on the number of returned contours.
        max_contours: usize,
    },
}

/// Trait for contour tracing strategies.
///
/// Input: a binary mask (foreground = `true`).
/// Output: polylines with at least `min_length` points, longest first.
pub trait ContourTracer {
    /// Trace contours in the given mask.
    fn trace(&self, mask: &BinaryMask, min_length: usize) -> Vec<Polyline>;
}

impl ContourTracer for ContourMode {
    fn trace(&self, mask: &BinaryMask, min_length: usize) -> Vec<Polyline> {
        match *self {
            Self::Single => trace_longest(mask, min_length).into_iter().collect(),
            Self::Multi { max_contours } => trace_contours(mask, max_contours, min_length),
        }
    }
}

/// The longest contour with at least `min_length` points, if any.
#[must_use = "returns the longest contour"]
pub fn trace_longest(mask: &BinaryMask, min_length: usize) -> Option<Polyline> {
    trace_contours(mask, 1, min_length).into_iter().next()
}

/// Up to `max_contours` contours with at least `min_length` points,
/// longest first.
#[must_use = "returns the traced contours"]
pub fn trace_contours(mask: &BinaryMask, max_contours: usize, min_length: usize) -> Vec<Polyline> {
    let mut contours = marching_squares(mask);
    contours.retain(|c| c.len() >= min_length);
    contours.truncate(max_contours);
    contours
}

/// Every traced path with at least two points, sorted by point count
/// (longest first, ties in discovery order).
///
/// Closed loops repeat their start point at the end. Walks prefer an
/// edge that does not lead straight back to the previous vertex, so
/// at junctions of degree three or more contours may be split or cross.
#[must_use = "returns the traced contours"]
pub fn marching_squares(mask: &BinaryMask) -> Vec<Polyline> {
    let graph = build_graph(mask);
    let mut visited = vec![false; graph.edge_count()];
    let mut paths: Vec<Vec<Point>> = Vec::new();

    // Dead ends first so open contours are walked end to end.
    for node in graph.node_indices() {
        if graph.edges(node).count() == 1 && has_unvisited(&graph, node, &visited) {
            paths.push(walk(&graph, node, &mut visited));
        }
    }
    for node in graph.node_indices() {
        while has_unvisited(&graph, node, &visited) {
            paths.push(walk(&graph, node, &mut visited));
        }
    }

    paths.retain(|p| p.len() >= 2);
    paths.sort_by(|a, b| b.len().cmp(&a.len()));
    log::debug!(
        "contour: {} vertices, {} segments, {} paths",
        graph.node_count(),
        graph.edge_count(),
        paths.len()
    );
    paths.into_iter().map(Polyline::new).collect()
}

/// Fixed-point key for merging endpoints shared by neighbouring cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PointKey(i64, i64);

impl PointKey {
    #[allow(clippy::cast_possible_truncation)]
    fn of(p: Point) -> Self {
        Self((p.x * KEY_SCALE).round() as i64, (p.y * KEY_SCALE).round() as i64)
    }
}

/// Cell-side midpoints in raster coordinates.
fn build_graph(mask: &BinaryMask) -> UnGraph<Point, ()> {
    let mut graph = UnGraph::new_undirected();
    let mut nodes: HashMap<PointKey, NodeIndex> = HashMap::new();
    let mut node = |graph: &mut UnGraph<Point, ()>, p: Point| {
        *nodes.entry(PointKey::of(p)).or_insert_with(|| graph.add_node(p))
    };

    for y in 0..mask.height().saturating_sub(1) {
        for x in 0..mask.width().saturating_sub(1) {
            let tl = mask.get(x, y);
            let tr = mask.get(x + 1, y);
            let br = mask.get(x + 1, y + 1);
            let bl = mask.get(x, y + 1);
            let code = u8::from(tl) * 8 + u8::from(tr) * 4 + u8::from(br) * 2 + u8::from(bl);
            if code == 0 || code == 15 {
                continue;
            }

            let (fx, fy) = (f64::from(x), f64::from(y));
            let top = (tl != tr).then(|| Point::new(fx + 0.5, fy));
            let right = (tr != br).then(|| Point::new(fx + 1.0, fy + 0.5));
            let bottom = (bl != br).then(|| Point::new(fx + 0.5, fy + 1.0));
            let left = (tl != bl).then(|| Point::new(fx, fy + 0.5));

            let segments: Vec<(Point, Point)> = match (code, top, right, bottom, left) {
                (5, Some(t), Some(r), Some(b), Some(l)) => vec![(t, r), (b, l)],
                (10, Some(t), Some(r), Some(b), Some(l)) => vec![(t, l), (b, r)],
                _ => {
                    let crossings: Vec<Point> =
                        [top, right, bottom, left].into_iter().flatten().collect();
                    match crossings[..] {
                        [a, b] => vec![(a, b)],
                        _ => Vec::new(),
                    }
                }
            };

            for (a, b) in segments {
                let na = node(&mut graph, a);
                let nb = node(&mut graph, b);
                if na != nb {
                    graph.add_edge(na, nb, ());
                }
            }
        }
    }
    graph
}

fn has_unvisited(graph: &UnGraph<Point, ()>, node: NodeIndex, visited: &[bool]) -> bool {
    graph.edges(node).any(|e| !visited[e.id().index()])
}

/// Follow unvisited edges from `start` until returning to it or running
/// out of edges.
fn walk(graph: &UnGraph<Point, ()>, start: NodeIndex, visited: &mut [bool]) -> Vec<Point> {
    let mut path = vec![graph[start]];
    let mut previous: Option<NodeIndex> = None;
    let mut current = start;

    loop {
        let mut preferred: Option<(EdgeIndex, NodeIndex)> = None;
        let mut fallback: Option<(EdgeIndex, NodeIndex)> = None;
        for edge in graph.edges(current) {
            if visited[edge.id().index()] {
                continue;
            }
            let other = if edge.source() == current {
                edge.target()
            } else {
                edge.source()
            };
            if Some(other) != previous {
                preferred = Some((edge.id(), other));
                break;
            }
            fallback.get_or_insert((edge.id(), other));
        }

        let Some((edge, next)) = preferred.or(fallback) else {
            break;
        };
        visited[edge.index()] = true;
        path.push(graph[next]);
        previous = Some(current);
        current = next;
        if current == start {
            break;
        }
    }
    path
}
