// SPDX-License-Identifier: MIT OR Apache-2.0
//! Automatic hierarchical layout and viewport math.
//!
//! The arranger is a layered (Sugiyama-style) pipeline: longest-path rank
//! assignment, barycenter crossing reduction, then coordinate assignment.
//! Ranks advance left to right, matching the flow direction of narrative
//! graphs, and the finished drawing is centered on the origin so the
//! viewport fit works from a symmetric rectangle.

use crate::node::{NodeId, Point, Size};
use std::collections::HashMap;

/// Gap between adjacent ranks
const RANK_GAP: f64 = 120.0;
/// Gap between adjacent nodes within a rank
const NODE_GAP: f64 = 40.0;
/// Barycenter sweep count; each pass is one downward and one upward sweep
const ORDERING_PASSES: usize = 4;

/// An axis-aligned rectangle in graph space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Rect {
    /// Create a rectangle from its top-left corner and extent
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Pan/zoom state of the host graph view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    /// Translation applied to graph content, in view units
    pub location: Point,
    /// Scale applied to graph content
    pub zoom: f64,
    /// Size of the host view
    pub size: Size,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            location: Point::default(),
            zoom: 1.0,
            size: Size::new(1280.0, 720.0),
        }
    }
}

impl ViewportState {
    /// Zoom and pan so the given content rectangle fills the view.
    ///
    /// The zoom never exceeds 1, so a small graph is centered at natural
    /// scale rather than blown up.
    pub fn fit_to(&mut self, rect: Rect) {
        if rect.width <= 0.0 || rect.height <= 0.0 {
            self.zoom = 1.0;
            self.location = Point::new(self.size.width / 2.0, self.size.height / 2.0);
            return;
        }
        let zoom = (self.size.width / rect.width)
            .min(self.size.height / rect.height)
            .min(1.0);
        let center = rect.center();
        self.zoom = zoom;
        self.location = Point::new(
            self.size.width / 2.0 - center.x * zoom,
            self.size.height / 2.0 - center.y * zoom,
        );
    }

    /// Pan to one node at natural scale
    pub fn center_on(&mut self, position: Point, size: Size) {
        self.zoom = 1.0;
        self.location = Point::new(
            self.size.width / 2.0 - (position.x + size.width / 2.0),
            self.size.height / 2.0 - (position.y + size.height / 2.0),
        );
    }
}

/// Arrange the given node boxes along the given edges.
///
/// Returns the assigned top-left positions and the bounding rectangle of the
/// drawing, which is centered on the origin. Nodes unreachable through the
/// rank assignment (cycle members) land one rank past the deepest ranked
/// node. Self-edges and edges naming unknown nodes are ignored.
pub fn arrange(
    boxes: &[(NodeId, Size)],
    edges: &[(NodeId, NodeId)],
) -> (Vec<(NodeId, Point)>, Rect) {
    if boxes.is_empty() {
        return (Vec::new(), Rect::default());
    }

    let index: HashMap<NodeId, usize> = boxes
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (*id, i))
        .collect();

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); boxes.len()];
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); boxes.len()];
    let mut indegree: Vec<usize> = vec![0; boxes.len()];
    for (source, target) in edges {
        let (Some(&s), Some(&t)) = (index.get(source), index.get(target)) else {
            continue;
        };
        if s == t {
            continue;
        }
        successors[s].push(t);
        predecessors[t].push(s);
        indegree[t] += 1;
    }

    let ranks = assign_ranks(&successors, &indegree);
    let rank_count = ranks.iter().max().copied().unwrap_or(0) + 1;

    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
    for (node, &rank) in ranks.iter().enumerate() {
        layers[rank].push(node);
    }
    reduce_crossings(&mut layers, &successors, &predecessors);

    // Ranks advance along x; each rank is as wide as its widest node, and its
    // members stack vertically around the axis.
    let mut positions: Vec<Point> = vec![Point::default(); boxes.len()];
    let mut rank_x = 0.0;
    for layer in &layers {
        let rank_width = layer
            .iter()
            .map(|&n| boxes[n].1.width)
            .fold(0.0_f64, f64::max);
        let total_height: f64 = layer.iter().map(|&n| boxes[n].1.height).sum::<f64>()
            + NODE_GAP * layer.len().saturating_sub(1) as f64;

        let mut y = -total_height / 2.0;
        for &node in layer {
            let size = boxes[node].1;
            positions[node] = Point::new(rank_x + (rank_width - size.width) / 2.0, y);
            y += size.height + NODE_GAP;
        }
        rank_x += rank_width + RANK_GAP;
    }

    // Recenter the whole drawing on the origin.
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (node, position) in positions.iter().enumerate() {
        let size = boxes[node].1;
        min_x = min_x.min(position.x);
        min_y = min_y.min(position.y);
        max_x = max_x.max(position.x + size.width);
        max_y = max_y.max(position.y + size.height);
    }
    let shift_x = (min_x + max_x) / 2.0;
    let shift_y = (min_y + max_y) / 2.0;

    let placed = boxes
        .iter()
        .enumerate()
        .map(|(i, (id, _))| {
            (
                *id,
                Point::new(positions[i].x - shift_x, positions[i].y - shift_y),
            )
        })
        .collect();
    let rect = Rect::new(
        min_x - shift_x,
        min_y - shift_y,
        max_x - min_x,
        max_y - min_y,
    );
    (placed, rect)
}

/// Longest-path ranks via Kahn's algorithm. Nodes stuck in a cycle keep no
/// topological order, so they are parked one rank past the deepest one.
fn assign_ranks(successors: &[Vec<usize>], indegree: &[usize]) -> Vec<usize> {
    let mut indegree = indegree.to_vec();
    let mut ranks = vec![0usize; successors.len()];
    let mut visited = vec![false; successors.len()];
    let mut queue: Vec<usize> = indegree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(n, _)| n)
        .collect();

    let mut head = 0;
    while head < queue.len() {
        let node = queue[head];
        head += 1;
        visited[node] = true;
        for &next in &successors[node] {
            ranks[next] = ranks[next].max(ranks[node] + 1);
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push(next);
            }
        }
    }

    if visited.iter().any(|v| !v) {
        let overflow = ranks
            .iter()
            .zip(&visited)
            .filter(|(_, &v)| v)
            .map(|(&r, _)| r + 1)
            .max()
            .unwrap_or(0);
        for (node, seen) in visited.iter().enumerate() {
            if !seen {
                ranks[node] = overflow;
            }
        }
    }
    ranks
}

/// Iterated barycenter ordering: each sweep reorders a layer by the mean
/// position of its neighbors in the adjacent layer.
fn reduce_crossings(
    layers: &mut [Vec<usize>],
    successors: &[Vec<usize>],
    predecessors: &[Vec<usize>],
) {
    let node_count = successors.len();
    for _ in 0..ORDERING_PASSES {
        for layer_index in 1..layers.len() {
            reorder_layer(layers, layer_index, predecessors, node_count);
        }
        for layer_index in (0..layers.len().saturating_sub(1)).rev() {
            reorder_layer(layers, layer_index, successors, node_count);
        }
    }
}

fn reorder_layer(
    layers: &mut [Vec<usize>],
    layer_index: usize,
    neighbors: &[Vec<usize>],
    node_count: usize,
) {
    let mut slot = vec![0.0f64; node_count];
    for layer in layers.iter() {
        for (position, &node) in layer.iter().enumerate() {
            slot[node] = position as f64;
        }
    }
    let layer = &mut layers[layer_index];
    let mut keyed: Vec<(f64, usize)> = layer
        .iter()
        .enumerate()
        .map(|(position, &node)| {
            let adjacent = &neighbors[node];
            let key = if adjacent.is_empty() {
                position as f64
            } else {
                adjacent.iter().map(|&n| slot[n]).sum::<f64>() / adjacent.len() as f64
            };
            (key, node)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    layer.clear();
    layer.extend(keyed.into_iter().map(|(_, node)| node));
}
