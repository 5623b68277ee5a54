//! Path search over a [`RoadGraph`].
//!
//! Two searches with different purposes:
//!
//! * [`shortest_path`] — Dijkstra weighted by edge length, used to verify
//!   reachability and to materialise route geometry.
//! * [`nodes_within_hops`] — breadth-first horizon bounded by hop count, used
//!   to find "nearby" candidates without building a full shortest-path tree.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet, VecDeque};

use super::{EdgeId, NodeId, RoadGraph};
use crate::error::{Error, Result};
use crate::geo::GeoPoint;

/// A route through the graph as node and edge sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub length_m: f64,
}

impl Path {
    pub fn is_trivial(&self) -> bool {
        self.edges.is_empty()
    }

    /// Concatenated edge polylines, each oriented to continue from the last
    /// emitted coordinate.
    ///
    /// Stored geometry does not always run in traversal direction, so every
    /// edge after the first is reversed when its far end is closer to the
    /// running tail than its near end. The shared junction point is emitted
    /// once.
    pub fn geometry(&self, graph: &RoadGraph) -> Vec<GeoPoint> {
        let mut coords: Vec<GeoPoint> = Vec::new();
        for &edge in &self.edges {
            let mut segment = graph.edge_polyline(edge);
            match coords.last().copied() {
                None => coords.extend(segment),
                Some(tail) => {
                    let (Some(&first), Some(&last)) = (segment.first(), segment.last()) else {
                        continue;
                    };
                    if planar_dist_2(tail, last) < planar_dist_2(tail, first) {
                        segment.reverse();
                    }
                    coords.extend(segment.into_iter().skip(1));
                }
            }
        }
        coords
    }
}

fn planar_dist_2(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = a.lat - b.lat;
    let dlon = a.lon - b.lon;
    dlat * dlat + dlon * dlon
}

/// Heap cost with a total order so `f64` lengths can sit in a `BinaryHeap`.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Length(f64);

impl Eq for Length {}

impl PartialOrd for Length {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Length {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Shortest path from `from` to `to` by total edge length.
///
/// `from == to` yields an empty path. Unreachable targets are
/// [`Error::NoRoute`].
pub fn shortest_path(graph: &RoadGraph, from: NodeId, to: NodeId) -> Result<Path> {
    let n = graph.node_count();
    if from.index() >= n {
        return Err(Error::UnknownNode(from));
    }
    if to.index() >= n {
        return Err(Error::UnknownNode(to));
    }
    if from == to {
        return Ok(Path {
            nodes: vec![from],
            edges: vec![],
            length_m: 0.0,
        });
    }

    let mut dist = vec![f64::INFINITY; n];
    let mut prev_edge: Vec<Option<EdgeId>> = vec![None; n];
    dist[from.index()] = 0.0;

    // Secondary key NodeId keeps tie-breaking deterministic.
    let mut heap: BinaryHeap<Reverse<(Length, NodeId)>> = BinaryHeap::new();
    heap.push(Reverse((Length(0.0), from)));

    while let Some(Reverse((Length(cost), node))) = heap.pop() {
        if node == to {
            return Ok(reconstruct(graph, &prev_edge, from, to, cost));
        }
        if cost > dist[node.index()] {
            continue;
        }
        for edge in graph.out_edges(node) {
            let next = graph.edge_to[edge.index()];
            let next_cost = cost + graph.edge_length_m[edge.index()];
            if next_cost < dist[next.index()] {
                dist[next.index()] = next_cost;
                prev_edge[next.index()] = Some(edge);
                heap.push(Reverse((Length(next_cost), next)));
            }
        }
    }

    Err(Error::NoRoute { from, to })
}

fn reconstruct(
    graph: &RoadGraph,
    prev_edge: &[Option<EdgeId>],
    from: NodeId,
    to: NodeId,
    length_m: f64,
) -> Path {
    let mut edges = Vec::new();
    let mut cur = to;
    while cur != from {
        let Some(edge) = prev_edge[cur.index()] else {
            break;
        };
        edges.push(edge);
        cur = graph.edge_from[edge.index()];
    }
    edges.reverse();

    let mut nodes = Vec::with_capacity(edges.len() + 1);
    nodes.push(from);
    nodes.extend(edges.iter().map(|e| graph.edge_to[e.index()]));

    Path {
        nodes,
        edges,
        length_m,
    }
}

/// Nodes reachable from `source` in at most `max_hops` outgoing edges,
/// excluding `source`, in breadth-first discovery order.
pub fn nodes_within_hops(graph: &RoadGraph, source: NodeId, max_hops: usize) -> Vec<NodeId> {
    let mut seen = HashSet::from([source]);
    let mut queue = VecDeque::from([(source, 0usize)]);
    let mut found = Vec::new();

    while let Some((node, hops)) = queue.pop_front() {
        if hops == max_hops {
            continue;
        }
        for edge in graph.out_edges(node) {
            let next = graph.edge_to[edge.index()];
            if seen.insert(next) {
                found.push(next);
                queue.push_back((next, hops + 1));
            }
        }
    }

    found
}
