//! Road graph representation and builder.
//!
//! Outgoing edges are stored in Compressed Sparse Row form: the edges leaving
//! node `n` are `edge_*[node_out_start[n] .. node_out_start[n + 1]]`. Edges of
//! one source node keep their insertion order, so parallel edges are
//! distinguishable by their `key` exactly as the map provider numbered them.

use std::collections::HashMap;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use super::{EdgeId, NodeId};
use crate::geo::GeoPoint;

/// Degree at which a node counts as an intersection.
pub const INTERSECTION_DEGREE: usize = 3;

#[derive(Clone)]
struct NodeEntry {
    point: [f64; 2], // [lat, lon]
    id: NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    /// Squared planar distance in degrees; good enough for nearest-node snapping.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.point[0] - point[0];
        let dlon = self.point[1] - point[1];
        dlat * dlat + dlon * dlon
    }
}

/// Descriptive attributes carried by a road edge.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeAttributes {
    pub road_id: Option<String>,
    pub name: Option<String>,
    pub highway: Option<String>,
    pub oneway: bool,
    pub maxspeed: Option<String>,
}

impl EdgeAttributes {
    /// Posted limit in the unit it was tagged with, e.g. `"50 km/h"` → 50.
    pub fn speed_limit(&self) -> Option<f64> {
        let raw = self.maxspeed.as_deref()?.trim();
        let numeric: String = raw
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        numeric.parse().ok()
    }
}

/// Everything about an edge except its endpoints.
#[derive(Clone, Debug, Default)]
pub struct EdgeSpec {
    pub key: u32,
    /// Physical length in metres; computed from the geometry when `None`.
    pub length_m: Option<f64>,
    /// Polyline from source to target; a straight segment when empty.
    pub geometry: Vec<GeoPoint>,
    pub attrs: EdgeAttributes,
}

impl EdgeSpec {
    pub fn named(name: &str) -> Self {
        Self {
            attrs: EdgeAttributes {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Directed road multigraph with a spatial index for node snapping.
///
/// Build with [`RoadGraphBuilder`].
pub struct RoadGraph {
    /// Provider node identifier, indexed by `NodeId`.
    pub node_ref: Vec<u64>,
    pub node_pos: Vec<GeoPoint>,
    node_in_degree: Vec<u32>,

    pub node_out_start: Vec<u32>,

    pub edge_from: Vec<NodeId>,
    pub edge_to: Vec<NodeId>,
    pub edge_key: Vec<u32>,
    pub edge_length_m: Vec<f64>,
    pub edge_geometry: Vec<Vec<GeoPoint>>,
    pub edge_attrs: Vec<EdgeAttributes>,

    ref_index: HashMap<u64, NodeId>,
    spatial_idx: RTree<NodeEntry>,
}

impl RoadGraph {
    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    #[inline]
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        let start = self.node_out_start[node.index()] as usize;
        let end = self.node_out_start[node.index() + 1] as usize;
        (start..end).map(|i| EdgeId(i as u32))
    }

    #[inline]
    pub fn out_degree(&self, node: NodeId) -> usize {
        let start = self.node_out_start[node.index()] as usize;
        let end = self.node_out_start[node.index() + 1] as usize;
        end - start
    }

    /// Incoming plus outgoing edge count, matching multigraph degree.
    pub fn degree(&self, node: NodeId) -> usize {
        self.out_degree(node) + self.node_in_degree[node.index()] as usize
    }

    /// All nodes with degree ≥ [`INTERSECTION_DEGREE`], in node order.
    pub fn intersections(&self) -> Vec<NodeId> {
        (0..self.node_count() as u32)
            .map(NodeId)
            .filter(|&n| self.degree(n) >= INTERSECTION_DEGREE)
            .collect()
    }

    pub fn node_by_ref(&self, node_ref: u64) -> Option<NodeId> {
        self.ref_index.get(&node_ref).copied()
    }

    #[inline]
    pub fn pos(&self, node: NodeId) -> GeoPoint {
        self.node_pos[node.index()]
    }

    #[inline]
    pub fn node_ref(&self, node: NodeId) -> u64 {
        self.node_ref[node.index()]
    }

    /// First edge from `from` to `to` in key order.
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.out_edges(from)
            .filter(|e| self.edge_to[e.index()] == to)
            .min_by_key(|e| self.edge_key[e.index()])
    }

    /// Edge polyline, falling back to a straight segment between its endpoints.
    pub fn edge_polyline(&self, edge: EdgeId) -> Vec<GeoPoint> {
        let geometry = &self.edge_geometry[edge.index()];
        if geometry.len() >= 2 {
            return geometry.clone();
        }
        vec![
            self.pos(self.edge_from[edge.index()]),
            self.pos(self.edge_to[edge.index()]),
        ]
    }

    /// Nearest node to `pos`. `None` only for an empty graph.
    pub fn snap_to_node(&self, pos: GeoPoint) -> Option<NodeId> {
        self.spatial_idx
            .nearest_neighbor(&[pos.lat, pos.lon])
            .map(|e| e.id)
    }
}

/// Accumulates nodes and edges in any order, then [`build`](Self::build)s the CSR arrays.
pub struct RoadGraphBuilder {
    nodes: Vec<(u64, GeoPoint)>,
    raw_edges: Vec<RawEdge>,
}

struct RawEdge {
    from: NodeId,
    to: NodeId,
    spec: EdgeSpec,
}

impl RoadGraphBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            raw_edges: Vec::new(),
        }
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            raw_edges: Vec::with_capacity(edges),
        }
    }

    /// Add a node and return its dense id (sequential from 0).
    pub fn add_node(&mut self, node_ref: u64, pos: GeoPoint) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push((node_ref, pos));
        id
    }

    pub fn add_directed_edge(&mut self, from: NodeId, to: NodeId, spec: EdgeSpec) {
        self.raw_edges.push(RawEdge { from, to, spec });
    }

    /// Two-way road: one edge per direction, the reverse with reversed geometry.
    pub fn add_road(&mut self, a: NodeId, b: NodeId, spec: EdgeSpec) {
        let mut back = spec.clone();
        back.geometry.reverse();
        self.add_directed_edge(a, b, spec);
        self.add_directed_edge(b, a, back);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn build(self) -> RoadGraph {
        let node_count = self.nodes.len();

        let mut raw = self.raw_edges;
        // Stable: parallel edges keep their insertion order.
        raw.sort_by_key(|e| e.from.0);

        let mut node_out_start = vec![0u32; node_count + 1];
        let mut node_in_degree = vec![0u32; node_count];
        for e in &raw {
            node_out_start[e.from.index() + 1] += 1;
            node_in_degree[e.to.index()] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }

        let positions: Vec<GeoPoint> = self.nodes.iter().map(|(_, p)| *p).collect();

        let mut edge_from = Vec::with_capacity(raw.len());
        let mut edge_to = Vec::with_capacity(raw.len());
        let mut edge_key = Vec::with_capacity(raw.len());
        let mut edge_length_m = Vec::with_capacity(raw.len());
        let mut edge_geometry = Vec::with_capacity(raw.len());
        let mut edge_attrs = Vec::with_capacity(raw.len());

        for e in raw {
            let length = e.spec.length_m.unwrap_or_else(|| {
                if e.spec.geometry.len() >= 2 {
                    e.spec
                        .geometry
                        .windows(2)
                        .map(|w| w[0].distance_m(w[1]))
                        .sum()
                } else {
                    positions[e.from.index()].distance_m(positions[e.to.index()])
                }
            });
            edge_from.push(e.from);
            edge_to.push(e.to);
            edge_key.push(e.spec.key);
            edge_length_m.push(length);
            edge_geometry.push(e.spec.geometry);
            edge_attrs.push(e.spec.attrs);
        }

        let ref_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, (r, _))| (*r, NodeId(i as u32)))
            .collect();

        let entries: Vec<NodeEntry> = positions
            .iter()
            .enumerate()
            .map(|(i, pos)| NodeEntry {
                point: [pos.lat, pos.lon],
                id: NodeId(i as u32),
            })
            .collect();

        RoadGraph {
            node_ref: self.nodes.into_iter().map(|(r, _)| r).collect(),
            node_pos: positions,
            node_in_degree,
            node_out_start,
            edge_from,
            edge_to,
            edge_key,
            edge_length_m,
            edge_geometry,
            edge_attrs,
            ref_index,
            spatial_idx: RTree::bulk_load(entries),
        }
    }
}

impl Default for RoadGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
