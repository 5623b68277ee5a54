//! Matching network-mode route pairs to a single road edge.

use std::collections::HashMap;

use crate::graph::{EdgeId, NodeId, RoadGraph, shortest_path};
use crate::sampler::RoutePair;

use super::types::SpatialKey;

/// `(u, v)` and `(v, u)` node pairs mapped to the first edge seen between them.
pub struct EdgeIndex {
    by_nodes: HashMap<(NodeId, NodeId), EdgeId>,
}

impl EdgeIndex {
    pub fn new(graph: &RoadGraph) -> Self {
        let mut by_nodes = HashMap::with_capacity(graph.edge_count() * 2);
        for e in 0..graph.edge_count() {
            let edge = EdgeId(e as u32);
            let (u, v) = (graph.edge_from[e], graph.edge_to[e]);
            by_nodes.entry((u, v)).or_insert(edge);
            by_nodes.entry((v, u)).or_insert(edge);
        }
        Self { by_nodes }
    }

    pub fn len(&self) -> usize {
        self.by_nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_nodes.is_empty()
    }

    pub fn get(&self, u: NodeId, v: NodeId) -> Option<EdgeId> {
        self.by_nodes.get(&(u, v)).copied()
    }

    /// The edge joining the pair's endpoints, or failing that the first
    /// indexed edge along the length-shortest path between them.
    pub fn match_pair(&self, graph: &RoadGraph, pair: &RoutePair) -> Option<EdgeId> {
        let origin = graph.node_by_ref(pair.origin_node)?;
        let dest = graph.node_by_ref(pair.dest_node)?;
        if let Some(edge) = self.get(origin, dest) {
            return Some(edge);
        }
        let path = shortest_path(graph, origin, dest).ok()?;
        path.nodes.windows(2).find_map(|w| self.get(w[0], w[1]))
    }

    pub fn spatial_key(&self, graph: &RoadGraph, pair: &RoutePair) -> Option<SpatialKey> {
        self.match_pair(graph, pair).map(SpatialKey::Edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::grid;

    fn pair(graph: &RoadGraph, from: u64, to: u64) -> RoutePair {
        let a = graph.node_by_ref(from).unwrap();
        let b = graph.node_by_ref(to).unwrap();
        RoutePair::new(from, graph.pos(a), to, graph.pos(b))
    }

    #[test]
    fn test_direct_edge_both_directions() {
        let graph = grid();
        let index = EdgeIndex::new(&graph);
        let forward = index.match_pair(&graph, &pair(&graph, 100, 101)).unwrap();
        let backward = index.match_pair(&graph, &pair(&graph, 101, 100)).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_fallback_uses_first_edge_on_path() {
        let graph = grid();
        let index = EdgeIndex::new(&graph);
        // opposite corners share no edge
        let edge = index.match_pair(&graph, &pair(&graph, 100, 115)).unwrap();
        let start = graph.node_by_ref(100).unwrap();
        assert!(graph.edge_from[edge.index()] == start || graph.edge_to[edge.index()] == start);
    }

    #[test]
    fn test_unknown_node_is_unmatched() {
        let graph = grid();
        let index = EdgeIndex::new(&graph);
        let mut p = pair(&graph, 100, 101);
        p.dest_node = 9_999;
        assert_eq!(index.match_pair(&graph, &p), None);
        assert_eq!(index.spatial_key(&graph, &p), None);
    }
}
