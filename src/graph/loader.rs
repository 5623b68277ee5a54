//! JSON graph document written by the map-data export step.
//!
//! ```json
//! {
//!   "nodes": [{ "id": 101, "lat": -6.2, "lon": 106.8 }],
//!   "edges": [{ "u": 101, "v": 102, "key": 0, "length_m": 84.2,
//!               "geometry": [[106.8, -6.2], [106.801, -6.2]],
//!               "road_id": "23614", "name": "Jalan Sudirman",
//!               "highway": "primary", "oneway": false, "maxspeed": "60" }]
//! }
//! ```
//!
//! Geometry positions are `[lon, lat]`. Edges naming unknown nodes are skipped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{EdgeAttributes, EdgeSpec, RoadGraph, RoadGraphBuilder};
use crate::error::{Error, Result};
use crate::geo::GeoPoint;

#[derive(Debug, Deserialize, Serialize)]
pub struct GraphDocument {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NodeRecord {
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EdgeRecord {
    pub u: u64,
    pub v: u64,
    #[serde(default)]
    pub key: u32,
    pub length_m: Option<f64>,
    #[serde(default)]
    pub geometry: Vec<[f64; 2]>,
    pub road_id: Option<String>,
    pub name: Option<String>,
    pub highway: Option<String>,
    #[serde(default)]
    pub oneway: bool,
    pub maxspeed: Option<String>,
}

impl GraphDocument {
    /// Concatenates documents for overlapping areas, keeping the first copy
    /// of each node id and of each `(u, v, key)` edge.
    pub fn merge(docs: impl IntoIterator<Item = GraphDocument>) -> GraphDocument {
        let mut seen_nodes = std::collections::HashSet::new();
        let mut seen_edges = std::collections::HashSet::new();
        let mut merged = GraphDocument {
            nodes: Vec::new(),
            edges: Vec::new(),
        };
        for doc in docs {
            merged
                .nodes
                .extend(doc.nodes.into_iter().filter(|n| seen_nodes.insert(n.id)));
            merged
                .edges
                .extend(doc.edges.into_iter().filter(|e| seen_edges.insert((e.u, e.v, e.key))));
        }
        merged
    }

    pub fn into_graph(self) -> RoadGraph {
        let mut b = RoadGraphBuilder::with_capacity(self.nodes.len(), self.edges.len());
        for n in &self.nodes {
            b.add_node(n.id, GeoPoint::new(n.lat, n.lon));
        }
        let index: std::collections::HashMap<u64, _> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, super::NodeId(i as u32)))
            .collect();

        let mut dangling = 0usize;
        for e in self.edges {
            let (Some(&from), Some(&to)) = (index.get(&e.u), index.get(&e.v)) else {
                dangling += 1;
                continue;
            };
            b.add_directed_edge(
                from,
                to,
                EdgeSpec {
                    key: e.key,
                    length_m: e.length_m,
                    geometry: e
                        .geometry
                        .iter()
                        .map(|[lon, lat]| GeoPoint::new(*lat, *lon))
                        .collect(),
                    attrs: EdgeAttributes {
                        road_id: e.road_id,
                        name: e.name,
                        highway: e.highway,
                        oneway: e.oneway,
                        maxspeed: e.maxspeed,
                    },
                },
            );
        }
        if dangling > 0 {
            warn!(dangling, "Skipped edges referencing unknown nodes");
        }
        b.build()
    }
}

fn read_document(path: &Path) -> Result<GraphDocument> {
    if !path.exists() {
        return Err(Error::MissingInput(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Reads a [`GraphDocument`] from disk and builds the graph.
pub fn load_graph(path: &Path) -> Result<RoadGraph> {
    load_graphs(std::slice::from_ref(&path))
}

/// Reads several area documents and builds one graph from their union.
pub fn load_graphs<P: AsRef<Path>>(paths: &[P]) -> Result<RoadGraph> {
    let docs = paths
        .iter()
        .map(|p| read_document(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let graph = GraphDocument::merge(docs).into_graph();
    info!(
        files = paths.len(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Road graph loaded"
    );
    Ok(graph)
}
