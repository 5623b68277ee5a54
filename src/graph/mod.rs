//! Road network graph, spatial snapping and path search.
//!
//! | Module      | Contents                                                 |
//! |-------------|----------------------------------------------------------|
//! | [`network`] | `RoadGraph` (CSR + R-tree), `RoadGraphBuilder`           |
//! | [`path`]    | length-weighted shortest path, bounded hop search        |
//! | [`loader`]  | JSON graph document produced by the map-data exporter    |
//!
//! The graph itself is supplied by an external map-data provider; this crate
//! only reads it.

pub mod loader;
pub mod network;
pub mod path;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use loader::{GraphDocument, load_graph, load_graphs};
pub use network::{EdgeAttributes, EdgeSpec, RoadGraph, RoadGraphBuilder};
pub use path::{Path, nodes_within_hops, shortest_path};

/// Dense index of a node inside a [`RoadGraph`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Dense index of a directed edge inside a [`RoadGraph`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl EdgeId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{EdgeSpec, RoadGraph, RoadGraphBuilder};
    use crate::geo::GeoPoint;

    /// A 4x4 grid of two-way streets, ~550 m between neighbouring nodes.
    ///
    /// Node refs are `100 + row * 4 + col`. Interior nodes have degree 8,
    /// edge nodes 6, corners 4, so every node is an intersection.
    pub fn grid() -> RoadGraph {
        let mut b = RoadGraphBuilder::new();
        let mut ids = Vec::new();
        for row in 0..4 {
            for col in 0..4 {
                let pos = GeoPoint::new(-6.20 + row as f64 * 0.005, 106.80 + col as f64 * 0.005);
                ids.push(b.add_node(100 + row * 4 + col, pos));
            }
        }
        for row in 0..4 {
            for col in 0..4 {
                let here = ids[(row * 4 + col) as usize];
                if col < 3 {
                    let right = ids[(row * 4 + col + 1) as usize];
                    b.add_road(here, right, EdgeSpec::named(&format!("row {row}")));
                }
                if row < 3 {
                    let down = ids[((row + 1) * 4 + col) as usize];
                    b.add_road(here, down, EdgeSpec::named(&format!("col {col}")));
                }
            }
        }
        b.build()
    }
}
