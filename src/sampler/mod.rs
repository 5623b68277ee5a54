//! Origin/destination pair generation over a road graph.
//!
//! Two samplers share the [`RouteSampler`] trait:
//!
//! * [`NetworkSampler`] pairs intersections with nearby intersections found by
//!   a bounded hop search, avoiding all-pairs enumeration.
//! * [`PoiSampler`] picks random far-enough intersections as origins for each
//!   point of interest and materialises the shortest-path geometry.
//!
//! Both honour the minimum straight-line distance: the directions service
//! rounds durations to whole minutes, so short pairs yield speeds dominated by
//! rounding error.

mod network;
mod poi;
mod queue;

pub use network::NetworkSampler;
pub use poi::{PoiSampler, PointOfInterest, load_points_of_interest};
pub use queue::{RouteQueue, SamplingMode};

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::graph::RoadGraph;
use crate::rng::SamplerRng;

/// Metadata for a named destination such as a facility from a roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// One origin→destination candidate for collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePair {
    pub origin_node: u64,
    #[serde(rename = "origin_coords")]
    pub origin: GeoPoint,
    pub dest_node: u64,
    #[serde(rename = "dest_coords")]
    pub destination: GeoPoint,
    pub straight_line_m: f64,
    /// `[lon, lat]` positions along the length-shortest path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_geometry: Option<Vec<[f64; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_info: Option<DestinationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_area: Option<String>,
}

impl RoutePair {
    pub fn new(origin_node: u64, origin: GeoPoint, dest_node: u64, destination: GeoPoint) -> Self {
        Self {
            origin_node,
            origin,
            dest_node,
            destination,
            straight_line_m: origin.distance_m(destination),
            path_geometry: None,
            destination_info: None,
            origin_area: None,
        }
    }

    /// Order-independent identity of the endpoints.
    pub fn unordered_key(&self) -> (u64, u64) {
        if self.origin_node <= self.dest_node {
            (self.origin_node, self.dest_node)
        } else {
            (self.dest_node, self.origin_node)
        }
    }
}

/// Bounds applied by both samplers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConstraints {
    pub min_distance_m: f64,
    /// Stop once this many pairs exist; unbounded when `None`.
    pub max_pairs: Option<usize>,
    /// Network mode: pairs emitted per source intersection.
    #[serde(default = "default_neighbors")]
    pub neighbors_per_source: usize,
    /// Network mode: hop horizon of the "nearby" search.
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    /// POI mode: origins drawn per destination.
    #[serde(default = "default_origins")]
    pub origins_per_destination: usize,
}

fn default_neighbors() -> usize {
    3
}

fn default_max_hops() -> usize {
    6
}

fn default_origins() -> usize {
    5
}

impl Default for SamplingConstraints {
    fn default() -> Self {
        Self {
            min_distance_m: 1_000.0,
            max_pairs: None,
            neighbors_per_source: default_neighbors(),
            max_hops: default_max_hops(),
            origins_per_destination: default_origins(),
        }
    }
}

impl SamplingConstraints {
    fn is_full(&self, count: usize) -> bool {
        self.max_pairs.is_some_and(|max| count >= max)
    }
}

/// Output of a sampling run plus what was dropped along the way.
#[derive(Debug, Default)]
pub struct Sampled {
    pub pairs: Vec<RoutePair>,
    /// Candidates dropped because the graph has no path between them.
    pub no_path: usize,
    /// Destinations with no origin far enough away (POI mode).
    pub skipped_destinations: usize,
}

/// A strategy for turning a graph into route pairs.
pub trait RouteSampler {
    fn mode(&self) -> SamplingMode;

    fn constraints(&self) -> &SamplingConstraints;

    fn generate(&self, graph: &RoadGraph, rng: &mut SamplerRng) -> Sampled;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unordered_key_is_symmetric() {
        let a = RoutePair::new(5, GeoPoint::new(0.0, 0.0), 2, GeoPoint::new(0.0, 0.1));
        let b = RoutePair::new(2, GeoPoint::new(0.0, 0.1), 5, GeoPoint::new(0.0, 0.0));
        assert_eq!(a.unordered_key(), b.unordered_key());
    }

    #[test]
    fn test_route_pair_json_field_names() {
        let pair = RoutePair::new(1, GeoPoint::new(-6.2, 106.8), 2, GeoPoint::new(-6.21, 106.81));
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["origin_coords"]["lat"], -6.2);
        assert_eq!(json["dest_node"], 2);
        assert!(json.get("path_geometry").is_none());
    }
}
