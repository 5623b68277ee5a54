use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::{DestinationInfo, RoutePair, RouteSampler, Sampled, SamplingConstraints, SamplingMode};
use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use crate::graph::{NodeId, RoadGraph, shortest_path};
use crate::rng::SamplerRng;

/// A fixed destination such as a hospital or clinic.
#[derive(Debug, Clone, PartialEq)]
pub struct PointOfInterest {
    pub info: DestinationInfo,
    pub location: GeoPoint,
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(default)]
    fid: String,
    #[serde(default)]
    name: String,
    latitude: Option<String>,
    longitude: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Loads a destination roster CSV with `fid,name,latitude,longitude,city`
/// (plus optional `category`). Rows whose coordinates don't parse are skipped.
pub fn load_points_of_interest(path: &Path) -> Result<Vec<PointOfInterest>> {
    if !path.exists() {
        return Err(Error::MissingInput(path.to_path_buf()));
    }
    let mut rdr = csv::Reader::from_path(path)?;
    let mut out = Vec::new();
    let mut skipped = 0usize;

    for row in rdr.deserialize() {
        let row: RosterRow = row?;
        let coords = row
            .latitude
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .zip(row.longitude.as_deref().and_then(|s| s.trim().parse::<f64>().ok()));
        let Some((lat, lon)) = coords else {
            skipped += 1;
            continue;
        };
        out.push(PointOfInterest {
            info: DestinationInfo {
                id: row.fid,
                name: row.name.trim().to_string(),
                category: row.category.filter(|s| !s.trim().is_empty()),
                city: row.city.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            },
            location: GeoPoint::new(lat, lon),
        });
    }

    info!(path = %path.display(), loaded = out.len(), skipped, "Destinations loaded");
    Ok(out)
}

/// Random far-enough origins toward each fixed destination.
///
/// Candidates without a path are skipped, not replaced, so a destination may
/// end up with fewer than `origins_per_destination` pairs.
pub struct PoiSampler {
    pub constraints: SamplingConstraints,
    pub destinations: Vec<PointOfInterest>,
}

impl PoiSampler {
    pub fn new(constraints: SamplingConstraints, destinations: Vec<PointOfInterest>) -> Self {
        Self {
            constraints,
            destinations,
        }
    }
}

impl RouteSampler for PoiSampler {
    fn mode(&self) -> SamplingMode {
        SamplingMode::PointOfInterest
    }

    fn constraints(&self) -> &SamplingConstraints {
        &self.constraints
    }

    #[instrument(skip_all, fields(destinations = self.destinations.len()))]
    fn generate(&self, graph: &RoadGraph, rng: &mut SamplerRng) -> Sampled {
        let c = &self.constraints;
        let mut out = Sampled::default();

        let intersections = graph.intersections();
        if intersections.is_empty() {
            warn!("No intersections found, cannot generate routes");
            return out;
        }

        'destinations: for poi in &self.destinations {
            if c.is_full(out.pairs.len()) {
                break;
            }
            let snapped = poi
                .location
                .is_finite()
                .then(|| graph.snap_to_node(poi.location))
                .flatten();
            let Some(dest_node) = snapped else {
                warn!(destination = %poi.info.name, location = %poi.location, "Destination cannot be placed on the graph");
                out.skipped_destinations += 1;
                continue;
            };

            let candidates: Vec<(NodeId, f64)> = intersections
                .iter()
                .map(|&n| (n, graph.pos(n).distance_m(poi.location)))
                .filter(|(_, d)| *d >= c.min_distance_m)
                .collect();
            if candidates.is_empty() {
                warn!(destination = %poi.info.name, "No valid origins, all too close");
                out.skipped_destinations += 1;
                continue;
            }

            for (origin, dist) in rng.sample(&candidates, c.origins_per_destination) {
                if c.is_full(out.pairs.len()) {
                    break 'destinations;
                }
                let geometry = match shortest_path(graph, origin, dest_node) {
                    Ok(path) => path.geometry(graph),
                    Err(e) => {
                        debug!(error = %e, "Dropping unreachable origin");
                        out.no_path += 1;
                        continue;
                    }
                };
                if geometry.len() < 2 {
                    out.no_path += 1;
                    continue;
                }

                let mut pair = RoutePair::new(
                    graph.node_ref(origin),
                    graph.pos(origin),
                    graph.node_ref(dest_node),
                    poi.location,
                );
                pair.straight_line_m = dist;
                pair.path_geometry = Some(geometry.into_iter().map(|p| p.lon_lat()).collect());
                pair.destination_info = Some(poi.info.clone());
                out.pairs.push(pair);
            }
        }

        if out.no_path > 0 {
            info!(no_path = out.no_path, "Skipped pairs with no path on the graph");
        }
        info!(
            generated = out.pairs.len(),
            destinations = self.destinations.len(),
            skipped_destinations = out.skipped_destinations,
            "Destination route queue generated"
        );
        out
    }
}
