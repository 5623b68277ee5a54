//! The route queue document handed from generation to collection.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{RoutePair, RouteSampler, SamplingConstraints};
use crate::error::{Error, Result};
use crate::store::write_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Intersection pairs over the road network.
    #[value(name = "road")]
    Network,
    /// Random origins toward a roster of destinations.
    #[value(name = "poi")]
    PointOfInterest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteQueue {
    pub generated_at: DateTime<Utc>,
    pub total_routes: usize,
    pub mode: SamplingMode,
    pub parameters: SamplingConstraints,
    /// Point-of-interest mode: total path vertices across all routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_coords_count: Option<usize>,
    pub routes: Vec<RoutePair>,
}

impl RouteQueue {
    pub fn new(sampler: &dyn RouteSampler, routes: Vec<RoutePair>) -> Self {
        let mode = sampler.mode();
        let path_coords_count = (mode == SamplingMode::PointOfInterest).then(|| {
            routes
                .iter()
                .map(|r| r.path_geometry.as_ref().map_or(0, Vec::len))
                .sum()
        });
        Self {
            generated_at: Utc::now(),
            total_routes: routes.len(),
            mode,
            parameters: sampler.constraints().clone(),
            path_coords_count,
            routes,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &body)?;
        info!(path = %path.display(), routes = self.total_routes, "Route queue written");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
