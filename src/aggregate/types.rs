//! Data types used by the aggregation pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::graph::EdgeId;
use crate::sampler::RoutePair;
use crate::window::{OFF_PEAK, PEAK_AM};

/// What observations are grouped by: a matched road edge, or the
/// origin/destination coordinates of a point-of-interest route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialKey {
    Edge(EdgeId),
    Route { origin: String, destination: String },
}

impl SpatialKey {
    /// Route identity from endpoint coordinates at six decimals.
    pub fn route(pair: &RoutePair) -> Self {
        let fmt = |p: crate::geo::GeoPoint| format!("{:.6},{:.6}", p.lat, p.lon);
        SpatialKey::Route {
            origin: fmt(pair.origin),
            destination: fmt(pair.destination),
        }
    }
}

impl fmt::Display for SpatialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialKey::Edge(edge) => write!(f, "{edge}"),
            SpatialKey::Route {
                origin,
                destination,
            } => write!(f, "{origin}→{destination}"),
        }
    }
}

/// Minimums below which an observation is discarded, and the plausible
/// speed band outside which an aggregate is flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationThresholds {
    pub min_distance_m: f64,
    pub min_duration_s: f64,
    pub low_speed_kmh: f64,
    pub high_speed_kmh: f64,
}

impl Default for AggregationThresholds {
    fn default() -> Self {
        Self {
            min_distance_m: 200.0,
            min_duration_s: 60.0,
            low_speed_kmh: 5.0,
            high_speed_kmh: 120.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedFlag {
    TooLow,
    TooHigh,
}

impl SpeedFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            SpeedFlag::TooLow => "too_low",
            SpeedFlag::TooHigh => "too_high",
        }
    }
}

/// Means over every kept observation for one (key, window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSample {
    pub key: SpatialKey,
    pub time_period: String,
    pub mean_duration_s: f64,
    pub mean_distance_m: f64,
    pub duration_stddev_s: f64,
    /// `None` when the mean duration or distance is not positive.
    pub speed_kmh: Option<f64>,
    pub sample_count: usize,
    pub speed_flag: Option<SpeedFlag>,
}

/// The part of an [`AggregatedSample`] kept per window after merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub mean_duration_s: f64,
    pub mean_distance_m: f64,
    pub speed_kmh: Option<f64>,
    pub sample_count: usize,
    pub speed_flag: Option<SpeedFlag>,
}

/// All windows for one spatial key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub key: SpatialKey,
    pub windows: BTreeMap<String, WindowStats>,
    /// Mean distance over every observation in every window.
    pub mean_distance_m: f64,
    /// Morning peak faster than off-peak.
    pub suspicious: bool,
}

impl MergedRecord {
    pub fn speed(&self, period: &str) -> Option<f64> {
        self.windows.get(period).and_then(|w| w.speed_kmh)
    }

    pub fn duration(&self, period: &str) -> Option<f64> {
        self.windows.get(period).map(|w| w.mean_duration_s)
    }

    pub fn flag(&self, period: &str) -> Option<SpeedFlag> {
        self.windows.get(period).and_then(|w| w.speed_flag)
    }

    pub fn peak_am_speed(&self) -> Option<f64> {
        self.speed(PEAK_AM)
    }

    pub fn off_peak_speed(&self) -> Option<f64> {
        self.speed(OFF_PEAK)
    }
}

/// Result of [`super::aggregate`].
#[derive(Debug, Default)]
pub struct Aggregation {
    pub samples: Vec<AggregatedSample>,
    /// First kept record per key; carries names and geometry for export.
    pub representatives: BTreeMap<SpatialKey, RoutePair>,
    /// Observations below the distance or duration minimum.
    pub filtered: usize,
    /// Observations the key function could not place.
    pub unmatched: usize,
}
