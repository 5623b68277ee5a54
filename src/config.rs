//! Run configuration loaded from a JSON settings document.
//!
//! Only presence is validated: `areas` is required, every other section
//! falls back to its defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use chrono::FixedOffset;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::AggregationThresholds;
use crate::collect::{CollectConfig, PacingConfig};
use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use crate::sampler::SamplingConstraints;
use crate::window::{TimeWindow, default_windows};

pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn contains(&self, p: GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&p.lat) && (self.min_lon..=self.max_lon).contains(&p.lon)
    }
}

/// A study area and the road graph exported for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub name: String,
    pub bounds: Bounds,
    /// Graph document path; defaults to `data/graphs/<area id>.json`.
    #[serde(default)]
    pub graph: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    pub max_routes_per_area: Option<usize>,
    pub neighbors_per_source: usize,
    pub max_hops: usize,
    pub min_distance_m: f64,
    /// Fixed seed for a reproducible queue; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        let c = SamplingConstraints::default();
        Self {
            max_routes_per_area: Some(5_000),
            neighbors_per_source: c.neighbors_per_source,
            max_hops: c.max_hops,
            min_distance_m: c.min_distance_m,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoiSettings {
    pub csv_path: PathBuf,
    pub origins_per_destination: usize,
    pub min_distance_m: f64,
    pub geocode_cache: PathBuf,
    pub geocoder_url: String,
    pub language: String,
}

impl Default for PoiSettings {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/poi.csv"),
            origins_per_destination: 5,
            min_distance_m: 1_000.0,
            geocode_cache: PathBuf::from("data/geocode_cache.json"),
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
            language: "id".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub raw_dir: PathBuf,
    pub output_dir: PathBuf,
    pub crs: String,
    /// Run log appended after each collection.
    pub runs_csv: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            output_dir: PathBuf::from("data/output"),
            crs: "EPSG:4326".to_string(),
            runs_csv: PathBuf::from("data/runs.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub areas: BTreeMap<String, Area>,
    #[serde(default = "default_windows")]
    pub windows: Vec<TimeWindow>,
    /// Local time offset of the study area, hours east of UTC.
    #[serde(default)]
    pub utc_offset_hours: i32,
    /// `Accept-Language` sent with page requests.
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub sampling: SamplingSettings,
    #[serde(default)]
    pub poi: PoiSettings,
    #[serde(default)]
    pub collect: CollectConfig,
    #[serde(default)]
    pub aggregate: AggregationThresholds,
    #[serde(default)]
    pub output: OutputSettings,
}

fn default_locale() -> String {
    "en-US".to_string()
}

impl Settings {
    pub fn from_json(content: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(content)?;
        if settings.areas.is_empty() {
            return Err(Error::Config("no areas configured".into()));
        }
        if settings.windows.is_empty() {
            return Err(Error::Config("no time windows configured".into()));
        }
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let settings = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), areas = settings.areas.len(), windows = settings.windows.len(), "Settings loaded");
        Ok(settings)
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .ok_or_else(|| Error::Config(format!("invalid utc_offset_hours: {}", self.utc_offset_hours)))
    }

    pub fn period_names(&self) -> Vec<String> {
        self.windows.iter().map(|w| w.name.clone()).collect()
    }

    /// Graph file of every configured area.
    pub fn graph_paths(&self) -> Vec<PathBuf> {
        self.areas
            .iter()
            .map(|(id, area)| {
                area.graph
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(format!("data/graphs/{id}.json")))
            })
            .collect()
    }

    pub fn network_constraints(&self) -> SamplingConstraints {
        SamplingConstraints {
            min_distance_m: self.sampling.min_distance_m,
            max_pairs: self.sampling.max_routes_per_area,
            neighbors_per_source: self.sampling.neighbors_per_source,
            max_hops: self.sampling.max_hops,
            ..SamplingConstraints::default()
        }
    }

    pub fn poi_constraints(&self) -> SamplingConstraints {
        SamplingConstraints {
            min_distance_m: self.poi.min_distance_m,
            max_pairs: self.sampling.max_routes_per_area,
            origins_per_destination: self.poi.origins_per_destination,
            ..SamplingConstraints::default()
        }
    }
}

static DURATION_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s*(s|m|h|min|sec|hr|hour|hours|mins|minutes|seconds)?$")
        .expect("valid regex")
});

/// Parses `"30m"`, `"1.5h"`, `"90s"`, `"45"` (minutes) into a duration.
pub fn parse_duration_arg(raw: &str) -> Result<Duration> {
    let raw = raw.trim().to_lowercase();
    let caps = DURATION_ARG
        .captures(&raw)
        .ok_or_else(|| Error::Config(format!("invalid duration: {raw} (try 30m, 1h, 90s)")))?;
    let value: f64 = caps[1]
        .parse()
        .map_err(|_| Error::Config(format!("invalid duration: {raw}")))?;
    let seconds = match caps.get(2).map_or("m", |m| m.as_str()) {
        "s" | "sec" | "seconds" => value,
        "h" | "hr" | "hour" | "hours" => value * 3600.0,
        _ => value * 60.0,
    };
    Ok(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "areas": {
            "menteng": {
                "name": "Menteng",
                "bounds": {"min_lat": -6.21, "max_lat": -6.18, "min_lon": 106.82, "max_lon": 106.85}
            }
        },
        "utc_offset_hours": 7
    }"#;

    #[test]
    fn test_minimal_settings_use_defaults() {
        let s = Settings::from_json(MINIMAL).unwrap();
        assert_eq!(s.period_names(), vec!["peak_am", "off_peak", "peak_pm"]);
        assert_eq!(s.collect.checkpoint_every, 10);
        assert!(!s.collect.retry_failed_in_run);
        assert_eq!(s.aggregate.min_distance_m, 200.0);
        assert_eq!(s.pacing.min_seconds, 2.0);
        assert_eq!(s.output.raw_dir, PathBuf::from("data/raw"));
        assert_eq!(s.graph_paths(), vec![PathBuf::from("data/graphs/menteng.json")]);
        assert_eq!(s.utc_offset().unwrap().local_minus_utc(), 7 * 3600);
        let bounds = &s.areas["menteng"].bounds;
        assert!(bounds.contains(GeoPoint::new(-6.2, 106.83)));
        assert!(!bounds.contains(GeoPoint::new(-6.3, 106.83)));
    }

    #[test]
    fn test_missing_areas_rejected() {
        assert!(Settings::from_json(r#"{"windows": []}"#).is_err());
        assert!(Settings::from_json(r#"{"areas": {}}"#).is_err());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let json = MINIMAL.replace(
            r#""utc_offset_hours": 7"#,
            r#""collect": {"retry_failed_in_run": true}, "aggregate": {"min_duration_s": 120}"#,
        );
        let s = Settings::from_json(&json).unwrap();
        assert!(s.collect.retry_failed_in_run);
        assert_eq!(s.collect.navigation_timeout_secs, 45);
        assert_eq!(s.aggregate.min_duration_s, 120.0);
        assert_eq!(s.aggregate.high_speed_kmh, 120.0);
    }

    #[test]
    fn test_parse_duration_arg() {
        assert_eq!(parse_duration_arg("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration_arg("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration_arg("1.5 hours").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration_arg("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration_arg("45").unwrap(), Duration::from_secs(2700));
        assert_eq!(parse_duration_arg("2 mins").unwrap(), Duration::from_secs(120));
        assert!(parse_duration_arg("soon").is_err());
        assert!(parse_duration_arg("-5m").is_err());
    }
}
