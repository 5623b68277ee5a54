//! Writing merged results as GIS vector features.
//!
//! Attribute names are limited to [`FIELD_NAME_LIMIT`] characters so the same
//! records convert losslessly to formats with that restriction (Shapefile
//! DBF). String values are capped at [`STRING_VALUE_LIMIT`].

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue};
use serde_json::json;
use tracing::info;

use crate::aggregate::utility::round_to;
use crate::aggregate::{MergedRecord, SpatialKey};
use crate::error::Result;
use crate::geocode::UNKNOWN_AREA;
use crate::graph::RoadGraph;
use crate::sampler::RoutePair;
use crate::store::write_atomic;

pub const FIELD_NAME_LIMIT: usize = 10;
pub const STRING_VALUE_LIMIT: usize = 80;

/// Attributes plus a `[lon, lat]` line geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub properties: Vec<(String, JsonValue)>,
    pub geometry: Vec<[f64; 2]>,
}

pub trait VectorExporter {
    /// Writes `features` in `crs` to `path`, returning the number written.
    fn export(&self, features: &[FeatureRecord], crs: &str, path: &Path) -> Result<usize>;
}

pub struct GeoJsonExporter;

impl VectorExporter for GeoJsonExporter {
    fn export(&self, features: &[FeatureRecord], crs: &str, path: &Path) -> Result<usize> {
        let features: Vec<Feature> = features.iter().map(to_geojson_feature).collect();
        let count = features.len();

        let mut foreign = JsonObject::new();
        foreign.insert(
            "crs".to_string(),
            json!({"type": "name", "properties": {"name": crs}}),
        );
        let geojson = GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign),
        });

        write_atomic(path, geojson.to_string().as_bytes())?;
        info!(path = %path.display(), features = count, "Exported features");
        Ok(count)
    }
}

fn to_geojson_feature(record: &FeatureRecord) -> Feature {
    let names = truncate_field_names(record.properties.iter().map(|(k, _)| k.as_str()));
    let mut properties = JsonObject::new();
    for (name, (_, value)) in names.into_iter().zip(&record.properties) {
        let value = match value {
            JsonValue::String(s) => JsonValue::from(truncate_chars(s, STRING_VALUE_LIMIT)),
            other => other.clone(),
        };
        properties.insert(name, value);
    }
    let positions = record.geometry.iter().map(|p| p.to_vec()).collect();
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::LineString(positions))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

/// Cuts names to [`FIELD_NAME_LIMIT`] characters. A name that collides with
/// an earlier one gets a numeric suffix within the limit (`road_type_` →
/// `road_typ_1`).
pub fn truncate_field_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let mut candidate = truncate_chars(name, FIELD_NAME_LIMIT);
        let mut n = 1;
        while !seen.insert(candidate.clone()) {
            let suffix = format!("_{n}");
            candidate = truncate_chars(name, FIELD_NAME_LIMIT - suffix.len()) + &suffix;
            n += 1;
        }
        out.push(candidate);
    }
    out
}

/// Short column tag for a window: `peak_am` → `pk_am`, `off_peak` → `offpk`.
pub fn period_abbrev(period: &str) -> String {
    match period {
        "peak_am" => "pk_am".to_string(),
        "off_peak" => "offpk".to_string(),
        "peak_pm" => "pk_pm".to_string(),
        other => truncate_chars(other, 6),
    }
}

fn opt(value: Option<f64>) -> JsonValue {
    value.map(JsonValue::from).unwrap_or(JsonValue::Null)
}

fn quality(record: &MergedRecord) -> JsonValue {
    if record.suspicious {
        JsonValue::from("suspicious")
    } else {
        JsonValue::Null
    }
}

fn flag_columns(record: &MergedRecord, periods: &[String], props: &mut Vec<(String, JsonValue)>) {
    for period in periods {
        let flag = record.flag(period).map(|f| JsonValue::from(f.as_str()));
        props.push((format!("flg_{}", period_abbrev(period)), flag.unwrap_or(JsonValue::Null)));
    }
    props.push(("quality".to_string(), quality(record)));
}

/// Network-mode row: edge attributes, per-window speed, flags.
/// Returns `None` for records not keyed by an edge of `graph`.
pub fn edge_feature(record: &MergedRecord, graph: &RoadGraph, periods: &[String]) -> Option<FeatureRecord> {
    let SpatialKey::Edge(edge) = record.key else {
        return None;
    };
    let attrs = graph.edge_attrs.get(edge.index())?;
    let road_id = attrs
        .road_id
        .clone()
        .unwrap_or_else(|| graph.node_ref(graph.edge_from[edge.index()]).to_string());

    let mut props = vec![
        ("road_id".to_string(), JsonValue::from(road_id)),
        ("road_name".to_string(), JsonValue::from(attrs.name.clone().unwrap_or_default())),
        ("road_type".to_string(), JsonValue::from(attrs.highway.clone().unwrap_or_default())),
        ("oneway".to_string(), JsonValue::from(if attrs.oneway { "yes" } else { "no" })),
        ("length_m".to_string(), JsonValue::from(round_to(graph.edge_length_m[edge.index()], 2))),
    ];
    for period in periods {
        props.push((format!("spd_{}", period_abbrev(period)), opt(record.speed(period))));
    }
    props.push(("spd_limit".to_string(), opt(attrs.speed_limit())));
    flag_columns(record, periods, &mut props);

    let geometry = graph.edge_polyline(edge).into_iter().map(|p| p.lon_lat()).collect();
    Some(FeatureRecord {
        properties: props,
        geometry,
    })
}

/// Point-of-interest row: origin label and coordinates, destination,
/// mean distance, per-window duration and speed, flags. Geometry is the
/// stored path when it has two or more points, else a straight line.
pub fn route_feature(record: &MergedRecord, pair: &RoutePair, periods: &[String]) -> FeatureRecord {
    let dest_name = pair
        .destination_info
        .as_ref()
        .map(|d| d.name.clone())
        .unwrap_or_else(|| UNKNOWN_AREA.to_string());
    let mut props = vec![
        (
            "origin_kel".to_string(),
            JsonValue::from(pair.origin_area.clone().unwrap_or_else(|| UNKNOWN_AREA.to_string())),
        ),
        ("origin_lat".to_string(), JsonValue::from(round_to(pair.origin.lat, 6))),
        ("origin_lon".to_string(), JsonValue::from(round_to(pair.origin.lon, 6))),
        ("dest_hosp".to_string(), JsonValue::from(dest_name)),
        ("dest_lat".to_string(), JsonValue::from(round_to(pair.destination.lat, 6))),
        ("dest_lon".to_string(), JsonValue::from(round_to(pair.destination.lon, 6))),
        ("dist_m".to_string(), JsonValue::from(round_to(record.mean_distance_m, 1))),
    ];
    for period in periods {
        props.push((
            format!("dur_{}", period_abbrev(period)),
            opt(record.duration(period).map(|d| round_to(d, 1))),
        ));
    }
    for period in periods {
        props.push((format!("spd_{}", period_abbrev(period)), opt(record.speed(period))));
    }
    flag_columns(record, periods, &mut props);

    let geometry = match &pair.path_geometry {
        Some(path) if path.len() >= 2 => path.clone(),
        _ => vec![pair.origin.lon_lat(), pair.destination.lon_lat()],
    };
    FeatureRecord {
        properties: props,
        geometry,
    }
}

/// Builds one feature per merged record that has a representative pair.
pub fn route_features(
    merged: &[MergedRecord],
    representatives: &BTreeMap<SpatialKey, RoutePair>,
    periods: &[String],
) -> Vec<FeatureRecord> {
    merged
        .iter()
        .filter_map(|m| representatives.get(&m.key).map(|p| route_feature(m, p, periods)))
        .collect()
}

pub fn edge_features(merged: &[MergedRecord], graph: &RoadGraph, periods: &[String]) -> Vec<FeatureRecord> {
    merged
        .iter()
        .filter_map(|m| edge_feature(m, graph, periods))
        .collect()
}
