//! Parser for structured directions payloads.
//!
//! The directions page's own background responses, and the state blobs it
//! embeds in scripts, carry a `routes[0].legs[0]` object shaped like:
//!
//! ```json
//! { "duration": {"text": "25 min", "value": 1500},
//!   "duration_in_traffic": {"text": "32 min", "value": 1920},
//!   "distance": {"text": "12.4 km", "value": 12400} }
//! ```
//!
//! Some responses nest the routes under a top-level `data` object.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A measured quantity as the page shows it plus its numeric value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub value: f64,
}

impl Measure {
    pub fn new(text: &str, value: f64) -> Self {
        Self {
            text: text.to_string(),
            value,
        }
    }

    fn from_json(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        if obj.is_empty() {
            return None;
        }
        Some(Self {
            text: obj
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            value: obj.get("value").and_then(Value::as_f64).unwrap_or_default(),
        })
    }
}

/// Duration (seconds) and distance (metres) for one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRoute {
    pub duration: Measure,
    /// Duration in current conditions; equals `duration` when the page gave none.
    pub duration_in_traffic: Measure,
    pub distance: Measure,
}

/// Reads the first leg of the first route from a parsed payload.
///
/// Returns `None` unless both a distance and a (traffic or typical) duration
/// are present.
pub fn directions_from_value(data: &Value) -> Option<ExtractedRoute> {
    let routes = data
        .get("routes")
        .and_then(Value::as_array)
        .filter(|r| !r.is_empty())
        .or_else(|| data.get("data")?.get("routes")?.as_array())?;

    let leg = routes.first()?.get("legs")?.as_array()?.first()?;

    let duration = leg.get("duration").and_then(Measure::from_json);
    let duration_in_traffic = leg
        .get("duration_in_traffic")
        .and_then(Measure::from_json)
        .or_else(|| duration.clone())?;
    let distance = leg.get("distance").and_then(Measure::from_json)?;

    Some(ExtractedRoute {
        duration: duration.unwrap_or_else(|| duration_in_traffic.clone()),
        duration_in_traffic,
        distance,
    })
}

/// Decodes a JSON directions payload from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not JSON or lack a usable first leg.
pub fn parse_directions(bytes: &[u8]) -> Result<ExtractedRoute> {
    let value: Value = serde_json::from_slice(bytes)?;
    directions_from_value(&value).ok_or_else(|| anyhow!("payload has no routes[0].legs[0] with duration and distance"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "routes": [{
            "legs": [{
                "duration": {"text": "25 min", "value": 1500},
                "duration_in_traffic": {"text": "32 min", "value": 1920},
                "distance": {"text": "12,4 km", "value": 12400}
            }]
        }]
    }"#;

    #[test]
    fn test_parse_full_leg() {
        let route = parse_directions(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(route.duration.value, 1500.0);
        assert_eq!(route.duration_in_traffic.value, 1920.0);
        assert_eq!(route.distance, Measure::new("12,4 km", 12400.0));
    }

    #[test]
    fn test_traffic_defaults_to_duration() {
        let payload = r#"{"data": {"routes": [{"legs": [{
            "duration": {"text": "10 min", "value": 600},
            "distance": {"text": "3 km", "value": 3000}
        }]}]}}"#;
        let route = parse_directions(payload.as_bytes()).unwrap();
        assert_eq!(route.duration_in_traffic.value, 600.0);
    }

    #[test]
    fn test_missing_distance_is_rejected() {
        let payload = r#"{"routes": [{"legs": [{"duration": {"value": 600}}]}]}"#;
        assert!(parse_directions(payload.as_bytes()).is_err());
    }

    #[test]
    fn test_invalid_bytes() {
        assert!(parse_directions(&[0xFF, 0xFE, 0x00]).is_err());
        assert!(parse_directions(b"{}").is_err());
        assert!(parse_directions(br#"{"routes": []}"#).is_err());
    }
}
