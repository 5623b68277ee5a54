//! Ordered extraction strategies over a loaded directions page.
//!
//! Each strategy is a plain function from a [`PageSnapshot`] to an optional
//! route. Strategies swallow their own parse failures; the chain stops at the
//! first one that yields both a duration and a distance.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::text::{parse_distance_text, parse_duration_text};
use crate::parser::{ExtractedRoute, Measure, directions_from_value, parse_directions};

/// URL fragments of the background responses worth capturing while a
/// directions page loads.
pub const CAPTURE_PATTERNS: &[&str] = &[
    "/maps/api/directions/json",
    "/maps/dir/",
    "/maps/rbt",
    "/maps/vt",
];

/// Anti-JSON-hijacking prefix some responses carry before the payload.
const XSSI_PREFIX: &str = ")]}'";

/// Upper bound on object starts tried per `"routes"` occurrence in a script.
const MAX_SCRIPT_PROBES: usize = 64;

pub fn should_capture(url: &str) -> bool {
    CAPTURE_PATTERNS.iter().any(|p| url.contains(p))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    CapturedResponse,
    PageScript,
    VisibleText,
}

/// A response body captured while the page loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedResponse {
    pub url: String,
    pub body: String,
}

/// What the page exposed after navigation settled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    pub url: String,
    pub captured: Vec<CapturedResponse>,
    /// Inline script bodies and serialized runtime state.
    pub scripts: Vec<String>,
    /// Rendered duration labels, most specific selector first.
    pub duration_texts: Vec<String>,
    pub distance_texts: Vec<String>,
}

type Strategy = fn(&PageSnapshot) -> Option<ExtractedRoute>;

const STRATEGIES: &[(ExtractionMethod, Strategy)] = &[
    (ExtractionMethod::CapturedResponse, from_captured as Strategy),
    (ExtractionMethod::PageScript, from_scripts as Strategy),
    (ExtractionMethod::VisibleText, from_visible_text as Strategy),
];

/// Runs the strategies in priority order.
pub fn extract(page: &PageSnapshot) -> Option<(ExtractionMethod, ExtractedRoute)> {
    STRATEGIES.iter().find_map(|(method, strategy)| {
        let route = strategy(page)?;
        debug!(?method, duration = route.duration_in_traffic.value, distance = route.distance.value, "Extracted route");
        Some((*method, route))
    })
}

fn from_captured(page: &PageSnapshot) -> Option<ExtractedRoute> {
    page.captured.iter().find_map(|resp| {
        let body = resp.body.trim_start();
        let body = body.strip_prefix(XSSI_PREFIX).unwrap_or(body);
        match parse_directions(body.as_bytes()) {
            Ok(route) => Some(route),
            Err(e) => {
                debug!(url = %resp.url, error = %e, "Captured response not usable");
                None
            }
        }
    })
}

fn from_scripts(page: &PageSnapshot) -> Option<ExtractedRoute> {
    page.scripts.iter().find_map(|script| route_in_script(script))
}

/// Finds a JSON object containing `"routes"` embedded anywhere in `script`.
///
/// For each occurrence of the key, object starts preceding it are tried from
/// nearest to farthest; the first that parses to a usable leg wins.
fn route_in_script(script: &str) -> Option<ExtractedRoute> {
    for (key_pos, _) in script.match_indices("\"routes\"") {
        let starts = script[..key_pos]
            .rmatch_indices('{')
            .take(MAX_SCRIPT_PROBES)
            .map(|(i, _)| i);
        for start in starts {
            let mut values = serde_json::Deserializer::from_str(&script[start..]).into_iter::<Value>();
            if let Some(Ok(value)) = values.next() {
                if let Some(route) = directions_from_value(&value) {
                    return Some(route);
                }
            }
        }
    }
    None
}

fn from_visible_text(page: &PageSnapshot) -> Option<ExtractedRoute> {
    let (duration_text, duration) = page
        .duration_texts
        .iter()
        .find_map(|t| parse_duration_text(t).map(|d| (t.trim(), d)))?;
    let (distance_text, distance) = page
        .distance_texts
        .iter()
        .find_map(|t| parse_distance_text(t).map(|d| (t.trim(), d)))?;

    Some(ExtractedRoute {
        duration: Measure::new(duration_text, duration.typical_s),
        duration_in_traffic: Measure::new(duration_text, duration.traffic_s),
        distance: Measure::new(distance_text, distance),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEG: &str = r#"{"routes":[{"legs":[{"duration":{"text":"25 min","value":1500},"duration_in_traffic":{"text":"32 min","value":1920},"distance":{"text":"12.4 km","value":12400}}]}]}"#;

    fn visible_only() -> PageSnapshot {
        PageSnapshot {
            duration_texts: vec!["Best route".into(), "20–35 min".into()],
            distance_texts: vec!["1,6 km".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_capture_patterns() {
        assert!(should_capture("https://www.google.com/maps/dir/-6.2,106.8/-6.3,106.9"));
        assert!(should_capture("https://www.google.com/maps/rbt/batch?x=1"));
        assert!(!should_capture("https://www.google.com/images/logo.png"));
    }

    #[test]
    fn test_captured_response_wins() {
        let mut page = visible_only();
        page.captured.push(CapturedResponse {
            url: "https://example.test/maps/rbt".into(),
            body: format!("{XSSI_PREFIX}\n{LEG}"),
        });
        let (method, route) = extract(&page).unwrap();
        assert_eq!(method, ExtractionMethod::CapturedResponse);
        assert_eq!(route.duration_in_traffic.value, 1920.0);
    }

    #[test]
    fn test_malformed_capture_falls_through_to_script() {
        let page = PageSnapshot {
            captured: vec![CapturedResponse {
                url: "https://example.test/maps/dir/".into(),
                body: "<html>not json</html>".into(),
            }],
            scripts: vec![format!("window.APP_STATE = {{\"data\": {LEG}, \"v\": 2}}; init();")],
            ..visible_only()
        };
        let (method, route) = extract(&page).unwrap();
        assert_eq!(method, ExtractionMethod::PageScript);
        assert_eq!(route.distance.value, 12400.0);
    }

    #[test]
    fn test_visible_text_fallback() {
        let (method, route) = extract(&visible_only()).unwrap();
        assert_eq!(method, ExtractionMethod::VisibleText);
        assert_eq!(route.duration.value, 1200.0);
        assert_eq!(route.duration_in_traffic.value, 2100.0);
        assert_eq!(route.distance.value, 1600.0);
        assert_eq!(route.distance.text, "1,6 km");
    }

    #[test]
    fn test_nothing_extractable() {
        let page = PageSnapshot {
            scripts: vec!["var routes = [];".into(), "{\"routes\": 3".into()],
            duration_texts: vec!["12 min".into()],
            ..Default::default()
        };
        assert!(extract(&page).is_none());
    }
}
