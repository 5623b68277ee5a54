//! Reverse geocoding of route origins to administrative-area names.
//!
//! The public geocoding service allows one request per second, so lookups are
//! bucketed by rounded coordinate and cached in a [`KeyValueStore`]: nearby
//! origins sampled for different destinations cost a single request.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::fetch::{HttpClient, fetch_bytes};
use crate::geo::GeoPoint;
use crate::sampler::RoutePair;
use crate::store::KeyValueStore;

pub const UNKNOWN_AREA: &str = "Unknown";

/// Address components consulted in order; the first present one names the area.
const AREA_FIELDS: &[&str] = &[
    "village",
    "suburb",
    "neighbourhood",
    "city_district",
    "town",
    "county",
];

/// Resolves a coordinate to an area name, or [`UNKNOWN_AREA`].
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn area_name(&self, point: GeoPoint) -> String;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: HashMap<String, String>,
}

/// Picks the most specific administrative name from a reverse-geocode address.
pub fn area_from_address(address: &HashMap<String, String>) -> String {
    AREA_FIELDS
        .iter()
        .find_map(|field| address.get(*field).filter(|v| !v.is_empty()))
        .cloned()
        .unwrap_or_else(|| UNKNOWN_AREA.to_string())
}

/// Nominatim `/reverse` client that spaces requests at least `min_interval` apart.
pub struct NominatimGeocoder<C> {
    client: C,
    base_url: String,
    language: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl<C: HttpClient> NominatimGeocoder<C> {
    pub fn new(client: C, base_url: &str, language: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
            min_interval: Duration::from_millis(1_100),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    fn reverse_url(&self, point: GeoPoint) -> String {
        format!(
            "{}/reverse?format=jsonv2&lat={}&lon={}&zoom=16&addressdetails=1&accept-language={}",
            self.base_url, point.lat, point.lon, self.language
        )
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl<C: HttpClient> ReverseGeocoder for NominatimGeocoder<C> {
    async fn area_name(&self, point: GeoPoint) -> String {
        self.throttle().await;
        let url = self.reverse_url(point);
        let bytes = match fetch_bytes(&self.client, &url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%point, error = %e, "Reverse geocode failed");
                return UNKNOWN_AREA.to_string();
            }
        };
        match serde_json::from_slice::<ReverseResponse>(&bytes) {
            Ok(resp) => area_from_address(&resp.address),
            Err(e) => {
                warn!(%point, error = %e, "Reverse geocode response unreadable");
                UNKNOWN_AREA.to_string()
            }
        }
    }
}

/// Cache-first area lookup keyed by [`GeoPoint::rounded_key`].
pub struct AreaLabeler<G, S> {
    geocoder: G,
    cache: S,
    pub lookups: usize,
}

impl<G: ReverseGeocoder, S: KeyValueStore<String>> AreaLabeler<G, S> {
    pub fn new(geocoder: G, cache: S) -> Self {
        Self {
            geocoder,
            cache,
            lookups: 0,
        }
    }

    pub async fn label(&mut self, point: GeoPoint) -> String {
        let key = point.rounded_key();
        if let Some(hit) = self.cache.get(&key) {
            return hit;
        }
        let name = self.geocoder.area_name(point).await;
        self.lookups += 1;
        debug!(key, name, "Geocoded origin");
        self.cache.put(&key, name.clone());
        name
    }

    /// Fills `origin_area` on every pair, resolving each rounded origin at
    /// most once, then flushes the cache.
    pub async fn label_origins(&mut self, pairs: &mut [RoutePair]) -> crate::error::Result<()> {
        let mut unique: Vec<(String, GeoPoint)> = Vec::new();
        for pair in pairs.iter() {
            let key = pair.origin.rounded_key();
            if !unique.iter().any(|(k, _)| *k == key) {
                unique.push((key, pair.origin));
            }
        }
        info!(unique = unique.len(), "Reverse-geocoding origin points");

        let mut names: HashMap<String, String> = HashMap::with_capacity(unique.len());
        for (i, (key, point)) in unique.into_iter().enumerate() {
            let name = self.label(point).await;
            names.insert(key, name);
            if (i + 1) % 20 == 0 {
                info!(done = i + 1, "Geocoding progress");
            }
        }

        for pair in pairs.iter_mut() {
            let name = names
                .get(&pair.origin.rounded_key())
                .cloned()
                .unwrap_or_else(|| UNKNOWN_AREA.to_string());
            pair.origin_area = Some(name);
        }

        self.cache.flush()
    }

    pub fn into_cache(self) -> S {
        self.cache
    }
}
