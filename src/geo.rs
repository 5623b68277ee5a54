//! Geographic coordinates and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius, metres.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Decimal places used to bucket coordinates for caching (~111 m at the equator).
pub const ROUNDING_DECIMALS: i32 = 3;

/// A WGS-84 coordinate.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Haversine great-circle distance in metres.
    pub fn distance_m(self, other: GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Coordinate rounded to [`ROUNDING_DECIMALS`], formatted as `"lat,lon"`.
    ///
    /// Points closer than the rounding resolution share a key.
    pub fn rounded_key(self) -> String {
        let factor = 10f64.powi(ROUNDING_DECIMALS);
        let lat = (self.lat * factor).round() / factor;
        let lon = (self.lon * factor).round() / factor;
        format!("{lat:.prec$},{lon:.prec$}", prec = ROUNDING_DECIMALS as usize)
    }

    /// `[lon, lat]` ordering used by GeoJSON positions.
    #[inline]
    pub fn lon_lat(self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}
