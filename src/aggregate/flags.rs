use super::types::{AggregationThresholds, SpeedFlag};

/// Classifies a speed against the plausible band.
///
/// | Speed (km/h)          | Flag       |
/// |-----------------------|------------|
/// | < `low_speed_kmh`     | `too_low`  |
/// | > `high_speed_kmh`    | `too_high` |
/// | otherwise, or `None`  | none       |
pub fn speed_flag(speed: Option<f64>, thresholds: &AggregationThresholds) -> Option<SpeedFlag> {
    match speed? {
        s if s < thresholds.low_speed_kmh => Some(SpeedFlag::TooLow),
        s if s > thresholds.high_speed_kmh => Some(SpeedFlag::TooHigh),
        _ => None,
    }
}

/// Peak traffic should not be faster than off-peak. Flagged rows are kept
/// for review, not dropped.
pub fn is_suspicious(peak_am: Option<f64>, off_peak: Option<f64>) -> bool {
    matches!((peak_am, off_peak), (Some(am), Some(off)) if am > off)
}
