//! Turning raw observations into per-key, per-window travel statistics.
//!
//! Observations shorter than the configured minimums are discarded, the rest
//! are grouped by (spatial key, window) and averaged, and speed is derived from
//! the mean distance and duration. [`merge`] then lines the windows of each key
//! up side by side and applies the quality flags.

pub mod edges;
pub mod flags;
pub mod types;
pub mod utility;

pub use edges::EdgeIndex;
pub use types::{
    AggregatedSample, Aggregation, AggregationThresholds, MergedRecord, SpatialKey, SpeedFlag,
    WindowStats,
};

use std::collections::BTreeMap;

use tracing::{info, instrument};

use crate::collect::ResultRecord;
use flags::{is_suspicious, speed_flag};
use utility::{mean, speed_kmh, stddev};

#[derive(Default)]
struct Group {
    durations: Vec<f64>,
    distances: Vec<f64>,
}

/// Groups `records` by `(key_fn(record), time_period)` and averages each group.
///
/// `key_fn` returns `None` for a record it cannot place (e.g. no matching
/// edge); such records are counted as unmatched. An empty input yields an
/// empty [`Aggregation`].
#[instrument(skip_all, fields(records = records.len()))]
pub fn aggregate<F>(records: &[ResultRecord], thresholds: &AggregationThresholds, mut key_fn: F) -> Aggregation
where
    F: FnMut(&ResultRecord) -> Option<SpatialKey>,
{
    let mut out = Aggregation::default();
    let mut groups: BTreeMap<(SpatialKey, String), Group> = BTreeMap::new();

    for record in records {
        let duration = record.observation.effective_duration_s();
        let distance = record.observation.distance_m;
        if distance < thresholds.min_distance_m || duration < thresholds.min_duration_s {
            out.filtered += 1;
            continue;
        }
        let Some(key) = key_fn(record) else {
            out.unmatched += 1;
            continue;
        };

        out.representatives
            .entry(key.clone())
            .or_insert_with(|| record.pair.clone());
        let group = groups.entry((key, record.time_period.clone())).or_default();
        group.durations.push(duration);
        group.distances.push(distance);
    }

    out.samples = groups
        .into_iter()
        .map(|((key, time_period), group)| {
            let mean_duration_s = mean(&group.durations);
            let mean_distance_m = mean(&group.distances);
            let speed = speed_kmh(mean_duration_s, mean_distance_m);
            AggregatedSample {
                key,
                time_period,
                mean_duration_s,
                mean_distance_m,
                duration_stddev_s: stddev(&group.durations, mean_duration_s),
                speed_kmh: speed,
                sample_count: group.durations.len(),
                speed_flag: speed_flag(speed, thresholds),
            }
        })
        .collect();

    info!(
        samples = out.samples.len(),
        keys = out.representatives.len(),
        filtered = out.filtered,
        unmatched = out.unmatched,
        "Aggregated observations"
    );
    out
}

/// One record per spatial key with every window's statistics, flagged
/// suspicious when the morning peak is faster than off-peak.
pub fn merge(samples: Vec<AggregatedSample>) -> Vec<MergedRecord> {
    let mut by_key: BTreeMap<SpatialKey, BTreeMap<String, WindowStats>> = BTreeMap::new();
    for s in samples {
        by_key.entry(s.key).or_default().insert(
            s.time_period,
            WindowStats {
                mean_duration_s: s.mean_duration_s,
                mean_distance_m: s.mean_distance_m,
                speed_kmh: s.speed_kmh,
                sample_count: s.sample_count,
                speed_flag: s.speed_flag,
            },
        );
    }

    let merged: Vec<MergedRecord> = by_key
        .into_iter()
        .map(|(key, windows)| {
            let count: usize = windows.values().map(|w| w.sample_count).sum();
            let total: f64 = windows
                .values()
                .map(|w| w.mean_distance_m * w.sample_count as f64)
                .sum();
            let mut record = MergedRecord {
                key,
                windows,
                mean_distance_m: if count == 0 { 0.0 } else { total / count as f64 },
                suspicious: false,
            };
            record.suspicious = is_suspicious(record.peak_am_speed(), record.off_peak_speed());
            record
        })
        .collect();

    let suspicious = merged.iter().filter(|r| r.suspicious).count();
    info!(records = merged.len(), suspicious, "Merged windows");
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::{ExtractionMethod, Observation};
    use crate::geo::GeoPoint;
    use crate::sampler::RoutePair;
    use chrono::{DateTime, Utc};

    fn record(origin_node: u64, period: &str, duration_s: f64, distance_m: f64) -> ResultRecord {
        ResultRecord {
            pair: RoutePair::new(
                origin_node,
                GeoPoint::new(-6.2, 106.8 + origin_node as f64 / 1000.0),
                99,
                GeoPoint::new(-6.3, 106.9),
            ),
            observation: Observation {
                duration_s,
                duration_in_traffic_s: duration_s,
                distance_m,
                duration_text: String::new(),
                distance_text: String::new(),
                method: ExtractionMethod::CapturedResponse,
                observed_at: Utc::now(),
            },
            time_period: period.to_string(),
            departure_time: DateTime::parse_from_rfc3339("2024-03-04T07:00:00+07:00").unwrap(),
        }
    }

    fn by_route(r: &ResultRecord) -> Option<SpatialKey> {
        Some(SpatialKey::route(&r.pair))
    }

    #[test]
    fn test_speed_from_means() {
        let records = vec![record(1, "peak_am", 1800.0, 18000.0)];
        let agg = aggregate(&records, &AggregationThresholds::default(), by_route);
        assert_eq!(agg.samples.len(), 1);
        assert_eq!(agg.samples[0].speed_kmh, Some(36.0));
        assert_eq!(agg.samples[0].sample_count, 1);
    }

    #[test]
    fn test_zero_duration_has_no_speed() {
        let thresholds = AggregationThresholds {
            min_duration_s: 0.0,
            ..Default::default()
        };
        let mut r = record(1, "peak_am", 0.0, 5000.0);
        r.observation.duration_in_traffic_s = 0.0;
        let agg = aggregate(&[r], &thresholds, by_route);
        assert_eq!(agg.samples[0].speed_kmh, None);
        assert_eq!(agg.samples[0].speed_flag, None);
    }

    #[test]
    fn test_short_observation_filtered() {
        let records = vec![record(1, "peak_am", 90.0, 150.0)];
        let agg = aggregate(&records, &AggregationThresholds::default(), by_route);
        assert!(agg.samples.is_empty());
        assert_eq!(agg.filtered, 1);
        assert!(agg.representatives.is_empty());
    }

    #[test]
    fn test_traffic_duration_preferred() {
        let mut r = record(1, "peak_am", 600.0, 10_000.0);
        r.observation.duration_in_traffic_s = 1200.0;
        let agg = aggregate(&[r], &AggregationThresholds::default(), by_route);
        assert_eq!(agg.samples[0].mean_duration_s, 1200.0);
        assert_eq!(agg.samples[0].speed_kmh, Some(30.0));
    }

    #[test]
    fn test_mean_speed_invariant_under_duplication() {
        let records = vec![
            record(1, "peak_am", 1200.0, 10_000.0),
            record(1, "peak_am", 1500.0, 11_000.0),
            record(1, "off_peak", 900.0, 10_500.0),
        ];
        let doubled: Vec<ResultRecord> = records.iter().chain(records.iter()).cloned().collect();

        let once = aggregate(&records, &AggregationThresholds::default(), by_route);
        let twice = aggregate(&doubled, &AggregationThresholds::default(), by_route);

        assert_eq!(once.samples.len(), twice.samples.len());
        for (a, b) in once.samples.iter().zip(&twice.samples) {
            assert_eq!(a.speed_kmh, b.speed_kmh);
            assert_eq!(b.sample_count, a.sample_count * 2);
        }
    }

    #[test]
    fn test_unmatched_counted() {
        let records = vec![record(1, "peak_am", 600.0, 5000.0)];
        let agg = aggregate(&records, &AggregationThresholds::default(), |_| None);
        assert_eq!(agg.unmatched, 1);
        assert!(agg.samples.is_empty());
    }

    #[test]
    fn test_merge_flags_peak_faster_than_off_peak() {
        // 45 km/h in the morning peak, 30 km/h off-peak
        let records = vec![
            record(1, "peak_am", 800.0, 10_000.0),
            record(1, "off_peak", 1200.0, 10_000.0),
            record(2, "peak_am", 1200.0, 10_000.0),
            record(2, "off_peak", 800.0, 10_000.0),
            record(2, "peak_pm", 9000.0, 10_000.0),
        ];
        let agg = aggregate(&records, &AggregationThresholds::default(), by_route);
        let merged = merge(agg.samples);

        assert_eq!(merged.len(), 2);
        let first = merged
            .iter()
            .find(|m| m.key == SpatialKey::route(&records[0].pair))
            .unwrap();
        assert_eq!(first.peak_am_speed(), Some(45.0));
        assert_eq!(first.off_peak_speed(), Some(30.0));
        assert!(first.suspicious);

        let second = merged.iter().find(|m| m.key != first.key).unwrap();
        assert!(!second.suspicious);
        assert_eq!(second.flag("peak_pm"), Some(SpeedFlag::TooLow));
        assert_eq!(second.mean_distance_m, 10_000.0);
        assert_eq!(second.windows.len(), 3);
    }

    #[test]
    fn test_empty_input() {
        let agg = aggregate(&[], &AggregationThresholds::default(), by_route);
        assert!(agg.samples.is_empty());
        assert!(merge(agg.samples).is_empty());
    }
}
