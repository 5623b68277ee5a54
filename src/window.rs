//! Named periods of the day and their representative departure instants.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A named period such as `peak_am`, queried at its start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub name: String,
    #[serde(with = "hh_mm")]
    pub start: NaiveTime,
    #[serde(with = "hh_mm")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(name: &str, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
        }
    }

    /// The single departure instant used for every query in this window:
    /// `date` at the window start, in the study area's local offset.
    pub fn departure(&self, date: NaiveDate, offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
        offset
            .from_local_datetime(&date.and_time(self.start))
            .single()
            .ok_or_else(|| Error::Config(format!("window {} has no departure on {date}", self.name)))
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

/// `peak_am` 07:00–09:00, `off_peak` 10:00–17:00, `peak_pm` 17:00–20:00.
pub fn default_windows() -> Vec<TimeWindow> {
    let hm = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap_or_default();
    vec![
        TimeWindow::new(PEAK_AM, hm(7), hm(9)),
        TimeWindow::new(OFF_PEAK, hm(10), hm(17)),
        TimeWindow::new(PEAK_PM, hm(17), hm(20)),
    ]
}

pub const PEAK_AM: &str = "peak_am";
pub const OFF_PEAK: &str = "off_peak";
pub const PEAK_PM: &str = "peak_pm";

/// Looks a window up by name.
pub fn find_window<'a>(windows: &'a [TimeWindow], name: &str) -> Result<&'a TimeWindow> {
    windows
        .iter()
        .find(|w| w.name == name)
        .ok_or_else(|| Error::Config(format!("unknown time period: {name}")))
}

mod hh_mm {
    use super::*;

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_document() {
        let w: TimeWindow =
            serde_json::from_str(r#"{"name": "peak_am", "start": "07:00", "end": "09:30:00"}"#).unwrap();
        assert_eq!(w.start, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(w.end, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains(r#""end":"09:30""#));
    }

    #[test]
    fn test_departure_uses_offset() {
        let w = &default_windows()[0];
        let jakarta = FixedOffset::east_opt(7 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let dep = w.departure(date, jakarta).unwrap();
        assert_eq!(dep.to_rfc3339(), "2024-03-04T07:00:00+07:00");
        // 07:00 WIB is midnight UTC
        assert_eq!(dep.timestamp() % 86_400, 0);
    }

    #[test]
    fn test_find_window() {
        let windows = default_windows();
        assert_eq!(find_window(&windows, OFF_PEAK).unwrap().end.to_string(), "17:00:00");
        assert!(find_window(&windows, "night").is_err());
        assert!(windows[1].contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    }
}
