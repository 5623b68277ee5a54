//! Locale-aware parsing of the duration and distance labels a directions page
//! renders, e.g. `"1 jam 5 menit"`, `"20–35 min"`, `"1,6 km"`.

use std::sync::LazyLock;

use regex::Regex;

const HOUR_UNITS: &[&str] = &[
    "h", "hr", "hrs", "hour", "hours", "jam", "std", "stunde", "stunden", "heure", "heures",
    "hora", "horas",
];

const MINUTE_UNITS: &[&str] = &[
    "m", "min", "mins", "minute", "minutes", "menit", "minuten", "minuto", "minutos",
];

const SECOND_UNITS: &[&str] = &["s", "sec", "secs", "second", "seconds", "detik", "sekunden"];

static COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*(\p{L}*)").expect("valid regex"));

static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d[^-–—]*?)\s*[-–—]\s*(.+)$").expect("valid regex")
});

static DISTANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)*)\s*(km|mi|ft|m)\b").expect("valid regex")
});

/// A visible duration label. `typical_s` and `traffic_s` differ only for a
/// range such as `"20–35 min"`, whose upper bound is the traffic estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationText {
    pub typical_s: f64,
    pub traffic_s: f64,
}

/// Parses a duration label into seconds.
///
/// A bare number counts as minutes. Returns `None` when no number is found.
pub fn parse_duration_text(text: &str) -> Option<DurationText> {
    let text = text.trim().to_lowercase();

    if let Some(caps) = RANGE.captures(&text) {
        let upper = sum_components(&caps[2])?;
        // "20–35 min": a bare lower bound takes the upper bound's unit
        let lower = match first_unit(&caps[1]) {
            Some(_) => sum_components(&caps[1])?,
            None => {
                let unit = last_unit(&caps[2]).unwrap_or_default();
                sum_components(&format!("{} {unit}", &caps[1]))?
            }
        };
        return Some(DurationText {
            typical_s: lower,
            traffic_s: upper,
        });
    }

    let total = sum_components(&text)?;
    Some(DurationText {
        typical_s: total,
        traffic_s: total,
    })
}

fn first_unit(text: &str) -> Option<String> {
    COMPONENT
        .captures_iter(text)
        .map(|c| c[2].to_string())
        .find(|u| !u.is_empty())
}

fn last_unit(text: &str) -> Option<String> {
    COMPONENT
        .captures_iter(text)
        .map(|c| c[2].to_string())
        .filter(|u| !u.is_empty())
        .last()
}

fn sum_components(text: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut matched = false;
    for caps in COMPONENT.captures_iter(text) {
        let Some(value) = parse_decimal(&caps[1]) else {
            continue;
        };
        let unit = &caps[2];
        let factor = if unit.is_empty() || MINUTE_UNITS.contains(&unit) {
            60.0
        } else if HOUR_UNITS.contains(&unit) {
            3600.0
        } else if SECOND_UNITS.contains(&unit) {
            1.0
        } else {
            continue;
        };
        total += value * factor;
        matched = true;
    }
    matched.then_some(total)
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

/// Parses a distance label into metres, rounded to 0.1 m.
///
/// Both `.` and `,` are accepted as the decimal separator. For metre and foot
/// values a separator followed by groups of exactly three digits is read as a
/// thousands separator (`"1.200 m"`, `"1,200 ft"`).
pub fn parse_distance_text(text: &str) -> Option<f64> {
    let caps = DISTANCE.captures(text)?;
    let unit = caps[2].to_lowercase();
    let value = normalize_number(&caps[1], matches!(unit.as_str(), "m" | "ft"))?;
    let metres = match unit.as_str() {
        "km" => value * 1000.0,
        "mi" => value * 1609.344,
        "ft" => value * 0.3048,
        _ => value,
    };
    Some((metres * 10.0).round() / 10.0)
}

fn normalize_number(raw: &str, small_unit: bool) -> Option<f64> {
    let separators: Vec<(usize, char)> = raw
        .char_indices()
        .filter(|(_, c)| *c == '.' || *c == ',')
        .collect();

    let Some(&(last_pos, last_sep)) = separators.last() else {
        return raw.parse().ok();
    };

    let mixed = separators.iter().any(|(_, c)| *c != last_sep);
    let grouped = raw
        .split(['.', ','])
        .skip(1)
        .all(|group| group.len() == 3);

    if mixed {
        // the last separator is the decimal point, the rest group thousands
        let int: String = raw[..last_pos].chars().filter(char::is_ascii_digit).collect();
        return format!("{int}.{}", &raw[last_pos + 1..]).parse().ok();
    }
    if separators.len() > 1 || (small_unit && grouped) {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        return digits.parse().ok();
    }
    parse_decimal(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(text: &str) -> Option<f64> {
        parse_duration_text(text).map(|d| d.traffic_s)
    }

    #[test]
    fn test_duration_units() {
        assert_eq!(seconds("1 hr 30 min"), Some(5400.0));
        assert_eq!(seconds("1 jam 5 menit"), Some(3900.0));
        assert_eq!(seconds("2 Std. 10 Min."), Some(7800.0));
        assert_eq!(seconds("1 h"), Some(3600.0));
        assert_eq!(seconds("25 min"), Some(1500.0));
        assert_eq!(seconds("45"), Some(2700.0));
        assert_eq!(seconds("1,5 horas"), Some(5400.0));
        assert_eq!(seconds("no data"), None);
        assert_eq!(seconds(""), None);
    }

    #[test]
    fn test_duration_range_takes_upper_bound_for_traffic() {
        let d = parse_duration_text("20–35 min").unwrap();
        assert_eq!(d.typical_s, 1200.0);
        assert_eq!(d.traffic_s, 2100.0);

        let d = parse_duration_text("50 min - 1 h 10 min").unwrap();
        assert_eq!(d.typical_s, 3000.0);
        assert_eq!(d.traffic_s, 4200.0);

        let d = parse_duration_text("1—2 jam").unwrap();
        assert_eq!((d.typical_s, d.traffic_s), (3600.0, 7200.0));

        let d = parse_duration_text("1 hr 10 min – 1 hr 30 min").unwrap();
        assert_eq!((d.typical_s, d.traffic_s), (4200.0, 5400.0));

        let d = parse_duration_text("35 min – 1 hr 5 min").unwrap();
        assert_eq!((d.typical_s, d.traffic_s), (2100.0, 3900.0));

        let d = parse_duration_text("35 – 1 hr 5 min").unwrap();
        assert_eq!((d.typical_s, d.traffic_s), (2100.0, 3900.0));
    }

    #[test]
    fn test_distance_decimal_separators() {
        assert_eq!(parse_distance_text("1,6 km"), Some(1600.0));
        assert_eq!(parse_distance_text("1.6 km"), Some(1600.0));
        assert_eq!(parse_distance_text("500 m"), Some(500.0));
        assert_eq!(parse_distance_text("12 km"), Some(12000.0));
        assert_eq!(parse_distance_text("2.5 KM"), Some(2500.0));
    }

    #[test]
    fn test_distance_thousands_and_imperial() {
        assert_eq!(parse_distance_text("1.200 m"), Some(1200.0));
        assert_eq!(parse_distance_text("1,200 ft"), Some(365.8));
        assert_eq!(parse_distance_text("1,234.5 km"), Some(1_234_500.0));
        assert_eq!(parse_distance_text("1 mi"), Some(1609.3));
        assert_eq!(parse_distance_text("via Jl. Sudirman"), None);
    }
}
