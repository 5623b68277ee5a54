/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the population standard deviation given a pre-computed mean.
/// Returns 0.0 for empty input.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `distance / duration × 3.6`, rounded to two decimals; `None` unless both
/// inputs are positive.
pub fn speed_kmh(duration_s: f64, distance_m: f64) -> Option<f64> {
    if duration_s <= 0.0 || distance_m <= 0.0 {
        return None;
    }
    Some(round_to(distance_m / duration_s * 3.6, 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed() {
        assert_eq!(speed_kmh(1800.0, 18000.0), Some(36.0));
        assert_eq!(speed_kmh(0.0, 5000.0), None);
        assert_eq!(speed_kmh(600.0, 0.0), None);
        assert_eq!(speed_kmh(700.0, 5000.0), Some(25.71));
    }

    #[test]
    fn test_mean_and_stddev() {
        assert_eq!(mean(&[]), 0.0);
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let m = mean(&values);
        assert_eq!(m, 5.0);
        assert_eq!(stddev(&values, m), 2.0);
    }
}
