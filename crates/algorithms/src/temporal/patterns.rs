//! Anomalies and seasonality in an index series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::records::{days_between, TimeSeriesPoint};
use crate::statistics::{mean, population_std};

const EPSILON: f64 = 1e-8;

/// |z| above which a point is anomalous
pub const ANOMALY_Z: f64 = 2.5;
/// |z| above which an anomaly is high severity
pub const HIGH_ANOMALY_Z: f64 = 3.5;
/// Minimum series length for seasonality
pub const MIN_SEASONAL_POINTS: usize = 12;
/// Minimum sample separation between peaks
pub const PEAK_DISTANCE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Spike,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Position in the sorted series
    pub index: usize,
    pub date: DateTime<Utc>,
    pub value: f64,
    /// Absolute z-score
    pub z_score: f64,
    pub kind: AnomalyKind,
    pub severity: AnomalySeverity,
}

/// Points more than 2.5 population standard deviations from the mean.
/// A series with no spread has no anomalies.
pub fn detect_anomalies(points: &[TimeSeriesPoint]) -> Vec<Anomaly> {
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let (Some(mu), Some(sigma)) = (mean(&values), population_std(&values)) else {
        return Vec::new();
    };
    if sigma < EPSILON {
        return Vec::new();
    }

    points
        .iter()
        .enumerate()
        .filter_map(|(index, p)| {
            let z = ((p.value - mu) / sigma).abs();
            (z > ANOMALY_Z).then(|| Anomaly {
                index,
                date: p.date,
                value: p.value,
                z_score: z,
                kind: if p.value > mu {
                    AnomalyKind::Spike
                } else {
                    AnomalyKind::Drop
                },
                severity: if z > HIGH_ANOMALY_Z {
                    AnomalySeverity::High
                } else {
                    AnomalySeverity::Moderate
                },
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPattern {
    pub seasonal: bool,
    pub confidence: f64,
    /// Mean days between peaks when seasonal
    pub period_days: Option<i64>,
    /// Peak-to-peak range of the values
    pub amplitude: f64,
    pub coefficient_of_variation: f64,
}

impl SeasonalPattern {
    fn none(amplitude: f64, coefficient_of_variation: f64) -> Self {
        Self {
            seasonal: false,
            confidence: 0.0,
            period_days: None,
            amplitude,
            coefficient_of_variation,
        }
    }
}

/// Regularly spaced peaks mean a seasonal series.
///
/// Needs at least 12 points. Seasonal when there are two or more peaks and
/// the std of the peak intervals is under 30% of their mean; confidence grows
/// with the coefficient of variation (`cv / 0.5`, capped at 1).
pub fn detect_seasonality(points: &[TimeSeriesPoint]) -> SeasonalPattern {
    if points.len() < MIN_SEASONAL_POINTS {
        return SeasonalPattern::none(0.0, 0.0);
    }
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let mu = mean(&values).unwrap_or(0.0);
    let sigma = population_std(&values).unwrap_or(0.0);
    let cv = if mu.abs() < EPSILON { 0.0 } else { sigma / mu.abs() };
    let amplitude = values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        - values.iter().copied().fold(f64::INFINITY, f64::min);

    let peaks = find_peaks(&values, PEAK_DISTANCE);
    if peaks.len() < 2 {
        return SeasonalPattern::none(amplitude, cv);
    }
    let intervals: Vec<f64> = peaks
        .windows(2)
        .map(|w| days_between(&points[w[0]].date, &points[w[1]].date) as f64)
        .collect();
    let avg = mean(&intervals).unwrap_or(0.0);
    let spread = population_std(&intervals).unwrap_or(0.0);

    if spread < avg * 0.3 {
        SeasonalPattern {
            seasonal: true,
            confidence: (cv / 0.5).min(1.0),
            period_days: Some(avg as i64),
            amplitude,
            coefficient_of_variation: cv,
        }
    } else {
        SeasonalPattern::none(amplitude, cv)
    }
}

/// Local maxima at least `distance` samples apart.
///
/// Flat tops count once, at their midpoint. When two maxima are too close
/// the higher one wins.
pub fn find_peaks(values: &[f64], distance: usize) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead + 1 < n && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    if distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|a, b| values[peaks[*a]].total_cmp(&values[peaks[*b]]));
    let mut keep = vec![true; peaks.len()];
    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }
    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn daily(values: &[f64], step: i64) -> Vec<TimeSeriesPoint> {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| TimeSeriesPoint::new(start + Duration::days(i as i64 * step), *v))
            .collect()
    }

    #[test]
    fn test_single_spike() {
        let mut values = vec![0.5; 10];
        values[6] = 0.9;
        let anomalies = detect_anomalies(&daily(&values, 1));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].index, 6);
        assert_eq!(anomalies[0].kind, AnomalyKind::Spike);
        assert_eq!(anomalies[0].severity, AnomalySeverity::Moderate);
        assert!((anomalies[0].z_score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_series_has_no_anomalies() {
        assert!(detect_anomalies(&daily(&[0.3; 12], 1)).is_empty());
    }

    #[test]
    fn test_find_peaks_plateau_and_distance() {
        assert_eq!(find_peaks(&[0.0, 1.0, 1.0, 1.0, 0.0], 1), vec![2]);
        // Neighbouring peaks: the higher survives
        assert_eq!(find_peaks(&[0.0, 2.0, 0.0, 3.0, 0.0, 1.0, 0.0], 5), vec![3]);
        assert_eq!(find_peaks(&[0.0, 2.0, 0.0, 3.0, 0.0, 1.0, 0.0], 1), vec![1, 3, 5]);
        // Edges are never peaks
        assert!(find_peaks(&[3.0, 1.0, 2.0], 1).is_empty());
    }

    #[test]
    fn test_regular_cycle_is_seasonal() {
        // 6-sample triangle wave, monthly samples
        let cycle = [0.2, 0.4, 0.6, 0.8, 0.6, 0.4];
        let values: Vec<f64> = cycle.iter().cycle().take(24).copied().collect();
        let pattern = detect_seasonality(&daily(&values, 30));
        assert!(pattern.seasonal);
        assert_eq!(pattern.period_days, Some(180));
        assert!((pattern.amplitude - 0.6).abs() < 1e-12);
        assert!(pattern.confidence > 0.0 && pattern.confidence <= 1.0);
    }

    #[test]
    fn test_short_series_not_seasonal() {
        let pattern = detect_seasonality(&daily(&[0.2, 0.8, 0.2, 0.8], 30));
        assert!(!pattern.seasonal);
        assert_eq!(pattern.confidence, 0.0);
    }
}
