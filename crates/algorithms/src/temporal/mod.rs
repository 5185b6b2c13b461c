//! Multi-temporal index analysis
//!
//! Trend, velocity, anomalies, seasonality and a one-step forecast for the
//! series of one spectral index over many acquisition dates:
//! - [`calculate_trend`]: least-squares trend with a significance test
//! - [`calculate_velocity`]: rates of change, acceleration, days to a threshold
//! - [`detect_anomalies`]: z-score outliers
//! - [`detect_seasonality`]: regularly spaced peaks
//! - [`TemporalAnalyzer`]: all of the above plus a plain-language interpretation

pub mod patterns;
pub mod records;
pub mod trend;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use patterns::{
    detect_anomalies, detect_seasonality, find_peaks, Anomaly, AnomalyKind, AnomalySeverity, SeasonalPattern,
};
pub use records::{extract_time_series, parse_date, TemporalRecord, TimeSeriesPoint};
pub use trend::{
    calculate_trend, calculate_velocity, TrendAnalysis, TrendDirection, VelocityAnalysis, VelocitySeverity,
};

use geowatch_core::{Error, Result};
use records::days_between;

/// Minimum number of points for any temporal analysis
pub const MIN_TEMPORAL_POINTS: usize = 3;

/// Assumed spacing when the last two points share a date
const DEFAULT_FORECAST_DAYS: i64 = 30;

/// Complete analysis of one index series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalResult {
    pub index_name: String,
    pub periods_analyzed: usize,
    pub trend: TrendAnalysis,
    pub velocity: VelocityAnalysis,
    pub anomalies: Vec<Anomaly>,
    pub seasonal_pattern: SeasonalPattern,
    pub next_period_forecast: f64,
    /// The analyzed points, sorted by date
    pub time_series: Vec<TimeSeriesPoint>,
    pub interpretation: String,
}

/// Stateless analyzer for index time series
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalAnalyzer;

impl TemporalAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze a series of points in any order.
    ///
    /// Fails with [`Error::InsufficientData`] below three points.
    pub fn analyze_trends(
        &self,
        mut points: Vec<TimeSeriesPoint>,
        index_name: &str,
        critical_threshold: Option<f64>,
    ) -> Result<TemporalResult> {
        if points.len() < MIN_TEMPORAL_POINTS {
            return Err(Error::InsufficientData {
                context: "temporal analysis",
                required: MIN_TEMPORAL_POINTS,
                actual: points.len(),
            });
        }
        points.sort_by(|a, b| a.date.cmp(&b.date));
        debug!(index = index_name, points = points.len(), "temporal analysis");

        let trend = calculate_trend(&points)?;
        let velocity = calculate_velocity(&points, critical_threshold);
        let anomalies = detect_anomalies(&points);
        let seasonal_pattern = detect_seasonality(&points);
        let next_period_forecast = forecast(&points, &trend);
        let interpretation = interpret(&trend, &velocity, &seasonal_pattern);

        Ok(TemporalResult {
            index_name: index_name.to_string(),
            periods_analyzed: points.len(),
            trend,
            velocity,
            anomalies,
            seasonal_pattern,
            next_period_forecast,
            time_series: points,
            interpretation,
        })
    }

    /// Extract one index from dated records, then analyze it
    pub fn analyze_records(
        &self,
        records: &[TemporalRecord],
        index_name: &str,
        critical_threshold: Option<f64>,
    ) -> Result<TemporalResult> {
        if records.len() < MIN_TEMPORAL_POINTS {
            return Err(Error::InsufficientData {
                context: "temporal records",
                required: MIN_TEMPORAL_POINTS,
                actual: records.len(),
            });
        }
        let points = extract_time_series(records, index_name);
        self.analyze_trends(points, index_name, critical_threshold)
    }
}

/// Last value advanced by the trend slope over the last sampling interval
fn forecast(points: &[TimeSeriesPoint], trend: &TrendAnalysis) -> f64 {
    match points {
        [.., prev, last] => {
            let mut days = days_between(&prev.date, &last.date);
            if days == 0 {
                days = DEFAULT_FORECAST_DAYS;
            }
            last.value + trend.slope * days as f64
        }
        [only] => only.value,
        [] => f64::NAN,
    }
}

fn strength(confidence: f64) -> &'static str {
    if confidence > 0.7 {
        "strong"
    } else if confidence > 0.5 {
        "moderate"
    } else {
        "weak"
    }
}

fn interpret(trend: &TrendAnalysis, velocity: &VelocityAnalysis, seasonal: &SeasonalPattern) -> String {
    let mut parts = Vec::new();
    match trend.direction {
        TrendDirection::Stable => {
            parts.push("The index shows stable values with no significant trend.".to_string());
        }
        direction => parts.push(format!(
            "A {} {} trend is detected (R²={:.3}).",
            strength(trend.confidence),
            direction.as_str(),
            trend.r_squared
        )),
    }

    if velocity.severity.is_rapid() {
        parts.push(format!(
            "Change is happening rapidly ({}).",
            velocity.severity.as_str().replace('_', " ")
        ));
        if velocity.is_accelerating {
            parts.push("The rate of change is accelerating, requiring immediate attention.".to_string());
        }
        if let Some(days) = velocity.days_to_critical.filter(|d| *d < 180.0) {
            parts.push(format!(
                "Critical threshold may be reached in approximately {} days.",
                days as i64
            ));
        }
    }

    if seasonal.seasonal && seasonal.confidence > 0.6 {
        parts.push(format!(
            "Seasonal pattern detected with ~{} day cycle. Some changes may be natural seasonal variation.",
            seasonal.period_days.unwrap_or_default()
        ));
    }

    parts.join(" ")
}
