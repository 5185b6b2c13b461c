//! Time-series points and extraction from per-date index records

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One observation of an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,
    pub value: f64,
    #[serde(default = "default_quality")]
    pub quality_score: f64,
}

impl TimeSeriesPoint {
    pub fn new(date: DateTime<Utc>, value: f64) -> Self {
        Self {
            date,
            value,
            quality_score: 1.0,
        }
    }
}

/// Index means captured for one acquisition date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalRecord {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,
    /// Index name to value; `"<name>_mean"` keys are accepted too
    #[serde(default)]
    pub indices: BTreeMap<String, f64>,
    #[serde(default = "default_quality")]
    pub quality_score: f64,
}

impl TemporalRecord {
    /// Value for an index, preferring an explicit `<name>_mean` entry
    pub fn value(&self, index_name: &str) -> Option<f64> {
        self.indices
            .get(&format!("{index_name}_mean"))
            .or_else(|| self.indices.get(index_name))
            .copied()
    }
}

fn default_quality() -> f64 {
    1.0
}

/// Accept RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC)
fn deserialize_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
}

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Points for one index, skipping records where it is missing or NaN.
/// Record order is kept.
pub fn extract_time_series(records: &[TemporalRecord], index_name: &str) -> Vec<TimeSeriesPoint> {
    records
        .iter()
        .filter_map(|record| {
            let value = record.value(index_name)?;
            (!value.is_nan()).then(|| TimeSeriesPoint {
                date: record.date,
                value,
                quality_score: record.quality_score,
            })
        })
        .collect()
}

/// Whole days from `from` to `to`
pub(crate) fn days_between(from: &DateTime<Utc>, to: &DateTime<Utc>) -> i64 {
    (*to - *from).num_days()
}
