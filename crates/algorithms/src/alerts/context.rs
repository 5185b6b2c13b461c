//! Where the prioritizer looks up AOIs and past alerts

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};

use super::prioritizer::Alert;
use geowatch_core::AoiMetadata;

/// Look-back window for historical context
pub const HISTORY_DAYS: i64 = 90;
/// Look-back window for the recent-alert importance boost
pub const RECENT_ALERT_DAYS: i64 = 30;

/// Summary of an AOI's recent alerts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalContext {
    pub alert_count: usize,
    pub alert_types: BTreeSet<String>,
    /// Confidences of the recent alerts, used as a velocity proxy
    pub recent_changes: Vec<f64>,
}

/// Read access to AOI metadata and alert history
pub trait AlertContextSource {
    fn aoi_metadata(&self, aoi_id: &str) -> Option<AoiMetadata>;

    /// Alerts of the last [`HISTORY_DAYS`] days, `None` when there are none
    fn historical_context(&self, aoi_id: &str) -> Option<HistoricalContext>;

    fn recent_alert_count(&self, aoi_id: &str, days: i64) -> usize;
}

/// Context source that knows nothing; every AOI gets default importance
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl AlertContextSource for NoContext {
    fn aoi_metadata(&self, _aoi_id: &str) -> Option<AoiMetadata> {
        None
    }

    fn historical_context(&self, _aoi_id: &str) -> Option<HistoricalContext> {
        None
    }

    fn recent_alert_count(&self, _aoi_id: &str, _days: i64) -> usize {
        0
    }
}

/// AOIs and past alerts held in memory, evaluated as of a fixed instant
#[derive(Debug, Clone)]
pub struct InMemoryContext {
    aois: HashMap<String, AoiMetadata>,
    history: Vec<Alert>,
    as_of: DateTime<Utc>,
}

impl Default for InMemoryContext {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl InMemoryContext {
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self {
            aois: HashMap::new(),
            history: Vec::new(),
            as_of,
        }
    }

    pub fn with_aoi(mut self, aoi: AoiMetadata) -> Self {
        self.aois.insert(aoi.id.clone(), aoi);
        self
    }

    pub fn with_history<I: IntoIterator<Item = Alert>>(mut self, alerts: I) -> Self {
        self.history.extend(alerts);
        self
    }

    /// Past alerts of one AOI created within `days` of the reference instant
    fn recent<'a>(&'a self, aoi_id: &'a str, days: i64) -> impl Iterator<Item = &'a Alert> + 'a {
        let cutoff = self.as_of - Duration::days(days);
        self.history.iter().filter(move |a| {
            a.aoi_id.as_deref() == Some(aoi_id) && a.created_at.is_some_and(|t| t >= cutoff)
        })
    }
}

impl AlertContextSource for InMemoryContext {
    fn aoi_metadata(&self, aoi_id: &str) -> Option<AoiMetadata> {
        self.aois.get(aoi_id).cloned()
    }

    fn historical_context(&self, aoi_id: &str) -> Option<HistoricalContext> {
        let recent: Vec<&Alert> = self.recent(aoi_id, HISTORY_DAYS).collect();
        if recent.is_empty() {
            return None;
        }
        Some(HistoricalContext {
            alert_count: recent.len(),
            alert_types: recent.iter().filter_map(|a| a.kind.clone()).collect(),
            recent_changes: recent.iter().map(|a| a.confidence.unwrap_or(0.5)).collect(),
        })
    }

    fn recent_alert_count(&self, aoi_id: &str, days: i64) -> usize {
        self.recent(aoi_id, days).count()
    }
}
