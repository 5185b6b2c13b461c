//! Priority scoring of change alerts
//!
//! Score out of 100 from five factors:
//!
//! | factor     | points | source                                              |
//! |------------|--------|-----------------------------------------------------|
//! | magnitude  | 0-30   | change magnitude, else first algorithm confidence   |
//! | confidence | 0-25   | overall confidence, else confidence, else 0.5       |
//! | importance | 0-25   | AOI tags and recent alert frequency                 |
//! | velocity   | 0-15   | alert velocity, else mean of recent confidences     |
//! | novelty    | 0-5    | alert type unseen in the AOI's history              |

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::context::{AlertContextSource, HistoricalContext, RECENT_ALERT_DAYS};
use geowatch_core::AoiMetadata;

const DEFAULT_CONFIDENCE: f64 = 0.5;
const DEFAULT_IMPORTANCE: f64 = 0.5;
const HIGH_VALUE_TAGS: [&str; 4] = ["forest", "wetland", "coral_reef", "wildlife_habitat"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfidence {
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// A change alert as stored by the alert store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub aoi_id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub overall_confidence: Option<f64>,
    #[serde(default)]
    pub change_magnitude: Option<f64>,
    #[serde(default)]
    pub change_velocity: Option<f64>,
    #[serde(default)]
    pub algorithm_results: Vec<AlgorithmConfidence>,
    #[serde(default)]
    pub spectral_indices: BTreeMap<String, f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Overall confidence, else confidence, else 0.5.
    ///
    /// An overall confidence of exactly zero counts as unset.
    pub fn effective_confidence(&self) -> f64 {
        self.overall_confidence
            .filter(|c| *c != 0.0)
            .or(self.confidence)
            .unwrap_or(DEFAULT_CONFIDENCE)
    }

    fn magnitude(&self) -> f64 {
        if let Some(m) = self.change_magnitude {
            return m;
        }
        if let Some(first) = self.algorithm_results.first() {
            return first.confidence.unwrap_or(DEFAULT_CONFIDENCE);
        }
        if let Some(ndvi) = self.spectral_indices.get("ndvi") {
            return ndvi.abs();
        }
        self.confidence.unwrap_or(DEFAULT_CONFIDENCE)
    }

    fn velocity(&self, history: Option<&HistoricalContext>) -> f64 {
        if let Some(v) = self.change_velocity {
            return v;
        }
        match history {
            Some(h) if h.recent_changes.len() >= 2 => {
                h.recent_changes.iter().sum::<f64>() / h.recent_changes.len() as f64
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityFactors {
    pub magnitude: f64,
    pub confidence: f64,
    pub importance: f64,
    pub velocity: f64,
    pub novelty: f64,
}

impl PriorityFactors {
    pub fn total(&self) -> f64 {
        self.magnitude + self.confidence + self.importance + self.velocity + self.novelty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    /// Level of `score * (0.5 + confidence * 0.5)`
    pub fn from_score(score: f64, confidence: f64) -> Self {
        let adjusted = score * (0.5 + confidence * 0.5);
        if adjusted >= 80.0 {
            PriorityLevel::Critical
        } else if adjusted >= 60.0 {
            PriorityLevel::High
        } else if adjusted >= 40.0 {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Critical => "critical",
        }
    }

    fn action(&self) -> &'static str {
        match self {
            PriorityLevel::Critical => {
                "IMMEDIATE ACTION REQUIRED: Deploy field team for verification and intervention within 24 hours."
            }
            PriorityLevel::High => {
                "HIGH PRIORITY: Schedule site inspection within 72 hours and alert relevant authorities."
            }
            PriorityLevel::Medium => "MEDIUM PRIORITY: Add to inspection queue. Review within one week.",
            PriorityLevel::Low => "LOW PRIORITY: Continue monitoring. Routine review in next reporting cycle.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Routine,
    Moderate,
    Urgent,
    Immediate,
}

impl Urgency {
    pub fn from_score(score: f64, velocity: f64) -> Self {
        if score >= 80.0 && velocity.abs() > 0.01 {
            Urgency::Immediate
        } else if score >= 60.0 {
            Urgency::Urgent
        } else if score >= 40.0 {
            Urgency::Moderate
        } else {
            Urgency::Routine
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedAlert {
    pub alert_id: String,
    pub aoi_id: String,
    /// 0-100
    pub priority_score: f64,
    pub priority_level: PriorityLevel,
    pub factors: PriorityFactors,
    pub recommended_action: String,
    pub urgency: Urgency,
}

/// Scores alerts against AOI metadata and alert history from `C`
#[derive(Debug, Clone, Default)]
pub struct AlertPrioritizer<C> {
    context: C,
}

impl<C: AlertContextSource> AlertPrioritizer<C> {
    pub fn new(context: C) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// AOI importance in [0, 1]; 0.5 for an unknown AOI.
    ///
    /// Base 0.5, +0.3 for a protected area, +0.2 for a high-value ecosystem
    /// tag, +0.1 when the AOI had more than three alerts in 30 days.
    pub fn aoi_importance(&self, aoi_id: &str, metadata: Option<&AoiMetadata>) -> f64 {
        let fetched;
        let metadata = match metadata {
            Some(m) => m,
            None => match self.context.aoi_metadata(aoi_id) {
                Some(m) => {
                    fetched = m;
                    &fetched
                }
                None => return DEFAULT_IMPORTANCE,
            },
        };

        let mut importance = DEFAULT_IMPORTANCE;
        if metadata.has_tag("protected_area") {
            importance += 0.3;
        }
        if HIGH_VALUE_TAGS.iter().any(|t| metadata.has_tag(t)) {
            importance += 0.2;
        }
        if self.context.recent_alert_count(aoi_id, RECENT_ALERT_DAYS) > 3 {
            importance += 0.1;
        }
        importance.min(1.0)
    }

    /// Score one alert with explicitly supplied metadata and history
    pub fn calculate_priority_score(
        &self,
        alert: &Alert,
        aoi: Option<&AoiMetadata>,
        history: Option<&HistoricalContext>,
    ) -> PrioritizedAlert {
        let confidence = alert.effective_confidence();
        let velocity = alert.velocity(history);
        let novel = history.is_some_and(|h| match &alert.kind {
            Some(kind) => !h.alert_types.contains(kind),
            None => true,
        });

        let factors = PriorityFactors {
            magnitude: (alert.magnitude() * 30.0).min(30.0),
            confidence: confidence * 25.0,
            importance: alert
                .aoi_id
                .as_deref()
                .map_or(0.0, |id| self.aoi_importance(id, aoi) * 25.0),
            velocity: (velocity.abs() * 15.0).min(15.0),
            novelty: if novel { 5.0 } else { 0.0 },
        };
        let score = factors.total();
        let priority_level = PriorityLevel::from_score(score, confidence);

        let mut recommended_action = priority_level.action().to_string();
        if factors.velocity > 10.0 {
            recommended_action.push_str(" ACCELERATING CHANGE DETECTED - prioritize above other alerts of same level.");
        }
        if factors.novelty > 0.0 {
            recommended_action.push_str(" NEW PATTERN - requires expert analysis.");
        }

        PrioritizedAlert {
            alert_id: alert.id.clone().unwrap_or_else(|| "unknown".to_string()),
            aoi_id: alert.aoi_id.clone().unwrap_or_else(|| "unknown".to_string()),
            priority_score: score,
            priority_level,
            factors,
            recommended_action,
            urgency: Urgency::from_score(score, velocity),
        }
    }

    /// Score alerts with context looked up per AOI, highest first.
    ///
    /// Equal scores keep their input order. `limit` truncates the result.
    pub fn prioritize_alerts(&self, alerts: &[Alert], limit: Option<usize>) -> Vec<PrioritizedAlert> {
        let mut prioritized: Vec<PrioritizedAlert> = alerts
            .iter()
            .map(|alert| {
                let (aoi, history) = match alert.aoi_id.as_deref() {
                    Some(id) => (self.context.aoi_metadata(id), self.context.historical_context(id)),
                    None => (None, None),
                };
                self.calculate_priority_score(alert, aoi.as_ref(), history.as_ref())
            })
            .collect();

        prioritized.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
        if let Some(limit) = limit {
            prioritized.truncate(limit);
        }
        debug!(alerts = alerts.len(), kept = prioritized.len(), "prioritized alerts");
        prioritized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::context::{InMemoryContext, NoContext};
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_bare_alert_defaults() {
        let prioritizer = AlertPrioritizer::new(NoContext);
        let result = prioritizer.calculate_priority_score(&Alert::default(), None, None);
        // magnitude 0.5 * 30, confidence 0.5 * 25, no AOI, no velocity
        assert!((result.priority_score - 27.5).abs() < 1e-12);
        assert_eq!(result.priority_level, PriorityLevel::Low);
        assert_eq!(result.urgency, Urgency::Routine);
        assert_eq!(result.alert_id, "unknown");
        assert!(result.recommended_action.starts_with("LOW PRIORITY"));
    }

    #[test]
    fn test_protected_forest_is_critical() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let aoi = AoiMetadata::new("reserve").with_tags(["protected_area", "forest"]);
        let past: Vec<Alert> = (0..4)
            .map(|d| Alert {
                aoi_id: Some("reserve".into()),
                kind: Some("vegetation".into()),
                confidence: Some(0.9),
                created_at: Some(now - Duration::days(d * 5)),
                ..Default::default()
            })
            .collect();
        let ctx = InMemoryContext::new(now).with_aoi(aoi).with_history(past);
        let prioritizer = AlertPrioritizer::new(ctx);

        assert_eq!(prioritizer.aoi_importance("reserve", None), 1.0);
        assert_eq!(prioritizer.aoi_importance("elsewhere", None), 0.5);

        let alert = Alert {
            id: Some("a1".into()),
            aoi_id: Some("reserve".into()),
            kind: Some("construction".into()),
            confidence: Some(0.9),
            change_magnitude: Some(1.0),
            ..Default::default()
        };
        let ranked = prioritizer.prioritize_alerts(std::slice::from_ref(&alert), None);
        let top = &ranked[0];
        // 30 + 22.5 + 25 + min(0.9*15, 15) + 5
        assert!((top.priority_score - 96.0).abs() < 1e-9);
        assert_eq!(top.priority_level, PriorityLevel::Critical);
        assert_eq!(top.urgency, Urgency::Immediate);
        assert!(top.recommended_action.contains("ACCELERATING CHANGE"));
        assert!(top.recommended_action.ends_with("NEW PATTERN - requires expert analysis."));
    }

    #[test]
    fn test_sorted_and_limited() {
        let prioritizer = AlertPrioritizer::new(NoContext);
        let alerts: Vec<Alert> = [0.1, 0.9, 0.5]
            .iter()
            .enumerate()
            .map(|(i, m)| Alert {
                id: Some(format!("a{i}")),
                change_magnitude: Some(*m),
                ..Default::default()
            })
            .collect();
        let ranked = prioritizer.prioritize_alerts(&alerts, Some(2));
        let ids: Vec<&str> = ranked.iter().map(|p| p.alert_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[test]
    fn test_magnitude_fallbacks() {
        let alert = Alert {
            spectral_indices: [("ndvi".to_string(), -0.4)].into_iter().collect(),
            ..Default::default()
        };
        assert!((alert.magnitude() - 0.4).abs() < 1e-12);

        let alert = Alert {
            algorithm_results: vec![AlgorithmConfidence { confidence: Some(0.7) }],
            ..alert
        };
        assert!((alert.magnitude() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_alert_json_uses_type_key() {
        let alert: Alert = serde_json::from_str(
            r#"{"id": "x", "aoi_id": "a", "type": "construction", "confidence": 0.8,
                "created_at": "2024-05-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(alert.kind.as_deref(), Some("construction"));
        assert_eq!(alert.effective_confidence(), 0.8);
    }

    #[test]
    fn test_zero_overall_confidence_falls_back() {
        let alert = Alert {
            overall_confidence: Some(0.0),
            confidence: Some(0.65),
            ..Default::default()
        };
        assert_eq!(alert.effective_confidence(), 0.65);
        let alert = Alert { confidence: None, ..alert };
        assert_eq!(alert.effective_confidence(), 0.5);
        let alert = Alert { overall_confidence: Some(0.9), ..alert };
        assert_eq!(alert.effective_confidence(), 0.9);
    }
}
