//! Clustering of alerts that are close in space and time

use serde::{Deserialize, Serialize};

use super::context::AlertContextSource;
use super::prioritizer::{Alert, PriorityLevel};
use geowatch_core::GeoPoint;

/// Parameters for alert grouping
#[derive(Debug, Clone, Copy)]
pub struct GroupingParams {
    /// Maximum planar distance between AOI centres, in km
    pub distance_km: f64,
    /// Maximum difference between creation dates, in days
    pub days: i64,
}

impl Default for GroupingParams {
    fn default() -> Self {
        Self {
            distance_km: 2.0,
            days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertGroup {
    pub group_id: String,
    pub alert_count: usize,
    /// Mean centre of every alert within range of the seed alert
    pub center: GeoPoint,
    pub severity: PriorityLevel,
    pub alerts: Vec<Alert>,
    pub recommendation: String,
}

/// Severity of a group from the mean alert confidence
pub fn group_severity(alerts: &[Alert]) -> PriorityLevel {
    let mean = if alerts.is_empty() {
        0.5
    } else {
        alerts.iter().map(|a| a.confidence.unwrap_or(0.5)).sum::<f64>() / alerts.len() as f64
    };
    if mean > 0.8 {
        PriorityLevel::Critical
    } else if mean > 0.6 {
        PriorityLevel::High
    } else if mean > 0.4 {
        PriorityLevel::Medium
    } else {
        PriorityLevel::Low
    }
}

/// Group alerts whose AOI centres lie within `distance_km` and whose
/// creation dates lie within `days` of a seed alert.
///
/// Alerts without a located AOI are ignored. Alerts without a date never
/// join a group. Only groups of two or more are returned.
pub fn group_related_alerts<C: AlertContextSource>(
    alerts: &[Alert],
    context: &C,
    params: GroupingParams,
) -> Vec<AlertGroup> {
    let located: Vec<(&Alert, GeoPoint)> = alerts
        .iter()
        .filter_map(|alert| {
            let aoi = context.aoi_metadata(alert.aoi_id.as_deref()?)?;
            Some((alert, aoi.center?))
        })
        .collect();

    let mut grouped = vec![false; located.len()];
    let mut groups = Vec::new();

    for i in 0..located.len() {
        if grouped[i] {
            continue;
        }
        let (seed, seed_center) = located[i];
        let nearby: Vec<usize> = (0..located.len())
            .filter(|&j| seed_center.approx_distance_km(&located[j].1) < params.distance_km)
            .collect();

        let mut members = Vec::new();
        for &j in &nearby {
            if grouped[j] {
                continue;
            }
            let close_in_time = match (seed.created_at, located[j].0.created_at) {
                (Some(a), Some(b)) => (a - b).num_days().abs() <= params.days,
                _ => false,
            };
            if close_in_time {
                members.push(located[j].0.clone());
                grouped[j] = true;
            }
        }

        if members.len() > 1 {
            let n = nearby.len() as f64;
            let center = GeoPoint::new(
                nearby.iter().map(|&j| located[j].1.lat).sum::<f64>() / n,
                nearby.iter().map(|&j| located[j].1.lon).sum::<f64>() / n,
            );
            groups.push(AlertGroup {
                group_id: format!("group_{}", groups.len()),
                alert_count: members.len(),
                center,
                severity: group_severity(&members),
                alerts: members,
                recommendation: "Investigate cluster of related changes".to_string(),
            });
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::context::InMemoryContext;
    use chrono::{Duration, TimeZone, Utc};
    use geowatch_core::AoiMetadata;

    #[test]
    fn test_groups_near_alerts_only() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let ctx = InMemoryContext::new(t0)
            .with_aoi(AoiMetadata::new("a").with_center(GeoPoint::new(10.0, 76.0)))
            .with_aoi(AoiMetadata::new("b").with_center(GeoPoint::new(10.01, 76.0)))
            .with_aoi(AoiMetadata::new("far").with_center(GeoPoint::new(12.0, 76.0)))
            .with_aoi(AoiMetadata::new("nowhere"));

        let alert = |id: &str, aoi: &str, days: i64, confidence: f64| Alert {
            id: Some(id.to_string()),
            aoi_id: Some(aoi.to_string()),
            confidence: Some(confidence),
            created_at: Some(t0 + Duration::days(days)),
            ..Default::default()
        };
        let alerts = vec![
            alert("1", "a", 0, 0.9),
            alert("2", "b", 3, 0.8),
            alert("3", "b", 30, 0.9),
            alert("4", "far", 0, 0.9),
            alert("5", "nowhere", 0, 0.9),
        ];

        let groups = group_related_alerts(&alerts, &ctx, GroupingParams::default());
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.alert_count, 2);
        assert_eq!(group.group_id, "group_0");
        assert_eq!(group.severity, PriorityLevel::Critical);
        // centre over the three alerts within 2 km of the seed
        assert!((group.center.lat - (10.0 + 10.01 + 10.01) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_severity_buckets() {
        let with = |c: f64| Alert {
            confidence: Some(c),
            ..Default::default()
        };
        assert_eq!(group_severity(&[with(0.7), with(0.65)]), PriorityLevel::High);
        assert_eq!(group_severity(&[with(0.5)]), PriorityLevel::Medium);
        assert_eq!(group_severity(&[with(0.2), with(0.4)]), PriorityLevel::Low);
    }
}
