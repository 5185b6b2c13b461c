//! Alert prioritization
//!
//! - [`AlertPrioritizer`]: 0-100 priority score, level, urgency and action
//! - [`group_related_alerts`]: clusters of nearby, near-simultaneous alerts
//! - [`AlertContextSource`]: AOI metadata and alert history lookups

mod context;
mod grouping;
mod prioritizer;

pub use context::{
    AlertContextSource, HistoricalContext, InMemoryContext, NoContext, HISTORY_DAYS, RECENT_ALERT_DAYS,
};
pub use grouping::{group_related_alerts, group_severity, AlertGroup, GroupingParams};
pub use prioritizer::{
    AlertPrioritizer, AlgorithmConfidence, Alert, PrioritizedAlert, PriorityFactors, PriorityLevel, Urgency,
};
