//! Multi-sensor fusion
//!
//! Turns simultaneous percent changes of many spectral indices into one
//! verdict: a change category, a composite risk score with its level, a
//! confidence and a recommendation. Significance thresholds and weight
//! vectors come from a region-calibrated [`FusionConfig`].

pub mod config;
mod engine;
pub mod rules;
mod types;

pub use config::{FusionConfig, Region, RiskThresholds, WeightProfile, BASE_THRESHOLDS, FALLBACK_THRESHOLD_PERCENT};
pub use engine::{fuse, Fusion, FusionInput, MultiSensorFusion};
pub use rules::percent_change;
pub use types::{ChangeCategory, FusionDetails, FusionResult, IndexChange, RiskLevel};

pub(crate) use types::title_case;
