//! Statistical change detectors
//!
//! Stateful per-series detectors driven one observation at a time:
//! - **EWMA**: exponentially weighted moving average control chart, with
//!   vegetation and water-quality presets
//! - **CUSUM**: bilateral cumulative sum chart, with construction and
//!   deforestation presets
//!
//! Each detector also sweeps whole index rasters ([`spatial`]), in full or
//! one [`RowWindow`](geowatch_core::RowWindow) at a time.

pub mod cusum;
pub mod ewma;
pub mod spatial;

use serde::{Deserialize, Serialize};

pub use cusum::{
    ConstructionActivity, ConstructionCusumDetector, ConstructionPatterns, CusumChangePoint,
    CusumConfig, CusumDetector, CusumOutcome, CusumReading, CusumSeriesResult, CusumStatus,
    Deforestation, DeforestationCusumDetector, DeforestationSeverity,
};
pub use ewma::{
    AlgalBloom, EwmaConfig, EwmaDetector, EwmaOutcome, EwmaReading, EwmaSeriesResult,
    EwmaStatus, VegetationEwmaDetector, VegetationLoss, VegetationLossSeverity,
    WaterQualityEwmaDetector,
};
pub use spatial::{SpatialAccumulator, SpatialChangeMap, SpatialStats, WindowChanges};

/// Side of the baseline a detected change lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Increase,
    Decrease,
    #[default]
    None,
}

impl ChangeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeDirection::Increase => "increase",
            ChangeDirection::Decrease => "decrease",
            ChangeDirection::None => "none",
        }
    }

    /// Raster code: +1 increase, -1 decrease, 0 none
    pub fn code(&self) -> i8 {
        match self {
            ChangeDirection::Increase => 1,
            ChangeDirection::Decrease => -1,
            ChangeDirection::None => 0,
        }
    }
}

impl std::fmt::Display for ChangeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input rejected by a detector before any state was touched.
///
/// A fault is a soft outcome: the call reports no change with zero
/// confidence and the detector keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFault {
    NanInput,
    InvalidBaselineStd,
}

impl InputFault {
    pub fn message(&self) -> &'static str {
        match self {
            InputFault::NanInput => "NaN values in input",
            InputFault::InvalidBaselineStd => "Invalid baseline standard deviation",
        }
    }
}

impl std::fmt::Display for InputFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Shared input validation for a single observation
pub(crate) fn check_inputs(value: f64, mean: f64, std: f64) -> Option<InputFault> {
    if value.is_nan() || mean.is_nan() || std.is_nan() {
        Some(InputFault::NanInput)
    } else if std <= 0.0 {
        Some(InputFault::InvalidBaselineStd)
    } else {
        None
    }
}

/// Aggregate of a processed series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub total_observations: usize,
    pub total_changes: usize,
    /// Changes over observations, 0 for an empty series
    pub change_rate: f64,
    pub mean_confidence: f64,
    pub max_confidence: f64,
    pub increase_changes: usize,
    pub decrease_changes: usize,
}

impl SeriesSummary {
    pub(crate) fn from_series(flags: &[bool], confidences: &[f64], directions: &[ChangeDirection]) -> Self {
        let total_observations = flags.len();
        let total_changes = flags.iter().filter(|f| **f).count();
        let count_dir = |d: ChangeDirection| {
            flags
                .iter()
                .zip(directions)
                .filter(|(f, dir)| **f && **dir == d)
                .count()
        };

        let (mean_confidence, max_confidence) = if confidences.is_empty() {
            (0.0, 0.0)
        } else {
            (
                confidences.iter().sum::<f64>() / confidences.len() as f64,
                confidences.iter().copied().fold(0.0, f64::max),
            )
        };

        Self {
            total_observations,
            total_changes,
            change_rate: if total_observations > 0 {
                total_changes as f64 / total_observations as f64
            } else {
                0.0
            },
            mean_confidence,
            max_confidence,
            increase_changes: count_dir(ChangeDirection::Increase),
            decrease_changes: count_dir(ChangeDirection::Decrease),
        }
    }
}
