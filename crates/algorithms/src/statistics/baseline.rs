//! Baseline statistics of the reference ("before") image
//!
//! Detectors compare each new observation against the distribution of an
//! index in the reference image: its mean and population standard deviation.
//! Min, max and quartiles are carried along for reporting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::descriptive::{finite_values, mean, percentile_sorted, population_std};
use crate::imagery::{IndexValue, SpectralIndex, SpectralIndexMap};
use geowatch_core::Raster;

/// Summary of one index over the reference image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
}

impl BaselineStats {
    /// Statistics over the finite cells of a raster, `None` when none are finite
    pub fn from_raster(raster: &Raster<f64>) -> Option<Self> {
        Self::from_values(raster.data().iter().copied())
    }

    /// Statistics over the finite values of an iterator
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut values = finite_values(values);
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        Some(Self {
            mean: mean(&values)?,
            std: population_std(&values)?,
            min: values[0],
            max: values[values.len() - 1],
            percentile_25: percentile_sorted(&values, 25.0)?,
            percentile_75: percentile_sorted(&values, 75.0)?,
        })
    }

    /// Baseline known only by its mean and spread
    pub fn from_moments(mean: f64, std: f64) -> Self {
        Self {
            mean,
            std,
            min: mean,
            max: mean,
            percentile_25: mean,
            percentile_75: mean,
        }
    }
}

/// Baseline statistics keyed by index
pub type BaselineTable = BTreeMap<SpectralIndex, BaselineStats>;

/// Baseline statistics for every grid-valued index of a map.
///
/// Scalar entries and grids without a single finite cell are skipped.
pub fn baseline_statistics(map: &SpectralIndexMap) -> BaselineTable {
    map.iter()
        .filter_map(|(index, value)| match value {
            IndexValue::Grid(raster) => BaselineStats::from_raster(raster).map(|s| (index, s)),
            IndexValue::Scalar(_) => None,
        })
        .collect()
}
