//! Statistical building blocks for change analysis
//!
//! - **descriptive**: NaN-aware mean, population std, percentiles
//! - **baseline**: per-index baseline statistics of a reference image
//! - **regression**: ordinary least squares with two-sided p-value

pub mod baseline;
pub mod descriptive;
pub mod regression;

pub use baseline::{baseline_statistics, BaselineStats, BaselineTable};
pub use descriptive::{finite_values, mean, percentile, population_std};
pub use regression::{linear_regression, LinearFit};
