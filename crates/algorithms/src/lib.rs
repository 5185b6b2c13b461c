//! # GeoWatch Algorithms
//!
//! Multi-temporal change analysis of satellite reflectance imagery.
//!
//! ## Available Algorithm Categories
//!
//! - **imagery**: Spectral indices, change magnitude, change hotspots
//! - **statistics**: Descriptive statistics, baselines, least-squares regression
//! - **detection**: EWMA and CUSUM change detectors with per-pixel sweeps
//! - **temporal**: Trend, velocity, anomalies and seasonality of index series
//! - **fusion**: Region-calibrated multi-index change classification
//! - **analysis**: Before/after orchestration of all of the above
//! - **alerts**: Alert prioritization and grouping

pub mod alerts;
pub mod analysis;
pub mod detection;
pub mod fusion;
pub mod imagery;
pub(crate) mod maybe_rayon;
pub mod statistics;
pub mod temporal;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::alerts::{Alert, AlertPrioritizer, InMemoryContext, NoContext, PrioritizedAlert, PriorityLevel};
    pub use crate::analysis::{
        AnalysisConfig, AnalysisEngine, AnalysisKind, AnalysisRequest, AnalysisResults, Detection, DetectionKind,
    };
    pub use crate::detection::{
        ChangeDirection, ConstructionCusumDetector, CusumConfig, CusumDetector, DeforestationCusumDetector,
        EwmaConfig, EwmaDetector, VegetationEwmaDetector, WaterQualityEwmaDetector,
    };
    pub use crate::fusion::{
        ChangeCategory, FusionConfig, FusionResult, MultiSensorFusion, Region, RiskLevel,
    };
    pub use crate::imagery::{
        compute_indices, IndexSnapshot, SpectralIndex, SpectralIndexCalculator, SpectralIndexMap,
    };
    pub use crate::statistics::{baseline_statistics, BaselineStats};
    pub use crate::temporal::{TemporalAnalyzer, TemporalResult, TimeSeriesPoint};
    pub use geowatch_core::prelude::*;
}
