//! Orchestrated before/after analysis
//!
//! [`AnalysisEngine`] computes the spectral indices of an image pair, derives
//! baseline statistics from the earlier image and runs the selected analyses:
//! - vegetation (EWMA sweep of NDVI)
//! - water quality (EWMA test of water index means)
//! - coastal (water-mask comparison)
//! - construction (compound BSI/NDVI CUSUM sweep)
//! - deforestation (sign-flipped NDVI CUSUM)
//!
//! Comprehensive runs add multi-sensor fusion. The outputs are combined into
//! an overall confidence, a priority, a summary and recommendations.

mod coastal;
mod config;
mod engine;
pub mod report;
mod results;

pub use coastal::{
    analyze_coastal_change, shoreline_pixels, water_mask, CoastalChangeType, CoastalParams, CoastalProcess,
    CoastalResult,
};
pub use config::{AnalysisConfig, AnalysisKind};
pub use engine::{AnalysisEngine, AnalysisRequest};
pub use results::{
    AnalysisMetadata, AnalysisPriority, AnalysisResults, ConstructionResult, DeforestationResult, Detection,
    DetectionKind, DetectionResult, FusionAnalysis, Severity, VegetationChangeType, VegetationResult,
    WaterInterpretation, WaterParameterResult, WaterQualityResult, WaterQualityStatus,
};
