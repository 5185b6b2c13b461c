//! Result records of the analysis engine
//!
//! Each analysis type produces its own record. They share the [`Detection`]
//! capability, which is all the aggregation in [`report`](super::report)
//! needs to know about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::coastal::CoastalResult;
use super::config::AnalysisKind;
use crate::detection::{ChangeDirection, DeforestationSeverity};
use crate::fusion::{title_case, FusionResult, Region};
use geowatch_core::Raster;

/// Graded severity shared by the raster analyses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Negligible,
    Low,
    Moderate,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Negligible => "negligible",
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
        }
    }

    /// Grade a value against descending `(high, moderate, low)` cut-offs
    pub(crate) fn grade(value: f64, high: f64, moderate: f64, low: f64) -> Self {
        if value > high {
            Severity::High
        } else if value > moderate {
            Severity::Moderate
        } else if value > low {
            Severity::Low
        } else {
            Severity::Negligible
        }
    }
}

/// Analyses that can contribute a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    #[serde(rename = "vegetation_analysis")]
    Vegetation,
    #[serde(rename = "water_quality_analysis")]
    WaterQuality,
    #[serde(rename = "coastal_analysis")]
    Coastal,
    #[serde(rename = "construction_analysis")]
    Construction,
    #[serde(rename = "deforestation_analysis")]
    Deforestation,
    #[serde(rename = "multi_sensor_fusion")]
    Fusion,
}

impl DetectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionKind::Vegetation => "vegetation_analysis",
            DetectionKind::WaterQuality => "water_quality_analysis",
            DetectionKind::Coastal => "coastal_analysis",
            DetectionKind::Construction => "construction_analysis",
            DetectionKind::Deforestation => "deforestation_analysis",
            DetectionKind::Fusion => "multi_sensor_fusion",
        }
    }

    /// Name of the algorithm behind the analysis, as listed in results
    pub fn algorithm(&self) -> &'static str {
        match self {
            DetectionKind::Vegetation => "ewma_vegetation",
            DetectionKind::WaterQuality => "spectral_water",
            DetectionKind::Coastal => "coastal_water_mask",
            DetectionKind::Construction => "cusum_construction",
            DetectionKind::Deforestation => "cusum_deforestation",
            DetectionKind::Fusion => "multi_sensor_fusion",
        }
    }

    /// Weight in the overall confidence
    pub fn weight(&self) -> f64 {
        match self {
            DetectionKind::Vegetation | DetectionKind::Construction => 0.25,
            DetectionKind::WaterQuality | DetectionKind::Coastal => 0.20,
            DetectionKind::Deforestation | DetectionKind::Fusion => 0.10,
        }
    }

    /// e.g. `Vegetation Analysis`
    pub fn title(&self) -> String {
        title_case(self.as_str())
    }
}

impl std::fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What every analysis result can tell the aggregation layer
pub trait Detection {
    fn kind(&self) -> DetectionKind;
    fn change_detected(&self) -> bool;
    fn confidence(&self) -> f64;
    /// Severity or status label used in summaries
    fn severity(&self) -> &'static str;
}

impl<D: Detection + ?Sized> Detection for &D {
    fn kind(&self) -> DetectionKind {
        (**self).kind()
    }
    fn change_detected(&self) -> bool {
        (**self).change_detected()
    }
    fn confidence(&self) -> f64 {
        (**self).confidence()
    }
    fn severity(&self) -> &'static str {
        (**self).severity()
    }
}

// ---------------------------------------------------------------------------
// Vegetation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VegetationChangeType {
    VegetationLoss,
    VegetationGain,
    VegetationStable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VegetationResult {
    pub change_detected: bool,
    pub change_type: VegetationChangeType,
    pub severity: Severity,
    pub change_percentage: f64,
    pub confidence: f64,
    pub total_pixels: usize,
    pub changed_pixels: usize,
    pub loss_pixels: usize,
    pub gain_pixels: usize,
    /// Mean per-pixel NDVI difference, after minus before
    pub mean_ndvi_change: f64,
    /// Largest absolute per-pixel NDVI difference
    pub max_ndvi_change: f64,
    pub affected_area_ha: f64,
    #[serde(skip)]
    pub change_map: Raster<u8>,
    #[serde(skip)]
    pub confidence_map: Raster<f64>,
}

impl Detection for VegetationResult {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Vegetation
    }
    fn change_detected(&self) -> bool {
        self.change_detected
    }
    fn confidence(&self) -> f64 {
        self.confidence
    }
    fn severity(&self) -> &'static str {
        self.severity.as_str()
    }
}

// ---------------------------------------------------------------------------
// Water quality
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterInterpretation {
    PotentialAlgalBloom,
    TurbidityChange,
    WaterExtentChange,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterQualityStatus {
    AlgalBloomRisk,
    ParameterChangesDetected,
    Stable,
}

impl WaterQualityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaterQualityStatus::AlgalBloomRisk => "algal_bloom_risk",
            WaterQualityStatus::ParameterChangesDetected => "parameter_changes_detected",
            WaterQualityStatus::Stable => "stable",
        }
    }
}

/// One water index tested on its scene mean
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterParameterResult {
    pub parameter: String,
    pub mean_before: f64,
    pub mean_after: f64,
    pub change_magnitude: f64,
    pub change_detected: bool,
    pub change_direction: ChangeDirection,
    pub confidence: f64,
    pub interpretation: WaterInterpretation,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterQualityResult {
    /// True when any parameter changed
    pub change_detected: bool,
    /// Mean confidence over the changed parameters
    pub confidence: f64,
    pub parameters: Vec<WaterParameterResult>,
    pub significant_parameters: usize,
    pub status: WaterQualityStatus,
}

impl Detection for WaterQualityResult {
    fn kind(&self) -> DetectionKind {
        DetectionKind::WaterQuality
    }
    fn change_detected(&self) -> bool {
        self.change_detected
    }
    fn confidence(&self) -> f64 {
        self.confidence
    }
    fn severity(&self) -> &'static str {
        self.status.as_str()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstructionResult {
    pub change_detected: bool,
    pub construction_percentage: f64,
    pub severity: Severity,
    /// Mean construction confidence over evaluated pixels
    pub confidence: f64,
    pub max_confidence: f64,
    pub total_pixels: usize,
    pub construction_pixels: usize,
    pub affected_area_ha: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub construction_map: Option<Raster<u8>>,
}

impl ConstructionResult {
    /// Not-detected result carrying the reason the analysis could not run
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            change_detected: false,
            construction_percentage: 0.0,
            severity: Severity::Negligible,
            confidence: 0.0,
            max_confidence: 0.0,
            total_pixels: 0,
            construction_pixels: 0,
            affected_area_ha: 0.0,
            error: Some(reason.into()),
            construction_map: None,
        }
    }
}

impl Detection for ConstructionResult {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Construction
    }
    fn change_detected(&self) -> bool {
        self.change_detected
    }
    fn confidence(&self) -> f64 {
        self.confidence
    }
    fn severity(&self) -> &'static str {
        self.severity.as_str()
    }
}

// ---------------------------------------------------------------------------
// Deforestation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeforestationResult {
    /// Outcome of the scene-mean NDVI test
    pub change_detected: bool,
    pub severity: DeforestationSeverity,
    /// Severity score of the scene-mean test, used as confidence
    pub confidence: f64,
    pub deforestation_percentage: f64,
    pub total_pixels: usize,
    pub deforestation_pixels: usize,
    /// Baseline NDVI mean minus after-image NDVI mean
    pub ndvi_change_magnitude: f64,
    pub additional_confirmations: usize,
    pub affected_area_ha: f64,
    #[serde(skip)]
    pub deforestation_map: Raster<u8>,
}

impl Detection for DeforestationResult {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Deforestation
    }
    fn change_detected(&self) -> bool {
        self.change_detected
    }
    fn confidence(&self) -> f64 {
        self.confidence
    }
    fn severity(&self) -> &'static str {
        self.severity.as_str()
    }
}

impl Detection for CoastalResult {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Coastal
    }
    fn change_detected(&self) -> bool {
        self.change_detected
    }
    fn confidence(&self) -> f64 {
        self.confidence
    }
    fn severity(&self) -> &'static str {
        self.severity.as_str()
    }
}

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

/// Fusion verdict as seen by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionAnalysis {
    #[serde(flatten)]
    pub result: FusionResult,
    /// Composite risk above [`FusionAnalysis::CHANGE_RISK`]
    pub change_detected: bool,
}

impl FusionAnalysis {
    pub const CHANGE_RISK: f64 = 0.3;

    pub fn new(result: FusionResult) -> Self {
        Self {
            change_detected: result.composite_risk_score > Self::CHANGE_RISK,
            result,
        }
    }
}

impl Detection for FusionAnalysis {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Fusion
    }
    fn change_detected(&self) -> bool {
        self.change_detected
    }
    fn confidence(&self) -> f64 {
        self.result.confidence
    }
    fn severity(&self) -> &'static str {
        self.result.risk_level.as_str()
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Any one analysis result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DetectionResult {
    #[serde(rename = "vegetation_analysis")]
    Vegetation(VegetationResult),
    #[serde(rename = "water_quality_analysis")]
    WaterQuality(WaterQualityResult),
    #[serde(rename = "coastal_analysis")]
    Coastal(CoastalResult),
    #[serde(rename = "construction_analysis")]
    Construction(ConstructionResult),
    #[serde(rename = "deforestation_analysis")]
    Deforestation(DeforestationResult),
}

impl DetectionResult {
    fn inner(&self) -> &dyn Detection {
        match self {
            DetectionResult::Vegetation(r) => r,
            DetectionResult::WaterQuality(r) => r,
            DetectionResult::Coastal(r) => r,
            DetectionResult::Construction(r) => r,
            DetectionResult::Deforestation(r) => r,
        }
    }
}

impl Detection for DetectionResult {
    fn kind(&self) -> DetectionKind {
        self.inner().kind()
    }
    fn change_detected(&self) -> bool {
        self.inner().change_detected()
    }
    fn confidence(&self) -> f64 {
        self.inner().confidence()
    }
    fn severity(&self) -> &'static str {
        self.inner().severity()
    }
}

/// Priority of a whole analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPriority {
    Info,
    Low,
    Medium,
    High,
}

impl AnalysisPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPriority::Info => "info",
            AnalysisPriority::Low => "low",
            AnalysisPriority::Medium => "medium",
            AnalysisPriority::High => "high",
        }
    }
}

impl std::fmt::Display for AnalysisPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs and settings the results were produced from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisMetadata {
    pub rows: usize,
    pub cols: usize,
    pub before_bands: usize,
    pub after_bands: usize,
    /// Indices computed for both dates
    pub indices: Vec<String>,
    /// Calibration region of the fusion stage, when it ran
    pub region: Option<Region>,
    pub spatial_resolution_m: f64,
}

/// Everything one analysis produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResults {
    pub timestamp: DateTime<Utc>,
    pub analysis_type: AnalysisKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aoi_id: Option<String>,
    pub algorithms_used: Vec<String>,
    pub detections: Vec<DetectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fusion_analysis: Option<FusionAnalysis>,
    pub overall_confidence: f64,
    pub priority_level: AnalysisPriority,
    pub summary: String,
    pub recommendations: Vec<String>,
    /// Detections that fired at or above the configured confidence threshold
    pub high_confidence: Vec<DetectionKind>,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResults {
    pub fn detection(&self, kind: DetectionKind) -> Option<&DetectionResult> {
        self.detections.iter().find(|d| d.kind() == kind)
    }

    pub fn vegetation(&self) -> Option<&VegetationResult> {
        self.detections.iter().find_map(|d| match d {
            DetectionResult::Vegetation(r) => Some(r),
            _ => None,
        })
    }

    pub fn water_quality(&self) -> Option<&WaterQualityResult> {
        self.detections.iter().find_map(|d| match d {
            DetectionResult::WaterQuality(r) => Some(r),
            _ => None,
        })
    }

    pub fn coastal(&self) -> Option<&CoastalResult> {
        self.detections.iter().find_map(|d| match d {
            DetectionResult::Coastal(r) => Some(r),
            _ => None,
        })
    }

    pub fn construction(&self) -> Option<&ConstructionResult> {
        self.detections.iter().find_map(|d| match d {
            DetectionResult::Construction(r) => Some(r),
            _ => None,
        })
    }

    pub fn deforestation(&self) -> Option<&DeforestationResult> {
        self.detections.iter().find_map(|d| match d {
            DetectionResult::Deforestation(r) => Some(r),
            _ => None,
        })
    }

    /// True when any detection or the fusion stage reported change
    pub fn any_change(&self) -> bool {
        self.detections.iter().any(|d| d.change_detected())
            || self.fusion_analysis.as_ref().is_some_and(|f| f.change_detected)
    }
}
