//! Analysis selection and settings

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::coastal::CoastalParams;
use super::results::DetectionKind;
use crate::fusion::Region;

/// Which analyses one run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Every analysis plus multi-sensor fusion
    #[default]
    Comprehensive,
    Vegetation,
    Water,
    Coastal,
    Construction,
    Deforestation,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 6] = [
        AnalysisKind::Comprehensive,
        AnalysisKind::Vegetation,
        AnalysisKind::Water,
        AnalysisKind::Coastal,
        AnalysisKind::Construction,
        AnalysisKind::Deforestation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Comprehensive => "comprehensive",
            AnalysisKind::Vegetation => "vegetation",
            AnalysisKind::Water => "water",
            AnalysisKind::Coastal => "coastal",
            AnalysisKind::Construction => "construction",
            AnalysisKind::Deforestation => "deforestation",
        }
    }

    /// Whether this run includes the given analysis
    pub fn includes(&self, detection: DetectionKind) -> bool {
        match (self, detection) {
            (AnalysisKind::Comprehensive, _) => true,
            (AnalysisKind::Vegetation, DetectionKind::Vegetation)
            | (AnalysisKind::Water, DetectionKind::WaterQuality)
            | (AnalysisKind::Coastal, DetectionKind::Coastal)
            | (AnalysisKind::Construction, DetectionKind::Construction)
            | (AnalysisKind::Deforestation, DetectionKind::Deforestation) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        AnalysisKind::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| format!("unknown analysis type '{}'", s))
    }
}

/// Settings of an [`AnalysisEngine`](super::AnalysisEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub kind: AnalysisKind,
    /// Detections at or above this confidence are listed as high confidence (default: 0.7)
    pub confidence_threshold: f64,
    /// Ground size of one pixel side in metres, for affected areas (default: 10.0)
    pub spatial_resolution_m: f64,
    /// Fusion calibration region; detected from the AOI location when unset
    pub region: Option<Region>,
    pub coastal: CoastalParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            kind: AnalysisKind::Comprehensive,
            confidence_threshold: 0.7,
            spatial_resolution_m: 10.0,
            region: None,
            coastal: CoastalParams::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn for_kind(kind: AnalysisKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Hectares covered by `pixels` pixels
    pub fn area_ha(&self, pixels: usize) -> f64 {
        pixels as f64 * self.spatial_resolution_m * self.spatial_resolution_m / 10_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_selection() {
        assert!(AnalysisKind::Comprehensive.includes(DetectionKind::Coastal));
        assert!(AnalysisKind::Water.includes(DetectionKind::WaterQuality));
        assert!(!AnalysisKind::Water.includes(DetectionKind::Vegetation));
        assert!(!AnalysisKind::Vegetation.includes(DetectionKind::Fusion));
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("Construction".parse::<AnalysisKind>(), Ok(AnalysisKind::Construction));
        assert!("urban".parse::<AnalysisKind>().is_err());
    }

    #[test]
    fn test_area() {
        let config = AnalysisConfig::default();
        assert!((config.area_ha(25) - 0.25).abs() < 1e-12);
    }
}
