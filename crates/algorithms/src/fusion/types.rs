//! Fusion result types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Classification of a fused change.
///
/// Declaration order breaks ties between equal rule scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    IllegalConstruction,
    IllegalMining,
    Deforestation,
    WaterPollution,
    CoastalErosion,
    AlgalBloom,
    AgriculturalExpansion,
    SeasonalAgriculture,
    UrbanHeatIsland,
    WildfireDamage,
    NormalVariation,
    Unknown,
}

impl ChangeCategory {
    pub const ALL: [ChangeCategory; 12] = [
        ChangeCategory::IllegalConstruction,
        ChangeCategory::IllegalMining,
        ChangeCategory::Deforestation,
        ChangeCategory::WaterPollution,
        ChangeCategory::CoastalErosion,
        ChangeCategory::AlgalBloom,
        ChangeCategory::AgriculturalExpansion,
        ChangeCategory::SeasonalAgriculture,
        ChangeCategory::UrbanHeatIsland,
        ChangeCategory::WildfireDamage,
        ChangeCategory::NormalVariation,
        ChangeCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeCategory::IllegalConstruction => "illegal_construction",
            ChangeCategory::IllegalMining => "illegal_mining",
            ChangeCategory::Deforestation => "deforestation",
            ChangeCategory::WaterPollution => "water_pollution",
            ChangeCategory::CoastalErosion => "coastal_erosion",
            ChangeCategory::AlgalBloom => "algal_bloom",
            ChangeCategory::AgriculturalExpansion => "agricultural_expansion",
            ChangeCategory::SeasonalAgriculture => "seasonal_agriculture",
            ChangeCategory::UrbanHeatIsland => "urban_heat_island",
            ChangeCategory::WildfireDamage => "wildfire_damage",
            ChangeCategory::NormalVariation => "normal_variation",
            ChangeCategory::Unknown => "unknown",
        }
    }

    /// Words capitalized, e.g. `Illegal Construction`
    pub fn title(&self) -> String {
        title_case(self.as_str())
    }
}

impl std::fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `snake_case` to `Title Case`
pub(crate) fn title_case(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change of one index between two periods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexChange {
    pub name: String,
    pub current_value: f64,
    pub previous_value: f64,
    pub change_percent: f64,
    pub absolute_change: f64,
    /// |change_percent| exceeds the regional threshold
    pub is_significant: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionDetails {
    /// Index name to percent change
    pub index_changes: BTreeMap<String, f64>,
    pub significant_changes: Vec<String>,
    pub total_indicators: usize,
}

/// Verdict of the fusion engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub composite_risk_score: f64,
    pub risk_level: RiskLevel,
    pub category: ChangeCategory,
    pub confidence: f64,
    pub primary_indicators: Vec<String>,
    pub supporting_evidence: Vec<String>,
    pub seasonal_likelihood: f64,
    pub recommendation: String,
    pub details: FusionDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles() {
        assert_eq!(ChangeCategory::IllegalConstruction.title(), "Illegal Construction");
        assert_eq!(ChangeCategory::Unknown.title(), "Unknown");
        assert_eq!(title_case("vegetation_loss"), "Vegetation Loss");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ChangeCategory::AlgalBloom).unwrap();
        assert_eq!(json, "\"algal_bloom\"");
        for c in ChangeCategory::ALL {
            assert_eq!(serde_json::to_string(&c).unwrap(), format!("\"{}\"", c.as_str()));
        }
        assert!(RiskLevel::Critical > RiskLevel::Low);
    }
}
