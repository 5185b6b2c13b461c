//! Region-calibrated fusion configuration
//!
//! Significance thresholds are percent changes per index. A region scales the
//! base thresholds by a multiplier (below 1 is more sensitive); regions with
//! no adjustment row keep the base values. The tables are plain data and
//! (de)serialize so an override table can be loaded from JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use geowatch_core::GeoPoint;

/// Threshold (percent) for indices missing from the table
pub const FALLBACK_THRESHOLD_PERCENT: f64 = 20.0;

/// Base significance thresholds in percent
pub const BASE_THRESHOLDS: [(&str, f64); 12] = [
    ("ndvi", 15.0),
    ("evi", 20.0),
    ("ndwi", 20.0),
    ("mndwi", 25.0),
    ("ndbi", 15.0),
    ("bsi", 20.0),
    ("nbri", 25.0),
    ("turbidity_index", 30.0),
    ("algae_index", 25.0),
    ("thermal_proxy", 15.0),
    ("savi", 20.0),
    ("bai", 20.0),
];

/// Calibration region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    IndiaNortheast,
    IndiaCoastal,
    IndiaPlains,
    IndiaHimalayan,
    IndiaDesert,
    GlobalTropical,
    GlobalTemperate,
    GlobalArid,
    #[default]
    Default,
}

impl Region {
    pub const ALL: [Region; 9] = [
        Region::IndiaNortheast,
        Region::IndiaCoastal,
        Region::IndiaPlains,
        Region::IndiaHimalayan,
        Region::IndiaDesert,
        Region::GlobalTropical,
        Region::GlobalTemperate,
        Region::GlobalArid,
        Region::Default,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Region::IndiaNortheast => "india_northeast",
            Region::IndiaCoastal => "india_coastal",
            Region::IndiaPlains => "india_plains",
            Region::IndiaHimalayan => "india_himalayan",
            Region::IndiaDesert => "india_desert",
            Region::GlobalTropical => "global_tropical",
            Region::GlobalTemperate => "global_temperate",
            Region::GlobalArid => "global_arid",
            Region::Default => "default",
        }
    }

    pub fn from_name(name: &str) -> Option<Region> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Region for a point, by nested bounding boxes.
    ///
    /// Inside the India box (8-35°N, 68-97°E): northeast, then Himalayan,
    /// then the three coastal strips, then the desert, else plains. Outside:
    /// tropical within ±23.5°, temperate below 45°, else arid.
    pub fn detect(latitude: f64, longitude: f64) -> Region {
        let (lat, lon) = (latitude, longitude);
        if (8.0..=35.0).contains(&lat) && (68.0..=97.0).contains(&lon) {
            if lat >= 24.0 && lon >= 88.0 {
                Region::IndiaNortheast
            } else if lat >= 28.0 {
                Region::IndiaHimalayan
            } else if lat <= 12.0
                || (lon <= 73.0 && (15.0..=20.0).contains(&lat))
                || (lon >= 85.0 && lat <= 20.0)
            {
                Region::IndiaCoastal
            } else if lon <= 75.0 && (24.0..=30.0).contains(&lat) {
                Region::IndiaDesert
            } else {
                Region::IndiaPlains
            }
        } else if (-23.5..=23.5).contains(&lat) {
            Region::GlobalTropical
        } else if lat.abs() < 45.0 {
            Region::GlobalTemperate
        } else {
            Region::GlobalArid
        }
    }

    /// Threshold multipliers for this region; empty when it has none
    pub fn adjustments(&self) -> &'static [(&'static str, f64)] {
        match self {
            Region::IndiaNortheast => &[
                ("ndvi", 0.8),
                ("evi", 0.85),
                ("ndwi", 1.2),
                ("mndwi", 1.2),
                ("algae_index", 0.9),
                ("turbidity_index", 0.85),
            ],
            Region::IndiaCoastal => &[
                ("ndwi", 0.9),
                ("mndwi", 0.85),
                ("algae_index", 0.75),
                ("turbidity_index", 0.8),
                ("ndvi", 1.1),
            ],
            Region::IndiaPlains => &[
                ("ndvi", 1.2),
                ("evi", 1.2),
                ("savi", 1.15),
                ("ndbi", 0.9),
                ("bai", 0.9),
            ],
            Region::IndiaHimalayan => &[
                ("ndvi", 0.85),
                ("nbri", 0.8),
                ("thermal_proxy", 0.85),
                ("ndwi", 1.1),
            ],
            Region::IndiaDesert => &[
                ("ndvi", 1.5),
                ("bsi", 0.85),
                ("ndbi", 0.85),
                ("bai", 0.85),
                ("ndwi", 1.5),
            ],
            _ => &[],
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Weight vector selected by the winning category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightProfile {
    VegetationLoss,
    Construction,
    WaterChange,
    Mining,
}

/// Adjusted risk score cut-offs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: 0.75,
            high: 0.50,
            medium: 0.25,
        }
    }
}

/// Fusion configuration for one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    pub region: Region,
    /// Index name to significance threshold in percent
    pub thresholds: BTreeMap<String, f64>,
    pub weights: BTreeMap<WeightProfile, BTreeMap<String, f64>>,
    #[serde(default)]
    pub risk_thresholds: RiskThresholds,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self::new(Region::Default)
    }
}

fn weight_table(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

impl FusionConfig {
    pub fn new(region: Region) -> Self {
        let adjustments = region.adjustments();
        let thresholds = BASE_THRESHOLDS
            .iter()
            .map(|(name, base)| {
                let multiplier = adjustments
                    .iter()
                    .find(|(n, _)| n == name)
                    .map_or(1.0, |(_, m)| *m);
                (name.to_string(), base * multiplier)
            })
            .collect();

        let weights = [
            (
                WeightProfile::VegetationLoss,
                weight_table(&[("ndvi", 0.35), ("evi", 0.25), ("savi", 0.20), ("nbri", 0.15), ("bsi", 0.05)]),
            ),
            (
                WeightProfile::Construction,
                weight_table(&[
                    ("ndbi", 0.40),
                    ("ndvi", 0.25),
                    ("bai", 0.20),
                    ("thermal_proxy", 0.10),
                    ("bsi", 0.05),
                ]),
            ),
            (
                WeightProfile::WaterChange,
                weight_table(&[
                    ("ndwi", 0.35),
                    ("mndwi", 0.30),
                    ("turbidity_index", 0.20),
                    ("ndvi", 0.10),
                    ("algae_index", 0.05),
                ]),
            ),
            (
                WeightProfile::Mining,
                weight_table(&[("ndvi", 0.30), ("ndwi", 0.25), ("bsi", 0.25), ("nbri", 0.15), ("ndbi", 0.05)]),
            ),
        ]
        .into_iter()
        .collect();

        Self {
            region,
            thresholds,
            weights,
            risk_thresholds: RiskThresholds::default(),
        }
    }

    pub fn for_location(latitude: f64, longitude: f64) -> Self {
        Self::new(Region::detect(latitude, longitude))
    }

    pub fn for_point(point: &GeoPoint) -> Self {
        Self::for_location(point.lat, point.lon)
    }

    /// Significance threshold in percent
    pub fn threshold_percent(&self, index_name: &str) -> f64 {
        self.thresholds
            .get(index_name)
            .copied()
            .unwrap_or(FALLBACK_THRESHOLD_PERCENT)
    }

    /// Significance threshold as a fraction
    pub fn threshold(&self, index_name: &str) -> f64 {
        self.threshold_percent(index_name) / 100.0
    }

    pub fn weights(&self, profile: WeightProfile) -> Option<&BTreeMap<String, f64>> {
        self.weights.get(&profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_region_reference_points() {
        assert_eq!(Region::detect(26.1445, 91.7362), Region::IndiaNortheast);
        assert_eq!(Region::detect(22.5726, 88.3639), Region::IndiaPlains);
        assert_eq!(Region::detect(28.6139, 77.2090), Region::IndiaHimalayan);
        assert_eq!(Region::detect(15.2993, 74.1240), Region::IndiaPlains);
        assert_eq!(Region::detect(27.0238, 74.2179), Region::IndiaDesert);
        assert_eq!(Region::detect(16.0, 72.9), Region::IndiaCoastal);
        assert_eq!(Region::detect(10.0, 76.0), Region::IndiaCoastal);
        assert_eq!(Region::detect(-3.0, -60.0), Region::GlobalTropical);
        assert_eq!(Region::detect(40.0, -3.0), Region::GlobalTemperate);
        assert_eq!(Region::detect(-40.0, 140.0), Region::GlobalTemperate);
        assert_eq!(Region::detect(60.0, 10.0), Region::GlobalArid);
    }

    #[test]
    fn test_box_edges_are_inclusive() {
        assert_eq!(Region::detect(8.0, 68.0), Region::IndiaCoastal);
        assert_eq!(Region::detect(35.0, 97.0), Region::IndiaNortheast);
        assert_eq!(Region::detect(23.5, 60.0), Region::GlobalTropical);
    }

    #[test]
    fn test_regional_thresholds() {
        let ne = FusionConfig::new(Region::IndiaNortheast);
        assert!((ne.threshold_percent("ndvi") - 12.0).abs() < 1e-12);
        assert!((ne.threshold("algae_index") - 0.225).abs() < 1e-12);

        let desert = FusionConfig::new(Region::IndiaDesert);
        assert!((desert.threshold_percent("ndvi") - 22.5).abs() < 1e-12);

        // Regions without a row keep the base values
        let tropical = FusionConfig::new(Region::GlobalTropical);
        assert_eq!(tropical.thresholds, FusionConfig::default().thresholds);

        assert_eq!(FusionConfig::default().threshold("ndre"), 0.20);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = FusionConfig::new(Region::IndiaCoastal);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"india_coastal\""));
        let back: FusionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.region, Region::IndiaCoastal);
        for (name, value) in &config.thresholds {
            assert!((back.threshold_percent(name) - value).abs() < 1e-12);
        }
        assert_eq!(back.weights.len(), 4);
    }

    #[test]
    fn test_region_names() {
        for region in Region::ALL {
            assert_eq!(Region::from_name(region.name()), Some(region));
        }
        assert_eq!(Region::from_name("atlantis"), None);
    }
}
