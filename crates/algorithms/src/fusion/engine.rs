//! Multi-sensor fusion engine

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::FusionConfig;
use super::rules;
use super::types::{FusionDetails, FusionResult};
use crate::imagery::IndexSnapshot;
use geowatch_core::{AoiMetadata, Algorithm, Error, Result};

/// Combines simultaneous per-index changes into one classified verdict
#[derive(Debug, Clone, Default)]
pub struct MultiSensorFusion {
    config: FusionConfig,
}

impl MultiSensorFusion {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Engine calibrated for the region containing a point
    pub fn for_location(latitude: f64, longitude: f64) -> Self {
        Self::new(FusionConfig::for_location(latitude, longitude))
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fuse the changes between two index snapshots.
    ///
    /// `historical` snapshots, in any order, feed the seasonality estimate.
    /// AOI metadata is accepted for callers that have it; the rules do not
    /// read it yet.
    pub fn analyze(
        &self,
        current: &IndexSnapshot,
        previous: &IndexSnapshot,
        historical: Option<&[IndexSnapshot]>,
        aoi: Option<&AoiMetadata>,
    ) -> FusionResult {
        let changes = rules::index_changes(current, previous, &self.config);
        let seasonal_likelihood = historical.map_or(0.0, |h| rules::seasonal_likelihood(&changes, h));

        let (category, confidence, primary_indicators) = rules::classify(&changes, seasonal_likelihood);
        let composite_risk_score = rules::composite_risk(&changes, category, seasonal_likelihood, &self.config);
        let risk_level = rules::risk_level(composite_risk_score, confidence, &self.config.risk_thresholds);
        let supporting_evidence = rules::supporting_evidence(&changes, &primary_indicators);
        let recommendation = rules::recommendation(category, confidence, seasonal_likelihood);

        debug!(
            aoi = aoi.map(|a| a.id.as_str()),
            region = %self.config.region,
            indices = changes.len(),
            seasonal_likelihood,
            "fusion inputs"
        );
        info!(
            category = %category,
            risk = composite_risk_score,
            level = %risk_level,
            confidence,
            "fusion verdict"
        );

        let details = FusionDetails {
            index_changes: changes.iter().map(|c| (c.name.clone(), c.change_percent)).collect(),
            significant_changes: changes
                .iter()
                .filter(|c| c.is_significant)
                .map(|c| c.name.clone())
                .collect(),
            total_indicators: changes.len(),
        };

        FusionResult {
            composite_risk_score,
            risk_level,
            category,
            confidence,
            primary_indicators,
            supporting_evidence,
            seasonal_likelihood,
            recommendation,
            details,
        }
    }
}

/// Inputs of one fusion call, as read from JSON by front ends
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusionInput {
    pub current: IndexSnapshot,
    pub previous: IndexSnapshot,
    #[serde(default)]
    pub historical: Vec<IndexSnapshot>,
    #[serde(default)]
    pub aoi: Option<AoiMetadata>,
}

/// Fusion as a stateless [`Algorithm`], with the config as parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct Fusion;

impl Algorithm for Fusion {
    type Input = FusionInput;
    type Output = FusionResult;
    type Params = FusionConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Multi-Sensor Fusion"
    }

    fn description(&self) -> &'static str {
        "Classify simultaneous spectral index changes into a risk-scored change category"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        fuse(&input, params)
    }
}

/// Run fusion on a [`FusionInput`].
///
/// Fails with [`Error::Validation`] when the snapshots share no index.
pub fn fuse(input: &FusionInput, config: FusionConfig) -> Result<FusionResult> {
    if !input.current.keys().any(|k| input.previous.contains_key(k)) {
        return Err(Error::Validation(
            "current and previous snapshots share no index".to_string(),
        ));
    }
    let historical = (!input.historical.is_empty()).then_some(input.historical.as_slice());
    Ok(MultiSensorFusion::new(config).analyze(&input.current, &input.previous, historical, input.aoi.as_ref()))
}
