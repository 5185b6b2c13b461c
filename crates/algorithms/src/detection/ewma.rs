//! EWMA (exponentially weighted moving average) change detection
//!
//! Classical EWMA control chart: the smoothed value
//! `z_t = λ·x_t + (1-λ)·z_{t-1}` is compared with the baseline mean, and a
//! change is flagged when it leaves the control band
//! `L·σ·sqrt(λ/(2-λ))`. The first observation of an unprimed detector
//! initializes the average to the baseline mean, so there is no cold-start
//! transient.
//!
//! Presets:
//! - [`VegetationEwmaDetector`]: slow smoothing for NDVI series
//! - [`WaterQualityEwmaDetector`]: fast response for water indices

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::spatial::{sweep, sweep_window, PixelChange, SpatialChangeMap, WindowChanges};
use super::{check_inputs, ChangeDirection, InputFault, SeriesSummary};
use geowatch_core::{Error, Raster, Result, RowWindow};

/// EWMA detector configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EwmaConfig {
    /// Smoothing factor λ in (0, 1] (default: 0.3)
    pub lambda: f64,
    /// Control limit width L in baseline standard deviations (default: 3.0)
    pub threshold_multiplier: f64,
    /// Observations considered necessary for a reliable series (default: 10)
    pub min_observations: usize,
    /// Bound on the smoothed-value history (default: 1000)
    pub max_history: usize,
}

impl Default for EwmaConfig {
    fn default() -> Self {
        Self {
            lambda: 0.3,
            threshold_multiplier: 3.0,
            min_observations: 10,
            max_history: 1000,
        }
    }
}

impl EwmaConfig {
    pub fn vegetation() -> Self {
        Self {
            lambda: 0.2,
            threshold_multiplier: 2.5,
            min_observations: 15,
            max_history: 500,
        }
    }

    pub fn water_quality() -> Self {
        Self {
            lambda: 0.4,
            threshold_multiplier: 2.0,
            min_observations: 8,
            max_history: 200,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.lambda > 0.0 && self.lambda <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "lambda",
                value: self.lambda.to_string(),
                reason: "must be in (0, 1]".into(),
            });
        }
        if !(self.threshold_multiplier > 0.0) {
            return Err(Error::InvalidParameter {
                name: "threshold_multiplier",
                value: self.threshold_multiplier.to_string(),
                reason: "must be positive".into(),
            });
        }
        if self.max_history == 0 {
            return Err(Error::InvalidParameter {
                name: "max_history",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Control limit for a baseline standard deviation
    pub fn control_limit(&self, baseline_std: f64) -> f64 {
        self.threshold_multiplier * baseline_std * (self.lambda / (2.0 - self.lambda)).sqrt()
    }
}

/// Chart state after one evaluated observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EwmaReading {
    pub ewma_value: f64,
    /// `|ewma - baseline_mean|`
    pub deviation: f64,
    pub control_limit: f64,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub observation_count: usize,
    pub lambda: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EwmaDetail {
    Reading(EwmaReading),
    Fault(InputFault),
}

/// Result of [`EwmaDetector::detect_change`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EwmaOutcome {
    pub change_detected: bool,
    /// In [0, 1]; saturates once the deviation is twice the control limit
    pub confidence: f64,
    pub detail: EwmaDetail,
}

impl EwmaOutcome {
    fn fault(fault: InputFault) -> Self {
        Self {
            change_detected: false,
            confidence: 0.0,
            detail: EwmaDetail::Fault(fault),
        }
    }

    pub fn reading(&self) -> Option<&EwmaReading> {
        match &self.detail {
            EwmaDetail::Reading(r) => Some(r),
            EwmaDetail::Fault(_) => None,
        }
    }

    pub fn fault_reason(&self) -> Option<InputFault> {
        match self.detail {
            EwmaDetail::Fault(f) => Some(f),
            EwmaDetail::Reading(_) => None,
        }
    }

    /// Side of the baseline the smoothed value lies on, when a change fired
    pub fn direction(&self) -> ChangeDirection {
        match (&self.detail, self.change_detected) {
            (EwmaDetail::Reading(r), true) if r.ewma_value > r.baseline_mean => ChangeDirection::Increase,
            (EwmaDetail::Reading(_), true) => ChangeDirection::Decrease,
            _ => ChangeDirection::None,
        }
    }
}

/// Snapshot of a detector for monitoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EwmaStatus {
    pub config: EwmaConfig,
    pub observation_count: usize,
    pub history_length: usize,
    pub total_change_points: usize,
    pub latest_ewma: Option<f64>,
}

/// Output of [`EwmaDetector::process_time_series`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EwmaSeriesResult {
    pub change_flags: Vec<bool>,
    pub confidences: Vec<f64>,
    /// Smoothed value per observation; NaN where the input was rejected
    pub ewma_values: Vec<f64>,
    /// Observation counts at which a change was first flagged
    pub change_points: Vec<usize>,
    pub summary: SeriesSummary,
}

/// Stateful EWMA detector for one series
#[derive(Debug, Clone)]
pub struct EwmaDetector {
    config: EwmaConfig,
    history: VecDeque<f64>,
    observation_count: usize,
    change_points: Vec<usize>,
}

impl EwmaDetector {
    pub fn new(config: EwmaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    /// Construct from a configuration known to be valid
    pub(crate) fn with_config(config: EwmaConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.max_history.min(1024)),
            config,
            observation_count: 0,
            change_points: Vec::new(),
        }
    }

    pub fn config(&self) -> &EwmaConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.observation_count = 0;
        self.change_points.clear();
    }

    /// Seed the average with a known level without counting an observation.
    ///
    /// A primed detector reacts to its very first observation, which makes a
    /// single-observation test against a baseline meaningful.
    pub fn prime(&mut self, level: f64) {
        self.push_history(level);
    }

    pub fn observation_count(&self) -> usize {
        self.observation_count
    }

    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    pub fn change_points(&self) -> &[usize] {
        &self.change_points
    }

    pub fn latest_ewma(&self) -> Option<f64> {
        self.history.back().copied()
    }

    fn push_history(&mut self, value: f64) {
        while self.history.len() >= self.config.max_history {
            self.history.pop_front();
        }
        self.history.push_back(value);
    }

    /// Advance the chart without recording change points
    fn update(&mut self, value: f64, baseline_mean: f64, baseline_std: f64) -> EwmaOutcome {
        if let Some(fault) = check_inputs(value, baseline_mean, baseline_std) {
            return EwmaOutcome::fault(fault);
        }

        let lambda = self.config.lambda;
        let ewma_value = match self.history.back() {
            Some(prev) => lambda * value + (1.0 - lambda) * prev,
            None => baseline_mean,
        };
        self.push_history(ewma_value);
        self.observation_count += 1;

        let control_limit = self.config.control_limit(baseline_std);
        let deviation = (ewma_value - baseline_mean).abs();
        let change_detected = deviation > control_limit;
        let confidence = if control_limit > 0.0 {
            (deviation / control_limit).min(2.0) / 2.0
        } else {
            0.0
        };

        EwmaOutcome {
            change_detected,
            confidence,
            detail: EwmaDetail::Reading(EwmaReading {
                ewma_value,
                deviation,
                control_limit,
                baseline_mean,
                baseline_std,
                observation_count: self.observation_count,
                lambda,
            }),
        }
    }

    /// Feed one observation and test it against the baseline.
    ///
    /// NaN inputs or a non-positive baseline std leave the state untouched
    /// and return a fault outcome.
    pub fn detect_change(&mut self, value: f64, baseline_mean: f64, baseline_std: f64) -> EwmaOutcome {
        let outcome = self.update(value, baseline_mean, baseline_std);
        if outcome.change_detected && self.change_points.last() != Some(&self.observation_count) {
            self.change_points.push(self.observation_count);
            info!(
                observation = self.observation_count,
                confidence = outcome.confidence,
                "EWMA change detected"
            );
        }
        outcome
    }

    /// Reset, then feed a whole series
    pub fn process_time_series(&mut self, series: &[f64], baseline_mean: f64, baseline_std: f64) -> EwmaSeriesResult {
        self.reset();
        let mut change_flags = Vec::with_capacity(series.len());
        let mut confidences = Vec::with_capacity(series.len());
        let mut ewma_values = Vec::with_capacity(series.len());
        let mut directions = Vec::with_capacity(series.len());

        for &value in series {
            let outcome = self.detect_change(value, baseline_mean, baseline_std);
            change_flags.push(outcome.change_detected);
            confidences.push(outcome.confidence);
            ewma_values.push(outcome.reading().map_or(f64::NAN, |r| r.ewma_value));
            directions.push(outcome.direction());
        }

        let summary = SeriesSummary::from_series(&change_flags, &confidences, &directions);
        EwmaSeriesResult {
            change_flags,
            confidences,
            ewma_values,
            change_points: self.change_points.clone(),
            summary,
        }
    }

    pub fn status(&self) -> EwmaStatus {
        EwmaStatus {
            config: self.config,
            observation_count: self.observation_count,
            history_length: self.history.len(),
            total_change_points: self.change_points.len(),
            latest_ewma: self.latest_ewma(),
        }
    }

    // -----------------------------------------------------------------------
    // Spatial sweeps
    // -----------------------------------------------------------------------

    fn row_step(config: EwmaConfig, mean: f64, std: f64) -> (impl Fn() -> EwmaDetector + Sync + Send, impl Fn(&mut EwmaDetector, usize, usize, f64) -> PixelChange + Sync + Send) {
        let init = move || {
            let mut detector = EwmaDetector::with_config(config);
            detector.prime(mean);
            detector
        };
        let step = move |detector: &mut EwmaDetector, _: usize, _: usize, value: f64| {
            let outcome = detector.update(value, mean, std);
            PixelChange {
                changed: outcome.change_detected,
                confidence: outcome.confidence,
                direction: outcome.direction(),
            }
        };
        (init, step)
    }

    /// Sweep a raster: each row is one series scanned left to right by a
    /// fresh detector primed with the baseline mean.
    ///
    /// This detector's own state is not touched.
    pub fn process_spatial_data(
        &self,
        values: &Raster<f64>,
        baseline_mean: f64,
        baseline_std: f64,
        mask: Option<&Raster<u8>>,
    ) -> Result<SpatialChangeMap> {
        let (init, step) = Self::row_step(self.config, baseline_mean, baseline_std);
        sweep(values, mask, init, step)
    }

    /// One window of [`process_spatial_data`](Self::process_spatial_data)
    pub fn process_spatial_window(
        &self,
        values: &Raster<f64>,
        baseline_mean: f64,
        baseline_std: f64,
        mask: Option<&Raster<u8>>,
        window: RowWindow,
    ) -> Result<WindowChanges> {
        let (init, step) = Self::row_step(self.config, baseline_mean, baseline_std);
        sweep_window(values, mask, window, init, step)
    }
}

impl Default for EwmaDetector {
    fn default() -> Self {
        Self::with_config(EwmaConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Vegetation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VegetationLossSeverity {
    Stable,
    Low,
    Moderate,
    High,
    Severe,
}

impl VegetationLossSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            VegetationLossSeverity::Stable => "stable",
            VegetationLossSeverity::Low => "low",
            VegetationLossSeverity::Moderate => "moderate",
            VegetationLossSeverity::High => "high",
            VegetationLossSeverity::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VegetationLoss {
    pub loss_detected: bool,
    pub severity_score: f64,
    pub severity: VegetationLossSeverity,
    pub outcome: EwmaOutcome,
}

/// EWMA detector tuned for NDVI series
#[derive(Debug, Clone)]
pub struct VegetationEwmaDetector {
    inner: EwmaDetector,
}

impl Default for VegetationEwmaDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl VegetationEwmaDetector {
    pub fn new() -> Self {
        Self {
            inner: EwmaDetector::with_config(EwmaConfig::vegetation()),
        }
    }

    pub fn inner(&self) -> &EwmaDetector {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut EwmaDetector {
        &mut self.inner
    }

    /// Only decreases of NDVI below the baseline count as loss
    pub fn detect_vegetation_loss(&mut self, ndvi: f64, baseline_mean: f64, baseline_std: f64) -> VegetationLoss {
        let outcome = self.inner.detect_change(ndvi, baseline_mean, baseline_std);
        let stable = VegetationLoss {
            loss_detected: false,
            severity_score: 0.0,
            severity: VegetationLossSeverity::Stable,
            outcome,
        };
        if !outcome.change_detected {
            return stable;
        }
        let ndvi_change = ndvi - baseline_mean;
        if ndvi_change >= 0.0 {
            return stable;
        }

        let drop = ndvi_change.abs();
        let (severity, factor) = if drop < 0.1 {
            (VegetationLossSeverity::Low, 0.3)
        } else if drop < 0.2 {
            (VegetationLossSeverity::Moderate, 0.6)
        } else if drop < 0.3 {
            (VegetationLossSeverity::High, 0.8)
        } else {
            (VegetationLossSeverity::Severe, 1.0)
        };

        VegetationLoss {
            loss_detected: true,
            severity_score: outcome.confidence * factor,
            severity,
            outcome,
        }
    }
}

// ---------------------------------------------------------------------------
// Water quality
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlgalBloom {
    pub bloom_detected: bool,
    pub confidence: f64,
    pub algae_change_detected: bool,
    pub algae_confidence: f64,
    pub water_present: bool,
    pub algae_increase: bool,
}

/// EWMA detector tuned for water indices
#[derive(Debug, Clone)]
pub struct WaterQualityEwmaDetector {
    inner: EwmaDetector,
}

impl Default for WaterQualityEwmaDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl WaterQualityEwmaDetector {
    pub fn new() -> Self {
        Self {
            inner: EwmaDetector::with_config(EwmaConfig::water_quality()),
        }
    }

    pub fn inner(&self) -> &EwmaDetector {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut EwmaDetector {
        &mut self.inner
    }

    /// Bloom = algae alarm, algae above baseline, and water still present
    pub fn detect_algal_bloom(
        &mut self,
        algae: f64,
        algae_mean: f64,
        algae_std: f64,
        ndwi: f64,
        ndwi_mean: f64,
    ) -> AlgalBloom {
        let outcome = self.inner.detect_change(algae, algae_mean, algae_std);
        let water_present = ndwi > ndwi_mean - 0.1;
        let algae_increase = algae > algae_mean;
        let bloom_detected = outcome.change_detected && water_present && algae_increase;

        let confidence = if bloom_detected {
            // Ratio is 1 when the NDWI baseline carries no scale
            let ratio = if ndwi_mean.abs() > 1e-8 { ndwi / ndwi_mean } else { 1.0 };
            let water_confidence = ratio.min(1.5) - 0.5;
            (outcome.confidence * (1.0 + water_confidence)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        AlgalBloom {
            bloom_detected,
            confidence,
            algae_change_detected: outcome.change_detected,
            algae_confidence: outcome.confidence,
            water_present,
            algae_increase,
        }
    }
}
