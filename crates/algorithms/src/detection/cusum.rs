//! CUSUM (cumulative sum) change detection
//!
//! Standardized observations `z = (x - μ) / σ` feed two one-sided sums:
//!
//! ```text
//! S⁺ = max(0, S⁺ + z - k)
//! S⁻ = max(0, S⁻ - z - k)      (bilateral only)
//! ```
//!
//! An alarm is raised when either sum reaches `h`. Suited to abrupt changes
//! such as land clearing or the start of construction.
//!
//! Presets:
//! - [`ConstructionCusumDetector`]: BSI increase corroborated by NDVI loss
//! - [`DeforestationCusumDetector`]: NDVI decrease via a sign-flipped chart

use serde::{Deserialize, Serialize};
use tracing::info;

use super::spatial::{
    joint_valid_mask, sweep, sweep_window, PixelChange, SpatialChangeMap, WindowChanges,
};
use super::{check_inputs, ChangeDirection, InputFault, SeriesSummary};
use geowatch_core::{Error, Raster, Result, RowWindow};

/// CUSUM detector configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CusumConfig {
    /// Reference value k in standard deviations (default: 0.5)
    pub drift_k: f64,
    /// Decision threshold h (default: 5.0)
    pub threshold_h: f64,
    /// Zero both sums after a recorded change point (default: true)
    pub reset_after_detection: bool,
    /// Observations required before a change point is recorded (default: 5)
    pub min_observations: usize,
    /// Track decreases as well as increases (default: true)
    pub bilateral: bool,
}

impl Default for CusumConfig {
    fn default() -> Self {
        Self {
            drift_k: 0.5,
            threshold_h: 5.0,
            reset_after_detection: true,
            min_observations: 5,
            bilateral: true,
        }
    }
}

impl CusumConfig {
    pub fn construction() -> Self {
        Self {
            drift_k: 0.3,
            threshold_h: 4.0,
            reset_after_detection: true,
            min_observations: 3,
            bilateral: false,
        }
    }

    pub fn deforestation() -> Self {
        Self {
            drift_k: 0.4,
            threshold_h: 3.5,
            reset_after_detection: true,
            min_observations: 5,
            bilateral: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.drift_k > 0.0) {
            return Err(Error::InvalidParameter {
                name: "drift_k",
                value: self.drift_k.to_string(),
                reason: "must be positive".into(),
            });
        }
        if !(self.threshold_h > 0.0) {
            return Err(Error::InvalidParameter {
                name: "threshold_h",
                value: self.threshold_h.to_string(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Chart state after one evaluated observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CusumReading {
    pub observation: f64,
    pub standardized: f64,
    /// Sums after the update, before any post-detection reset
    pub s_plus: f64,
    pub s_minus: f64,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub observation_count: usize,
    pub upper_alarm: bool,
    pub lower_alarm: bool,
    pub drift_k: f64,
    pub threshold_h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CusumDetail {
    Reading(CusumReading),
    Fault(InputFault),
}

/// Result of [`CusumDetector::detect_change`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CusumOutcome {
    pub change_detected: bool,
    pub direction: ChangeDirection,
    pub confidence: f64,
    pub detail: CusumDetail,
}

impl CusumOutcome {
    fn fault(fault: InputFault) -> Self {
        Self {
            change_detected: false,
            direction: ChangeDirection::None,
            confidence: 0.0,
            detail: CusumDetail::Fault(fault),
        }
    }

    pub fn reading(&self) -> Option<&CusumReading> {
        match &self.detail {
            CusumDetail::Reading(r) => Some(r),
            CusumDetail::Fault(_) => None,
        }
    }

    pub fn fault_reason(&self) -> Option<InputFault> {
        match self.detail {
            CusumDetail::Fault(f) => Some(f),
            CusumDetail::Reading(_) => None,
        }
    }

    fn pixel(&self) -> PixelChange {
        PixelChange {
            changed: self.change_detected,
            confidence: self.confidence,
            direction: self.direction,
        }
    }
}

/// A recorded alarm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CusumChangePoint {
    /// 1-based observation count at the alarm
    pub observation_index: usize,
    pub direction: ChangeDirection,
    pub confidence: f64,
    pub s_plus: f64,
    pub s_minus: f64,
    pub observation_value: f64,
    pub standardized_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CusumStatus {
    pub config: CusumConfig,
    pub observation_count: usize,
    pub s_plus: f64,
    pub s_minus: f64,
    pub total_change_points: usize,
}

/// Output of [`CusumDetector::process_time_series`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CusumSeriesResult {
    pub change_flags: Vec<bool>,
    pub directions: Vec<ChangeDirection>,
    pub confidences: Vec<f64>,
    pub s_plus_history: Vec<f64>,
    pub s_minus_history: Vec<f64>,
    pub change_points: Vec<CusumChangePoint>,
    pub summary: SeriesSummary,
}

/// Stateful CUSUM detector for one series
#[derive(Debug, Clone)]
pub struct CusumDetector {
    config: CusumConfig,
    s_plus: f64,
    s_minus: f64,
    observation_count: usize,
    change_points: Vec<CusumChangePoint>,
}

impl Default for CusumDetector {
    fn default() -> Self {
        Self::with_config(CusumConfig::default())
    }
}

impl CusumDetector {
    pub fn new(config: CusumConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    pub(crate) fn with_config(config: CusumConfig) -> Self {
        Self {
            config,
            s_plus: 0.0,
            s_minus: 0.0,
            observation_count: 0,
            change_points: Vec::new(),
        }
    }

    pub fn config(&self) -> &CusumConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.s_plus = 0.0;
        self.s_minus = 0.0;
        self.observation_count = 0;
        self.change_points.clear();
    }

    pub fn s_plus(&self) -> f64 {
        self.s_plus
    }

    pub fn s_minus(&self) -> f64 {
        self.s_minus
    }

    pub fn observation_count(&self) -> usize {
        self.observation_count
    }

    pub fn change_points(&self) -> &[CusumChangePoint] {
        &self.change_points
    }

    /// Advance both sums without recording change points
    fn update(&mut self, value: f64, baseline_mean: f64, baseline_std: f64) -> CusumOutcome {
        if let Some(fault) = check_inputs(value, baseline_mean, baseline_std) {
            return CusumOutcome::fault(fault);
        }
        let CusumConfig {
            drift_k: k,
            threshold_h: h,
            bilateral,
            ..
        } = self.config;

        let z = (value - baseline_mean) / baseline_std;
        self.s_plus = (self.s_plus + z - k).max(0.0);
        if bilateral {
            self.s_minus = (self.s_minus - z - k).max(0.0);
        }
        self.observation_count += 1;

        let upper_alarm = self.s_plus >= h;
        let lower_alarm = bilateral && self.s_minus >= h;
        let (direction, confidence) = if upper_alarm {
            (ChangeDirection::Increase, (self.s_plus / h).min(2.0) / 2.0)
        } else if lower_alarm {
            (ChangeDirection::Decrease, (self.s_minus / h).min(2.0) / 2.0)
        } else {
            (ChangeDirection::None, 0.0)
        };

        CusumOutcome {
            change_detected: upper_alarm || lower_alarm,
            direction,
            confidence,
            detail: CusumDetail::Reading(CusumReading {
                observation: value,
                standardized: z,
                s_plus: self.s_plus,
                s_minus: self.s_minus,
                baseline_mean,
                baseline_std,
                observation_count: self.observation_count,
                upper_alarm,
                lower_alarm,
                drift_k: k,
                threshold_h: h,
            }),
        }
    }

    /// Feed one observation.
    ///
    /// An alarm is reported as soon as a sum reaches `h`, but it is only
    /// recorded as a change point (and the sums reset) once
    /// `min_observations` observations have been seen.
    pub fn detect_change(&mut self, value: f64, baseline_mean: f64, baseline_std: f64) -> CusumOutcome {
        let outcome = self.update(value, baseline_mean, baseline_std);
        if let Some(reading) = outcome.reading() {
            if outcome.change_detected && self.observation_count >= self.config.min_observations {
                self.change_points.push(CusumChangePoint {
                    observation_index: self.observation_count,
                    direction: outcome.direction,
                    confidence: outcome.confidence,
                    s_plus: reading.s_plus,
                    s_minus: reading.s_minus,
                    observation_value: value,
                    standardized_value: reading.standardized,
                });
                info!(
                    direction = %outcome.direction,
                    observation = self.observation_count,
                    "CUSUM change detected"
                );
                if self.config.reset_after_detection {
                    self.s_plus = 0.0;
                    self.s_minus = 0.0;
                }
            }
        }
        outcome
    }

    /// Reset, then feed a whole series
    pub fn process_time_series(&mut self, series: &[f64], baseline_mean: f64, baseline_std: f64) -> CusumSeriesResult {
        self.reset();
        let n = series.len();
        let mut change_flags = Vec::with_capacity(n);
        let mut directions = Vec::with_capacity(n);
        let mut confidences = Vec::with_capacity(n);
        let mut s_plus_history = Vec::with_capacity(n);
        let mut s_minus_history = Vec::with_capacity(n);

        for &value in series {
            let outcome = self.detect_change(value, baseline_mean, baseline_std);
            change_flags.push(outcome.change_detected);
            directions.push(outcome.direction);
            confidences.push(outcome.confidence);
            let (sp, sm) = outcome.reading().map_or((0.0, 0.0), |r| (r.s_plus, r.s_minus));
            s_plus_history.push(sp);
            s_minus_history.push(sm);
        }

        let summary = SeriesSummary::from_series(&change_flags, &confidences, &directions);
        CusumSeriesResult {
            change_flags,
            directions,
            confidences,
            s_plus_history,
            s_minus_history,
            change_points: self.change_points.clone(),
            summary,
        }
    }

    pub fn status(&self) -> CusumStatus {
        CusumStatus {
            config: self.config,
            observation_count: self.observation_count,
            s_plus: self.s_plus,
            s_minus: self.s_minus,
            total_change_points: self.change_points.len(),
        }
    }

    // -----------------------------------------------------------------------
    // Spatial sweeps
    // -----------------------------------------------------------------------

    fn pixel_step(
        config: CusumConfig,
        mean: f64,
        std: f64,
    ) -> (
        impl Fn() -> CusumDetector + Sync + Send,
        impl Fn(&mut CusumDetector, usize, usize, f64) -> PixelChange + Sync + Send,
    ) {
        let init = move || CusumDetector::with_config(config);
        let step = move |detector: &mut CusumDetector, _: usize, _: usize, value: f64| {
            detector.reset();
            detector.update(value, mean, std).pixel()
        };
        (init, step)
    }

    /// Test every pixel independently against the baseline (state is reset
    /// before each pixel). This detector's own state is not touched.
    pub fn process_spatial_data(
        &self,
        values: &Raster<f64>,
        baseline_mean: f64,
        baseline_std: f64,
        mask: Option<&Raster<u8>>,
    ) -> Result<SpatialChangeMap> {
        let (init, step) = Self::pixel_step(self.config, baseline_mean, baseline_std);
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
        let (init, step) = Self::pixel_step(self.config, baseline_mean, baseline_std);
        sweep_window(values, mask, window, init, step)
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Compound BSI/NDVI construction test for one observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstructionActivity {
    pub detected: bool,
    pub confidence: f64,
    pub bsi_increase: bool,
    pub ndvi_decrease: bool,
    pub bsi: CusumOutcome,
}

impl ConstructionActivity {
    fn from_bsi(bsi: CusumOutcome, ndvi: f64, ndvi_mean: f64) -> Self {
        let ndvi_decrease = ndvi < ndvi_mean - 0.05;
        let bsi_increase = bsi.direction == ChangeDirection::Increase;
        let detected = bsi.change_detected && bsi_increase && ndvi_decrease;
        let confidence = if detected {
            let ndvi_factor = ((ndvi_mean - ndvi) / 0.2).max(0.0);
            (bsi.confidence * (1.0 + ndvi_factor)).min(1.0)
        } else {
            0.0
        };
        Self {
            detected,
            confidence,
            bsi_increase,
            ndvi_decrease,
            bsi,
        }
    }
}

/// Construction and BSI maps from a compound sweep
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructionPatterns {
    /// Change map is the construction map; increase pixels are construction
    pub construction: SpatialChangeMap,
    /// Plain CUSUM sweep of BSI over the same mask
    pub bsi: SpatialChangeMap,
}

impl ConstructionPatterns {
    pub fn total_pixels(&self) -> usize {
        self.construction.stats.total_pixels
    }

    pub fn construction_pixels(&self) -> usize {
        self.construction.stats.changed_pixels
    }

    pub fn construction_percentage(&self) -> f64 {
        self.construction.stats.change_percentage
    }

    pub fn mean_construction_confidence(&self) -> f64 {
        self.construction.stats.mean_confidence
    }

    pub fn max_construction_confidence(&self) -> f64 {
        self.construction.stats.max_confidence
    }
}

/// CUSUM detector tuned for construction (BSI increase, unilateral)
#[derive(Debug, Clone)]
pub struct ConstructionCusumDetector {
    inner: CusumDetector,
}

impl Default for ConstructionCusumDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionCusumDetector {
    pub fn new() -> Self {
        Self {
            inner: CusumDetector::with_config(CusumConfig::construction()),
        }
    }

    pub fn inner(&self) -> &CusumDetector {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut CusumDetector {
        &mut self.inner
    }

    /// BSI alarm upwards, corroborated by NDVI at least 0.05 below baseline
    pub fn detect_construction_activity(
        &mut self,
        bsi: f64,
        bsi_mean: f64,
        bsi_std: f64,
        ndvi: f64,
        ndvi_mean: f64,
    ) -> ConstructionActivity {
        let outcome = self.inner.detect_change(bsi, bsi_mean, bsi_std);
        ConstructionActivity::from_bsi(outcome, ndvi, ndvi_mean)
    }

    fn construction_step<'a>(
        ndvi: &'a Raster<f64>,
        bsi_mean: f64,
        bsi_std: f64,
        ndvi_mean: f64,
    ) -> impl Fn(&mut CusumDetector, usize, usize, f64) -> PixelChange + Sync + Send + 'a {
        move |detector: &mut CusumDetector, row: usize, col: usize, bsi: f64| {
            detector.reset();
            let outcome = detector.update(bsi, bsi_mean, bsi_std);
            let activity = ConstructionActivity::from_bsi(outcome, ndvi.data()[[row, col]], ndvi_mean);
            PixelChange {
                changed: activity.detected,
                confidence: activity.confidence,
                direction: if activity.detected {
                    ChangeDirection::Increase
                } else {
                    ChangeDirection::None
                },
            }
        }
    }

    fn resolve_mask(bsi: &Raster<f64>, ndvi: &Raster<f64>, mask: Option<&Raster<u8>>) -> Result<Raster<u8>> {
        bsi.ensure_same_shape(ndvi)?;
        match mask {
            Some(m) => {
                bsi.ensure_same_shape(m)?;
                Ok(m.clone())
            }
            None => joint_valid_mask(bsi, ndvi),
        }
    }

    /// Per-pixel construction detection over BSI and NDVI rasters.
    ///
    /// Without a mask, pixels that are NaN in either raster are skipped.
    pub fn analyze_construction_patterns(
        &self,
        bsi: &Raster<f64>,
        ndvi: &Raster<f64>,
        bsi_mean: f64,
        bsi_std: f64,
        ndvi_mean: f64,
        mask: Option<&Raster<u8>>,
    ) -> Result<ConstructionPatterns> {
        let mask = Self::resolve_mask(bsi, ndvi, mask)?;
        let config = self.inner.config;
        let construction = sweep(
            bsi,
            Some(&mask),
            move || CusumDetector::with_config(config),
            Self::construction_step(ndvi, bsi_mean, bsi_std, ndvi_mean),
        )?;
        let bsi_sweep = self.inner.process_spatial_data(bsi, bsi_mean, bsi_std, Some(&mask))?;
        Ok(ConstructionPatterns {
            construction,
            bsi: bsi_sweep,
        })
    }

    /// One window of
    /// [`analyze_construction_patterns`](Self::analyze_construction_patterns):
    /// `(construction, bsi)` window results
    #[allow(clippy::too_many_arguments)]
    pub fn analyze_construction_window(
        &self,
        bsi: &Raster<f64>,
        ndvi: &Raster<f64>,
        bsi_mean: f64,
        bsi_std: f64,
        ndvi_mean: f64,
        mask: Option<&Raster<u8>>,
        window: RowWindow,
    ) -> Result<(WindowChanges, WindowChanges)> {
        let mask = Self::resolve_mask(bsi, ndvi, mask)?;
        let config = self.inner.config;
        let construction = sweep_window(
            bsi,
            Some(&mask),
            window,
            move || CusumDetector::with_config(config),
            Self::construction_step(ndvi, bsi_mean, bsi_std, ndvi_mean),
        )?;
        let bsi_window = self
            .inner
            .process_spatial_window(bsi, bsi_mean, bsi_std, Some(&mask), window)?;
        Ok((construction, bsi_window))
    }
}

// ---------------------------------------------------------------------------
// Deforestation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeforestationSeverity {
    None,
    Low,
    Moderate,
    High,
    Severe,
}

impl DeforestationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeforestationSeverity::None => "none",
            DeforestationSeverity::Low => "low",
            DeforestationSeverity::Moderate => "moderate",
            DeforestationSeverity::High => "high",
            DeforestationSeverity::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deforestation {
    pub detected: bool,
    pub severity_score: f64,
    pub severity: DeforestationSeverity,
    /// `baseline_mean - ndvi`, positive for a decrease
    pub ndvi_change_magnitude: f64,
    pub additional_confirmations: usize,
    pub total_additional: usize,
    pub ndvi: CusumOutcome,
}

/// CUSUM detector tuned for NDVI decreases
#[derive(Debug, Clone)]
pub struct DeforestationCusumDetector {
    inner: CusumDetector,
}

impl Default for DeforestationCusumDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeforestationCusumDetector {
    pub fn new() -> Self {
        Self {
            inner: CusumDetector::with_config(CusumConfig::deforestation()),
        }
    }

    pub fn inner(&self) -> &CusumDetector {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut CusumDetector {
        &mut self.inner
    }

    /// NDVI decrease test on the negated series.
    ///
    /// `additional` holds `(current, baseline_mean)` pairs of corroborating
    /// vegetation indices; each one more than 0.05 below its baseline counts
    /// as a confirmation and scales the score by `0.7 + 0.3 * ratio`.
    pub fn detect_deforestation(
        &mut self,
        ndvi: f64,
        ndvi_mean: f64,
        ndvi_std: f64,
        additional: &[(f64, f64)],
    ) -> Deforestation {
        let outcome = self.inner.detect_change(-ndvi, -ndvi_mean, ndvi_std);
        let magnitude = ndvi_mean - ndvi;
        let detected =
            outcome.change_detected && outcome.direction == ChangeDirection::Increase && magnitude > 0.0;

        let (severity, mut severity_score) = if !detected {
            (DeforestationSeverity::None, 0.0)
        } else if magnitude < 0.1 {
            (DeforestationSeverity::Low, outcome.confidence * 0.4)
        } else if magnitude < 0.2 {
            (DeforestationSeverity::Moderate, outcome.confidence * 0.6)
        } else if magnitude < 0.3 {
            (DeforestationSeverity::High, outcome.confidence * 0.8)
        } else {
            (DeforestationSeverity::Severe, outcome.confidence)
        };

        let total_additional = additional.len();
        let additional_confirmations = additional
            .iter()
            .filter(|(current, baseline)| *current < baseline - 0.05)
            .count();
        if total_additional > 0 {
            let ratio = additional_confirmations as f64 / total_additional as f64;
            severity_score *= 0.7 + 0.3 * ratio;
        }

        Deforestation {
            detected,
            severity_score,
            severity,
            ndvi_change_magnitude: magnitude,
            additional_confirmations,
            total_additional,
            ndvi: outcome,
        }
    }

    fn negated(ndvi: &Raster<f64>) -> Raster<f64> {
        let mut out = Raster::from_array(ndvi.data().mapv(|v| -v));
        out.set_transform(ndvi.transform().copied());
        out
    }

    fn flip(mut change: PixelChange) -> PixelChange {
        change.direction = match change.direction {
            ChangeDirection::Increase => ChangeDirection::Decrease,
            ChangeDirection::Decrease => ChangeDirection::Increase,
            ChangeDirection::None => ChangeDirection::None,
        };
        change
    }

    /// Per-pixel NDVI decrease sweep. Alarms are reported in NDVI terms:
    /// deforested pixels are `Decrease` in the direction map.
    pub fn process_spatial_data(
        &self,
        ndvi: &Raster<f64>,
        ndvi_mean: f64,
        ndvi_std: f64,
        mask: Option<&Raster<u8>>,
    ) -> Result<SpatialChangeMap> {
        let (init, step) = CusumDetector::pixel_step(self.inner.config, -ndvi_mean, ndvi_std);
        sweep(&Self::negated(ndvi), mask, init, move |d, r, c, v| Self::flip(step(d, r, c, v)))
    }

    /// One window of [`process_spatial_data`](Self::process_spatial_data)
    pub fn process_spatial_window(
        &self,
        ndvi: &Raster<f64>,
        ndvi_mean: f64,
        ndvi_std: f64,
        mask: Option<&Raster<u8>>,
        window: RowWindow,
    ) -> Result<WindowChanges> {
        let (init, step) = CusumDetector::pixel_step(self.inner.config, -ndvi_mean, ndvi_std);
        sweep_window(&Self::negated(ndvi), mask, window, init, move |d, r, c, v| {
            Self::flip(step(d, r, c, v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sums_never_negative() {
        let mut d = CusumDetector::default();
        for v in [0.5, 0.4, 0.6, 0.45, 0.55, 0.5] {
            d.detect_change(v, 0.5, 0.1);
            assert!(d.s_plus() >= 0.0 && d.s_minus() >= 0.0);
        }
        assert_eq!(d.observation_count(), 6);
    }

    #[test]
    fn test_upper_alarm_single_observation() {
        let mut d = CusumDetector::default();
        // z = 6 -> S+ = 5.5 >= 5
        let out = d.detect_change(1.1, 0.5, 0.1);
        assert!(out.change_detected);
        assert_eq!(out.direction, ChangeDirection::Increase);
        assert_abs_diff_eq!(out.confidence, 0.55, epsilon = 1e-9);
        // Below min_observations: reported, not recorded, sums kept
        assert!(d.change_points().is_empty());
        assert!(d.s_plus() > 0.0);
    }

    #[test]
    fn test_reset_after_recorded_detection() {
        let mut d = CusumDetector::default();
        for _ in 0..4 {
            d.detect_change(0.5, 0.5, 0.1);
        }
        let out = d.detect_change(1.2, 0.5, 0.1);
        assert!(out.change_detected);
        assert_eq!(d.change_points().len(), 1);
        assert_eq!(d.change_points()[0].observation_index, 5);
        assert_eq!(d.s_plus(), 0.0);
        assert_eq!(d.s_minus(), 0.0);
        // The outcome still carries the pre-reset sums
        assert!(out.reading().unwrap().s_plus >= 5.0);
    }

    #[test]
    fn test_lower_alarm_bilateral_only() {
        let mut d = CusumDetector::default();
        let out = d.detect_change(-0.1, 0.5, 0.1);
        assert_eq!(out.direction, ChangeDirection::Decrease);

        let mut d = CusumDetector::new(CusumConfig {
            bilateral: false,
            ..Default::default()
        })
        .unwrap();
        let out = d.detect_change(-0.1, 0.5, 0.1);
        assert!(!out.change_detected);
        assert_eq!(d.s_minus(), 0.0);
    }

    #[test]
    fn test_faults() {
        let mut d = CusumDetector::default();
        assert_eq!(d.detect_change(f64::NAN, 0.5, 0.1).fault_reason(), Some(InputFault::NanInput));
        assert_eq!(
            d.detect_change(0.5, 0.5, -0.1).fault_reason(),
            Some(InputFault::InvalidBaselineStd)
        );
        assert_eq!(d.observation_count(), 0);
    }

    #[test]
    fn test_invalid_config() {
        let bad = CusumConfig {
            drift_k: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            CusumDetector::new(bad),
            Err(Error::InvalidParameter { name: "drift_k", .. })
        ));
        let bad = CusumConfig {
            threshold_h: -1.0,
            ..Default::default()
        };
        assert!(CusumDetector::new(bad).is_err());
    }

    #[test]
    fn test_time_series_step_change() {
        let mut d = CusumDetector::default();
        let mut series = vec![0.5; 10];
        series.extend(vec![0.8; 5]);
        let result = d.process_time_series(&series, 0.5, 0.1);
        // z = 3 per step: S+ = 2.5, 5.0 -> alarm on the 12th observation
        assert!(!result.change_flags[10]);
        assert!(result.change_flags[11]);
        assert_eq!(result.change_points[0].observation_index, 12);
        assert_eq!(result.summary.increase_changes, result.summary.total_changes);
        assert_eq!(result.s_plus_history.len(), 15);
    }

    #[test]
    fn test_spatial_mask_and_counts() {
        let mut values = Raster::filled(4, 4, 0.5);
        values.set(0, 0, 2.5).unwrap();
        values.set(1, 1, -0.5).unwrap();
        values.set(3, 3, f64::NAN).unwrap();

        let d = CusumDetector::default();
        let result = d.process_spatial_data(&values, 0.5, 0.1, None).unwrap();
        assert_eq!(result.stats.total_pixels, 15);
        assert_eq!(result.stats.increase_pixels, 1);
        assert_eq!(result.stats.decrease_pixels, 1);
        assert_eq!(result.confidence_map.get(0, 0).unwrap(), 1.0);

        let bad_mask: Raster<u8> = Raster::filled(3, 4, 1);
        assert!(matches!(
            d.process_spatial_data(&values, 0.5, 0.1, Some(&bad_mask)),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_construction_activity() {
        let mut d = ConstructionCusumDetector::new();
        // z = 5 -> S+ = 4.7 >= 4, conf = 4.7/4/2
        let act = d.detect_construction_activity(0.25, 0.0, 0.05, 0.3, 0.5);
        assert!(act.detected);
        let bsi_conf = 4.7 / 4.0 / 2.0;
        assert_abs_diff_eq!(act.bsi.confidence, bsi_conf, epsilon = 1e-9);
        assert_abs_diff_eq!(act.confidence, (bsi_conf * 2.0).min(1.0), epsilon = 1e-9);

        // NDVI not corroborating
        let mut d = ConstructionCusumDetector::new();
        let act = d.detect_construction_activity(0.25, 0.0, 0.05, 0.48, 0.5);
        assert!(act.bsi.change_detected);
        assert!(!act.detected);
        assert_eq!(act.confidence, 0.0);
    }

    #[test]
    fn test_construction_patterns() {
        let mut bsi = Raster::filled(4, 4, 0.0);
        let mut ndvi = Raster::filled(4, 4, 0.5);
        for r in 0..2 {
            for c in 0..2 {
                bsi.set(r, c, 0.3).unwrap();
                ndvi.set(r, c, 0.2).unwrap();
            }
        }
        // BSI rises here but vegetation holds
        bsi.set(3, 3, 0.3).unwrap();
        ndvi.set(3, 2, f64::NAN).unwrap();

        let d = ConstructionCusumDetector::new();
        let p = d.analyze_construction_patterns(&bsi, &ndvi, 0.0, 0.05, 0.5, None).unwrap();
        assert_eq!(p.total_pixels(), 15);
        assert_eq!(p.construction_pixels(), 4);
        assert_eq!(p.bsi.stats.changed_pixels, 5);
        assert_abs_diff_eq!(p.construction_percentage(), 400.0 / 15.0, epsilon = 1e-9);
        assert_eq!(p.max_construction_confidence(), 1.0);
    }

    #[test]
    fn test_deforestation_single_step() {
        let mut d = DeforestationCusumDetector::new();
        // Inverted z = 5 -> S+ = 4.6 >= 3.5
        let def = d.detect_deforestation(0.55, 0.6, 0.01, &[]);
        assert!(def.detected);
        assert_eq!(def.severity, DeforestationSeverity::Low);
        assert_abs_diff_eq!(def.severity_score, (4.6 / 3.5 / 2.0) * 0.4, epsilon = 1e-9);

        let mut d = DeforestationCusumDetector::new();
        let gain = d.detect_deforestation(0.7, 0.6, 0.01, &[]);
        assert!(!gain.detected);
        assert_eq!(gain.severity, DeforestationSeverity::None);
    }

    #[test]
    fn test_deforestation_confirmations() {
        let mut d = DeforestationCusumDetector::new();
        let def = d.detect_deforestation(0.2, 0.6, 0.01, &[(0.1, 0.4), (0.4, 0.4)]);
        assert!(def.detected);
        assert_eq!(def.severity, DeforestationSeverity::Severe);
        assert_eq!(def.additional_confirmations, 1);
        assert_abs_diff_eq!(def.severity_score, 1.0 * 0.85, epsilon = 1e-9);
    }

    #[test]
    fn test_deforestation_sweep_reports_decrease() {
        let mut ndvi = Raster::filled(3, 3, 0.6);
        ndvi.set(1, 1, 0.3).unwrap();
        ndvi.set(0, 2, 0.9).unwrap();
        let d = DeforestationCusumDetector::new();
        let map = d.process_spatial_data(&ndvi, 0.6, 0.01, None).unwrap();
        assert_eq!(map.stats.changed_pixels, 1);
        assert_eq!(map.stats.decrease_pixels, 1);
        assert_eq!(map.direction_map.get(1, 1).unwrap(), -1);
    }
}
