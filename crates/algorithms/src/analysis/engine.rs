//! Before/after analysis of one area of interest

use chrono::Utc;
use tracing::{debug, info, warn};

use super::coastal::{analyze_coastal_change, CoastalResult};
use super::config::{AnalysisConfig, AnalysisKind};
use super::report;
use super::results::{
    AnalysisMetadata, AnalysisResults, ConstructionResult, DeforestationResult, Detection, DetectionKind,
    DetectionResult, FusionAnalysis, Severity, VegetationChangeType, VegetationResult, WaterInterpretation,
    WaterParameterResult, WaterQualityResult, WaterQualityStatus,
};
use crate::detection::{
    ChangeDirection, ConstructionCusumDetector, DeforestationCusumDetector, VegetationEwmaDetector,
    WaterQualityEwmaDetector,
};
use crate::fusion::{FusionConfig, MultiSensorFusion};
use crate::imagery::{IndexSnapshot, SpectralIndex, SpectralIndexCalculator, SpectralIndexMap};
use crate::statistics::{baseline_statistics, finite_values, mean, BaselineStats, BaselineTable};
use geowatch_core::{AoiMetadata, Error, Raster, ReflectanceImage, Result};

/// Per-pixel NDVI difference beyond which a changed pixel is loss or gain
const VEGETATION_DELTA: f64 = 0.1;

/// Indices tested by the water-quality analysis
const WATER_INDICES: [SpectralIndex; 4] = [
    SpectralIndex::Ndwi,
    SpectralIndex::Mndwi,
    SpectralIndex::AlgaeIndex,
    SpectralIndex::TurbidityIndex,
];

/// Order in which analyses run and are reported
const DETECTION_ORDER: [DetectionKind; 5] = [
    DetectionKind::Vegetation,
    DetectionKind::WaterQuality,
    DetectionKind::Coastal,
    DetectionKind::Construction,
    DetectionKind::Deforestation,
];

/// One co-registered image pair and what is known about its area
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub before: ReflectanceImage,
    pub after: ReflectanceImage,
    pub aoi: Option<AoiMetadata>,
    /// Earlier index means, for the fusion seasonality estimate
    pub historical: Vec<IndexSnapshot>,
    /// Baseline statistics that replace the ones derived from `before`
    pub baseline: Option<BaselineTable>,
}

impl AnalysisRequest {
    pub fn new(before: ReflectanceImage, after: ReflectanceImage) -> Self {
        Self {
            before,
            after,
            aoi: None,
            historical: Vec::new(),
            baseline: None,
        }
    }

    pub fn with_aoi(mut self, aoi: AoiMetadata) -> Self {
        self.aoi = Some(aoi);
        self
    }

    pub fn with_historical(mut self, historical: Vec<IndexSnapshot>) -> Self {
        self.historical = historical;
        self
    }

    pub fn with_baseline(mut self, baseline: BaselineTable) -> Self {
        self.baseline = Some(baseline);
        self
    }
}

/// Index maps and baseline shared by the stages of one analysis
struct Scene<'a> {
    before: SpectralIndexMap,
    after: SpectralIndexMap,
    baseline: BaselineTable,
    request: &'a AnalysisRequest,
}

impl Scene<'_> {
    fn grids(&self, index: SpectralIndex) -> Option<(&Raster<f64>, &Raster<f64>)> {
        Some((self.before.grid(index)?, self.after.grid(index)?))
    }

    fn require_grids(&self, index: SpectralIndex) -> Result<(&Raster<f64>, &Raster<f64>)> {
        self.grids(index)
            .ok_or_else(|| Error::Validation(format!("{} is not available for both images", index)))
    }

    fn baseline(&self, index: SpectralIndex) -> Result<BaselineStats> {
        self.baseline
            .get(&index)
            .copied()
            .ok_or_else(|| Error::Validation(format!("no valid {} pixels in the reference image", index)))
    }
}

/// Runs the detectors and the fusion engine over an image pair.
///
/// The engine holds configuration only. Every call builds its own detector
/// instances, so one engine can serve concurrent analyses.
#[derive(Debug, Clone, Default)]
pub struct AnalysisEngine {
    config: AnalysisConfig,
    calculator: SpectralIndexCalculator,
}

impl AnalysisEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            calculator: SpectralIndexCalculator::new(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one image pair.
    ///
    /// Fails when the images do not share a grid, when an image has too few
    /// bands for index computation, or when NDVI is needed but missing.
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResults> {
        let kind = self.config.kind;
        info!(
            kind = %kind,
            aoi = request.aoi.as_ref().map(|a| a.id.as_str()),
            "starting analysis"
        );
        request.before.ensure_same_grid(&request.after)?;

        debug!("computing spectral indices");
        let before = self.calculator.compute_indices(&request.before)?;
        let after = self.calculator.compute_indices(&request.after)?;
        let mut baseline = baseline_statistics(&before);
        if let Some(overrides) = &request.baseline {
            baseline.extend(overrides.iter().map(|(k, v)| (*k, *v)));
        }
        let scene = Scene {
            before,
            after,
            baseline,
            request,
        };

        let mut algorithms_used = Vec::new();
        let fusion = if kind == AnalysisKind::Comprehensive {
            self.run_fusion(&scene)
        } else {
            None
        };
        let region = fusion.as_ref().map(|(_, config)| config.region);
        let fusion = fusion.map(|(analysis, _)| analysis);
        if fusion.is_some() {
            algorithms_used.push(DetectionKind::Fusion.algorithm().to_string());
        }

        let mut detections = Vec::new();
        for detection in DETECTION_ORDER.into_iter().filter(|d| kind.includes(*d)) {
            let result = match detection {
                DetectionKind::Vegetation => DetectionResult::Vegetation(self.analyze_vegetation(&scene)?),
                DetectionKind::WaterQuality => DetectionResult::WaterQuality(self.analyze_water_quality(&scene)),
                DetectionKind::Coastal => DetectionResult::Coastal(self.analyze_coastal(&scene)?),
                DetectionKind::Construction => DetectionResult::Construction(self.analyze_construction(&scene)?),
                DetectionKind::Deforestation => {
                    DetectionResult::Deforestation(self.analyze_deforestation(&scene)?)
                }
                DetectionKind::Fusion => continue,
            };
            algorithms_used.push(detection.algorithm().to_string());
            detections.push(result);
        }

        let overall_confidence = report::overall_confidence(&detections);
        let priority_level = report::priority_level(&detections);
        let summary = report::summary(&detections, fusion.as_ref(), overall_confidence);
        let recommendations = report::recommendations(&detections, fusion.as_ref());
        let high_confidence = detections
            .iter()
            .filter(|d| d.change_detected() && d.confidence() >= self.config.confidence_threshold)
            .map(|d| d.kind())
            .collect();

        let (rows, cols) = request.after.shape();
        let metadata = AnalysisMetadata {
            rows,
            cols,
            before_bands: request.before.band_count(),
            after_bands: request.after.band_count(),
            indices: scene
                .before
                .indices()
                .filter(|i| scene.after.contains(*i))
                .map(|i| i.name().to_string())
                .collect(),
            region,
            spatial_resolution_m: self.config.spatial_resolution_m,
        };

        info!(
            overall_confidence,
            priority = %priority_level,
            detections = detections.iter().filter(|d| d.change_detected()).count(),
            "analysis complete"
        );

        Ok(AnalysisResults {
            timestamp: Utc::now(),
            analysis_type: kind,
            aoi_id: request.aoi.as_ref().map(|a| a.id.clone()),
            algorithms_used,
            detections,
            fusion_analysis: fusion,
            overall_confidence,
            priority_level,
            summary,
            recommendations,
            high_confidence,
            metadata,
        })
    }

    /// Analyze independent requests side by side; results keep input order
    #[cfg(feature = "parallel")]
    pub fn analyze_batch(
        &self,
        requests: &[AnalysisRequest],
        mode: geowatch_parallel::ProcessingMode,
    ) -> Vec<Result<AnalysisResults>> {
        use geowatch_parallel::ParallelStrategy;

        debug!(requests = requests.len(), mode = %mode, "batch analysis");
        mode.map_items(requests, |request| self.analyze(request))
    }

    /// Calibration for the request: explicit region, then AOI centre, then
    /// the georeferenced image centre
    fn fusion_config(&self, request: &AnalysisRequest) -> FusionConfig {
        if let Some(region) = self.config.region {
            return FusionConfig::new(region);
        }
        if let Some(center) = request.aoi.as_ref().and_then(|a| a.center) {
            return FusionConfig::for_point(&center);
        }
        match request.after.center() {
            Some((x, y)) => FusionConfig::for_location(y, x),
            None => FusionConfig::default(),
        }
    }

    fn run_fusion(&self, scene: &Scene<'_>) -> Option<(FusionAnalysis, FusionConfig)> {
        let current = scene.after.means();
        let previous = scene.before.means();
        if !current.keys().any(|k| previous.contains_key(k)) {
            warn!("fusion skipped: no index is available for both images");
            return None;
        }
        let config = self.fusion_config(scene.request);
        debug!(region = %config.region, "multi-sensor fusion");
        let historical = (!scene.request.historical.is_empty()).then_some(scene.request.historical.as_slice());
        let result = MultiSensorFusion::new(config.clone()).analyze(
            &current,
            &previous,
            historical,
            scene.request.aoi.as_ref(),
        );
        Some((FusionAnalysis::new(result), config))
    }

    fn analyze_vegetation(&self, scene: &Scene<'_>) -> Result<VegetationResult> {
        debug!("vegetation analysis");
        let (before, after) = scene.require_grids(SpectralIndex::Ndvi)?;
        let stats = scene.baseline(SpectralIndex::Ndvi)?;

        let detector = VegetationEwmaDetector::new();
        let sweep = detector
            .inner()
            .process_spatial_data(after, stats.mean, stats.std, None)?;

        let diff = after.data() - before.data();
        let (mut loss_pixels, mut gain_pixels) = (0usize, 0usize);
        for (changed, d) in sweep.change_map.data().iter().zip(diff.iter()) {
            if *changed == 1 {
                if *d < -VEGETATION_DELTA {
                    loss_pixels += 1;
                } else if *d > VEGETATION_DELTA {
                    gain_pixels += 1;
                }
            }
        }
        let finite = finite_values(diff.iter().copied());
        let mean_ndvi_change = mean(&finite).unwrap_or(0.0);
        let max_ndvi_change = finite.iter().fold(0.0f64, |m, d| m.max(d.abs()));

        let total = sweep.stats.total_pixels;
        let (change_type, dominant) = if loss_pixels > gain_pixels {
            (VegetationChangeType::VegetationLoss, loss_pixels)
        } else if gain_pixels > 0 {
            (VegetationChangeType::VegetationGain, gain_pixels)
        } else {
            (VegetationChangeType::VegetationStable, 0)
        };
        let severity_factor = if total > 0 {
            dominant as f64 / total as f64
        } else {
            0.0
        };

        Ok(VegetationResult {
            change_detected: sweep.stats.change_percentage > 1.0,
            change_type,
            severity: Severity::grade(severity_factor, 0.15, 0.05, 0.01),
            change_percentage: sweep.stats.change_percentage,
            confidence: sweep.stats.mean_confidence,
            total_pixels: total,
            changed_pixels: sweep.stats.changed_pixels,
            loss_pixels,
            gain_pixels,
            mean_ndvi_change,
            max_ndvi_change,
            affected_area_ha: self.config.area_ha(sweep.stats.changed_pixels),
            change_map: sweep.change_map,
            confidence_map: sweep.confidence_map,
        })
    }

    /// Scene means of each water index, tested by a fresh water-quality
    /// chart primed at the baseline mean
    fn analyze_water_quality(&self, scene: &Scene<'_>) -> WaterQualityResult {
        debug!("water quality analysis");
        let mut parameters = Vec::new();
        for index in WATER_INDICES {
            let (Some(before), Some(after)) = (scene.before.get(index), scene.after.get(index)) else {
                continue;
            };
            let Some(stats) = scene.baseline.get(&index) else {
                debug!(index = %index, "no baseline, parameter skipped");
                continue;
            };
            let (mean_before, mean_after) = (before.mean(), after.mean());

            let mut detector = WaterQualityEwmaDetector::new();
            detector.inner_mut().prime(stats.mean);
            let outcome = detector.inner_mut().detect_change(mean_after, stats.mean, stats.std);

            let change_direction = if mean_after > mean_before {
                ChangeDirection::Increase
            } else if mean_after < mean_before {
                ChangeDirection::Decrease
            } else {
                ChangeDirection::None
            };
            let changed = outcome.change_detected;
            let (interpretation, severity) = match index {
                SpectralIndex::AlgaeIndex if changed && change_direction == ChangeDirection::Increase => (
                    WaterInterpretation::PotentialAlgalBloom,
                    if outcome.confidence > 0.8 {
                        Severity::High
                    } else {
                        Severity::Moderate
                    },
                ),
                SpectralIndex::TurbidityIndex if changed => (WaterInterpretation::TurbidityChange, Severity::Moderate),
                SpectralIndex::Ndwi | SpectralIndex::Mndwi if changed => {
                    (WaterInterpretation::WaterExtentChange, Severity::Low)
                }
                _ => (WaterInterpretation::Stable, Severity::Negligible),
            };

            parameters.push(WaterParameterResult {
                parameter: index.name().to_string(),
                mean_before,
                mean_after,
                change_magnitude: (mean_after - mean_before).abs(),
                change_detected: changed,
                change_direction,
                confidence: outcome.confidence,
                interpretation,
                severity,
            });
        }

        let fired: Vec<&WaterParameterResult> = parameters.iter().filter(|p| p.change_detected).collect();
        let significant_parameters = fired.len();
        let confidence = if fired.is_empty() {
            0.0
        } else {
            fired.iter().map(|p| p.confidence).sum::<f64>() / fired.len() as f64
        };
        let status = if fired.is_empty() {
            WaterQualityStatus::Stable
        } else if fired
            .iter()
            .any(|p| p.interpretation == WaterInterpretation::PotentialAlgalBloom)
        {
            WaterQualityStatus::AlgalBloomRisk
        } else {
            WaterQualityStatus::ParameterChangesDetected
        };

        WaterQualityResult {
            change_detected: significant_parameters > 0,
            confidence,
            parameters,
            significant_parameters,
            status,
        }
    }

    fn analyze_coastal(&self, scene: &Scene<'_>) -> Result<CoastalResult> {
        debug!("coastal analysis");
        match scene.grids(SpectralIndex::Ndwi) {
            Some((before, after)) => analyze_coastal_change(before, after, &self.config.coastal),
            None => {
                warn!("coastal analysis skipped: NDWI unavailable");
                Ok(CoastalResult::unavailable("NDWI unavailable for water masks"))
            }
        }
    }

    fn analyze_construction(&self, scene: &Scene<'_>) -> Result<ConstructionResult> {
        debug!("construction analysis");
        let Some((_, bsi)) = scene.grids(SpectralIndex::Bsi) else {
            warn!("construction analysis skipped: BSI unavailable");
            return Ok(ConstructionResult::unavailable(
                "Insufficient spectral bands for BSI calculation",
            ));
        };
        let (_, ndvi) = scene.require_grids(SpectralIndex::Ndvi)?;
        let bsi_stats = scene.baseline(SpectralIndex::Bsi)?;
        let ndvi_stats = scene.baseline(SpectralIndex::Ndvi)?;

        let patterns = ConstructionCusumDetector::new().analyze_construction_patterns(
            bsi,
            ndvi,
            bsi_stats.mean,
            bsi_stats.std,
            ndvi_stats.mean,
            None,
        )?;
        let construction_percentage = patterns.construction_percentage();

        Ok(ConstructionResult {
            change_detected: construction_percentage > 0.5,
            construction_percentage,
            severity: Severity::grade(construction_percentage, 5.0, 2.0, 0.5),
            confidence: patterns.mean_construction_confidence(),
            max_confidence: patterns.max_construction_confidence(),
            total_pixels: patterns.total_pixels(),
            construction_pixels: patterns.construction_pixels(),
            affected_area_ha: self.config.area_ha(patterns.construction_pixels()),
            error: None,
            construction_map: Some(patterns.construction.change_map),
        })
    }

    fn analyze_deforestation(&self, scene: &Scene<'_>) -> Result<DeforestationResult> {
        debug!("deforestation analysis");
        let (_, ndvi) = scene.require_grids(SpectralIndex::Ndvi)?;
        let stats = scene.baseline(SpectralIndex::Ndvi)?;
        let ndvi_after = scene.after.get(SpectralIndex::Ndvi).map_or(f64::NAN, |v| v.mean());

        let additional: Vec<(f64, f64)> = scene
            .after
            .get(SpectralIndex::Evi)
            .map(|evi| {
                let current = evi.mean();
                let base = scene.baseline.get(&SpectralIndex::Evi).map_or(current, |s| s.mean);
                (current, base)
            })
            .into_iter()
            .collect();

        let mut detector = DeforestationCusumDetector::new();
        let verdict = detector.detect_deforestation(ndvi_after, stats.mean, stats.std, &additional);
        let sweep = detector.process_spatial_data(ndvi, stats.mean, stats.std, None)?;
        let total = sweep.stats.total_pixels;
        let deforested = sweep.stats.changed_pixels;

        Ok(DeforestationResult {
            change_detected: verdict.detected,
            severity: verdict.severity,
            confidence: verdict.severity_score,
            deforestation_percentage: if total > 0 {
                deforested as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            total_pixels: total,
            deforestation_pixels: deforested,
            ndvi_change_magnitude: verdict.ndvi_change_magnitude,
            additional_confirmations: verdict.additional_confirmations,
            affected_area_ha: self.config.area_ha(deforested),
            deforestation_map: sweep.change_map,
        })
    }
}
