//! End-to-end change scenarios through the public API.
//!
//! Each test builds synthetic Sentinel-2 ordered reflectance cubes (or index
//! series) with a known change and checks what the analysis layers report.

use chrono::{Duration, TimeZone, Utc};
use ndarray::Array3;

use geowatch_algorithms::alerts::{Alert, AlertPrioritizer, InMemoryContext, PriorityLevel};
use geowatch_algorithms::analysis::{
    AnalysisConfig, AnalysisEngine, AnalysisKind, AnalysisRequest, Detection, DetectionKind, Severity,
    VegetationChangeType,
};
use geowatch_algorithms::detection::{DeforestationCusumDetector, DeforestationSeverity};
use geowatch_algorithms::fusion::{ChangeCategory, FusionConfig, MultiSensorFusion, Region, RiskLevel};
use geowatch_algorithms::imagery::IndexSnapshot;
use geowatch_algorithms::temporal::{
    AnomalyKind, AnomalySeverity, TemporalAnalyzer, TemporalRecord, TimeSeriesPoint, TrendDirection,
};
use geowatch_core::{AoiMetadata, GeoPoint, ReflectanceImage};

const SIZE: usize = 20;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Vegetated scene; red and swir1 alternate by ±0.002 so every index has spread
fn scene(modify: impl Fn(usize, usize, &mut [f64; 9])) -> ReflectanceImage {
    let mut cube = Array3::zeros((SIZE, SIZE, 9));
    for r in 0..SIZE {
        for c in 0..SIZE {
            let jitter = if (r + c) % 2 == 0 { 0.002 } else { -0.002 };
            let mut px = [0.05, 0.08, 0.06 + jitter, 0.40, 0.05, 0.2, 0.3, 0.15 + jitter, 0.1];
            modify(r, c, &mut px);
            for (b, v) in px.iter().enumerate() {
                cube[[r, c, b]] = *v;
            }
        }
    }
    ReflectanceImage::sentinel2(cube)
}

/// Bare soil over a 9x9 block: 81 of 400 pixels
fn construction_site() -> ReflectanceImage {
    scene(|r, c, px| {
        if (4..13).contains(&r) && (4..13).contains(&c) {
            px[2] = 0.12;
            px[3] = 0.30;
            px[7] = 0.30;
        }
    })
}

fn snapshot(entries: &[(&str, f64)]) -> IndexSnapshot {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn monthly(values: &[f64]) -> Vec<TimeSeriesPoint> {
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, v)| TimeSeriesPoint::new(start + Duration::days(30 * i as i64), *v))
        .collect()
}

// ---------------------------------------------------------------------------
// Image pairs
// ---------------------------------------------------------------------------

#[test]
fn construction_site_is_reported_end_to_end() {
    let aoi = AoiMetadata::new("site-7").with_center(GeoPoint::new(26.2, 91.7));
    let request = AnalysisRequest::new(scene(|_, _, _| {}), construction_site()).with_aoi(aoi);
    let results = AnalysisEngine::default().analyze(&request).unwrap();

    let construction = results.construction().unwrap();
    assert!(construction.change_detected);
    assert_eq!(construction.construction_pixels, 81);
    assert!(
        (15.0..=30.0).contains(&construction.construction_percentage),
        "construction covers {}%",
        construction.construction_percentage
    );
    assert_eq!(construction.severity, Severity::High);

    let vegetation = results.vegetation().unwrap();
    assert_eq!(vegetation.change_type, VegetationChangeType::VegetationLoss);

    assert_eq!(results.metadata.region, Some(Region::IndiaNortheast));
    assert_eq!(results.aoi_id.as_deref(), Some("site-7"));
    assert!(results.any_change());
    assert!(results.overall_confidence > 0.0 && results.overall_confidence <= 1.0);
    assert!(results.recommendations.len() <= 5);
    assert!(results.summary.starts_with("Analysis Summary"));
}

#[test]
fn results_serialize_with_tagged_detections() {
    let request = AnalysisRequest::new(scene(|_, _, _| {}), construction_site());
    let results = AnalysisEngine::default().analyze(&request).unwrap();
    let json = serde_json::to_value(&results).unwrap();

    assert_eq!(json["analysis_type"], "comprehensive");
    let types: Vec<&str> = json["detections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec![
            "vegetation_analysis",
            "water_quality_analysis",
            "coastal_analysis",
            "construction_analysis",
            "deforestation_analysis",
        ]
    );
    // rasters stay out of the report
    assert!(json["detections"][3].get("construction_map").is_none());
}

#[test]
fn identical_images_report_nothing() {
    for kind in AnalysisKind::ALL {
        let engine = AnalysisEngine::new(AnalysisConfig::for_kind(kind));
        let results = engine
            .analyze(&AnalysisRequest::new(scene(|_, _, _| {}), scene(|_, _, _| {})))
            .unwrap();
        assert!(!results.any_change(), "{} reported change", kind);
        assert!(results.detections.iter().all(|d| !d.change_detected()));
        assert_eq!(results.overall_confidence, 0.0);
    }
}

#[test]
fn high_confidence_detections_meet_threshold() {
    let config = AnalysisConfig {
        confidence_threshold: 0.3,
        ..AnalysisConfig::default()
    };
    let results = AnalysisEngine::new(config)
        .analyze(&AnalysisRequest::new(scene(|_, _, _| {}), construction_site()))
        .unwrap();
    for kind in &results.high_confidence {
        let detection = results.detection(*kind).unwrap();
        assert!(detection.change_detected());
        assert!(detection.confidence() >= 0.3);
    }
    assert!(!results.high_confidence.contains(&DetectionKind::Fusion));
}

// ---------------------------------------------------------------------------
// Detectors
// ---------------------------------------------------------------------------

#[test]
fn deforestation_severity_escalates_with_loss() {
    let mut detector = DeforestationCusumDetector::new();
    let severities: Vec<DeforestationSeverity> = (1..=7)
        .map(|step| {
            let ndvi = 0.6 - 0.05 * step as f64;
            let result = detector.detect_deforestation(ndvi, 0.6, 0.01, &[]);
            assert!(result.detected, "step {} not detected", step);
            result.severity
        })
        .collect();

    assert!(severities.windows(2).all(|w| w[0] <= w[1]), "{:?}", severities);
    assert_eq!(severities[0], DeforestationSeverity::Low);
    assert_eq!(severities[6], DeforestationSeverity::Severe);
    for expected in [DeforestationSeverity::Moderate, DeforestationSeverity::High] {
        assert!(severities.contains(&expected), "{:?} missing", expected);
    }
}

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

#[test]
fn fusion_is_deterministic_for_construction() {
    let fusion = MultiSensorFusion::new(FusionConfig::default());
    let current = snapshot(&[("ndvi", 0.3), ("ndbi", 0.35)]);
    let previous = snapshot(&[("ndvi", 0.4), ("ndbi", 0.28)]);

    let first = fusion.analyze(&current, &previous, None, None);
    for _ in 0..5 {
        assert_eq!(fusion.analyze(&current, &previous, None, None), first);
    }
    assert_eq!(first.category, ChangeCategory::IllegalConstruction);
    assert!(first.composite_risk_score > 0.0);
    // Level bands risk * confidence: 0.25 * 0.6 = 0.15, under the 0.25 medium cutoff.
    assert!((first.composite_risk_score * first.confidence - 0.15).abs() < 1e-9);
    assert_eq!(first.risk_level, RiskLevel::Low);
}

#[test]
fn seasonal_history_discounts_risk() {
    let fusion = MultiSensorFusion::default();
    let current = snapshot(&[("ndvi", 0.3), ("ndbi", 0.35)]);
    let previous = snapshot(&[("ndvi", 0.4), ("ndbi", 0.28)]);
    let stable: Vec<IndexSnapshot> = [0.4, 0.41, 0.4, 0.39].iter().map(|v| snapshot(&[("ndvi", *v)])).collect();
    let cyclic: Vec<IndexSnapshot> = [0.3, 0.5, 0.3, 0.5].iter().map(|v| snapshot(&[("ndvi", *v)])).collect();

    let calm = fusion.analyze(&current, &previous, Some(&stable), None);
    let seasonal = fusion.analyze(&current, &previous, Some(&cyclic), None);
    assert!(seasonal.seasonal_likelihood > calm.seasonal_likelihood);
    assert!(seasonal.composite_risk_score < calm.composite_risk_score);
}

#[test]
fn regional_thresholds_follow_location() {
    let plains = FusionConfig::for_location(26.8, 80.9);
    let default = FusionConfig::default();
    assert_eq!(plains.region, Region::IndiaPlains);
    assert_eq!(FusionConfig::for_location(-3.4, -62.2).region, Region::GlobalTropical);
    assert!(plains.threshold("ndvi") > default.threshold("ndvi"));
    assert!(plains.threshold("ndbi") < default.threshold("ndbi"));
}

// ---------------------------------------------------------------------------
// Temporal
// ---------------------------------------------------------------------------

#[test]
fn linear_series_round_trips_through_trend() {
    let values: Vec<f64> = (0..12).map(|i| 0.2 + 0.03 * i as f64).collect();
    let result = TemporalAnalyzer::new()
        .analyze_trends(monthly(&values), "ndvi", None)
        .unwrap();

    assert_eq!(result.trend.direction, TrendDirection::Increasing);
    assert!((result.trend.slope - 0.001).abs() < 1e-9);
    assert!((result.trend.r_squared - 1.0).abs() < 1e-9);
    assert!((result.velocity.average_velocity - 0.001).abs() < 1e-9);
    assert!((result.next_period_forecast - (values[11] + 0.03)).abs() < 1e-9);
    assert!(result.anomalies.is_empty());
}

#[test]
fn single_spike_is_an_anomaly() {
    let mut values = vec![0.5; 12];
    values[6] = 0.9;
    let result = TemporalAnalyzer::new()
        .analyze_trends(monthly(&values), "ndvi", None)
        .unwrap();

    assert_eq!(result.anomalies.len(), 1);
    let anomaly = &result.anomalies[0];
    assert_eq!(anomaly.index, 6);
    assert_eq!(anomaly.kind, AnomalyKind::Spike);
    assert_eq!(anomaly.severity, AnomalySeverity::Moderate);
    assert!(anomaly.z_score > 2.5);
}

#[test]
fn records_are_read_from_json() {
    let raw = r#"[
        {"date": "2024-01-01", "indices": {"ndvi_mean": 0.70, "ndwi": 0.1}},
        {"date": "2024-02-01", "indices": {"ndvi_mean": 0.65}},
        {"date": "2024-03-02T00:00:00Z", "indices": {"ndvi": 0.60}},
        {"date": "2024-04-01", "indices": {"ndwi": 0.2}}
    ]"#;
    let records: Vec<TemporalRecord> = serde_json::from_str(raw).unwrap();
    let result = TemporalAnalyzer::new().analyze_records(&records, "ndvi", Some(0.3)).unwrap();

    assert_eq!(result.periods_analyzed, 3);
    assert_eq!(result.trend.direction, TrendDirection::Decreasing);
    assert!(result.velocity.days_to_critical.is_some());
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[test]
fn protected_aoi_outranks_plain_aoi() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let context = InMemoryContext::new(now)
        .with_aoi(AoiMetadata::new("reserve").with_tags(["protected_area", "wetland"]))
        .with_aoi(AoiMetadata::new("farm"));
    let alert = |id: &str, aoi: &str| Alert {
        id: Some(id.into()),
        aoi_id: Some(aoi.into()),
        kind: Some("deforestation".into()),
        confidence: Some(0.8),
        change_magnitude: Some(0.6),
        ..Alert::default()
    };

    let ranked = AlertPrioritizer::new(context).prioritize_alerts(&[alert("a", "farm"), alert("b", "reserve")], None);
    assert_eq!(ranked[0].alert_id, "b");
    assert!(ranked[0].priority_score > ranked[1].priority_score);
    assert!(ranked[0].priority_level >= PriorityLevel::Medium);
}
