//! Aggregation of analysis results into confidence, priority and text

use super::results::{AnalysisPriority, Detection, DetectionKind, FusionAnalysis};

/// Most recommendations reported for one analysis
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Weighted mean confidence over the detections that fired, 0 when none did
pub fn overall_confidence<D: Detection>(detections: &[D]) -> f64 {
    let (weighted, total) = detections
        .iter()
        .filter(|d| d.change_detected())
        .fold((0.0, 0.0), |(sum, weights), d| {
            let w = d.kind().weight();
            (sum + d.confidence() * w, weights + w)
        });
    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

/// High when a construction or deforestation detection fired above 0.7
/// confidence; otherwise graded by the strongest vegetation or coastal
/// detection.
pub fn priority_level<D: Detection>(detections: &[D]) -> AnalysisPriority {
    let mut max_confidence = 0.0f64;
    for d in detections.iter().filter(|d| d.change_detected()) {
        match d.kind() {
            DetectionKind::Construction | DetectionKind::Deforestation if d.confidence() > 0.7 => {
                return AnalysisPriority::High;
            }
            DetectionKind::Vegetation | DetectionKind::Coastal => {
                max_confidence = max_confidence.max(d.confidence());
            }
            _ => {}
        }
    }
    if max_confidence > 0.7 {
        AnalysisPriority::Medium
    } else if max_confidence > 0.3 {
        AnalysisPriority::Low
    } else {
        AnalysisPriority::Info
    }
}

fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Human-readable summary: the fusion verdict when it found change, then one
/// line per fired detection.
pub fn summary<D: Detection>(detections: &[D], fusion: Option<&FusionAnalysis>, overall: f64) -> String {
    let mut lines = Vec::new();
    if let Some(f) = fusion.filter(|f| f.change_detected) {
        lines.push(format!(
            "Multi-Sensor Fusion: {} detected (Risk: {}, Score: {:.2}, Confidence: {})",
            f.result.category.title(),
            f.result.risk_level.as_str().to_uppercase(),
            f.result.composite_risk_score,
            percent(f.result.confidence)
        ));
    }

    let fired: Vec<&D> = detections.iter().filter(|d| d.change_detected()).collect();
    if fired.is_empty() && lines.is_empty() {
        return "No significant environmental changes detected in the monitored area.".to_string();
    }
    for d in fired {
        lines.push(format!(
            "{} detected with {} confidence (severity: {})",
            d.kind().title(),
            percent(d.confidence()),
            d.severity()
        ));
    }
    format!("Analysis Summary (Overall confidence: {}):\n{}", percent(overall), lines.join("\n"))
}

/// Up to [`MAX_RECOMMENDATIONS`] distinct actions, most specific first
pub fn recommendations<D: Detection>(detections: &[D], fusion: Option<&FusionAnalysis>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |text: &str| {
        if !out.iter().any(|r| r == text) {
            out.push(text.to_string());
        }
    };

    let fusion_fired = fusion.filter(|f| f.change_detected);
    if let Some(f) = fusion_fired {
        push(&format!("[FUSION] {}", f.result.recommendation));
    }

    let fired: Vec<&D> = detections.iter().filter(|d| d.change_detected()).collect();
    if fired.is_empty() && fusion_fired.is_none() {
        push("Continue regular monitoring of the area");
        push("Consider expanding monitoring to adjacent areas");
        push("Review monitoring parameters if changes are expected");
        return out;
    }

    for d in fired {
        match d.kind() {
            DetectionKind::Vegetation | DetectionKind::Deforestation => {
                if d.confidence() > 0.8 {
                    push("Urgent: Investigate vegetation loss immediately");
                    push("Consider contacting local environmental authorities");
                } else {
                    push("Monitor vegetation changes closely");
                    push("Verify changes with ground truth data");
                }
            }
            DetectionKind::Construction => {
                push("Verify if construction activity is authorized");
                push("Monitor for potential environmental impact");
            }
            DetectionKind::Coastal => {
                push("Assess coastal erosion/accretion patterns");
                push("Consider coastal protection measures if needed");
            }
            DetectionKind::WaterQuality => {
                push("Monitor water quality parameters");
                push("Check for pollution sources if quality declined");
            }
            DetectionKind::Fusion => {}
        }
    }
    push("Increase monitoring frequency for detected change areas");
    push("Document changes for trend analysis");
    push("Consider ground-truth verification for high-confidence detections");

    out.truncate(MAX_RECOMMENDATIONS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::{ChangeCategory, FusionDetails, FusionResult, RiskLevel};

    struct Fake {
        kind: DetectionKind,
        fired: bool,
        confidence: f64,
    }

    impl Detection for Fake {
        fn kind(&self) -> DetectionKind {
            self.kind
        }
        fn change_detected(&self) -> bool {
            self.fired
        }
        fn confidence(&self) -> f64 {
            self.confidence
        }
        fn severity(&self) -> &'static str {
            "moderate"
        }
    }

    fn fake(kind: DetectionKind, fired: bool, confidence: f64) -> Fake {
        Fake { kind, fired, confidence }
    }

    fn fusion(risk: f64) -> FusionAnalysis {
        FusionAnalysis::new(FusionResult {
            composite_risk_score: risk,
            risk_level: RiskLevel::Medium,
            category: ChangeCategory::IllegalConstruction,
            confidence: 0.6,
            primary_indicators: vec!["ndbi".into()],
            supporting_evidence: vec![],
            seasonal_likelihood: 0.0,
            recommendation: "Inspect the site.".into(),
            details: FusionDetails::default(),
        })
    }

    #[test]
    fn test_overall_confidence_weights_fired_only() {
        let detections = [
            fake(DetectionKind::Vegetation, true, 0.8),
            fake(DetectionKind::Deforestation, true, 0.2),
            fake(DetectionKind::Construction, false, 1.0),
        ];
        let expected = (0.8 * 0.25 + 0.2 * 0.10) / 0.35;
        assert!((overall_confidence(&detections) - expected).abs() < 1e-12);
        assert_eq!(overall_confidence::<Fake>(&[]), 0.0);
    }

    #[test]
    fn test_water_counts_toward_overall() {
        let detections = [fake(DetectionKind::WaterQuality, true, 0.5)];
        assert!((overall_confidence(&detections) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_priority_levels() {
        assert_eq!(
            priority_level(&[fake(DetectionKind::Construction, true, 0.75)]),
            AnalysisPriority::High
        );
        assert_eq!(
            priority_level(&[
                fake(DetectionKind::Construction, true, 0.6),
                fake(DetectionKind::Coastal, true, 0.9),
            ]),
            AnalysisPriority::Medium
        );
        assert_eq!(
            priority_level(&[fake(DetectionKind::Vegetation, true, 0.5)]),
            AnalysisPriority::Low
        );
        assert_eq!(
            priority_level(&[fake(DetectionKind::WaterQuality, true, 0.99)]),
            AnalysisPriority::Info
        );
    }

    #[test]
    fn test_summary_lines() {
        let detections = [
            fake(DetectionKind::Construction, true, 0.75),
            fake(DetectionKind::Vegetation, false, 0.1),
        ];
        let f = fusion(0.5);
        let text = summary(&detections, Some(&f), 0.75);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Analysis Summary (Overall confidence: 75.0%):");
        assert_eq!(
            lines[1],
            "Multi-Sensor Fusion: Illegal Construction detected (Risk: MEDIUM, Score: 0.50, Confidence: 60.0%)"
        );
        assert_eq!(
            lines[2],
            "Construction Analysis detected with 75.0% confidence (severity: moderate)"
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_quiet_summary() {
        let detections = [fake(DetectionKind::Vegetation, false, 0.0)];
        let f = fusion(0.2);
        assert_eq!(
            summary(&detections, Some(&f), 0.0),
            "No significant environmental changes detected in the monitored area."
        );
    }

    #[test]
    fn test_recommendations_order_and_limit() {
        let detections = [
            fake(DetectionKind::Vegetation, true, 0.9),
            fake(DetectionKind::Construction, true, 0.5),
        ];
        let f = fusion(0.5);
        let recs = recommendations(&detections, Some(&f));
        assert_eq!(
            recs,
            vec![
                "[FUSION] Inspect the site.",
                "Urgent: Investigate vegetation loss immediately",
                "Consider contacting local environmental authorities",
                "Verify if construction activity is authorized",
                "Monitor for potential environmental impact",
            ]
        );
    }

    #[test]
    fn test_recommendations_deduplicated() {
        let detections = [
            fake(DetectionKind::Vegetation, true, 0.5),
            fake(DetectionKind::Deforestation, true, 0.5),
        ];
        let recs = recommendations(&detections, None);
        assert_eq!(recs.len(), 5);
        assert_eq!(recs[0], "Monitor vegetation changes closely");
        assert_eq!(recs[1], "Verify changes with ground truth data");
        assert_eq!(recs[2], "Increase monitoring frequency for detected change areas");
    }

    #[test]
    fn test_quiet_recommendations() {
        let recs = recommendations(&[fake(DetectionKind::Coastal, false, 0.0)], Some(&fusion(0.1)));
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0], "Continue regular monitoring of the area");
    }
}
