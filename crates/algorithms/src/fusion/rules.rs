//! Fusion steps: index changes, seasonality, category rules, risk
//!
//! Each step is a free function over the list of [`IndexChange`]s so the
//! engine stays a thin pipeline and every step can be tested on its own.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use super::config::{FusionConfig, RiskThresholds, WeightProfile};
use super::types::{ChangeCategory, IndexChange, RiskLevel};
use crate::imagery::{IndexSnapshot, SpectralIndex};
use crate::statistics::{mean, population_std};

/// Previous values closer to zero than this have no usable ratio
const ZERO_GUARD: f64 = 0.001;
/// Minimum historical samples for a seasonality estimate
pub const MIN_SEASONAL_SAMPLES: usize = 4;
/// Category scores below this fall back to unknown / normal variation
pub const MIN_CATEGORY_SCORE: f64 = 0.3;
const MAX_PRIMARY: usize = 5;
const MAX_UNKNOWN_PRIMARY: usize = 3;
const MAX_EVIDENCE: usize = 5;

/// Known indices in declaration order, then unknown names alphabetically
pub(crate) fn canonical_order(a: &str, b: &str) -> Ordering {
    let key = |n: &str| {
        let known = SpectralIndex::from_name(n);
        (known.is_none(), known)
    };
    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

/// Percent change with the near-zero guard: 0 when both values are ~0,
/// +/-100 when only the previous value is.
pub fn percent_change(previous: f64, current: f64) -> f64 {
    let absolute = current - previous;
    if previous.abs() < ZERO_GUARD {
        if absolute.abs() < ZERO_GUARD {
            0.0
        } else {
            100.0_f64.copysign(absolute)
        }
    } else {
        absolute / previous.abs() * 100.0
    }
}

/// Changes for every index present in both snapshots, in canonical order.
///
/// Non-finite values carry no change and are skipped.
pub fn index_changes(current: &IndexSnapshot, previous: &IndexSnapshot, config: &FusionConfig) -> Vec<IndexChange> {
    let mut changes: Vec<IndexChange> = current
        .iter()
        .filter_map(|(name, &current_value)| {
            let &previous_value = previous.get(name)?;
            if !current_value.is_finite() || !previous_value.is_finite() {
                debug!(index = %name, "skipping non-finite index value");
                return None;
            }
            let change_percent = percent_change(previous_value, current_value);
            Some(IndexChange {
                name: name.clone(),
                current_value,
                previous_value,
                change_percent,
                absolute_change: current_value - previous_value,
                is_significant: change_percent.abs() > config.threshold(name) * 100.0,
            })
        })
        .collect();
    changes.sort_by(|a, b| canonical_order(&a.name, &b.name));
    changes
}

/// Likelihood in [0, 1] that the NDVI change is seasonal.
///
/// Needs an NDVI change and at least four historical NDVI samples; the
/// likelihood is the historical coefficient of variation over 0.5, capped.
pub fn seasonal_likelihood(changes: &[IndexChange], historical: &[IndexSnapshot]) -> f64 {
    const NDVI: &str = "ndvi";
    if historical.len() < MIN_SEASONAL_SAMPLES || !changes.iter().any(|c| c.name == NDVI) {
        return 0.0;
    }
    let samples: Vec<f64> = historical.iter().filter_map(|h| h.get(NDVI).copied()).collect();
    if samples.len() < MIN_SEASONAL_SAMPLES {
        return 0.0;
    }
    let (Some(mu), Some(sigma)) = (mean(&samples), population_std(&samples)) else {
        return 0.0;
    };
    if mu == 0.0 {
        return 0.0;
    }
    (sigma / mu.abs() / 0.5).min(1.0)
}

// ---------------------------------------------------------------------------
// Category rules
// ---------------------------------------------------------------------------

struct Lookup<'a>(BTreeMap<&'a str, &'a IndexChange>);

impl<'a> Lookup<'a> {
    fn new(changes: &'a [IndexChange]) -> Self {
        Self(changes.iter().map(|c| (c.name.as_str(), c)).collect())
    }

    fn pct(&self, name: &str) -> Option<f64> {
        self.0.get(name).map(|c| c.change_percent)
    }

    fn rises(&self, name: &str, pct: f64) -> bool {
        self.pct(name).is_some_and(|p| p > pct)
    }

    fn drops(&self, name: &str, pct: f64) -> bool {
        self.pct(name).is_some_and(|p| p < -pct)
    }

    fn bonus(condition: bool, amount: f64) -> f64 {
        if condition {
            amount
        } else {
            0.0
        }
    }
}

/// Score of every category whose rule fired, in category order
pub fn category_scores(changes: &[IndexChange], seasonal_likelihood: f64) -> Vec<(ChangeCategory, f64)> {
    let c = Lookup::new(changes);
    let mut scores = Vec::new();

    if c.drops("ndvi", 15.0) && c.rises("ndbi", 15.0) {
        let score = 0.6
            + Lookup::bonus(c.rises("thermal_proxy", 10.0), 0.2)
            + Lookup::bonus(c.rises("bsi", 10.0), 0.2);
        scores.push((ChangeCategory::IllegalConstruction, score));
    }

    if c.drops("ndvi", 30.0) && c.rises("ndwi", 20.0) {
        let score = 0.7 + Lookup::bonus(c.rises("bsi", 15.0), 0.2) + Lookup::bonus(c.drops("nbri", 20.0), 0.1);
        scores.push((ChangeCategory::IllegalMining, score));
    }

    if c.drops("ndvi", 40.0) {
        let score = 0.5 + Lookup::bonus(c.drops("evi", 30.0), 0.3) + Lookup::bonus(c.drops("nbri", 30.0), 0.2);
        scores.push((ChangeCategory::Deforestation, score));
    }

    if c.pct("ndvi").is_some_and(|p| p.abs() > 20.0) && seasonal_likelihood > 0.6 {
        scores.push((ChangeCategory::SeasonalAgriculture, seasonal_likelihood));
    }

    if c.rises("turbidity_index", 30.0) {
        let score = 0.6
            + Lookup::bonus(c.rises("algae_index", 25.0), 0.2)
            + Lookup::bonus(c.pct("mndwi").is_some_and(|p| p.abs() > 20.0), 0.2);
        scores.push((ChangeCategory::WaterPollution, score));
    }

    if c.rises("algae_index", 40.0) {
        let water_present = c.0.get("ndwi").is_some_and(|ndwi| ndwi.current_value > 0.3);
        let score = 0.7 + Lookup::bonus(water_present, 0.2) + Lookup::bonus(c.rises("turbidity_index", 20.0), 0.1);
        scores.push((ChangeCategory::AlgalBloom, score));
    }

    if c.drops("nbri", 50.0) {
        let score = 0.7 + Lookup::bonus(c.drops("ndvi", 40.0), 0.2) + Lookup::bonus(c.rises("thermal_proxy", 20.0), 0.1);
        scores.push((ChangeCategory::WildfireDamage, score));
    }

    scores.sort_by_key(|(category, _)| *category);
    scores
}

/// Winning category, its confidence and the primary indicator names.
///
/// Ties go to the earlier category.
pub fn classify(changes: &[IndexChange], seasonal_likelihood: f64) -> (ChangeCategory, f64, Vec<String>) {
    let significant = changes.iter().filter(|c| c.is_significant).map(|c| c.name.clone());

    let best = category_scores(changes, seasonal_likelihood)
        .into_iter()
        .fold(None, |best: Option<(ChangeCategory, f64)>, (category, score)| match best {
            Some((_, top)) if score <= top => best,
            _ => Some((category, score)),
        });

    match best {
        Some((category, score)) if score >= MIN_CATEGORY_SCORE => {
            (category, score, significant.take(MAX_PRIMARY).collect())
        }
        _ => {
            let indicators: Vec<String> = significant.take(MAX_UNKNOWN_PRIMARY).collect();
            if indicators.is_empty() {
                (ChangeCategory::NormalVariation, 0.8, indicators)
            } else {
                (ChangeCategory::Unknown, 0.4, indicators)
            }
        }
    }
}

/// Weighted mean of `min(|change|/100, 1)` over the category's weight
/// vector, discounted by seasonality and capped at 1.
pub fn composite_risk(
    changes: &[IndexChange],
    category: ChangeCategory,
    seasonal_likelihood: f64,
    config: &FusionConfig,
) -> f64 {
    let profile = match category {
        ChangeCategory::IllegalConstruction => Some(WeightProfile::Construction),
        ChangeCategory::IllegalMining | ChangeCategory::Deforestation => Some(WeightProfile::VegetationLoss),
        ChangeCategory::WaterPollution | ChangeCategory::AlgalBloom => Some(WeightProfile::WaterChange),
        _ => None,
    };
    let uniform = if changes.is_empty() {
        0.0
    } else {
        1.0 / changes.len() as f64
    };
    let weights = profile.and_then(|p| config.weights(p));
    let weight_of = |name: &str| match weights {
        Some(table) => table.get(name).copied(),
        None => Some(uniform),
    };

    let (weighted, total) = changes.iter().fold((0.0, 0.0), |(sum, total), change| {
        match weight_of(&change.name) {
            Some(w) => (sum + (change.change_percent.abs() / 100.0).min(1.0) * w, total + w),
            None => (sum, total),
        }
    });
    let mut risk = if total > 0.0 { weighted / total } else { weighted };

    risk *= if category == ChangeCategory::SeasonalAgriculture {
        1.0 - seasonal_likelihood * 0.7
    } else {
        1.0 - seasonal_likelihood * 0.3
    };
    risk.clamp(0.0, 1.0)
}

/// Level of `score * confidence` against the cut-offs
pub fn risk_level(score: f64, confidence: f64, thresholds: &RiskThresholds) -> RiskLevel {
    let adjusted = score * confidence;
    if adjusted >= thresholds.critical {
        RiskLevel::Critical
    } else if adjusted >= thresholds.high {
        RiskLevel::High
    } else if adjusted >= thresholds.medium {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Formatted significant changes that are not primary indicators
pub fn supporting_evidence(changes: &[IndexChange], primary: &[String]) -> Vec<String> {
    changes
        .iter()
        .filter(|c| c.is_significant && !primary.contains(&c.name))
        .take(MAX_EVIDENCE)
        .map(|c| {
            format!(
                "{}: {:+.1}% change ({:.3} → {:.3})",
                c.name, c.change_percent, c.previous_value, c.current_value
            )
        })
        .collect()
}

fn base_recommendation(category: ChangeCategory) -> &'static str {
    match category {
        ChangeCategory::IllegalConstruction => {
            "High confidence unauthorized construction detected. Recommend immediate site inspection and enforcement action."
        }
        ChangeCategory::IllegalMining => {
            "Possible illegal mining or quarrying activity detected. Recommend aerial survey and ground verification."
        }
        ChangeCategory::Deforestation => {
            "Significant vegetation loss detected. Recommend assessment for illegal logging or land clearing."
        }
        ChangeCategory::WaterPollution => {
            "Water quality degradation detected. Recommend water sampling and pollutant source investigation."
        }
        ChangeCategory::AlgalBloom => {
            "Algal bloom detected. Recommend water quality monitoring and public health advisory."
        }
        ChangeCategory::SeasonalAgriculture => {
            "Changes consistent with normal agricultural cycles. Low priority - continue routine monitoring."
        }
        ChangeCategory::WildfireDamage => {
            "Wildfire or burn damage detected. Recommend damage assessment and restoration planning."
        }
        ChangeCategory::NormalVariation => {
            "Changes within normal variation range. No immediate action required - continue monitoring."
        }
        ChangeCategory::Unknown => {
            "Significant change detected but classification uncertain. Recommend expert review and additional data collection."
        }
        ChangeCategory::CoastalErosion
        | ChangeCategory::AgriculturalExpansion
        | ChangeCategory::UrbanHeatIsland => "Further investigation recommended.",
    }
}

pub fn recommendation(category: ChangeCategory, confidence: f64, seasonal_likelihood: f64) -> String {
    let mut text = base_recommendation(category).to_string();
    if confidence < 0.5 {
        text = format!("LOW CONFIDENCE: {text} Collect additional data for verification.");
    }
    if seasonal_likelihood > 0.6 && category != ChangeCategory::SeasonalAgriculture {
        text.push_str(" Note: Some changes may be seasonal - compare with historical patterns.");
    }
    text
}
