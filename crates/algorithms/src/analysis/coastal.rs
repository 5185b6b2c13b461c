//! Shoreline change from water masks
//!
//! Water is where NDWI exceeds a threshold. Comparing the before and after
//! masks gives eroded pixels (land that became water) and accreted pixels
//! (water that became land). The shoreline is the set of water pixels with
//! at least one 4-neighbour on land.

use serde::{Deserialize, Serialize};

use super::results::Severity;
use crate::maybe_rayon::*;
use geowatch_core::{Raster, Result};

/// Parameters for coastal change analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoastalParams {
    /// NDWI above this value is water (default: 0.0)
    pub water_threshold: f64,
    /// Changed share of the scene, in percent, that counts as a change (default: 2.0)
    pub change_threshold_pct: f64,
    /// Factor by which one process must exceed the other to dominate (default: 1.5)
    pub dominance_ratio: f64,
}

impl Default for CoastalParams {
    fn default() -> Self {
        Self {
            water_threshold: 0.0,
            change_threshold_pct: 2.0,
            dominance_ratio: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoastalProcess {
    Erosion,
    Accretion,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoastalChangeType {
    CoastalErosion,
    CoastalAccretion,
    StableCoastline,
}

impl CoastalChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoastalChangeType::CoastalErosion => "coastal_erosion",
            CoastalChangeType::CoastalAccretion => "coastal_accretion",
            CoastalChangeType::StableCoastline => "stable_coastline",
        }
    }
}

/// Outcome of [`analyze_coastal_change`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoastalResult {
    pub change_detected: bool,
    pub change_type: CoastalChangeType,
    pub dominant_process: CoastalProcess,
    /// Eroded plus accreted pixels over evaluated pixels, in percent
    pub change_magnitude: f64,
    pub confidence: f64,
    pub severity: Severity,
    /// Pixels with a finite NDWI on both dates
    pub total_pixels: usize,
    pub erosion_pixels: usize,
    pub accretion_pixels: usize,
    pub erosion_percentage: f64,
    pub accretion_percentage: f64,
    /// Accretion minus erosion, in percent; negative when land is lost
    pub net_change_percentage: f64,
    pub shoreline_pixels_before: usize,
    pub shoreline_pixels_after: usize,
    pub shoreline_change_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CoastalResult {
    /// Not-detected result carrying the reason the analysis could not run
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            change_detected: false,
            change_type: CoastalChangeType::StableCoastline,
            dominant_process: CoastalProcess::Balanced,
            change_magnitude: 0.0,
            confidence: 0.0,
            severity: Severity::Negligible,
            total_pixels: 0,
            erosion_pixels: 0,
            accretion_pixels: 0,
            erosion_percentage: 0.0,
            accretion_percentage: 0.0,
            net_change_percentage: 0.0,
            shoreline_pixels_before: 0,
            shoreline_pixels_after: 0,
            shoreline_change_percentage: 0.0,
            error: Some(reason.into()),
        }
    }
}

/// 1 where NDWI exceeds `threshold`; NaN cells are land
pub fn water_mask(ndwi: &Raster<f64>, threshold: f64) -> Raster<u8> {
    let mut mask = ndwi.with_same_meta::<u8>();
    *mask.data_mut() = ndwi.data().mapv(|v| u8::from(v > threshold));
    mask
}

/// Water pixels with at least one land pixel among their 4 neighbours.
///
/// Pixels on the raster edge only look at the neighbours that exist.
pub fn shoreline_pixels(mask: &Raster<u8>) -> usize {
    let (rows, cols) = mask.shape();
    let data = mask.data();
    (0..rows)
        .into_par_iter()
        .map(|r| {
            (0..cols)
                .filter(|&c| {
                    if data[[r, c]] == 0 {
                        return false;
                    }
                    let land = |rr: usize, cc: usize| data[[rr, cc]] == 0;
                    (r > 0 && land(r - 1, c))
                        || (r + 1 < rows && land(r + 1, c))
                        || (c > 0 && land(r, c - 1))
                        || (c + 1 < cols && land(r, c + 1))
                })
                .count()
        })
        .sum()
}

fn severity(magnitude: f64, threshold: f64) -> Severity {
    if magnitude > threshold * 5.0 {
        Severity::High
    } else if magnitude > threshold * 2.5 {
        Severity::Moderate
    } else if magnitude >= threshold {
        Severity::Low
    } else {
        Severity::Negligible
    }
}

/// Compare the water extent of two NDWI rasters.
///
/// Only pixels with a finite NDWI on both dates are evaluated.
pub fn analyze_coastal_change(
    before_ndwi: &Raster<f64>,
    after_ndwi: &Raster<f64>,
    params: &CoastalParams,
) -> Result<CoastalResult> {
    before_ndwi.ensure_same_shape(after_ndwi)?;
    let before = water_mask(before_ndwi, params.water_threshold);
    let after = water_mask(after_ndwi, params.water_threshold);

    let mut total = 0usize;
    let mut erosion = 0usize;
    let mut accretion = 0usize;
    for (((b, a), nb), na) in before
        .data()
        .iter()
        .zip(after.data().iter())
        .zip(before_ndwi.data().iter())
        .zip(after_ndwi.data().iter())
    {
        if !(nb.is_finite() && na.is_finite()) {
            continue;
        }
        total += 1;
        match (*b, *a) {
            (0, 1) => erosion += 1,
            (1, 0) => accretion += 1,
            _ => {}
        }
    }

    let pct = |n: f64| if total > 0 { n / total as f64 * 100.0 } else { 0.0 };
    let erosion_percentage = pct(erosion as f64);
    let accretion_percentage = pct(accretion as f64);
    let change_magnitude = erosion_percentage + accretion_percentage;

    let ratio = params.dominance_ratio;
    let dominant_process = if erosion as f64 > accretion as f64 * ratio {
        CoastalProcess::Erosion
    } else if accretion as f64 > erosion as f64 * ratio {
        CoastalProcess::Accretion
    } else {
        CoastalProcess::Balanced
    };

    let change_detected = total > 0 && change_magnitude >= params.change_threshold_pct;
    let change_type = if !change_detected {
        CoastalChangeType::StableCoastline
    } else if erosion >= accretion {
        CoastalChangeType::CoastalErosion
    } else {
        CoastalChangeType::CoastalAccretion
    };
    let confidence = if params.change_threshold_pct > 0.0 {
        (change_magnitude / params.change_threshold_pct).min(1.0)
    } else {
        0.0
    };

    let shoreline_pixels_before = shoreline_pixels(&before);
    let shoreline_pixels_after = shoreline_pixels(&after);
    let shoreline_change_percentage = if shoreline_pixels_before > 0 {
        (shoreline_pixels_after as f64 - shoreline_pixels_before as f64) / shoreline_pixels_before as f64 * 100.0
    } else {
        0.0
    };

    Ok(CoastalResult {
        change_detected,
        change_type,
        dominant_process,
        change_magnitude,
        confidence,
        severity: severity(change_magnitude, params.change_threshold_pct),
        total_pixels: total,
        erosion_pixels: erosion,
        accretion_pixels: accretion,
        erosion_percentage,
        accretion_percentage,
        net_change_percentage: accretion_percentage - erosion_percentage,
        shoreline_pixels_before,
        shoreline_pixels_after,
        shoreline_change_percentage,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Water in columns `< water_cols`, land elsewhere
    fn coast(rows: usize, cols: usize, water_cols: usize) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, -0.3);
        for row in 0..rows {
            for col in 0..water_cols {
                r.set(row, col, 0.4).unwrap();
            }
        }
        r
    }

    #[test]
    fn test_shoreline_is_water_edge() {
        let mask = water_mask(&coast(4, 6, 2), 0.0);
        assert_eq!(shoreline_pixels(&mask), 4);
        assert_eq!(shoreline_pixels(&Raster::filled(3, 3, 1u8)), 0);
    }

    #[test]
    fn test_sea_advance_is_erosion() {
        let before = coast(10, 10, 3);
        let after = coast(10, 10, 5);
        let result = analyze_coastal_change(&before, &after, &CoastalParams::default()).unwrap();
        assert_eq!(result.erosion_pixels, 20);
        assert_eq!(result.accretion_pixels, 0);
        assert_eq!(result.dominant_process, CoastalProcess::Erosion);
        assert_eq!(result.change_type, CoastalChangeType::CoastalErosion);
        assert!(result.change_detected);
        assert_abs_diff_eq!(result.change_magnitude, 20.0, epsilon = 1e-12);
        assert_abs_diff_eq!(result.net_change_percentage, -20.0, epsilon = 1e-12);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.shoreline_change_percentage, 0.0);
    }

    #[test]
    fn test_small_retreat_is_stable() {
        let before = coast(10, 10, 5);
        let mut after = before.clone();
        after.set(0, 4, -0.2).unwrap();
        let result = analyze_coastal_change(&before, &after, &CoastalParams::default()).unwrap();
        assert_eq!(result.accretion_pixels, 1);
        assert!(!result.change_detected);
        assert_eq!(result.change_type, CoastalChangeType::StableCoastline);
        assert_eq!(result.dominant_process, CoastalProcess::Accretion);
        assert_abs_diff_eq!(result.confidence, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_pixels_not_evaluated() {
        let mut before = coast(2, 2, 1);
        before.set(0, 0, f64::NAN).unwrap();
        let after = coast(2, 2, 2);
        let result = analyze_coastal_change(&before, &after, &CoastalParams::default()).unwrap();
        assert_eq!(result.total_pixels, 3);
        assert_eq!(result.erosion_pixels, 2);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = analyze_coastal_change(&coast(2, 2, 1), &coast(3, 2, 1), &CoastalParams::default());
        assert!(err.is_err());
    }
}
