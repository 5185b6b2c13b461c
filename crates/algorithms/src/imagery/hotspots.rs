//! Change hotspots
//!
//! Splits a change-magnitude map into a `grid_size x grid_size` grid of cells
//! and reports the cells whose mean change exceeds a global percentile of the
//! whole map. Cells are `rows / grid_size` by `cols / grid_size` pixels; the
//! remainder rows and columns past the last full cell are not assigned.

use serde::{Deserialize, Serialize};

use super::change_detection::change_magnitude;
use crate::statistics::descriptive::{mean, percentile, population_std};
use geowatch_core::{Raster, ReflectanceImage, Result};

/// Parameters for hotspot detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotParams {
    /// Cells per side (default: 10)
    pub grid_size: usize,
    /// Percentile of the whole change map used as the hotspot threshold (default: 75)
    pub threshold_percentile: f64,
}

impl Default for HotspotParams {
    fn default() -> Self {
        Self {
            grid_size: 10,
            threshold_percentile: 75.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotSeverity {
    Low,
    Moderate,
    High,
    Critical,
}

impl HotspotSeverity {
    /// Severity from the ratio of a cell's mean change to the threshold
    fn classify(intensity: f64, threshold: f64) -> Self {
        let ratio = if threshold > 0.0 { intensity / threshold } else { 1.0 };
        if ratio > 2.0 {
            HotspotSeverity::Critical
        } else if ratio > 1.5 {
            HotspotSeverity::High
        } else if ratio > 1.2 {
            HotspotSeverity::Moderate
        } else {
            HotspotSeverity::Low
        }
    }
}

/// Spatial arrangement of the hotspot cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotDistribution {
    None,
    Isolated,
    Clustered,
    Scattered,
    Dispersed,
}

/// One grid cell whose mean change exceeds the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub grid_row: usize,
    pub grid_col: usize,
    /// Mean change magnitude in the cell
    pub intensity: f64,
    pub max_intensity: f64,
    /// Cell pixels above the threshold
    pub pixels_affected: usize,
    pub severity: HotspotSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotReport {
    pub threshold: f64,
    pub hotspots: Vec<Hotspot>,
    pub distribution: HotspotDistribution,
    /// Hotspot cells as a percentage of all grid cells
    pub coverage_percent: f64,
}

impl HotspotReport {
    pub fn total_hotspots(&self) -> usize {
        self.hotspots.len()
    }

    /// Hotspot with the highest mean intensity
    pub fn largest(&self) -> Option<&Hotspot> {
        self.hotspots
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
    }
}

/// Detect hotspots of spectral change between two co-registered images
pub fn detect_change_hotspots(
    before: &ReflectanceImage,
    after: &ReflectanceImage,
    params: &HotspotParams,
) -> Result<HotspotReport> {
    let magnitude = change_magnitude(before, after)?;
    Ok(hotspots_from_change_map(&magnitude, params))
}

/// Grid analysis over a precomputed change map. NaN pixels are ignored.
pub fn hotspots_from_change_map(change_map: &Raster<f64>, params: &HotspotParams) -> HotspotReport {
    let (rows, cols) = change_map.shape();
    let grid = params.grid_size.max(1);
    let cell_h = rows / grid;
    let cell_w = cols / grid;

    let all: Vec<f64> = change_map.data().iter().copied().collect();
    let threshold = percentile(&all, params.threshold_percentile).unwrap_or(0.0);

    let mut hotspots = Vec::new();
    if cell_h > 0 && cell_w > 0 {
        let data = change_map.data();
        for gi in 0..grid {
            for gj in 0..grid {
                let mut cell = Vec::with_capacity(cell_h * cell_w);
                for r in gi * cell_h..((gi + 1) * cell_h).min(rows) {
                    for c in gj * cell_w..((gj + 1) * cell_w).min(cols) {
                        let v = data[[r, c]];
                        if v.is_finite() {
                            cell.push(v);
                        }
                    }
                }
                let Some(intensity) = mean(&cell) else {
                    continue;
                };
                if intensity > threshold {
                    let max_intensity = cell.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    hotspots.push(Hotspot {
                        grid_row: gi,
                        grid_col: gj,
                        intensity,
                        max_intensity,
                        pixels_affected: cell.iter().filter(|v| **v > threshold).count(),
                        severity: HotspotSeverity::classify(intensity, threshold),
                    });
                }
            }
        }
    }

    let distribution = classify_distribution(&hotspots);
    let coverage_percent = hotspots.len() as f64 / (grid * grid) as f64 * 100.0;

    HotspotReport {
        threshold,
        hotspots,
        distribution,
        coverage_percent,
    }
}

fn classify_distribution(hotspots: &[Hotspot]) -> HotspotDistribution {
    match hotspots.len() {
        0 => return HotspotDistribution::None,
        1 => return HotspotDistribution::Isolated,
        _ => {}
    }
    let rows: Vec<f64> = hotspots.iter().map(|h| h.grid_row as f64).collect();
    let cols: Vec<f64> = hotspots.iter().map(|h| h.grid_col as f64).collect();
    let spread = (population_std(&rows).unwrap_or(0.0) + population_std(&cols).unwrap_or(0.0)) / 2.0;

    if spread < 2.0 {
        HotspotDistribution::Clustered
    } else if spread < 4.0 {
        HotspotDistribution::Scattered
    } else {
        HotspotDistribution::Dispersed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn block_change_map(size: usize, blocks: &[(usize, usize)], value: f64) -> Raster<f64> {
        let mut map = Raster::filled(size, size, 0.01);
        for &(br, bc) in blocks {
            for r in br * 10..br * 10 + 10 {
                for c in bc * 10..bc * 10 + 10 {
                    map.set(r, c, value).unwrap();
                }
            }
        }
        map
    }

    #[test]
    fn test_no_change_has_no_hotspots() {
        let map = Raster::filled(20, 20, 0.0);
        let report = hotspots_from_change_map(&map, &HotspotParams::default());
        assert_eq!(report.total_hotspots(), 0);
        assert_eq!(report.distribution, HotspotDistribution::None);
        assert_eq!(report.coverage_percent, 0.0);
        assert!(report.largest().is_none());
    }

    #[test]
    fn test_single_block_is_isolated() {
        let map = block_change_map(100, &[(3, 4)], 0.5);
        let report = hotspots_from_change_map(&map, &HotspotParams::default());
        assert_eq!(report.total_hotspots(), 1);
        let h = &report.hotspots[0];
        assert_eq!((h.grid_row, h.grid_col), (3, 4));
        assert_eq!(h.pixels_affected, 100);
        assert_eq!(h.severity, HotspotSeverity::Critical);
        assert_eq!(report.distribution, HotspotDistribution::Isolated);
        assert!((report.coverage_percent - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_adjacent_blocks_cluster_and_corners_disperse() {
        let near = block_change_map(100, &[(4, 4), (4, 5), (5, 4)], 0.5);
        let report = hotspots_from_change_map(&near, &HotspotParams::default());
        assert_eq!(report.distribution, HotspotDistribution::Clustered);

        let far = block_change_map(100, &[(0, 0), (9, 9), (0, 9), (9, 0)], 0.5);
        let report = hotspots_from_change_map(&far, &HotspotParams::default());
        assert_eq!(report.total_hotspots(), 4);
        assert_eq!(report.distribution, HotspotDistribution::Dispersed);
    }

    #[test]
    fn test_from_images() {
        let before = ReflectanceImage::sentinel2(Array3::from_elem((20, 20, 4), 0.2));
        let mut cube = Array3::from_elem((20, 20, 4), 0.2);
        for r in 0..2 {
            for c in 0..2 {
                cube[[r, c, 3]] = 0.6;
            }
        }
        let after = ReflectanceImage::sentinel2(cube);
        let report = detect_change_hotspots(&before, &after, &HotspotParams::default()).unwrap();
        assert_eq!(report.total_hotspots(), 1);
        assert_eq!(report.largest().unwrap().grid_row, 0);
    }

    #[test]
    fn test_grid_larger_than_raster() {
        let map = Raster::filled(3, 3, 1.0);
        let report = hotspots_from_change_map(&map, &HotspotParams::default());
        assert_eq!(report.total_hotspots(), 0);
    }
}
