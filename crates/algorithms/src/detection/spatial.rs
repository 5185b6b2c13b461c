//! Raster sweeps for per-pixel detectors
//!
//! A sweep evaluates a detector on every pixel of an index raster and
//! produces a change mask, a confidence map and a direction map. Work is
//! split into [`RowWindow`]s: a window is computed with the rows inside it in
//! parallel, and a [`SpatialAccumulator`] merges finished windows. Callers
//! that need to stop early drive the windows themselves.

use serde::{Deserialize, Serialize};

use super::ChangeDirection;
use crate::maybe_rayon::*;
use geowatch_core::{Error, Raster, RasterElement, Result, RowWindow, RowWindows};

/// Rows per window for whole-raster sweeps
pub const DEFAULT_WINDOW_ROWS: usize = 256;

/// Detector outcome for one evaluated pixel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PixelChange {
    pub changed: bool,
    pub confidence: f64,
    pub direction: ChangeDirection,
}

/// Results for every pixel of one window, row-major.
///
/// `None` marks pixels outside the analysis mask.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowChanges {
    pub window: RowWindow,
    pub cols: usize,
    pub cells: Vec<Option<PixelChange>>,
}

impl WindowChanges {
    /// Cell at a row relative to the window start
    pub fn get(&self, window_row: usize, col: usize) -> Option<PixelChange> {
        if window_row >= self.window.rows || col >= self.cols {
            return None;
        }
        self.cells[window_row * self.cols + col]
    }

    pub fn changed_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.changed).count()
    }
}

/// Aggregate statistics over the evaluated pixels of a sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialStats {
    /// Pixels inside the analysis mask
    pub total_pixels: usize,
    pub changed_pixels: usize,
    pub increase_pixels: usize,
    pub decrease_pixels: usize,
    pub change_percentage: f64,
    pub increase_percentage: f64,
    pub decrease_percentage: f64,
    pub mean_confidence: f64,
    pub max_confidence: f64,
}

/// Output of a whole-raster sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialChangeMap {
    /// 1 where a change was detected
    pub change_map: Raster<u8>,
    pub confidence_map: Raster<f64>,
    /// +1 increase, -1 decrease, 0 none
    pub direction_map: Raster<i8>,
    pub stats: SpatialStats,
}

/// Merges window results into full-size maps
#[derive(Debug, Clone)]
pub struct SpatialAccumulator {
    change_map: Raster<u8>,
    confidence_map: Raster<f64>,
    direction_map: Raster<i8>,
    total: usize,
    changed: usize,
    increase: usize,
    decrease: usize,
    confidence_sum: f64,
    confidence_max: f64,
}

impl SpatialAccumulator {
    /// Empty maps with the shape and georeferencing of `template`
    pub fn new<T: RasterElement>(template: &Raster<T>) -> Self {
        Self {
            change_map: template.with_same_meta(),
            confidence_map: template.with_same_meta(),
            direction_map: template.with_same_meta(),
            total: 0,
            changed: 0,
            increase: 0,
            decrease: 0,
            confidence_sum: 0.0,
            confidence_max: 0.0,
        }
    }

    /// Write one finished window into the maps
    pub fn absorb(&mut self, changes: &WindowChanges) -> Result<()> {
        if changes.cols != self.change_map.cols() || changes.cells.len() != changes.window.rows * changes.cols {
            return Err(Error::size_mismatch(
                (changes.window.rows, self.change_map.cols()),
                (changes.window.rows, changes.cols),
            ));
        }
        let mut change = self.change_map.window_view_mut(changes.window)?;
        let mut confidence = self.confidence_map.window_view_mut(changes.window)?;
        let mut direction = self.direction_map.window_view_mut(changes.window)?;

        for (i, cell) in changes.cells.iter().enumerate() {
            let Some(cell) = cell else { continue };
            let (r, c) = (i / changes.cols, i % changes.cols);
            self.total += 1;
            self.confidence_sum += cell.confidence;
            self.confidence_max = self.confidence_max.max(cell.confidence);
            confidence[[r, c]] = cell.confidence;
            if cell.changed {
                change[[r, c]] = 1;
                direction[[r, c]] = cell.direction.code();
                self.changed += 1;
                match cell.direction {
                    ChangeDirection::Increase => self.increase += 1,
                    ChangeDirection::Decrease => self.decrease += 1,
                    ChangeDirection::None => {}
                }
            }
        }
        Ok(())
    }

    pub fn finish(self) -> SpatialChangeMap {
        let pct = |n: usize| {
            if self.total > 0 {
                n as f64 / self.total as f64 * 100.0
            } else {
                0.0
            }
        };
        let stats = SpatialStats {
            total_pixels: self.total,
            changed_pixels: self.changed,
            increase_pixels: self.increase,
            decrease_pixels: self.decrease,
            change_percentage: pct(self.changed),
            increase_percentage: pct(self.increase),
            decrease_percentage: pct(self.decrease),
            mean_confidence: if self.total > 0 {
                self.confidence_sum / self.total as f64
            } else {
                0.0
            },
            max_confidence: self.confidence_max,
        };
        SpatialChangeMap {
            change_map: self.change_map,
            confidence_map: self.confidence_map,
            direction_map: self.direction_map,
            stats,
        }
    }
}

// ---------------------------------------------------------------------------
// Sweep drivers
// ---------------------------------------------------------------------------

/// Evaluate one window.
///
/// `init` builds fresh detector state at the start of every row; `step` is
/// called left to right for each evaluated pixel with its absolute
/// `(row, col)`. Without a mask, every non-NaN pixel is evaluated.
pub(crate) fn sweep_window<S, I, F>(
    values: &Raster<f64>,
    mask: Option<&Raster<u8>>,
    window: RowWindow,
    init: I,
    step: F,
) -> Result<WindowChanges>
where
    I: Fn() -> S + Sync + Send,
    F: Fn(&mut S, usize, usize, f64) -> PixelChange + Sync + Send,
{
    if let Some(m) = mask {
        values.ensure_same_shape(m)?;
    }
    let cols = values.cols();
    let view = values.window_view(window)?;
    let mask_view = mask.map(|m| m.window_view(window)).transpose()?;

    let cells: Vec<Option<PixelChange>> = (0..window.rows)
        .into_par_iter()
        .flat_map(|wr| {
            let row = window.row_start + wr;
            let mut state = init();
            let mut out = Vec::with_capacity(cols);
            for col in 0..cols {
                let v = view[[wr, col]];
                let evaluated = match &mask_view {
                    Some(m) => m[[wr, col]] != 0,
                    None => !v.is_nan(),
                };
                out.push(evaluated.then(|| step(&mut state, row, col, v)));
            }
            out
        })
        .collect();

    Ok(WindowChanges { window, cols, cells })
}

/// Evaluate every window of a raster and merge the results
pub(crate) fn sweep<S, I, F>(
    values: &Raster<f64>,
    mask: Option<&Raster<u8>>,
    init: I,
    step: F,
) -> Result<SpatialChangeMap>
where
    I: Fn() -> S + Sync + Send,
    F: Fn(&mut S, usize, usize, f64) -> PixelChange + Sync + Send,
{
    if let Some(m) = mask {
        values.ensure_same_shape(m)?;
    }
    let mut acc = SpatialAccumulator::new(values);
    for window in RowWindows::new(values.rows(), DEFAULT_WINDOW_ROWS) {
        let changes = sweep_window(values, mask, window, &init, &step)?;
        acc.absorb(&changes)?;
    }
    Ok(acc.finish())
}

/// Mask of pixels that are non-NaN in both rasters
pub fn joint_valid_mask(a: &Raster<f64>, b: &Raster<f64>) -> Result<Raster<u8>> {
    a.ensure_same_shape(b)?;
    let mut mask: Raster<u8> = a.with_same_meta();
    ndarray::Zip::from(mask.data_mut())
        .and(a.data())
        .and(b.data())
        .for_each(|m, &x, &y| *m = u8::from(!x.is_nan() && !y.is_nan()));
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold_step(_: &mut (), _: usize, _: usize, v: f64) -> PixelChange {
        PixelChange {
            changed: v > 0.5,
            confidence: if v > 0.5 { 1.0 } else { 0.0 },
            direction: if v > 0.5 {
                ChangeDirection::Increase
            } else {
                ChangeDirection::None
            },
        }
    }

    #[test]
    fn test_sweep_counts_and_nan_exclusion() {
        let mut values = Raster::filled(4, 5, 0.1);
        values.set(0, 0, 0.9).unwrap();
        values.set(3, 4, 0.9).unwrap();
        values.set(2, 2, f64::NAN).unwrap();

        let result = sweep(&values, None, || (), threshold_step).unwrap();
        assert_eq!(result.stats.total_pixels, 19);
        assert_eq!(result.stats.changed_pixels, 2);
        assert_eq!(result.stats.increase_pixels, 2);
        assert_eq!(result.change_map.get(0, 0).unwrap(), 1);
        assert_eq!(result.direction_map.get(3, 4).unwrap(), 1);
        assert_eq!(result.change_map.get(2, 2).unwrap(), 0);
        assert!((result.stats.change_percentage - 200.0 / 19.0).abs() < 1e-9);
        assert!((result.stats.mean_confidence - 2.0 / 19.0).abs() < 1e-12);
    }

    #[test]
    fn test_windowed_merge_matches_full_sweep() {
        let values = Raster::from_vec((0..30).map(|i| (i % 7) as f64 / 7.0).collect(), 6, 5).unwrap();
        let full = sweep(&values, None, || (), threshold_step).unwrap();

        let mut acc = SpatialAccumulator::new(&values);
        for window in RowWindows::new(6, 4) {
            let part = sweep_window(&values, None, window, || (), threshold_step).unwrap();
            acc.absorb(&part).unwrap();
        }
        assert_eq!(acc.finish(), full);
    }

    #[test]
    fn test_row_state_is_fresh_per_row() {
        // State counts pixels seen so far in the row
        let values = Raster::filled(3, 4, 0.0);
        let result = sweep(
            &values,
            None,
            || 0usize,
            |seen: &mut usize, _, _, _| {
                *seen += 1;
                PixelChange {
                    changed: *seen == 4,
                    confidence: 0.0,
                    direction: ChangeDirection::None,
                }
            },
        )
        .unwrap();
        assert_eq!(result.stats.changed_pixels, 3);
        for r in 0..3 {
            assert_eq!(result.change_map.get(r, 3).unwrap(), 1);
        }
    }

    #[test]
    fn test_mask_shape_mismatch() {
        let values = Raster::filled(3, 3, 0.0);
        let mask: Raster<u8> = Raster::filled(2, 3, 1);
        assert!(matches!(
            sweep(&values, Some(&mask), || (), threshold_step),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_window_past_end_is_rejected() {
        let values = Raster::filled(3, 3, 0.0);
        let res = sweep_window(&values, None, RowWindow::new(2, 2), || (), threshold_step);
        assert!(matches!(res, Err(Error::IndexOutOfBounds { .. })));
    }

    #[test]
    fn test_joint_valid_mask() {
        let mut a = Raster::filled(2, 2, 0.1);
        let mut b = Raster::filled(2, 2, 0.1);
        a.set(0, 1, f64::NAN).unwrap();
        b.set(1, 0, f64::NAN).unwrap();
        let mask = joint_valid_mask(&a, &b).unwrap();
        assert_eq!(mask.data().iter().map(|v| *v as usize).sum::<usize>(), 2);
    }
}
