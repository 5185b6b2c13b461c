//! Change magnitude between two dates
//!
//! - Multi-band change-vector magnitude for reflectance images
//! - Absolute difference for single-band rasters

use crate::maybe_rayon::*;
use geowatch_core::{Error, Raster, ReflectanceImage, Result};
use ndarray::{Array2, Axis};

/// Per-pixel change-vector magnitude across all bands:
///
/// `magnitude = sqrt(Σ_b (after_b - before_b)²)`
///
/// Both images must share the same grid and band count. A NaN in any band
/// makes that pixel NaN.
pub fn change_magnitude(before: &ReflectanceImage, after: &ReflectanceImage) -> Result<Raster<f64>> {
    before.ensure_same_grid(after)?;
    if before.band_count() != after.band_count() {
        return Err(Error::Validation(format!(
            "band count differs between dates: {} vs {}",
            before.band_count(),
            after.band_count()
        )));
    }

    let (rows, cols) = before.shape();
    let b = before.data();
    let a = after.data();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let before_row = b.index_axis(Axis(0), row);
            let after_row = a.index_axis(Axis(0), row);
            (0..cols)
                .map(|col| {
                    let sum_sq: f64 = before_row
                        .index_axis(Axis(0), col)
                        .iter()
                        .zip(after_row.index_axis(Axis(0), col).iter())
                        .map(|(x0, x1)| (x1 - x0) * (x1 - x0))
                        .sum();
                    sum_sq.sqrt()
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut output = Raster::from_array(
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?,
    );
    output.set_transform(before.transform().copied());
    output.set_nodata(Some(f64::NAN));
    Ok(output)
}

/// Per-pixel `|after - before|` for single-band rasters
pub fn raster_difference_magnitude(before: &Raster<f64>, after: &Raster<f64>) -> Result<Raster<f64>> {
    before.ensure_same_shape(after)?;
    let diff = (after.data() - before.data()).mapv(f64::abs);
    let mut output = before.with_same_meta::<f64>();
    *output.data_mut() = diff;
    output.set_nodata(Some(f64::NAN));
    Ok(output)
}
