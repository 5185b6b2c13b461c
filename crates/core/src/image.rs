//! Multi-band surface-reflectance imagery
//!
//! A [`ReflectanceImage`] is a `[rows, cols, bands]` cube of reflectance values
//! (nominally 0-1) plus a mapping from named [`Band`]s to band positions.
//! It is read-only once built and borrowed for the duration of one analysis.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use ndarray::{Array3, ArrayD, ArrayView2, Axis, Ix2, Ix3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named spectral bands used by the index layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Blue,
    Green,
    Red,
    Nir,
    RedEdge1,
    RedEdge2,
    RedEdge3,
    Swir1,
    Swir2,
}

impl Band {
    /// All bands in Sentinel-2 style stacking order
    pub const STACK_ORDER: [Band; 9] = [
        Band::Blue,
        Band::Green,
        Band::Red,
        Band::Nir,
        Band::RedEdge1,
        Band::RedEdge2,
        Band::RedEdge3,
        Band::Swir1,
        Band::Swir2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Band::Blue => "blue",
            Band::Green => "green",
            Band::Red => "red",
            Band::Nir => "nir",
            Band::RedEdge1 => "red_edge_1",
            Band::RedEdge2 => "red_edge_2",
            Band::RedEdge3 => "red_edge_3",
            Band::Swir1 => "swir_1",
            Band::Swir2 => "swir_2",
        }
    }

    pub fn from_name(name: &str) -> Option<Band> {
        Band::STACK_ORDER
            .iter()
            .copied()
            .find(|b| b.name() == name)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Minimum band count for index computation (blue, green, red, NIR)
pub const MIN_INDEX_BANDS: usize = 4;

/// A `[rows, cols, bands]` reflectance cube with named bands
#[derive(Debug, Clone)]
pub struct ReflectanceImage {
    data: Array3<f64>,
    bands: BTreeMap<Band, usize>,
    transform: Option<GeoTransform>,
}

impl ReflectanceImage {
    /// Build an image from a cube and an explicit band mapping.
    ///
    /// Every mapped position must exist in the cube's band axis.
    pub fn new(data: Array3<f64>, bands: BTreeMap<Band, usize>) -> Result<Self> {
        let band_count = data.len_of(Axis(2));
        if let Some((band, idx)) = bands.iter().find(|(_, idx)| **idx >= band_count) {
            return Err(Error::Validation(format!(
                "band {} mapped to position {} but image has {} bands",
                band, idx, band_count
            )));
        }
        Ok(Self {
            data,
            bands,
            transform: None,
        })
    }

    /// Build an image whose bands are stacked in Sentinel-2 order:
    /// blue, green, red, NIR, then red-edge 1-3, SWIR-1 and SWIR-2 when present.
    ///
    /// Red-edge 1/2 are mapped from 6 bands up, red-edge 3 and SWIR-1 from 8,
    /// SWIR-2 from 9. Images with fewer than 4 bands keep no band mapping.
    pub fn sentinel2(data: Array3<f64>) -> Self {
        let band_count = data.len_of(Axis(2));
        let mut bands = BTreeMap::new();
        if band_count >= MIN_INDEX_BANDS {
            for (idx, band) in Band::STACK_ORDER[..4].iter().enumerate() {
                bands.insert(*band, idx);
            }
        }
        if band_count >= 6 {
            bands.insert(Band::RedEdge1, 4);
            bands.insert(Band::RedEdge2, 5);
        }
        if band_count >= 8 {
            bands.insert(Band::RedEdge3, 6);
            bands.insert(Band::Swir1, 7);
        }
        if band_count >= 9 {
            bands.insert(Band::Swir2, 8);
        }
        Self {
            data,
            bands,
            transform: None,
        }
    }

    /// Build a Sentinel-2 ordered image from an array of any rank.
    ///
    /// A 2D array is a single grayscale band. Fewer than 2 dimensions or more
    /// than 3 is a validation error.
    pub fn from_dyn(data: ArrayD<f64>) -> Result<Self> {
        match data.ndim() {
            2 => {
                let grid = data
                    .into_dimensionality::<Ix2>()
                    .map_err(|e| Error::Other(e.to_string()))?;
                Ok(Self::sentinel2(grid.insert_axis(Axis(2))))
            }
            3 => {
                let cube = data
                    .into_dimensionality::<Ix3>()
                    .map_err(|e| Error::Other(e.to_string()))?;
                Ok(Self::sentinel2(cube))
            }
            n => Err(Error::Validation(format!(
                "image must have 2 or 3 dimensions, got {}",
                n
            ))),
        }
    }

    /// Attach a georeferencing transform
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Spatial shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn has_band(&self, band: Band) -> bool {
        self.bands.contains_key(&band)
    }

    /// Mapped band names and their positions
    pub fn band_map(&self) -> &BTreeMap<Band, usize> {
        &self.bands
    }

    /// 2D view of a named band
    pub fn band(&self, band: Band) -> Option<ArrayView2<'_, f64>> {
        self.bands
            .get(&band)
            .map(|&idx| self.data.index_axis(Axis(2), idx))
    }

    /// 2D view of the band at a raw position
    pub fn band_at(&self, idx: usize) -> Option<ArrayView2<'_, f64>> {
        (idx < self.band_count()).then(|| self.data.index_axis(Axis(2), idx))
    }

    /// Copy of a named band as a raster sharing the image's georeferencing
    pub fn band_raster(&self, band: Band) -> Option<Raster<f64>> {
        self.band(band).map(|view| {
            let mut raster = Raster::from_array(view.to_owned());
            raster.set_transform(self.transform);
            raster
        })
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn transform(&self) -> Option<&GeoTransform> {
        self.transform.as_ref()
    }

    /// Geographic center `(x, y)` when georeferenced
    pub fn center(&self) -> Option<(f64, f64)> {
        self.transform.map(|t| t.center(self.cols(), self.rows()))
    }

    /// Fail unless `other` covers the same spatial grid
    pub fn ensure_same_grid(&self, other: &ReflectanceImage) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::size_mismatch(self.shape(), other.shape()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_sentinel2_band_order() {
        let img = ReflectanceImage::sentinel2(Array3::zeros((2, 2, 9)));
        assert_eq!(img.band_map().get(&Band::Nir), Some(&3));
        assert_eq!(img.band_map().get(&Band::RedEdge1), Some(&4));
        assert_eq!(img.band_map().get(&Band::Swir1), Some(&7));
        assert_eq!(img.band_map().get(&Band::Swir2), Some(&8));
    }

    #[test]
    fn test_partial_band_sets() {
        let four = ReflectanceImage::sentinel2(Array3::zeros((2, 2, 4)));
        assert!(four.has_band(Band::Nir));
        assert!(!four.has_band(Band::RedEdge1));

        let six = ReflectanceImage::sentinel2(Array3::zeros((2, 2, 6)));
        assert!(six.has_band(Band::RedEdge2));
        assert!(!six.has_band(Band::Swir1));

        let eight = ReflectanceImage::sentinel2(Array3::zeros((2, 2, 8)));
        assert!(eight.has_band(Band::Swir1));
        assert!(!eight.has_band(Band::Swir2));
    }

    #[test]
    fn test_from_dyn_rank_checks() {
        let gray = ReflectanceImage::from_dyn(ArrayD::zeros(IxDyn(&[3, 4]))).unwrap();
        assert_eq!(gray.band_count(), 1);
        assert_eq!(gray.shape(), (3, 4));
        assert!(gray.band_map().is_empty());

        let flat = ReflectanceImage::from_dyn(ArrayD::zeros(IxDyn(&[5])));
        assert!(matches!(flat, Err(Error::Validation(_))));
    }

    #[test]
    fn test_explicit_mapping_out_of_range() {
        let mut bands = BTreeMap::new();
        bands.insert(Band::Red, 0);
        bands.insert(Band::Nir, 3);
        let err = ReflectanceImage::new(Array3::zeros((2, 2, 2)), bands).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_band_view_and_center() {
        let mut cube = Array3::zeros((2, 3, 4));
        cube[[1, 2, 3]] = 0.4;
        let img = ReflectanceImage::sentinel2(cube)
            .with_transform(GeoTransform::new(80.0, 20.0, 0.5, -0.5));
        let nir = img.band(Band::Nir).unwrap();
        assert_eq!(nir[[1, 2]], 0.4);
        let (x, y) = img.center().unwrap();
        assert!((x - 80.75).abs() < 1e-12);
        assert!((y - 19.5).abs() < 1e-12);
        assert_eq!(img.band_raster(Band::Nir).unwrap().get(1, 2).unwrap(), 0.4);
    }

    #[test]
    fn test_band_names_roundtrip() {
        for band in Band::STACK_ORDER {
            assert_eq!(Band::from_name(band.name()), Some(band));
        }
        assert_eq!(Band::from_name("thermal"), None);
    }
}
