//! Spectral vegetation, water, soil and built-up indices
//!
//! Every index is a per-pixel function of a few named reflectance bands.
//! Denominators carry a small epsilon instead of masking, and every output is
//! clipped to `[-clip, clip]` (1.5 by default) so pathological ratios such as
//! BAI or the algae/turbidity proxies stay bounded.

use crate::maybe_rayon::*;
use geowatch_core::image::MIN_INDEX_BANDS;
use geowatch_core::{Algorithm, Band, Error, Raster, ReflectanceImage, Result};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::index_map::{IndexValue, SpectralIndexMap};

/// Enumeration of supported spectral indices.
///
/// Declaration order is the canonical reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Enhanced Vegetation Index
    Evi,
    /// Normalized Difference Water Index (McFeeters)
    Ndwi,
    /// Modified NDWI (Xu, uses SWIR-1)
    Mndwi,
    /// Bare Soil Index
    Bsi,
    /// Normalized Difference Built-up Index
    Ndbi,
    /// Burned Area Index
    Bai,
    /// Soil Adjusted Vegetation Index
    Savi,
    /// Normalized Burn Ratio
    Nbri,
    /// SWIR-1 reflectance as a surface-heat proxy
    ThermalProxy,
    /// Red-edge / red ratio, sensitive to chlorophyll in water
    AlgaeIndex,
    /// Red / NIR ratio, sensitive to suspended sediment
    TurbidityIndex,
    /// Normalized Difference Red Edge Index
    Ndre,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 13] = [
        SpectralIndex::Ndvi,
        SpectralIndex::Evi,
        SpectralIndex::Ndwi,
        SpectralIndex::Mndwi,
        SpectralIndex::Bsi,
        SpectralIndex::Ndbi,
        SpectralIndex::Bai,
        SpectralIndex::Savi,
        SpectralIndex::Nbri,
        SpectralIndex::ThermalProxy,
        SpectralIndex::AlgaeIndex,
        SpectralIndex::TurbidityIndex,
        SpectralIndex::Ndre,
    ];

    /// Lower-case key used in index snapshots, thresholds and weights
    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "ndvi",
            SpectralIndex::Evi => "evi",
            SpectralIndex::Ndwi => "ndwi",
            SpectralIndex::Mndwi => "mndwi",
            SpectralIndex::Bsi => "bsi",
            SpectralIndex::Ndbi => "ndbi",
            SpectralIndex::Bai => "bai",
            SpectralIndex::Savi => "savi",
            SpectralIndex::Nbri => "nbri",
            SpectralIndex::ThermalProxy => "thermal_proxy",
            SpectralIndex::AlgaeIndex => "algae_index",
            SpectralIndex::TurbidityIndex => "turbidity_index",
            SpectralIndex::Ndre => "ndre",
        }
    }

    pub fn from_name(name: &str) -> Option<SpectralIndex> {
        SpectralIndex::ALL.iter().copied().find(|i| i.name() == name)
    }

    /// Bands the formula reads, in the order [`SpectralIndex::evaluate`] expects them
    pub fn required_bands(&self) -> &'static [Band] {
        use Band::*;
        match self {
            SpectralIndex::Ndvi | SpectralIndex::Savi => &[Nir, Red],
            SpectralIndex::Evi => &[Nir, Red, Blue],
            SpectralIndex::Ndwi => &[Green, Nir],
            SpectralIndex::Mndwi => &[Green, Swir1],
            SpectralIndex::Bsi => &[Swir1, Red, Nir, Blue],
            SpectralIndex::Ndbi => &[Swir1, Nir],
            SpectralIndex::Bai | SpectralIndex::TurbidityIndex => &[Red, Nir],
            SpectralIndex::Nbri => &[Nir, Swir2],
            SpectralIndex::ThermalProxy => &[Swir1],
            SpectralIndex::AlgaeIndex => &[RedEdge1, Red],
            SpectralIndex::Ndre => &[Nir, RedEdge1],
        }
    }

    /// Whether every band the formula needs is mapped in `image`
    pub fn is_available(&self, image: &ReflectanceImage) -> bool {
        self.required_bands().iter().all(|b| image.has_band(*b))
    }

    /// Evaluate the index for one pixel.
    ///
    /// `v` holds the band values in [`SpectralIndex::required_bands`] order.
    /// The result is not clipped.
    pub fn evaluate(&self, v: &[f64], params: &IndexParams) -> f64 {
        let e = params.epsilon;
        match self {
            SpectralIndex::Ndvi => nd(v[0], v[1], e),
            SpectralIndex::Evi => {
                let p = &params.evi;
                p.g * (v[0] - v[1]) / (v[0] + p.c1 * v[1] - p.c2 * v[2] + p.l + e)
            }
            SpectralIndex::Ndwi | SpectralIndex::Mndwi | SpectralIndex::Ndbi => nd(v[0], v[1], e),
            SpectralIndex::Bsi => {
                let soil = v[0] + v[1];
                let veg = v[2] + v[3];
                (soil - veg) / (soil + veg + e)
            }
            SpectralIndex::Bai => {
                let dr = 0.1 - v[0];
                let dn = 0.06 - v[1];
                1.0 / (dr * dr + dn * dn + e)
            }
            SpectralIndex::Savi => {
                let l = params.savi_l;
                (v[0] - v[1]) / (v[0] + v[1] + l + e) * (1.0 + l)
            }
            SpectralIndex::Nbri | SpectralIndex::Ndre => nd(v[0], v[1], e),
            SpectralIndex::ThermalProxy => v[0],
            SpectralIndex::AlgaeIndex | SpectralIndex::TurbidityIndex => v[0] / (v[1] + e),
        }
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[inline]
fn nd(a: f64, b: f64, eps: f64) -> f64 {
    (a - b) / (a + b + eps)
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Parameters for EVI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EviParams {
    /// Gain factor (default: 2.5)
    pub g: f64,
    /// Aerosol coefficient for red band (default: 6.0)
    pub c1: f64,
    /// Aerosol coefficient for blue band (default: 7.5)
    pub c2: f64,
    /// Canopy background adjustment (default: 1.0)
    pub l: f64,
}

impl Default for EviParams {
    fn default() -> Self {
        Self {
            g: 2.5,
            c1: 6.0,
            c2: 7.5,
            l: 1.0,
        }
    }
}

/// Parameters shared by all index formulas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexParams {
    /// SAVI soil brightness correction factor (default: 0.5)
    pub savi_l: f64,
    pub evi: EviParams,
    /// Outputs are clipped to `[-clip, clip]` (default: 1.5)
    pub clip: f64,
    /// Added to every denominator (default: 1e-8)
    pub epsilon: f64,
    /// Indices to compute; empty means all of them
    pub selection: Vec<SpectralIndex>,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            savi_l: 0.5,
            evi: EviParams::default(),
            clip: 1.5,
            epsilon: 1e-8,
            selection: Vec::new(),
        }
    }
}

impl IndexParams {
    fn wanted(&self) -> &[SpectralIndex] {
        if self.selection.is_empty() {
            &SpectralIndex::ALL
        } else {
            &self.selection
        }
    }
}

// ---------------------------------------------------------------------------
// Single index over an image
// ---------------------------------------------------------------------------

/// Compute one index over the whole image.
///
/// Returns `Ok(None)` when a required band is not mapped. NaN reflectance
/// (cloud-masked pixels) propagates to NaN in the output.
pub fn compute_index(
    image: &ReflectanceImage,
    index: SpectralIndex,
    params: &IndexParams,
) -> Result<Option<Raster<f64>>> {
    let views: Vec<ArrayView2<'_, f64>> = match index
        .required_bands()
        .iter()
        .map(|b| image.band(*b))
        .collect::<Option<Vec<_>>>()
    {
        Some(v) => v,
        None => return Ok(None),
    };

    let (rows, cols) = image.shape();
    let clip = params.clip;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut buf = [0.0f64; 4];
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                for (k, view) in views.iter().enumerate() {
                    buf[k] = view[[row, col]];
                }
                let v = index.evaluate(&buf[..views.len()], params);
                if !v.is_nan() {
                    *out = v.clamp(-clip, clip);
                }
            }
            row_data
        })
        .collect();

    let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    let mut output = Raster::from_array(array);
    output.set_transform(image.transform().copied());
    output.set_nodata(Some(f64::NAN));
    Ok(Some(output))
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Derives a [`SpectralIndexMap`] from a reflectance image.
///
/// Indices whose bands are missing are omitted, not reported as errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralIndexCalculator;

impl SpectralIndexCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Compute every available index with default parameters
    pub fn compute_indices(&self, image: &ReflectanceImage) -> Result<SpectralIndexMap> {
        self.compute_with(image, &IndexParams::default())
    }

    /// Compute the selected (or all) available indices
    pub fn compute_with(&self, image: &ReflectanceImage, params: &IndexParams) -> Result<SpectralIndexMap> {
        if image.band_count() < MIN_INDEX_BANDS {
            return Err(Error::Validation(format!(
                "index computation needs at least {} bands (blue, green, red, nir), got {}",
                MIN_INDEX_BANDS,
                image.band_count()
            )));
        }

        let mut map = SpectralIndexMap::new();
        for &index in params.wanted() {
            match compute_index(image, index, params)? {
                Some(raster) => map.insert(index, IndexValue::Grid(raster)),
                None => debug!("skipping {}: bands {:?} not available", index, index.required_bands()),
            }
        }
        debug!("computed {} spectral indices", map.len());
        Ok(map)
    }
}

impl Algorithm for SpectralIndexCalculator {
    type Input = ReflectanceImage;
    type Output = SpectralIndexMap;
    type Params = IndexParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "SpectralIndices"
    }

    fn description(&self) -> &'static str {
        "Compute vegetation, water, soil and built-up indices from reflectance bands"
    }

    fn execute(&self, image: ReflectanceImage, params: IndexParams) -> Result<SpectralIndexMap> {
        self.compute_with(&image, &params)
    }
}

/// Compute every available index with default parameters
pub fn compute_indices(image: &ReflectanceImage) -> Result<SpectralIndexMap> {
    SpectralIndexCalculator.compute_indices(image)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// 9-band image with every pixel set to the same band values
    fn uniform_image(rows: usize, cols: usize, bands: [f64; 9]) -> ReflectanceImage {
        let mut cube = Array3::zeros((rows, cols, 9));
        for r in 0..rows {
            for c in 0..cols {
                for (b, v) in bands.iter().enumerate() {
                    cube[[r, c, b]] = *v;
                }
            }
        }
        ReflectanceImage::sentinel2(cube)
    }

    // blue, green, red, nir, re1, re2, re3, swir1, swir2
    const VEG: [f64; 9] = [0.05, 0.08, 0.05, 0.40, 0.15, 0.25, 0.30, 0.20, 0.10];

    fn value(map: &SpectralIndexMap, index: SpectralIndex) -> f64 {
        map.grid(index).unwrap().get(0, 0).unwrap()
    }

    #[test]
    fn test_vegetation_pixel_values() {
        let map = compute_indices(&uniform_image(2, 2, VEG)).unwrap();
        assert_eq!(map.len(), 13);

        let ndvi = value(&map, SpectralIndex::Ndvi);
        assert!((ndvi - 0.35 / 0.45).abs() < 1e-6, "Expected 0.7778, got {}", ndvi);

        let ndwi = value(&map, SpectralIndex::Ndwi);
        assert!((ndwi - (-0.32 / 0.48)).abs() < 1e-6);

        let ndbi = value(&map, SpectralIndex::Ndbi);
        assert!((ndbi - (-0.2 / 0.6)).abs() < 1e-6);

        let bsi = value(&map, SpectralIndex::Bsi);
        assert!((bsi - (-0.2 / 0.7)).abs() < 1e-6);

        let evi = value(&map, SpectralIndex::Evi);
        let expected_evi = 2.5 * 0.35 / (0.40 + 0.30 - 0.375 + 1.0);
        assert!((evi - expected_evi).abs() < 1e-6, "Expected {}, got {}", expected_evi, evi);

        let savi = value(&map, SpectralIndex::Savi);
        assert!((savi - 0.35 / 0.95 * 1.5).abs() < 1e-6);

        let thermal = value(&map, SpectralIndex::ThermalProxy);
        assert!((thermal - 0.20).abs() < 1e-12);

        let algae = value(&map, SpectralIndex::AlgaeIndex);
        assert!((algae - 1.5).abs() < 1e-6, "0.15/0.05 = 3.0 clipped to 1.5, got {}", algae);

        let turbidity = value(&map, SpectralIndex::TurbidityIndex);
        assert!((turbidity - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_bai_is_clipped() {
        let map = compute_indices(&uniform_image(1, 1, VEG)).unwrap();
        assert_eq!(value(&map, SpectralIndex::Bai), 1.5);
    }

    #[test]
    fn test_values_always_in_clip_range() {
        // Deterministic pseudo-random reflectances, including values above 1.
        let mut cube = Array3::zeros((8, 8, 9));
        let mut state = 12345u64;
        for v in cube.iter_mut() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            *v = ((state >> 33) as f64 / (1u64 << 31) as f64) * 1.2;
        }
        let map = compute_indices(&ReflectanceImage::sentinel2(cube)).unwrap();
        for (index, value) in map.iter() {
            let grid = value.as_grid().unwrap();
            for v in grid.data().iter() {
                assert!((-1.5..=1.5).contains(v), "{} produced {}", index, v);
            }
        }
    }

    #[test]
    fn test_missing_bands_are_omitted() {
        let cube = Array3::from_elem((3, 3, 4), 0.2);
        let map = compute_indices(&ReflectanceImage::sentinel2(cube)).unwrap();
        assert!(map.contains(SpectralIndex::Ndvi));
        assert!(map.contains(SpectralIndex::Ndwi));
        assert!(map.contains(SpectralIndex::Evi));
        assert!(!map.contains(SpectralIndex::Bsi));
        assert!(!map.contains(SpectralIndex::AlgaeIndex));
        assert!(!map.contains(SpectralIndex::Nbri));
    }

    #[test]
    fn test_too_few_bands_is_validation_error() {
        let cube = Array3::from_elem((3, 3, 3), 0.2);
        let err = compute_indices(&ReflectanceImage::sentinel2(cube)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_nan_pixels_propagate() {
        let mut cube = Array3::from_elem((2, 2, 4), 0.2);
        cube[[0, 1, 3]] = f64::NAN;
        let map = compute_indices(&ReflectanceImage::sentinel2(cube)).unwrap();
        let ndvi = map.grid(SpectralIndex::Ndvi).unwrap();
        assert!(ndvi.get(0, 1).unwrap().is_nan());
        assert!(!ndvi.get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_zero_reflectance_is_finite() {
        let map = compute_indices(&uniform_image(1, 1, [0.0; 9])).unwrap();
        for (index, value) in map.iter() {
            let v = value.as_grid().unwrap().get(0, 0).unwrap();
            assert!(v.is_finite(), "{} not finite for zero input", index);
        }
    }

    #[test]
    fn test_selection_limits_output() {
        let params = IndexParams {
            selection: vec![SpectralIndex::Ndvi, SpectralIndex::Bsi],
            ..Default::default()
        };
        let map = SpectralIndexCalculator
            .execute(uniform_image(1, 1, VEG), params)
            .unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains(SpectralIndex::Bsi));
    }

    #[test]
    fn test_names_roundtrip() {
        for index in SpectralIndex::ALL {
            assert_eq!(SpectralIndex::from_name(index.name()), Some(index));
        }
        assert_eq!(SpectralIndex::from_name("lst"), None);
    }
}
