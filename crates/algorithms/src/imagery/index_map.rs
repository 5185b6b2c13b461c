//! Per-image collection of spectral index values

use std::collections::BTreeMap;

use geowatch_core::Raster;

use super::indices::SpectralIndex;

/// Index name to scalar mean, as consumed by the fusion engine.
///
/// Keys are lower-case index names (`"ndvi"`, `"thermal_proxy"`, ...). Names
/// outside [`SpectralIndex`] are allowed and fall back to default thresholds.
pub type IndexSnapshot = BTreeMap<String, f64>;

/// A spectral index value: a whole grid aligned to the source image, or a
/// single scalar (typically a spatial mean supplied by a caller)
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Scalar(f64),
    Grid(Raster<f64>),
}

impl IndexValue {
    /// Scalar value, or the mean over valid cells of a grid
    pub fn mean(&self) -> f64 {
        match self {
            IndexValue::Scalar(v) => *v,
            IndexValue::Grid(r) => r.mean(),
        }
    }

    pub fn as_grid(&self) -> Option<&Raster<f64>> {
        match self {
            IndexValue::Grid(r) => Some(r),
            IndexValue::Scalar(_) => None,
        }
    }
}

/// Spectral indices computed for one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectralIndexMap {
    values: BTreeMap<SpectralIndex, IndexValue>,
}

impl SpectralIndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: SpectralIndex, value: IndexValue) {
        self.values.insert(index, value);
    }

    pub fn get(&self, index: SpectralIndex) -> Option<&IndexValue> {
        self.values.get(&index)
    }

    /// Grid for an index, if present as a grid
    pub fn grid(&self, index: SpectralIndex) -> Option<&Raster<f64>> {
        self.get(index).and_then(IndexValue::as_grid)
    }

    pub fn contains(&self, index: SpectralIndex) -> bool {
        self.values.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in canonical index order
    pub fn iter(&self) -> impl Iterator<Item = (SpectralIndex, &IndexValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn indices(&self) -> impl Iterator<Item = SpectralIndex> + '_ {
        self.values.keys().copied()
    }

    /// Mean of every index keyed by name
    pub fn means(&self) -> IndexSnapshot {
        self.values
            .iter()
            .map(|(k, v)| (k.name().to_string(), v.mean()))
            .collect()
    }
}

impl FromIterator<(SpectralIndex, IndexValue)> for SpectralIndexMap {
    fn from_iter<I: IntoIterator<Item = (SpectralIndex, IndexValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_means_mix_scalar_and_grid() {
        let mut grid = Raster::filled(2, 2, 0.4);
        grid.set(0, 0, f64::NAN).unwrap();
        let map: SpectralIndexMap = [
            (SpectralIndex::Ndvi, IndexValue::Grid(grid)),
            (SpectralIndex::Ndwi, IndexValue::Scalar(-0.2)),
        ]
        .into_iter()
        .collect();

        let means = map.means();
        assert!((means["ndvi"] - 0.4).abs() < 1e-12);
        assert_eq!(means["ndwi"], -0.2);
        assert!(map.grid(SpectralIndex::Ndwi).is_none());
    }

    #[test]
    fn test_iteration_is_canonical() {
        let map: SpectralIndexMap = [
            (SpectralIndex::Ndre, IndexValue::Scalar(0.1)),
            (SpectralIndex::Bsi, IndexValue::Scalar(0.1)),
            (SpectralIndex::Ndvi, IndexValue::Scalar(0.1)),
        ]
        .into_iter()
        .collect();
        let order: Vec<_> = map.indices().collect();
        assert_eq!(order, vec![SpectralIndex::Ndvi, SpectralIndex::Bsi, SpectralIndex::Ndre]);
    }
}
