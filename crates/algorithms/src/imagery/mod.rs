//! Imagery analysis algorithms
//!
//! - Spectral indices: NDVI, EVI, NDWI, MNDWI, BSI, NDBI, BAI, SAVI, NBRI,
//!   thermal proxy, algae and turbidity proxies, NDRE
//! - Index maps: per-image collections of index grids or scalars
//! - Change magnitude: per-pixel spectral change between two dates
//! - Hotspots: grid cells where change concentrates

mod change_detection;
mod hotspots;
mod index_map;
mod indices;

pub use change_detection::{change_magnitude, raster_difference_magnitude};
pub use hotspots::{
    detect_change_hotspots, hotspots_from_change_map, Hotspot, HotspotDistribution,
    HotspotParams, HotspotReport, HotspotSeverity,
};
pub use index_map::{IndexSnapshot, IndexValue, SpectralIndexMap};
pub use indices::{
    compute_index, compute_indices, EviParams, IndexParams, SpectralIndex,
    SpectralIndexCalculator,
};
