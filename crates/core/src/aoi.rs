//! Area-of-interest metadata

use serde::{Deserialize, Serialize};

/// Kilometres per degree used for coarse planar distances
pub const KM_PER_DEGREE: f64 = 111.0;

/// A WGS84 point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Center of the bounding box of a polygon ring given as `(lon, lat)` pairs.
    ///
    /// Returns `None` for an empty ring.
    pub fn bbox_center(ring: &[(f64, f64)]) -> Option<Self> {
        let (first_lon, first_lat) = *ring.first()?;
        let (mut min_lon, mut max_lon) = (first_lon, first_lon);
        let (mut min_lat, mut max_lat) = (first_lat, first_lat);
        for &(lon, lat) in &ring[1..] {
            min_lon = min_lon.min(lon);
            max_lon = max_lon.max(lon);
            min_lat = min_lat.min(lat);
            max_lat = max_lat.max(lat);
        }
        Some(Self::new((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0))
    }

    /// Planar distance in kilometres, treating one degree as [`KM_PER_DEGREE`].
    ///
    /// Good enough for deciding whether two AOIs are neighbours; not a geodesic.
    pub fn approx_distance_km(&self, other: &GeoPoint) -> f64 {
        let dlat = self.lat - other.lat;
        let dlon = self.lon - other.lon;
        (dlat * dlat + dlon * dlon).sqrt() * KM_PER_DEGREE
    }
}

/// Descriptive metadata for a monitored area
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AoiMetadata {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub center: Option<GeoPoint>,
    /// Free-form land-use / protection tags such as `protected_area` or `forest`
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AoiMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_center(mut self, center: GeoPoint) -> Self {
        self.center = Some(center);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_center() {
        let ring = [(77.0, 28.0), (78.0, 28.0), (78.0, 29.0), (77.0, 29.0), (77.0, 28.0)];
        let c = GeoPoint::bbox_center(&ring).unwrap();
        assert!((c.lat - 28.5).abs() < 1e-12);
        assert!((c.lon - 77.5).abs() < 1e-12);
        assert!(GeoPoint::bbox_center(&[]).is_none());
    }

    #[test]
    fn test_approx_distance() {
        let a = GeoPoint::new(10.0, 76.0);
        let b = GeoPoint::new(10.01, 76.0);
        assert!((a.approx_distance_km(&b) - 1.11).abs() < 1e-9);
    }

    #[test]
    fn test_tags() {
        let aoi = AoiMetadata::new("sundarbans").with_tags(["protected_area", "wetland"]);
        assert!(aoi.has_tag("wetland"));
        assert!(!aoi.has_tag("forest"));
    }
}
