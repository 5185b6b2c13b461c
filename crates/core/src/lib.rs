//! # GeoWatch Core
//!
//! Core types and traits shared by the geowatch change-analysis crates.
//!
//! This crate provides:
//! - `Raster<T>`: generic 2D grid used for index maps and change masks
//! - `RowWindow`: contiguous row bands for chunked sweeps
//! - `GeoTransform`: affine georeferencing of a grid
//! - `ReflectanceImage`: multi-band surface-reflectance cube with named bands
//! - `AoiMetadata`: area-of-interest description consumed by the analysis layers
//! - Algorithm trait for a consistent API

pub mod aoi;
pub mod error;
pub mod image;
pub mod raster;

pub use aoi::{AoiMetadata, GeoPoint};
pub use error::{Error, Result};
pub use image::{Band, ReflectanceImage};
pub use raster::{GeoTransform, Raster, RasterElement, RowWindow, RowWindows};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::aoi::{AoiMetadata, GeoPoint};
    pub use crate::error::{Error, Result};
    pub use crate::image::{Band, ReflectanceImage};
    pub use crate::raster::{GeoTransform, Raster, RasterElement, RowWindow, RowWindows};
    pub use crate::Algorithm;
}

/// Core trait for stateless algorithms in geowatch.
///
/// Algorithms are pure functions that transform input data according to parameters.
/// Stateful detectors (EWMA, CUSUM) do not implement this trait; they own
/// per-series state and are driven observation by observation.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
