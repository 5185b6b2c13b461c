//! # GeoWatch Parallel
//!
//! Execution strategies for running independent analyses side by side.
//!
//! Per-pixel sweeps inside one raster are row-parallel in `geowatch-algorithms`.
//! This crate covers the coarser level: one task per AOI request, each task
//! owning its own detectors and sharing only read-only inputs.

pub mod strategy;

pub use strategy::{num_cpus, ParallelStrategy, ProcessingMode};
