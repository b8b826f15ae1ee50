//! cubeseek-core: data cube container and numeric kernels for the cubeseek
//! source finder.
//!
//! This crate provides the FITS header store, the typed data cube, the
//! smoothing and statistics kernels, and the small value containers used to
//! pass regions, kernel lists, and flagging shapes around the pipeline.

pub mod cube;
pub mod error;
pub mod filters;
pub mod header;
pub mod stats;
pub mod values;

pub use cube::{CubeData, DataCube};
pub use error::{CubeError, Error, HeaderError, Result, ValueError};
pub use header::Header;
pub use stats::{FluxRange, NoiseStatistic, MAD_TO_STD};
pub use values::{FlagShape, Region, ValueList};
