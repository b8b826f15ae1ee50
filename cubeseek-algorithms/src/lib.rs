//! cubeseek-algorithms: detection and labelling machinery for the cubeseek
//! source finder.
//!
//! This crate provides the Smooth + Clip finder, the connected-component
//! linker with its per-source parameter table, and the noise scaling
//! filters.

mod error;
mod linker;
mod scale_noise;
mod scfind;
mod source_table;

pub use error::{Error, FinderError, LinkerError, Result};
pub use linker::{run_linker, LinkerConfig};
pub use scale_noise::{scale_noise_global, scale_noise_local, ScaleNoiseConfig, ScaleNoiseMode};
pub use scfind::{run_scfind, ScFindConfig};
pub use source_table::SourceTable;
