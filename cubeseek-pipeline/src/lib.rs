//! cubeseek-pipeline: the end-to-end source-finding run.
//!
//! One callable, [`run`], drives the whole chain: load the cube, apply
//! flags, weights, and noise scaling, detect with the Smooth + Clip
//! finder, label and filter with the linker, and write the requested
//! output products.

mod params;

use thiserror::Error;

use cubeseek_algorithms::{
    run_linker, run_scfind, scale_noise_global, scale_noise_local, ScaleNoiseMode, SourceTable,
};
use cubeseek_core::DataCube;
use cubeseek_io::{load_cube, save_cube};

pub use params::{InputParams, OutputParams, Params};

/// Pipeline error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the core library.
    #[error("core error: {0}")]
    Core(#[from] cubeseek_core::Error),

    /// Error from file I/O.
    #[error("I/O error: {0}")]
    Io(#[from] cubeseek_io::Error),

    /// Error from the detection algorithms.
    #[error("algorithm error: {0}")]
    Algorithm(#[from] cubeseek_algorithms::Error),
}

impl From<cubeseek_core::CubeError> for Error {
    fn from(error: cubeseek_core::CubeError) -> Self {
        Self::Core(error.into())
    }
}

impl From<cubeseek_core::HeaderError> for Error {
    fn from(error: cubeseek_core::HeaderError) -> Self {
        Self::Core(error.into())
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Products of a pipeline run.
#[derive(Clone, Debug)]
pub struct RunOutput {
    /// Labelled source mask (0 = background, labels start at 1).
    pub mask: DataCube,
    /// One row per surviving source, ordered by label.
    pub sources: SourceTable,
}

/// Run the full source-finding pipeline.
///
/// A run with zero surviving sources is a clean outcome: the returned
/// table is empty and the mask all background. Failures in any stage
/// unwind here and surface as a single structured error.
pub fn run(params: &Params) -> Result<RunOutput> {
    log::info!("loading data cube '{}'", params.input.data.display());
    let mut cube = load_cube(&params.input.data, params.input.region.as_ref())?;

    if !params.input.flags.is_empty() {
        log::info!("flagging {} shape(s)", params.input.flags.len());
        cube.flag(&params.input.flags)?;
    }

    let mut filtered = false;

    if let Some(weights_path) = &params.input.weights {
        log::info!("applying weights cube '{}'", weights_path.display());
        let weights = load_cube(weights_path, params.input.region.as_ref())?;
        cube.divide(&weights)?;
        filtered = true;
    }

    if let Some(scale) = &params.scale_noise {
        match scale.mode {
            ScaleNoiseMode::Global => {
                log::info!("scaling noise per spectral channel");
                scale_noise_global(&mut cube, scale.statistic, scale.flux_range)?;
            }
            ScaleNoiseMode::Local => {
                log::info!("scaling noise in local windows");
                let noise = scale_noise_local(&mut cube, scale)?;
                if params.output.write_noise {
                    save_cube(
                        &noise,
                        &params.output_path("_noise.fits"),
                        params.output.overwrite,
                    )?;
                }
            }
        }
        filtered = true;
    }

    if filtered && params.output.write_filtered {
        save_cube(
            &cube,
            &params.output_path("_filtered.fits"),
            params.output.overwrite,
        )?;
    }

    log::info!("running S+C finder");
    let mut mask = run_scfind(&cube, &params.scfind)?;
    mask.header_mut().put_str("BUNIT", " ")?;

    // Source parameters are measured on the unfiltered data, so reload the
    // original cube when weights or noise scaling modified it.
    if filtered {
        log::info!("reloading data cube for parameterisation");
        cube = load_cube(&params.input.data, params.input.region.as_ref())?;
        if !params.input.flags.is_empty() {
            cube.flag(&params.input.flags)?;
        }
    }

    log::info!("running linker");
    let sources = run_linker(&cube, &mut mask, &params.linker)?;

    if sources.source_count() == 0 {
        log::info!("no sources left after linking");
    } else {
        log::info!("catalogued {} source(s)", sources.source_count());
    }

    if params.output.write_mask {
        save_cube(
            &mask,
            &params.output_path("_mask.fits"),
            params.output.overwrite,
        )?;
    }

    Ok(RunOutput { mask, sources })
}
