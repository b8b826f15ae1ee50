//! Pipeline parameters.

use std::path::PathBuf;

use cubeseek_algorithms::{LinkerConfig, ScFindConfig, ScaleNoiseConfig};
use cubeseek_core::{FlagShape, Region};

/// Input selection.
#[derive(Clone, Debug, Default)]
pub struct InputParams {
    /// Path of the input data cube.
    pub data: PathBuf,
    /// Optional weights cube the data are divided by.
    pub weights: Option<PathBuf>,
    /// Optional sub-cube region to load.
    pub region: Option<Region>,
    /// Voxel sets to blank before any processing.
    pub flags: Vec<FlagShape>,
}

/// Output selection.
#[derive(Clone, Debug)]
pub struct OutputParams {
    /// Output directory; the input cube's directory when `None`.
    pub directory: Option<PathBuf>,
    /// Base name for output files; the input file stem when `None`.
    pub base_name: Option<String>,
    /// Write the labelled mask cube.
    pub write_mask: bool,
    /// Write the filtered (weighted/noise-scaled) cube.
    pub write_filtered: bool,
    /// Write the local noise cube.
    pub write_noise: bool,
    /// Replace existing output files.
    pub overwrite: bool,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            directory: None,
            base_name: None,
            write_mask: true,
            write_filtered: false,
            write_noise: false,
            overwrite: false,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Clone, Debug, Default)]
pub struct Params {
    /// Input selection.
    pub input: InputParams,
    /// Noise scaling stage; `None` disables the stage.
    pub scale_noise: Option<ScaleNoiseConfig>,
    /// S+C finder configuration.
    pub scfind: ScFindConfig,
    /// Linker configuration.
    pub linker: LinkerConfig,
    /// Output selection.
    pub output: OutputParams,
}

impl Params {
    /// Parameters for finding sources in `data` with all defaults.
    pub fn new(data: PathBuf) -> Self {
        Self {
            input: InputParams {
                data,
                ..InputParams::default()
            },
            ..Self::default()
        }
    }

    /// Directory receiving output products.
    pub fn output_directory(&self) -> PathBuf {
        if let Some(dir) = &self.output.directory {
            return dir.clone();
        }
        self.input
            .data
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default()
    }

    /// Path of an output product with the given suffix, e.g. `_mask.fits`.
    pub fn output_path(&self, suffix: &str) -> PathBuf {
        let stem = match &self.output.base_name {
            Some(name) => name.clone(),
            None => self
                .input
                .data
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| String::from("output")),
        };
        self.output_directory().join(format!("{stem}{suffix}"))
    }
}
