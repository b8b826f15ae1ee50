//! The Smooth + Clip source finder.
//!
//! The finder smooths the cube on a grid of spatial Gaussian and spectral
//! boxcar scales, re-measures the noise after every smoothing step, and
//! accumulates all pixels beyond the relative threshold into a 32-bit
//! union mask.

use cubeseek_core::{CubeError, DataCube, FluxRange, NoiseStatistic};

use crate::error::{FinderError, Result};

/// Conversion between the FWHM and the sigma of a Gaussian.
const FWHM_CONST: f64 = 2.3548200450309493;

/// Cap on the number of samples entering a noise measurement.
const MAX_NOISE_SAMPLES: f64 = 1.0e6;

/// S+C finder configuration.
#[derive(Clone, Debug)]
pub struct ScFindConfig {
    /// Spatial kernel FWHMs in pixels; 0 means no spatial smoothing.
    pub kernels_xy: Vec<f64>,
    /// Spectral boxcar widths in channels; must be odd or 0.
    pub kernels_z: Vec<usize>,
    /// Detection threshold in multiples of the local noise.
    pub threshold: f64,
    /// Detected pixels are replaced by this multiple of the original noise
    /// before each smoothing pass.
    pub replacement: f64,
    /// Noise measurement statistic.
    pub statistic: NoiseStatistic,
    /// Flux range entering the noise measurement.
    pub flux_range: FluxRange,
}

impl Default for ScFindConfig {
    fn default() -> Self {
        Self {
            kernels_xy: vec![0.0, 3.0, 6.0],
            kernels_z: vec![0, 3, 7, 15],
            threshold: 5.0,
            replacement: 2.0,
            statistic: NoiseStatistic::Std,
            flux_range: FluxRange::Negative,
        }
    }
}

impl ScFindConfig {
    /// Set the spatial kernel list.
    pub fn with_kernels_xy(mut self, kernels: Vec<f64>) -> Self {
        self.kernels_xy = kernels;
        self
    }

    /// Set the spectral kernel list.
    pub fn with_kernels_z(mut self, kernels: Vec<usize>) -> Self {
        self.kernels_z = kernels;
        self
    }

    /// Set the detection threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the mask replacement factor.
    pub fn with_replacement(mut self, replacement: f64) -> Self {
        self.replacement = replacement;
        self
    }

    /// Set the noise statistic.
    pub fn with_statistic(mut self, statistic: NoiseStatistic) -> Self {
        self.statistic = statistic;
        self
    }

    /// Set the flux range.
    pub fn with_flux_range(mut self, flux_range: FluxRange) -> Self {
        self.flux_range = flux_range;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.kernels_xy.is_empty() {
            return Err(FinderError::EmptyKernelList("spatial").into());
        }
        if self.kernels_z.is_empty() {
            return Err(FinderError::EmptyKernelList("spectral").into());
        }
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(FinderError::InvalidThreshold(self.threshold).into());
        }
        if self.replacement.is_nan() || self.replacement < 0.0 {
            return Err(FinderError::InvalidReplacement(self.replacement).into());
        }
        for &width in &self.kernels_z {
            if width != 0 && width % 2 == 0 {
                return Err(FinderError::EvenSpectralKernel(width).into());
            }
        }
        Ok(())
    }
}

/// WCS keywords copied from the input cube onto the mask.
const WCS_STR_KEYS: [&str; 3] = ["CTYPE1", "CTYPE2", "CTYPE3"];
const WCS_FLT_KEYS: [&str; 10] = [
    "CRVAL1", "CRVAL2", "CRVAL3", "CRPIX1", "CRPIX2", "CRPIX3", "CDELT1", "CDELT2", "CDELT3",
    "EPOCH",
];

fn copy_wcs(cube: &DataCube, mask: &mut DataCube) -> Result<()> {
    for key in WCS_STR_KEYS {
        if cube.header().contains(key) {
            let value = cube.header().get_str(key)?;
            mask.header_mut().put_str(key, &value)?;
        }
    }
    for key in WCS_FLT_KEYS {
        if cube.header().contains(key) {
            let value = cube.header().get_flt(key);
            mask.header_mut().put_flt(key, value)?;
        }
    }
    Ok(())
}

/// Run the S+C finder on `cube`.
///
/// Returns a fresh 32-bit mask cube of the same shape with detected pixels
/// set to 1, background to 0, and the input's WCS keywords copied across.
pub fn run_scfind(cube: &DataCube, config: &ScFindConfig) -> Result<DataCube> {
    if !cube.data().is_float() {
        return Err(CubeError::NotFloatingPoint("S+C finder").into());
    }
    config.validate()?;

    let [nx, ny, nz] = cube.axis_size();
    let mut mask = DataCube::blank(nx, ny, nz, 32)?;
    copy_wcs(cube, &mut mask)?;

    // Subsampling stride capping the noise measurement cost.
    let sample = ((cube.data_size() as f64 / MAX_NOISE_SAMPLES).cbrt() as usize).max(1);

    let rms = cube.noise_level(sample, config.statistic, config.flux_range)?;
    log::info!("initial noise level: {rms:.3e} (sampling every {sample} voxel(s))");

    // Threshold the unsmoothed cube first.
    cube.mask_32(&mut mask, config.threshold * rms)?;

    for &kernel_xy in &config.kernels_xy {
        for &kernel_z in &config.kernels_z {
            if kernel_xy == 0.0 && kernel_z == 0 {
                continue;
            }
            log::info!("smoothing kernel: [{kernel_xy:.1}] x [{kernel_z}]");

            let mut smoothed = cube.clone();
            smoothed.set_masked_32(&mask, config.replacement * rms)?;

            if kernel_xy > 0.0 {
                smoothed.gaussian(kernel_xy / FWHM_CONST)?;
            }
            if kernel_z > 0 {
                smoothed.boxcar(kernel_z / 2)?;
            }

            let rms_smoothed =
                smoothed.noise_level(sample, config.statistic, config.flux_range)?;
            smoothed.mask_32(&mut mask, config.threshold * rms_smoothed)?;
        }
    }

    let candidates = mask
        .data()
        .as_i32()
        .map(|m| m.iter().filter(|&&v| v != 0).count())
        .unwrap_or(0);
    if candidates == 0 {
        log::warn!("S+C finder detected no candidate pixels");
    } else {
        log::info!("S+C finder detected {candidates} candidate pixel(s)");
    }

    Ok(mask)
}
