//! Error types for the detection and labelling algorithms.

use thiserror::Error;

/// Result type for algorithm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the S+C finder.
#[derive(Error, Debug)]
pub enum FinderError {
    /// Kernel list is empty.
    #[error("empty {0} kernel list")]
    EmptyKernelList(&'static str),

    /// Threshold is negative or NaN.
    #[error("invalid flux threshold {0}")]
    InvalidThreshold(f64),

    /// Replacement factor is negative or NaN.
    #[error("invalid mask replacement factor {0}")]
    InvalidReplacement(f64),

    /// A spectral kernel width is even.
    #[error("spectral kernel width {0} must be odd or zero")]
    EvenSpectralKernel(usize),
}

/// Errors raised by the linker.
#[derive(Error, Debug)]
pub enum LinkerError {
    /// An axis exceeds the 16-bit bounding-box range.
    #[error("axis {axis} size {size} exceeds the linker's 65535-voxel limit")]
    AxisTooLarge {
        /// Axis index (0 = x).
        axis: usize,
        /// Size of the offending axis.
        size: usize,
    },

    /// More sources than fit the 32-bit mask dynamic range.
    #[error("too many sources for the 32-bit dynamic range of the mask")]
    LabelOverflow,
}

/// Combined error type for the algorithms crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the S+C finder.
    #[error("finder error: {0}")]
    Finder(#[from] FinderError),

    /// Error from the linker.
    #[error("linker error: {0}")]
    Linker(#[from] LinkerError),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] cubeseek_core::Error),
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
