//! I/O error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output file exists and overwriting was not requested.
    #[error("file '{0}' already exists and overwrite is disabled")]
    Exists(PathBuf),

    /// Stream does not start with a SIMPLE record.
    #[error("file does not appear to be a FITS file")]
    NotFits,

    /// Header ended without an END record.
    #[error("file ended unexpectedly while reading header")]
    TruncatedHeader,

    /// Payload is shorter than the header promises.
    #[error("file ended unexpectedly while reading data")]
    TruncatedPayload,

    /// BITPIX outside the supported set.
    #[error("invalid BITPIX keyword: {0}")]
    UnsupportedBitpix(i64),

    /// NAXIS outside 1 to 4.
    #[error("only files with 1 to 4 dimensions are supported, found NAXIS = {0}")]
    UnsupportedNaxis(i64),

    /// Fourth axis longer than one sample.
    #[error("the size of the 4th axis must be <= 1, found {0}")]
    FourthAxis(i64),

    /// Axis with a missing or non-positive size.
    #[error("axis {0} has invalid size {1}")]
    InvalidAxis(usize, i64),

    /// Non-trivial BSCALE/BZERO scaling is not supported.
    #[error("non-trivial BSCALE ({bscale}) and BZERO ({bzero}) not supported")]
    NonTrivialScaling {
        /// BSCALE value found in the header.
        bscale: f64,
        /// BZERO value found in the header.
        bzero: f64,
    },

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] cubeseek_core::Error),
}

impl From<cubeseek_core::HeaderError> for Error {
    fn from(error: cubeseek_core::HeaderError) -> Self {
        Self::Core(error.into())
    }
}

impl From<cubeseek_core::CubeError> for Error {
    fn from(error: cubeseek_core::CubeError) -> Self {
        Self::Core(error.into())
    }
}
