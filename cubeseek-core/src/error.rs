//! Error types for cubeseek-core.

use thiserror::Error;

/// Errors raised by header operations.
#[derive(Error, Debug)]
pub enum HeaderError {
    /// Requested keyword is not present in the header.
    #[error("header keyword '{0}' not found")]
    KeyMissing(String),

    /// Keyword is empty or longer than the 8-byte keyword field.
    #[error("illegal header keyword '{0}'")]
    IllegalKeyword(String),

    /// A string read was requested but the value field carries no quoted string.
    #[error("header entry '{0}' is not a string")]
    NotAString(String),

    /// A string value field has an opening quote without a closing one.
    #[error("unbalanced quotation marks in header entry '{0}'")]
    UnbalancedQuotes(String),

    /// String value does not fit into a header record.
    #[error("value of length {len} too long for header entry '{key}'")]
    ValueTooLong {
        /// Keyword of the offending record.
        key: String,
        /// Length of the rejected value in bytes.
        len: usize,
    },
}

/// Errors raised by data cube operations.
#[derive(Error, Debug)]
pub enum CubeError {
    /// Voxel coordinate outside the cube boundaries.
    #[error("position ({x}, {y}, {z}) outside of cube boundaries")]
    IndexRange {
        /// Requested x coordinate.
        x: usize,
        /// Requested y coordinate.
        y: usize,
        /// Requested z coordinate.
        z: usize,
    },

    /// Operation requires a floating-point payload.
    #[error("{0} requires a floating-point cube")]
    NotFloatingPoint(&'static str),

    /// Operation requires a 32-bit integer mask payload.
    #[error("{0} requires a 32-bit integer mask cube")]
    NotMask(&'static str),

    /// Two cubes that must match in shape do not.
    #[error("cube sizes differ: {0:?} vs {1:?}")]
    ShapeMismatch([usize; 3], [usize; 3]),

    /// Threshold is negative or NaN.
    #[error("invalid threshold {0}")]
    InvalidThreshold(f64),

    /// A cube dimension or data type argument is out of range.
    #[error("invalid cube request: {0}")]
    InvalidRequest(String),
}

/// Errors raised while parsing value containers.
#[derive(Error, Debug)]
pub enum ValueError {
    /// A list element failed to parse as the requested kind.
    #[error("failed to parse '{0}' as {1}")]
    Parse(String, &'static str),

    /// A container has the wrong number of elements.
    #[error("expected {expected} values, found {found}")]
    WrongLength {
        /// Number of elements required by the container kind.
        expected: usize,
        /// Number of elements supplied.
        found: usize,
    },

    /// Region bounds with minimum greater than maximum.
    #[error("invalid region: minimum greater than maximum on axis {0}")]
    MinExceedsMax(usize),

    /// Unknown flagging shape keyword.
    #[error("unknown flagging shape '{0}'")]
    UnknownShape(String),
}

/// Combined error type for the core crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the header store.
    #[error("header error: {0}")]
    Header(#[from] HeaderError),

    /// Error from cube operations.
    #[error("cube error: {0}")]
    Cube(#[from] CubeError),

    /// Error from value container parsing.
    #[error("value error: {0}")]
    Value(#[from] ValueError),
}

/// Result type alias using the combined core error.
pub type Result<T> = std::result::Result<T, Error>;
