//! cubeseek-io: FITS-subset file I/O for the cubeseek source finder.
//!
//! The on-disk format is an ASCII header of 2880-byte blocks terminated by
//! `END`, followed by a contiguous big-endian payload padded to the next
//! block boundary.

pub mod endian;
mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{load_cube, read_header};
pub use writer::save_cube;
