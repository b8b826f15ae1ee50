//! FITS-subset writing.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use cubeseek_core::header::BLOCK_SIZE;
use cubeseek_core::DataCube;

use crate::endian;
use crate::error::{Error, Result};

/// Write `cube` to `path`.
///
/// Refuses to replace an existing file unless `overwrite` is set. The
/// header is written verbatim, the payload in big-endian order, and the
/// file is zero-padded to the next 2880-byte boundary.
pub fn save_cube(cube: &DataCube, path: &Path, overwrite: bool) -> Result<()> {
    log::info!("creating FITS file '{}'", path.display());
    let file = open_output(path, overwrite)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(cube.header().raw())?;
    endian::write_be(cube.data(), &mut writer)?;

    let payload_bytes = cube.data_size() * cube.word_size();
    let remainder = payload_bytes % BLOCK_SIZE;
    if remainder != 0 {
        writer.write_all(&vec![0_u8; BLOCK_SIZE - remainder])?;
    }

    writer.flush()?;
    Ok(())
}

fn open_output(path: &Path, overwrite: bool) -> Result<File> {
    if overwrite {
        return Ok(File::create(path)?);
    }
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|error| {
            if error.kind() == ErrorKind::AlreadyExists {
                Error::Exists(path.to_path_buf())
            } else {
                Error::Io(error)
            }
        })
}
