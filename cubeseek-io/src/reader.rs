//! FITS-subset reading.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use cubeseek_core::header::{BLOCK_SIZE, RECORD_SIZE};
use cubeseek_core::{DataCube, Header, Region};

use crate::endian;
use crate::error::{Error, Result};

/// Read 2880-byte header blocks from `reader` until an `END` record.
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    let mut raw = Vec::with_capacity(BLOCK_SIZE);
    loop {
        let start = raw.len();
        raw.resize(start + BLOCK_SIZE, 0);
        reader
            .read_exact(&mut raw[start..])
            .map_err(|_| Error::TruncatedHeader)?;

        let end_found = raw[start..]
            .chunks_exact(RECORD_SIZE)
            .any(|record| record.starts_with(b"END") && (record[3] == b' ' || record[3] == b'='));
        if end_found {
            return Ok(Header::from_raw(raw)?);
        }
    }
}

/// Parse and validate the structural keywords of a cube header.
///
/// Returns `(bitpix, dimension, axis_size)` with missing trailing axes
/// normalised to size 1.
fn parse_structure(header: &Header) -> Result<(i64, usize, [usize; 3])> {
    let bitpix = header.get_int("BITPIX");
    if !matches!(bitpix, -64 | -32 | 8 | 16 | 32 | 64) {
        return Err(Error::UnsupportedBitpix(bitpix));
    }

    let naxis = header.get_int("NAXIS");
    if !(1..=4).contains(&naxis) {
        return Err(Error::UnsupportedNaxis(naxis));
    }
    if naxis == 4 {
        let naxis4 = header.get_int("NAXIS4");
        if naxis4 > 1 {
            return Err(Error::FourthAxis(naxis4));
        }
    }

    let bscale = header.get_flt("BSCALE");
    let bzero = header.get_flt("BZERO");
    if !((bscale.is_nan() || bscale == 1.0) && (bzero.is_nan() || bzero == 0.0)) {
        return Err(Error::NonTrivialScaling { bscale, bzero });
    }

    let dimension = (naxis as usize).min(3);
    let mut axis_size = [1_usize; 3];
    for (axis, slot) in axis_size.iter_mut().enumerate().take(dimension) {
        let size = header.get_int(&format!("NAXIS{}", axis + 1));
        if size <= 0 {
            return Err(Error::InvalidAxis(axis + 1, size));
        }
        *slot = size as usize;
    }

    Ok((bitpix, dimension, axis_size))
}

/// Load a data cube, optionally restricted to a sub-cube region.
///
/// The cube must have 1 to 3 dimensions (a fourth axis of size 1 is
/// tolerated). When a region is given, only the selected rows are read via
/// per-row seeks, and the `NAXIS*`/`CRPIX*` keywords are rewritten so pixel
/// coordinates become relative to the new origin.
pub fn load_cube(path: &Path, region: Option<&Region>) -> Result<DataCube> {
    log::info!("opening FITS file '{}'", path.display());
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut header = read_header(&mut reader)?;
    if !header.raw().starts_with(b"SIMPLE") {
        return Err(Error::NotFits);
    }

    let (bitpix, dimension, full_size) = parse_structure(&header)?;
    let word_size = (bitpix.unsigned_abs() / 8) as usize;

    log::info!(
        "reading FITS data: type {bitpix}, {dimension} axes, {} x {} x {}",
        full_size[0],
        full_size[1],
        full_size[2]
    );

    let (data, axis_size) = match region {
        None => {
            let total: usize = full_size.iter().product();
            let mut bytes = vec![0_u8; total * word_size];
            reader
                .read_exact(&mut bytes)
                .map_err(|_| Error::TruncatedPayload)?;
            (endian::data_from_be(bitpix, &bytes)?, full_size)
        }
        Some(region) => {
            let [(x_min, x_max), (y_min, y_max), (z_min, z_max)] = region.clip(full_size);
            let region_nx = x_max - x_min + 1;
            let region_ny = y_max - y_min + 1;
            let region_nz = z_max - z_min + 1;
            log::info!(
                "region: {x_min}-{x_max}, {y_min}-{y_max}, {z_min}-{z_max}"
            );

            let data_start = header.size() as u64;
            let mut bytes = Vec::with_capacity(region_nx * region_ny * region_nz * word_size);
            let mut row = vec![0_u8; region_nx * word_size];
            for z in z_min..=z_max {
                for y in y_min..=y_max {
                    let index = x_min + full_size[0] * (y + full_size[1] * z);
                    reader.seek(SeekFrom::Start(data_start + (index * word_size) as u64))?;
                    reader
                        .read_exact(&mut row)
                        .map_err(|_| Error::TruncatedPayload)?;
                    bytes.extend_from_slice(&row);
                }
            }

            // Make subsequent pixel coordinates relative to the new origin.
            for (axis, (size, offset)) in [
                (region_nx, x_min),
                (region_ny, y_min),
                (region_nz, z_min),
            ]
            .into_iter()
            .enumerate()
            {
                let naxis_key = format!("NAXIS{}", axis + 1);
                if header.contains(&naxis_key) {
                    header.put_int(&naxis_key, size as i64)?;
                }
                let crpix_key = format!("CRPIX{}", axis + 1);
                if header.contains(&crpix_key) {
                    let crpix = header.get_flt(&crpix_key);
                    header.put_flt(&crpix_key, crpix - offset as f64)?;
                }
            }

            (
                endian::data_from_be(bitpix, &bytes)?,
                [region_nx, region_ny, region_nz],
            )
        }
    };

    Ok(DataCube::from_parts(header, data, axis_size, dimension)?)
}
