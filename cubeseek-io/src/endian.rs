//! Big-endian payload conversion.
//!
//! FITS stores binary data most-significant byte first; in memory the cube
//! holds native-endian typed vectors. Conversion happens once at the I/O
//! boundary in both directions.

use std::io::Write;

use cubeseek_core::CubeData;

use crate::error::{Error, Result};

macro_rules! from_be {
    ($bytes:expr, $ty:ty) => {
        $bytes
            .chunks_exact(std::mem::size_of::<$ty>())
            .map(|chunk| {
                let mut word = [0_u8; std::mem::size_of::<$ty>()];
                word.copy_from_slice(chunk);
                <$ty>::from_be_bytes(word)
            })
            .collect()
    };
}

/// Decode a big-endian byte buffer into a typed payload for `bitpix`.
///
/// The buffer length must be an exact multiple of the element size.
pub fn data_from_be(bitpix: i64, bytes: &[u8]) -> Result<CubeData> {
    let data = match bitpix {
        8 => CubeData::U8(bytes.to_vec()),
        16 => CubeData::I16(from_be!(bytes, i16)),
        32 => CubeData::I32(from_be!(bytes, i32)),
        64 => CubeData::I64(from_be!(bytes, i64)),
        -32 => CubeData::F32(from_be!(bytes, f32)),
        -64 => CubeData::F64(from_be!(bytes, f64)),
        other => return Err(Error::UnsupportedBitpix(other)),
    };
    Ok(data)
}

/// Stream a typed payload to `writer` in big-endian byte order.
///
/// The in-memory payload is left untouched; conversion happens per element
/// on the way out.
pub fn write_be<W: Write>(data: &CubeData, writer: &mut W) -> std::io::Result<()> {
    match data {
        CubeData::U8(values) => writer.write_all(values)?,
        CubeData::I16(values) => {
            for value in values {
                writer.write_all(&value.to_be_bytes())?;
            }
        }
        CubeData::I32(values) => {
            for value in values {
                writer.write_all(&value.to_be_bytes())?;
            }
        }
        CubeData::I64(values) => {
            for value in values {
                writer.write_all(&value.to_be_bytes())?;
            }
        }
        CubeData::F32(values) => {
            for value in values {
                writer.write_all(&value.to_be_bytes())?;
            }
        }
        CubeData::F64(values) => {
            for value in values {
                writer.write_all(&value.to_be_bytes())?;
            }
        }
    }
    Ok(())
}
