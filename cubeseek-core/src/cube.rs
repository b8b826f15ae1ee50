//! The data cube container.
//!
//! A [`DataCube`] owns a FITS header and a contiguous payload in one of the
//! six supported element types, `x` fastest-varying. Values live in host
//! byte order; the I/O layer converts to and from the big-endian on-disk
//! form.

use num_traits::Float;

use crate::error::CubeError;
use crate::filters;
use crate::header::Header;
use crate::stats::{self, FluxRange, NoiseStatistic};
use crate::values::FlagShape;

/// Cube payload, tagged by the FITS BITPIX element type.
#[derive(Clone, Debug, PartialEq)]
pub enum CubeData {
    /// BITPIX 8: unsigned bytes.
    U8(Vec<u8>),
    /// BITPIX 16: signed 16-bit integers.
    I16(Vec<i16>),
    /// BITPIX 32: signed 32-bit integers.
    I32(Vec<i32>),
    /// BITPIX 64: signed 64-bit integers.
    I64(Vec<i64>),
    /// BITPIX -32: IEEE single precision.
    F32(Vec<f32>),
    /// BITPIX -64: IEEE double precision.
    F64(Vec<f64>),
}

impl CubeData {
    /// Allocate a zero-filled payload for the given BITPIX.
    pub fn zeros(bitpix: i64, len: usize) -> Result<Self, CubeError> {
        match bitpix {
            8 => Ok(Self::U8(vec![0; len])),
            16 => Ok(Self::I16(vec![0; len])),
            32 => Ok(Self::I32(vec![0; len])),
            64 => Ok(Self::I64(vec![0; len])),
            -32 => Ok(Self::F32(vec![0.0; len])),
            -64 => Ok(Self::F64(vec![0.0; len])),
            other => Err(CubeError::InvalidRequest(format!(
                "invalid BITPIX value {other}"
            ))),
        }
    }

    /// FITS BITPIX code of the element type.
    pub fn bitpix(&self) -> i64 {
        match self {
            Self::U8(_) => 8,
            Self::I16(_) => 16,
            Self::I32(_) => 32,
            Self::I64(_) => 64,
            Self::F32(_) => -32,
            Self::F64(_) => -64,
        }
    }

    /// Element size in bytes.
    pub fn word_size(&self) -> usize {
        match self {
            Self::U8(_) => 1,
            Self::I16(_) => 2,
            Self::I32(_) => 4,
            Self::I64(_) => 8,
            Self::F32(_) => 4,
            Self::F64(_) => 8,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    /// Returns `true` if the payload holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` for the floating-point element types.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32(_) | Self::F64(_))
    }

    /// Element `i` widened to f64.
    #[inline]
    pub fn value_at(&self, i: usize) -> f64 {
        match self {
            Self::U8(v) => f64::from(v[i]),
            Self::I16(v) => f64::from(v[i]),
            Self::I32(v) => f64::from(v[i]),
            Self::I64(v) => v[i] as f64,
            Self::F32(v) => f64::from(v[i]),
            Self::F64(v) => v[i],
        }
    }

    /// Store `value` at element `i`, narrowing with `as`-cast semantics.
    #[inline]
    pub fn set_value_at(&mut self, i: usize, value: f64) {
        match self {
            Self::U8(v) => v[i] = value as u8,
            Self::I16(v) => v[i] = value as i16,
            Self::I32(v) => v[i] = value as i32,
            Self::I64(v) => v[i] = value as i64,
            Self::F32(v) => v[i] = value as f32,
            Self::F64(v) => v[i] = value,
        }
    }

    /// Borrow the payload as an i32 slice, if that is its type.
    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            Self::I32(v) => Some(v),
            _ => None,
        }
    }

    /// Mutably borrow the payload as an i32 slice, if that is its type.
    pub fn as_i32_mut(&mut self) -> Option<&mut [i32]> {
        match self {
            Self::I32(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the payload as an f32 slice, if that is its type.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the payload as an f64 slice, if that is its type.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Self::F64(v) => Some(v),
            _ => None,
        }
    }
}

/// A data cube: header plus typed payload plus derived axis bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct DataCube {
    header: Header,
    data: CubeData,
    axis_size: [usize; 3],
    dimension: usize,
}

impl DataCube {
    /// Create a zero-filled cube of the given size and BITPIX with a
    /// minimal valid header.
    pub fn blank(nx: usize, ny: usize, nz: usize, bitpix: i64) -> Result<Self, CubeError> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(CubeError::InvalidRequest(String::from(
                "cube axes must be non-zero",
            )));
        }
        let data = CubeData::zeros(bitpix, nx * ny * nz)?;
        let dimension = if nz > 1 {
            3
        } else if ny > 1 {
            2
        } else {
            1
        };

        let mut header = Header::new();
        // Header writes onto a fresh block cannot fail.
        let _ = header.put_bool("SIMPLE", true);
        let _ = header.put_int("BITPIX", bitpix);
        let _ = header.put_int("NAXIS", dimension as i64);
        let _ = header.put_int("NAXIS1", nx as i64);
        if dimension > 1 {
            let _ = header.put_int("NAXIS2", ny as i64);
        }
        if dimension > 2 {
            let _ = header.put_int("NAXIS3", nz as i64);
        }
        for axis in 1..=dimension {
            let _ = header.put_flt(&format!("CRPIX{axis}"), 1.0);
            let _ = header.put_flt(&format!("CDELT{axis}"), 1.0);
            let _ = header.put_flt(&format!("CRVAL{axis}"), 1.0);
        }

        Ok(Self {
            header,
            data,
            axis_size: [nx, ny, nz],
            dimension,
        })
    }

    /// Assemble a cube from a header and payload read from disk.
    pub fn from_parts(
        header: Header,
        data: CubeData,
        axis_size: [usize; 3],
        dimension: usize,
    ) -> Result<Self, CubeError> {
        let expected: usize = axis_size.iter().product();
        if data.len() != expected {
            return Err(CubeError::InvalidRequest(format!(
                "payload holds {} elements, axes require {expected}",
                data.len()
            )));
        }
        if dimension == 0 || dimension > 3 {
            return Err(CubeError::InvalidRequest(format!(
                "unsupported dimension {dimension}"
            )));
        }
        Ok(Self {
            header,
            data,
            axis_size,
            dimension,
        })
    }

    /// Borrow the header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Mutably borrow the header.
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Borrow the payload.
    pub fn data(&self) -> &CubeData {
        &self.data
    }

    /// Mutably borrow the payload.
    pub fn data_mut(&mut self) -> &mut CubeData {
        &mut self.data
    }

    /// Axis sizes `[nx, ny, nz]`.
    pub fn axis_size(&self) -> [usize; 3] {
        self.axis_size
    }

    /// Number of axes (1 to 3).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total number of voxels.
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// FITS BITPIX code of the payload.
    pub fn bitpix(&self) -> i64 {
        self.data.bitpix()
    }

    /// Element size in bytes.
    pub fn word_size(&self) -> usize {
        self.data.word_size()
    }

    /// Flat payload index of voxel `(x, y, z)`.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.axis_size[0] * (y + self.axis_size[1] * z)
    }

    fn check_bounds(&self, x: usize, y: usize, z: usize) -> Result<(), CubeError> {
        if x < self.axis_size[0] && y < self.axis_size[1] && z < self.axis_size[2] {
            Ok(())
        } else {
            Err(CubeError::IndexRange { x, y, z })
        }
    }

    /// Read the voxel at `(x, y, z)` widened to f64.
    pub fn get_flt(&self, x: usize, y: usize, z: usize) -> Result<f64, CubeError> {
        self.check_bounds(x, y, z)?;
        Ok(self.data.value_at(self.index(x, y, z)))
    }

    /// Read the voxel at `(x, y, z)` as an integer (floats truncate).
    pub fn get_int(&self, x: usize, y: usize, z: usize) -> Result<i64, CubeError> {
        self.check_bounds(x, y, z)?;
        Ok(self.data.value_at(self.index(x, y, z)) as i64)
    }

    /// Write `value` to the voxel at `(x, y, z)`, narrowing to the payload
    /// type.
    pub fn set_flt(&mut self, x: usize, y: usize, z: usize, value: f64) -> Result<(), CubeError> {
        self.check_bounds(x, y, z)?;
        let i = self.index(x, y, z);
        self.data.set_value_at(i, value);
        Ok(())
    }

    /// Integer variant of [`DataCube::set_flt`].
    pub fn set_int(&mut self, x: usize, y: usize, z: usize, value: i64) -> Result<(), CubeError> {
        self.set_flt(x, y, z, value as f64)
    }

    fn require_float(&self, what: &'static str) -> Result<(), CubeError> {
        if self.data.is_float() {
            Ok(())
        } else {
            Err(CubeError::NotFloatingPoint(what))
        }
    }

    fn require_same_shape(&self, other: &DataCube) -> Result<(), CubeError> {
        if self.axis_size == other.axis_size {
            Ok(())
        } else {
            Err(CubeError::ShapeMismatch(self.axis_size, other.axis_size))
        }
    }

    /// Standard deviation of the payload about `value` (see
    /// [`stats::std_dev_about`]). Rejects integer payloads.
    pub fn stat_std(
        &self,
        value: f64,
        cadence: usize,
        range: FluxRange,
    ) -> Result<f64, CubeError> {
        self.require_float("standard deviation")?;
        Ok(match &self.data {
            CubeData::F32(v) => stats::std_dev_about(v, value, cadence, range),
            CubeData::F64(v) => stats::std_dev_about(v, value, cadence, range),
            _ => unreachable!(),
        })
    }

    /// NaN-safe sum of the payload. Rejects integer payloads.
    pub fn stat_sum(&self) -> Result<f64, CubeError> {
        self.require_float("summation")?;
        Ok(match &self.data {
            CubeData::F32(v) => stats::nan_safe_sum(v),
            CubeData::F64(v) => stats::nan_safe_sum(v),
            _ => unreachable!(),
        })
    }

    /// Median absolute deviation about `value`. Destructive: the payload is
    /// reordered, so run this on a copy when the data still matter.
    pub fn stat_mad(&mut self, value: f64) -> Result<f64, CubeError> {
        self.require_float("median absolute deviation")?;
        Ok(match &mut self.data {
            CubeData::F32(v) => stats::mad_about(v, value),
            CubeData::F64(v) => stats::mad_about(v, value),
            _ => unreachable!(),
        })
    }

    /// Noise level of the payload using the requested statistic and flux
    /// range, subsampled by `cadence`.
    pub fn noise_level(
        &self,
        cadence: usize,
        statistic: NoiseStatistic,
        range: FluxRange,
    ) -> Result<f64, CubeError> {
        self.require_float("noise measurement")?;
        Ok(match &self.data {
            CubeData::F32(v) => stats::noise_level(v, cadence, statistic, range),
            CubeData::F64(v) => stats::noise_level(v, cadence, statistic, range),
            _ => unreachable!(),
        })
    }

    /// Convolve every spectrum with a boxcar of half-width `radius`.
    ///
    /// The radius has a floor of one channel; NaN values are zeroed per
    /// spectrum before filtering.
    pub fn boxcar(&mut self, radius: usize) -> Result<(), CubeError> {
        self.require_float("boxcar filter")?;
        let radius = radius.max(1);
        let [nx, ny, nz] = self.axis_size;

        fn run<T: Float>(data: &mut [T], nx: usize, ny: usize, nz: usize, radius: usize) {
            let mut spectrum = vec![T::zero(); nz];
            let mut scratch = vec![T::zero(); nz + 2 * radius];
            for y in 0..ny {
                for x in 0..nx {
                    for z in 0..nz {
                        spectrum[z] = data[x + nx * (y + ny * z)];
                    }
                    let replace = stats::contains_nan(&spectrum);
                    filters::boxcar_1d(&mut spectrum, &mut scratch, radius, replace);
                    for z in 0..nz {
                        data[x + nx * (y + ny * z)] = spectrum[z];
                    }
                }
            }
        }

        match &mut self.data {
            CubeData::F32(v) => run(v, nx, ny, nz, radius),
            CubeData::F64(v) => run(v, nx, ny, nz, radius),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Convolve every x-y plane with a Gaussian of standard deviation
    /// `sigma`, approximated by repeated boxcars.
    pub fn gaussian(&mut self, sigma: f64) -> Result<(), CubeError> {
        self.require_float("gaussian filter")?;
        let [nx, ny, _] = self.axis_size;
        let (radius, n_iter) = filters::optimal_filter_size(sigma);

        fn run<T: Float>(data: &mut [T], nx: usize, ny: usize, n_iter: usize, radius: usize) {
            let mut column = vec![T::zero(); ny];
            let mut row_scratch = vec![T::zero(); nx + 2 * radius];
            let mut col_scratch = vec![T::zero(); ny + 2 * radius];
            for plane in data.chunks_exact_mut(nx * ny) {
                let replace = stats::contains_nan(plane);
                filters::gauss_2d(
                    plane,
                    &mut column,
                    &mut row_scratch,
                    &mut col_scratch,
                    nx,
                    ny,
                    n_iter,
                    radius,
                    replace,
                );
            }
        }

        match &mut self.data {
            CubeData::F32(v) => run(v, nx, ny, n_iter, radius),
            CubeData::F64(v) => run(v, nx, ny, n_iter, radius),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Set `mask` to 1 wherever `|data| > threshold`.
    ///
    /// The mask must be a 32-bit integer cube of the same shape. Already-set
    /// mask values are left alone, so repeated calls accumulate detections.
    pub fn mask_32(&self, mask: &mut DataCube, threshold: f64) -> Result<(), CubeError> {
        self.require_float("masking")?;
        self.require_same_shape(mask)?;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(CubeError::InvalidThreshold(threshold));
        }
        let mask_data = mask
            .data
            .as_i32_mut()
            .ok_or(CubeError::NotMask("masking"))?;

        fn run<T: Float>(data: &[T], mask: &mut [i32], threshold: f64) {
            let pos: T = T::from(threshold).unwrap_or_else(T::infinity);
            let neg = -pos;
            for (x, m) in data.iter().zip(mask.iter_mut()) {
                if *x > pos || *x < neg {
                    *m = 1;
                }
            }
        }

        match &self.data {
            CubeData::F32(v) => run(v, mask_data, threshold),
            CubeData::F64(v) => run(v, mask_data, threshold),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Replace every voxel whose mask value is non-zero by `value` carrying
    /// the sign of the original datum.
    pub fn set_masked_32(&mut self, mask: &DataCube, value: f64) -> Result<(), CubeError> {
        self.require_float("masked replacement")?;
        self.require_same_shape(mask)?;
        let mask_data = mask
            .data
            .as_i32()
            .ok_or(CubeError::NotMask("masked replacement"))?;

        fn run<T: Float>(data: &mut [T], mask: &[i32], value: f64) {
            let v: T = T::from(value).unwrap_or_else(T::nan);
            for (x, &m) in data.iter_mut().zip(mask.iter()) {
                if m != 0 {
                    *x = v.copysign(*x);
                }
            }
        }

        match &mut self.data {
            CubeData::F32(v) => run(v, mask_data, value),
            CubeData::F64(v) => run(v, mask_data, value),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Divide the payload element-wise by `divisor` (the weights cube).
    ///
    /// Voxels whose divisor is zero or non-finite become NaN so they drop
    /// out of later statistics.
    pub fn divide(&mut self, divisor: &DataCube) -> Result<(), CubeError> {
        self.require_float("weights division")?;
        divisor.require_float("weights division")?;
        self.require_same_shape(divisor)?;

        for i in 0..self.data.len() {
            let w = divisor.data.value_at(i);
            let d = self.data.value_at(i);
            let out = if w.is_finite() && w != 0.0 {
                d / w
            } else {
                f64::NAN
            };
            self.data.set_value_at(i, out);
        }
        Ok(())
    }

    /// Blank every voxel covered by one of the flagging shapes to NaN.
    pub fn flag(&mut self, shapes: &[FlagShape]) -> Result<(), CubeError> {
        self.require_float("flagging")?;
        let [nx, ny, nz] = self.axis_size;
        for shape in shapes {
            for z in 0..nz {
                for y in 0..ny {
                    for x in 0..nx {
                        if shape.covers(x, y, z) {
                            let i = self.index(x, y, z);
                            self.data.set_value_at(i, f64::NAN);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
