//! Noise normalisation across the cube.
//!
//! Radio interferometric cubes rarely have uniform noise: it varies between
//! spectral channels and, with primary-beam corrections, across the sky.
//! Dividing the data by a local noise estimate flattens these variations so
//! a single relative threshold works everywhere.

use cubeseek_core::{stats, CubeError, DataCube, FluxRange, NoiseStatistic};

use crate::error::Result;

/// Noise scaling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScaleNoiseMode {
    /// One noise value per spectral channel.
    #[default]
    Global,
    /// Noise measured in local windows on a coarse grid.
    Local,
}

/// Noise scaling configuration.
#[derive(Clone, Debug)]
pub struct ScaleNoiseConfig {
    /// Scaling mode.
    pub mode: ScaleNoiseMode,
    /// Noise measurement statistic.
    pub statistic: NoiseStatistic,
    /// Flux range entering the noise measurement.
    pub flux_range: FluxRange,
    /// Spatial window size in pixels (local mode).
    pub window_xy: usize,
    /// Spectral window size in channels (local mode).
    pub window_z: usize,
    /// Spatial grid spacing; 0 means half the spatial window.
    pub grid_xy: usize,
    /// Spectral grid spacing; 0 means half the spectral window.
    pub grid_z: usize,
    /// Interpolate noise values between grid points.
    pub interpolate: bool,
}

impl Default for ScaleNoiseConfig {
    fn default() -> Self {
        Self {
            mode: ScaleNoiseMode::Global,
            statistic: NoiseStatistic::Std,
            flux_range: FluxRange::Negative,
            window_xy: 25,
            window_z: 15,
            grid_xy: 0,
            grid_z: 0,
            interpolate: false,
        }
    }
}

/// Divide every spectral channel by its own noise level.
///
/// Channels whose measured noise is zero or non-finite are left unchanged.
pub fn scale_noise_global(
    cube: &mut DataCube,
    statistic: NoiseStatistic,
    flux_range: FluxRange,
) -> Result<()> {
    if !cube.data().is_float() {
        return Err(CubeError::NotFloatingPoint("noise scaling").into());
    }
    let [nx, ny, nz] = cube.axis_size();
    let plane = nx * ny;

    fn run<T: num_traits::Float>(
        data: &mut [T],
        plane: usize,
        nz: usize,
        statistic: NoiseStatistic,
        flux_range: FluxRange,
    ) {
        for z in 0..nz {
            let channel = &mut data[z * plane..(z + 1) * plane];
            let noise = stats::noise_level(channel, 1, statistic, flux_range);
            if noise.is_finite() && noise > 0.0 {
                let factor = T::from(1.0 / noise).unwrap_or_else(T::one);
                for value in channel.iter_mut() {
                    *value = *value * factor;
                }
            } else {
                log::warn!("channel {z}: unusable noise level {noise}; left unscaled");
            }
        }
    }

    match cube.data_mut() {
        cubeseek_core::CubeData::F32(v) => run(v, plane, nz, statistic, flux_range),
        cubeseek_core::CubeData::F64(v) => run(v, plane, nz, statistic, flux_range),
        _ => unreachable!(),
    }
    Ok(())
}

/// Measure noise in windows centred on a coarse grid and divide it out.
///
/// Returns a cube of the noise values that were divided out of each voxel,
/// with the same element type as the input. Voxels whose local noise is
/// unusable keep their data value and record NaN in the noise cube.
pub fn scale_noise_local(cube: &mut DataCube, config: &ScaleNoiseConfig) -> Result<DataCube> {
    if !cube.data().is_float() {
        return Err(CubeError::NotFloatingPoint("noise scaling").into());
    }
    let [nx, ny, nz] = cube.axis_size();

    let window_xy = config.window_xy.max(1);
    let window_z = config.window_z.max(1);
    let grid_xy = if config.grid_xy > 0 {
        config.grid_xy
    } else {
        (window_xy / 2).max(1)
    };
    let grid_z = if config.grid_z > 0 {
        config.grid_z
    } else {
        (window_z / 2).max(1)
    };

    let cells_x = nx.div_ceil(grid_xy);
    let cells_y = ny.div_ceil(grid_xy);
    let cells_z = nz.div_ceil(grid_z);
    log::info!(
        "local noise scaling: {cells_x} x {cells_y} x {cells_z} grid cells, \
         window {window_xy} x {window_xy} x {window_z}"
    );

    // Grid-cell centre along an axis.
    let centre = |cell: usize, spacing: usize| cell * spacing + spacing / 2;
    // Inclusive window bounds around a centre, clamped to the axis.
    let window = |mid: usize, half: usize, size: usize| {
        (mid.saturating_sub(half), (mid + half).min(size - 1))
    };

    let half_xy = window_xy / 2;
    let half_z = window_z / 2;

    // Per-cell noise values.
    let mut noise = vec![f64::NAN; cells_x * cells_y * cells_z];
    let mut samples: Vec<f64> = Vec::with_capacity(window_xy * window_xy * window_z);
    for cz in 0..cells_z {
        let (z0, z1) = window(centre(cz, grid_z).min(nz - 1), half_z, nz);
        for cy in 0..cells_y {
            let (y0, y1) = window(centre(cy, grid_xy).min(ny - 1), half_xy, ny);
            for cx in 0..cells_x {
                let (x0, x1) = window(centre(cx, grid_xy).min(nx - 1), half_xy, nx);

                samples.clear();
                for z in z0..=z1 {
                    for y in y0..=y1 {
                        for x in x0..=x1 {
                            let value = cube.data().value_at(x + nx * (y + ny * z));
                            if config.flux_range.selects(value, 0.0) {
                                samples.push(value);
                            }
                        }
                    }
                }
                noise[cx + cells_x * (cy + cells_y * cz)] =
                    stats::noise_level(&samples, 1, config.statistic, FluxRange::Full);
            }
        }
    }

    // Noise value at a voxel: nearest cell, or linear interpolation between
    // neighbouring cell centres.
    let noise_at = |x: usize, y: usize, z: usize| -> f64 {
        if !config.interpolate {
            let cx = (x / grid_xy).min(cells_x - 1);
            let cy = (y / grid_xy).min(cells_y - 1);
            let cz = (z / grid_z).min(cells_z - 1);
            return noise[cx + cells_x * (cy + cells_y * cz)];
        }

        let axis = |pos: usize, spacing: usize, cells: usize| -> (usize, usize, f64) {
            let half = spacing / 2;
            if pos <= half {
                return (0, 0, 0.0);
            }
            let offset = pos - half;
            let lo = (offset / spacing).min(cells - 1);
            let hi = (lo + 1).min(cells - 1);
            let frac = (offset % spacing) as f64 / spacing as f64;
            (lo, hi, if lo == hi { 0.0 } else { frac })
        };

        let (x0, x1, fx) = axis(x, grid_xy, cells_x);
        let (y0, y1, fy) = axis(y, grid_xy, cells_y);
        let (z0, z1, fz) = axis(z, grid_z, cells_z);
        let at = |cx: usize, cy: usize, cz: usize| noise[cx + cells_x * (cy + cells_y * cz)];

        let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;
        let c00 = lerp(at(x0, y0, z0), at(x1, y0, z0), fx);
        let c10 = lerp(at(x0, y1, z0), at(x1, y1, z0), fx);
        let c01 = lerp(at(x0, y0, z1), at(x1, y0, z1), fx);
        let c11 = lerp(at(x0, y1, z1), at(x1, y1, z1), fx);
        lerp(lerp(c00, c10, fy), lerp(c01, c11, fy), fz)
    };

    let mut noise_cube = DataCube::blank(nx, ny, nz, cube.bitpix())?;
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let index = x + nx * (y + ny * z);
                let local = noise_at(x, y, z);
                if local.is_finite() && local > 0.0 {
                    let value = cube.data().value_at(index);
                    cube.data_mut().set_value_at(index, value / local);
                    noise_cube.data_mut().set_value_at(index, local);
                } else {
                    noise_cube.data_mut().set_value_at(index, f64::NAN);
                }
            }
        }
    }

    Ok(noise_cube)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_scaling_equalises_channels() {
        // Two channels with noise 1 and 4 (two-point distributions).
        let mut cube = DataCube::blank(2, 2, 2, -64).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                let sign = if x == 0 { 1.0 } else { -1.0 };
                cube.set_flt(x, y, 0, sign).unwrap();
                cube.set_flt(x, y, 1, 4.0 * sign).unwrap();
            }
        }
        scale_noise_global(&mut cube, NoiseStatistic::Std, FluxRange::Full).unwrap();
        for z in 0..2 {
            let noise = cube.stat_std(0.0, 1, FluxRange::Full).unwrap();
            assert!(noise.is_finite());
            for y in 0..2 {
                for x in 0..2 {
                    assert!((cube.get_flt(x, y, z).unwrap().abs() - 1.0).abs() < 1.0e-12);
                }
            }
        }
    }

    #[test]
    fn test_global_scaling_leaves_dead_channel() {
        let mut cube = DataCube::blank(2, 1, 2, -32).unwrap();
        cube.set_flt(0, 0, 1, 3.0).unwrap();
        cube.set_flt(1, 0, 1, -3.0).unwrap();
        // Channel 0 is all zero: noise 0, left unscaled.
        scale_noise_global(&mut cube, NoiseStatistic::Std, FluxRange::Full).unwrap();
        assert_eq!(cube.get_flt(0, 0, 0).unwrap(), 0.0);
        assert!((cube.get_flt(0, 0, 1).unwrap() - 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn test_global_scaling_rejects_integer_cube() {
        let mut cube = DataCube::blank(2, 2, 2, 32).unwrap();
        assert!(scale_noise_global(&mut cube, NoiseStatistic::Std, FluxRange::Full).is_err());
    }

    #[test]
    fn test_local_scaling_flattens_spatial_gradient() {
        // Left half has noise 1, right half noise 5.
        let (nx, ny, nz) = (16, 8, 8);
        let mut cube = DataCube::blank(nx, ny, nz, -64).unwrap();
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let sign = if (x + y + z) % 2 == 0 { 1.0 } else { -1.0 };
                    let scale = if x < nx / 2 { 1.0 } else { 5.0 };
                    cube.set_flt(x, y, z, sign * scale).unwrap();
                }
            }
        }

        let config = ScaleNoiseConfig {
            mode: ScaleNoiseMode::Local,
            window_xy: 7,
            window_z: 7,
            grid_xy: 8,
            grid_z: 8,
            ..ScaleNoiseConfig::default()
        };
        let mut scaled = cube.clone();
        let noise_cube = scale_noise_local(&mut scaled, &config).unwrap();

        // Windows that stay on one side of the step scale to unit amplitude.
        assert!((scaled.get_flt(1, 4, 4).unwrap().abs() - 1.0).abs() < 1.0e-9);
        assert!((scaled.get_flt(14, 4, 4).unwrap().abs() - 1.0).abs() < 1.0e-9);
        // The noise cube records a larger value on the noisy side.
        let low = noise_cube.get_flt(1, 4, 4).unwrap();
        let high = noise_cube.get_flt(14, 4, 4).unwrap();
        assert!(high > low, "high = {high}, low = {low}");
    }

    #[test]
    fn test_local_scaling_interpolation_is_smooth() {
        let (nx, ny, nz) = (12, 4, 4);
        let mut cube = DataCube::blank(nx, ny, nz, -64).unwrap();
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let sign = if (x + y + z) % 2 == 0 { 1.0 } else { -1.0 };
                    let scale = 1.0 + x as f64;
                    cube.set_flt(x, y, z, sign * scale).unwrap();
                }
            }
        }
        let config = ScaleNoiseConfig {
            mode: ScaleNoiseMode::Local,
            window_xy: 4,
            window_z: 4,
            grid_xy: 4,
            grid_z: 4,
            interpolate: true,
            ..ScaleNoiseConfig::default()
        };
        let noise_cube = scale_noise_local(&mut cube, &config).unwrap();

        // Interpolated noise grows monotonically along the gradient between
        // the first and last grid centres.
        let mut previous = 0.0;
        for x in 2..10 {
            let value = noise_cube.get_flt(x, 2, 2).unwrap();
            assert!(value >= previous, "noise not monotone at x = {x}");
            previous = value;
        }
    }
}
