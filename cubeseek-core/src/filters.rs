//! Boxcar and Gaussian smoothing kernels.
//!
//! The Gaussian is approximated by repeated boxcar passes, which keeps the
//! whole smoothing stage in O(n) per axis independent of kernel size. All
//! routines run on caller-supplied scratch buffers and exist as one generic
//! body instantiated at f32 and f64.

use num_traits::Float;

/// Maximum number of boxcar iterations used to approximate a Gaussian.
const BOXCAR_MAX_ITER: usize = 4;

fn cast<T: Float>(x: f64) -> T {
    T::from(x).unwrap_or_else(T::nan)
}

/// Symmetric boxcar filter of half-width `radius` applied in place.
///
/// `scratch` must hold `data.len() + 2 * radius` elements; both overhangs
/// are zero-padded. When `replace_nan` is set, NaN values are zeroed before
/// filtering. The filter runs as a rolling sum seeded at the last sample
/// and propagated backwards; the evaluation order is fixed so repeated runs
/// agree bit for bit.
pub fn boxcar_1d<T: Float>(data: &mut [T], scratch: &mut [T], radius: usize, replace_nan: bool) {
    let size = data.len();
    if size == 0 {
        return;
    }
    debug_assert!(scratch.len() >= size + 2 * radius);

    let filter_size = 2 * radius + 1;
    let inv: T = cast(1.0 / filter_size as f64);

    if replace_nan {
        for x in data.iter_mut() {
            if x.is_nan() {
                *x = T::zero();
            }
        }
    }

    scratch[radius..radius + size].copy_from_slice(data);
    for i in 0..radius {
        scratch[i] = T::zero();
        scratch[size + radius + i] = T::zero();
    }

    // Window sum for the last sample, accumulated back to front.
    let mut acc = T::zero();
    for i in (0..filter_size).rev() {
        acc = acc + scratch[size + i - 1];
    }
    data[size - 1] = acc * inv;

    // Roll the window towards the front.
    for i in (0..size - 1).rev() {
        data[i] = data[i + 1] + (scratch[i] - scratch[filter_size + i]) * inv;
    }
}

/// Separable Gaussian filter over one x-y plane.
///
/// Approximated by `n_iter` boxcar passes of half-width `radius` along the
/// rows and then along the columns. NaN substitution happens once for the
/// whole plane; the individual boxcar passes never re-check.
#[allow(clippy::too_many_arguments)]
pub fn gauss_2d<T: Float>(
    plane: &mut [T],
    column: &mut [T],
    row_scratch: &mut [T],
    col_scratch: &mut [T],
    nx: usize,
    ny: usize,
    n_iter: usize,
    radius: usize,
    replace_nan: bool,
) {
    debug_assert_eq!(plane.len(), nx * ny);
    debug_assert!(column.len() >= ny);

    if replace_nan {
        for x in plane.iter_mut() {
            if x.is_nan() {
                *x = T::zero();
            }
        }
    }

    // Rows are contiguous in memory.
    for row in plane.chunks_exact_mut(nx) {
        for _ in 0..n_iter {
            boxcar_1d(row, row_scratch, radius, false);
        }
    }

    // Columns go through a gather/scatter copy.
    for x in 0..nx {
        for y in 0..ny {
            column[y] = plane[y * nx + x];
        }
        for _ in 0..n_iter {
            boxcar_1d(&mut column[..ny], col_scratch, radius, false);
        }
        for y in 0..ny {
            plane[y * nx + x] = column[y];
        }
    }
}

/// Boxcar half-width and iteration count approximating a Gaussian of
/// standard deviation `sigma`.
///
/// `n` repeated boxcars of half-width `r` have an effective variance of
/// `n·((2r+1)² − 1)/12`; the scan keeps the `(r, n)` pair whose ideal radius
/// lands closest to an integer.
pub fn optimal_filter_size(sigma: f64) -> (usize, usize) {
    let mut filter_radius = 0;
    let mut n_iter = 0;
    let mut best = -1.0_f64;

    for i in 0..BOXCAR_MAX_ITER {
        let radius = (3.0 * sigma * sigma / (i + 1) as f64 + 0.25).sqrt() - 0.5;
        let diff = (radius - (radius + 0.5).floor()).abs();
        if best < 0.0 || diff < best {
            best = diff;
            n_iter = i + 1;
            filter_radius = (radius + 0.5) as usize;
        }
    }

    let sigma_approx = (n_iter as f64
        * ((2.0 * filter_radius as f64 + 1.0).powi(2) - 1.0)
        / 12.0)
        .sqrt();
    log::debug!(
        "gaussian filter: requested sigma = {sigma:.2}, approximated sigma = {sigma_approx:.2}, \
         iterations = {n_iter}, radius = {filter_radius}"
    );

    (filter_radius, n_iter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxcar(data: &[f64], radius: usize, replace_nan: bool) -> Vec<f64> {
        let mut out = data.to_vec();
        let mut scratch = vec![0.0; data.len() + 2 * radius];
        boxcar_1d(&mut out, &mut scratch, radius, replace_nan);
        out
    }

    #[test]
    fn test_boxcar_impulse() {
        let out = boxcar(&[0.0, 0.0, 3.0, 0.0, 0.0], 1, false);
        for (got, want) in out.iter().zip([0.0, 1.0, 1.0, 1.0, 0.0]) {
            assert!((got - want).abs() < 1.0e-12, "{out:?}");
        }
    }

    #[test]
    fn test_boxcar_zero_padding_at_edges() {
        let out = boxcar(&[6.0, 6.0, 6.0], 1, false);
        // Edge windows see one zero-padded neighbour.
        assert!((out[0] - 4.0).abs() < 1.0e-12);
        assert!((out[1] - 6.0).abs() < 1.0e-12);
        assert!((out[2] - 4.0).abs() < 1.0e-12);
    }

    #[test]
    fn test_boxcar_preserves_total_flux_interior() {
        let data = [0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0];
        let out = boxcar(&data, 1, false);
        let sum: f64 = out.iter().sum();
        assert!((sum - 5.0).abs() < 1.0e-12);
    }

    #[test]
    fn test_boxcar_nan_replaced_with_zero() {
        let out = boxcar(&[0.0, f64::NAN, 3.0], 1, true);
        let clean = boxcar(&[0.0, 0.0, 3.0], 1, false);
        assert_eq!(out, clean);
    }

    #[test]
    fn test_boxcar_nan_free_input_identical_with_and_without_nan_path() {
        let data = [0.25, -1.5, 3.0, 0.5, -0.125];
        let with = boxcar(&data, 2, true);
        let without = boxcar(&data, 2, false);
        assert_eq!(with, without);
    }

    #[test]
    fn test_boxcar_linearity() {
        let a = [1.0, -2.0, 0.5, 3.0, -0.25, 1.5];
        let b = [0.5, 0.5, -1.0, 2.0, 4.0, -3.0];
        let (alpha, beta) = (2.0, -0.5);
        let combined: Vec<f64> = a
            .iter()
            .zip(&b)
            .map(|(&x, &y)| alpha * x + beta * y)
            .collect();
        let filtered_combined = boxcar(&combined, 1, false);
        let fa = boxcar(&a, 1, false);
        let fb = boxcar(&b, 1, false);
        for i in 0..a.len() {
            let expect = alpha * fa[i] + beta * fb[i];
            assert!((filtered_combined[i] - expect).abs() < 1.0e-12);
        }
    }

    #[test]
    fn test_boxcar_f32_matches_f64_closely() {
        let data64 = [1.0_f64, 2.0, 3.0, 4.0, 5.0];
        let data32: Vec<f32> = data64.iter().map(|&x| x as f32).collect();
        let out64 = boxcar(&data64, 1, false);
        let mut out32 = data32.clone();
        let mut scratch = vec![0.0_f32; data32.len() + 2];
        boxcar_1d(&mut out32, &mut scratch, 1, false);
        for (a, b) in out64.iter().zip(&out32) {
            assert!((a - *b as f64).abs() < 1.0e-6);
        }
    }

    #[test]
    fn test_gauss_2d_impulse_is_symmetric_and_normalised() {
        let (nx, ny) = (11, 11);
        let mut plane = vec![0.0_f64; nx * ny];
        plane[5 * nx + 5] = 1.0;

        let (radius, n_iter) = optimal_filter_size(1.5);
        let mut column = vec![0.0; ny];
        let mut row_scratch = vec![0.0; nx + 2 * radius];
        let mut col_scratch = vec![0.0; ny + 2 * radius];
        gauss_2d(
            &mut plane,
            &mut column,
            &mut row_scratch,
            &mut col_scratch,
            nx,
            ny,
            n_iter,
            radius,
            false,
        );

        let sum: f64 = plane.iter().sum();
        assert!((sum - 1.0).abs() < 1.0e-9, "sum = {sum}");
        // Reflection symmetry about the centre.
        for y in 0..ny {
            for x in 0..nx {
                let mirrored = plane[(ny - 1 - y) * nx + (nx - 1 - x)];
                assert!((plane[y * nx + x] - mirrored).abs() < 1.0e-12);
            }
        }
        // The peak stays at the centre.
        let peak = plane
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(plane[5 * nx + 5], peak);
    }

    #[test]
    fn test_gauss_2d_nan_plane_substitution() {
        let (nx, ny) = (4, 3);
        let mut with_nan = vec![1.0_f64; nx * ny];
        with_nan[5] = f64::NAN;
        let mut clean = vec![1.0_f64; nx * ny];
        clean[5] = 0.0;

        let mut column = vec![0.0; ny];
        let mut row_scratch = vec![0.0; nx + 2];
        let mut col_scratch = vec![0.0; ny + 2];
        gauss_2d(
            &mut with_nan,
            &mut column,
            &mut row_scratch,
            &mut col_scratch,
            nx,
            ny,
            1,
            1,
            true,
        );
        let mut column2 = vec![0.0; ny];
        gauss_2d(
            &mut clean,
            &mut column2,
            &mut row_scratch,
            &mut col_scratch,
            nx,
            ny,
            1,
            1,
            false,
        );
        assert_eq!(with_nan, clean);
    }

    #[test]
    fn test_optimal_filter_size_known_values() {
        // sigma = 0 keeps the trivial filter.
        let (radius, n_iter) = optimal_filter_size(0.0);
        assert_eq!(radius, 0);
        assert!(n_iter >= 1);

        // A sizeable sigma must produce a non-trivial radius whose effective
        // sigma lands near the request.
        let sigma = 3.5 / (2.0 * (2.0 * 2.0_f64.ln()).sqrt());
        let (radius, n_iter) = optimal_filter_size(sigma);
        assert!(radius >= 1);
        let approx =
            (n_iter as f64 * ((2.0 * radius as f64 + 1.0).powi(2) - 1.0) / 12.0).sqrt();
        assert!((approx - sigma).abs() < 0.35, "approx = {approx}");
    }
}
