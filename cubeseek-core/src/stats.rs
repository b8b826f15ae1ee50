//! Streaming statistics shared by the cube container and the source finder.
//!
//! One generic body covers the f32 and f64 payloads; accumulation always
//! happens in f64 so the two instantiations agree to the last bit that the
//! input precision allows.

use num_traits::Float;

/// Conversion factor from the median absolute deviation to the standard
/// deviation of a Gaussian distribution.
pub const MAD_TO_STD: f64 = 1.482602218505602;

/// Noise measurement statistic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoiseStatistic {
    /// Standard deviation about zero.
    #[default]
    Std,
    /// Median absolute deviation, scaled to a Gaussian-equivalent sigma.
    Mad,
    /// Gaussian fit to the flux histogram.
    Gauss,
}

/// Flux range entering a noise measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FluxRange {
    /// Values less than or equal to the reference value.
    #[default]
    Negative,
    /// All finite values.
    Full,
    /// Values greater than or equal to the reference value.
    Positive,
}

impl FluxRange {
    /// Returns `true` if `x` participates in a measurement about `value`.
    #[inline]
    pub fn selects(self, x: f64, value: f64) -> bool {
        if !x.is_finite() {
            return false;
        }
        match self {
            Self::Negative => x <= value,
            Self::Full => true,
            Self::Positive => x >= value,
        }
    }
}

/// Returns `true` if the slice contains at least one NaN.
pub fn contains_nan<T: Float>(data: &[T]) -> bool {
    data.iter().any(|x| x.is_nan())
}

/// NaN-safe sum: NaN values are skipped; if nothing contributes, NaN.
pub fn nan_safe_sum<T: Float>(data: &[T]) -> f64 {
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for &x in data {
        if !x.is_nan() {
            sum += x.to_f64().unwrap_or(f64::NAN);
            count += 1;
        }
    }
    if count > 0 {
        sum
    } else {
        f64::NAN
    }
}

/// Standard deviation about `value` over every `cadence`-th element.
///
/// Only elements selected by `range` contribute; NaN when none qualify.
pub fn std_dev_about<T: Float>(data: &[T], value: f64, cadence: usize, range: FluxRange) -> f64 {
    let cadence = cadence.max(1);
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    let mut i = 0;
    while i < data.len() {
        let x = data[i].to_f64().unwrap_or(f64::NAN);
        if range.selects(x, value) {
            let dev = x - value;
            sum += dev * dev;
            count += 1;
        }
        i += cadence;
    }
    if count > 0 {
        (sum / count as f64).sqrt()
    } else {
        f64::NAN
    }
}

/// Median absolute deviation about `value`.
///
/// Destructive: the slice is overwritten with absolute deviations and
/// reordered by the selection; callers must work on a copy if the original
/// ordering matters. Non-finite entries are excluded.
pub fn mad_about<T: Float>(data: &mut [T], value: f64) -> f64 {
    let v = match T::from(value) {
        Some(v) => v,
        None => return f64::NAN,
    };

    // Compact the finite absolute deviations to the front of the slice.
    let mut n = 0;
    for i in 0..data.len() {
        let x = data[i];
        if x.is_finite() {
            data[n] = (x - v).abs();
            n += 1;
        }
    }
    if n == 0 {
        return f64::NAN;
    }

    median_in_place(&mut data[..n])
}

/// Median by in-place selection; the slice must hold finite values only.
fn median_in_place<T: Float>(data: &mut [T]) -> f64 {
    let n = data.len();
    let mid = n / 2;
    let (_, upper_mid, _) =
        data.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let upper = upper_mid.to_f64().unwrap_or(f64::NAN);
    if n % 2 == 1 {
        upper
    } else {
        // Even length: the lower middle is the maximum of the left partition.
        let lower = data[..mid]
            .iter()
            .copied()
            .fold(T::neg_infinity(), T::max)
            .to_f64()
            .unwrap_or(f64::NAN);
        0.5 * (lower + upper)
    }
}

/// Number of histogram bins used by the Gaussian noise fit.
const GAUSS_FIT_BINS: usize = 101;

/// Sigma of a zero-centred Gaussian fitted to the histogram of `values`.
///
/// The fit linearises `ln(count) = ln(a) − c²/(2σ²)` and regresses the log
/// counts against the squared bin centres; a degenerate regression falls
/// back to the plain root mean square.
pub fn gauss_fit_noise(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let rms = {
        let sum: f64 = values.iter().map(|x| x * x).sum();
        (sum / values.len() as f64).sqrt()
    };
    if !(rms > 0.0) || !rms.is_finite() {
        return rms;
    }

    let span = 4.0 * rms;
    let width = 2.0 * span / GAUSS_FIT_BINS as f64;
    let mut counts = [0_usize; GAUSS_FIT_BINS];
    for &x in values {
        let bin = ((x + span) / width).floor();
        if bin >= 0.0 && bin < GAUSS_FIT_BINS as f64 {
            counts[bin as usize] += 1;
        }
    }

    // Linear regression of ln(count) on squared bin centre.
    let mut n = 0.0_f64;
    let mut sx = 0.0_f64;
    let mut sy = 0.0_f64;
    let mut sxx = 0.0_f64;
    let mut sxy = 0.0_f64;
    for (bin, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let centre = (bin as f64 + 0.5) * width - span;
        let x = centre * centre;
        let y = (count as f64).ln();
        n += 1.0;
        sx += x;
        sy += y;
        sxx += x * x;
        sxy += x * y;
    }

    let denom = n * sxx - sx * sx;
    if denom.abs() < f64::EPSILON {
        return rms;
    }
    let slope = (n * sxy - sx * sy) / denom;
    if slope < 0.0 {
        (-0.5 / slope).sqrt()
    } else {
        rms
    }
}

/// Noise level of `data` measured with the requested statistic.
///
/// All statistics are taken about zero and reported as Gaussian-equivalent
/// sigmas so they are interchangeable inside the finder. `cadence`
/// subsamples the payload; `range` restricts the flux range.
pub fn noise_level<T: Float>(
    data: &[T],
    cadence: usize,
    statistic: NoiseStatistic,
    range: FluxRange,
) -> f64 {
    match statistic {
        NoiseStatistic::Std => std_dev_about(data, 0.0, cadence, range),
        NoiseStatistic::Mad => {
            let mut selected = sample_selected(data, cadence, range);
            mad_about(&mut selected, 0.0) * MAD_TO_STD
        }
        NoiseStatistic::Gauss => {
            let selected = sample_selected(data, cadence, range);
            gauss_fit_noise(&selected)
        }
    }
}

fn sample_selected<T: Float>(data: &[T], cadence: usize, range: FluxRange) -> Vec<f64> {
    let cadence = cadence.max(1);
    let mut selected = Vec::with_capacity(data.len() / cadence + 1);
    let mut i = 0;
    while i < data.len() {
        let x = data[i].to_f64().unwrap_or(f64::NAN);
        if range.selects(x, 0.0) {
            selected.push(x);
        }
        i += cadence;
    }
    selected
}
