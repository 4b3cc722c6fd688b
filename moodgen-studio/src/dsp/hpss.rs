//! Harmonic/percussive source separation by median filtering
//!
//! Harmonic content is smooth along time, percussive content is smooth along
//! frequency. Median-filtering the magnitude spectrogram in each direction
//! gives the two reference components; a soft Wiener-style mask then keeps
//! the harmonic part of the original complex spectrogram.

use super::stft::{istft, magnitude, stft};
use super::{validate_signal, DspError, HOP_LENGTH, N_FFT};

/// Separation settings
#[derive(Debug, Clone, Copy)]
pub struct HpssParams {
    pub n_fft: usize,
    pub hop: usize,
    /// Median kernel length along both axes
    pub kernel_size: usize,
    /// Margin >= 1; larger values leave less percussive bleed
    pub margin: f32,
}

impl Default for HpssParams {
    fn default() -> Self {
        Self {
            n_fft: N_FFT,
            hop: HOP_LENGTH,
            kernel_size: 31,
            margin: 1.0,
        }
    }
}

impl HpssParams {
    pub fn with_margin(margin: f32) -> Self {
        Self {
            margin,
            ..Self::default()
        }
    }
}

/// Extract the harmonic component of `samples`.
///
/// The result has exactly `samples.len()` samples.
pub fn harmonic(samples: &[f32], params: &HpssParams) -> Result<Vec<f32>, DspError> {
    validate_signal(samples)?;
    if !params.margin.is_finite() || params.margin < 1.0 {
        return Err(DspError::InvalidParameter(format!(
            "margin must be >= 1, got {}",
            params.margin
        )));
    }
    if params.kernel_size == 0 {
        return Err(DspError::InvalidParameter("kernel size must be positive".to_string()));
    }

    let mut spec = stft(samples, params.n_fft, params.hop)?;
    let mag = magnitude(&spec);

    let harm_ref = median_filter_time(&mag, params.kernel_size);
    let perc_ref = median_filter_freq(&mag, params.kernel_size);

    let split_zeros = params.margin == 1.0;
    for (t, frame) in spec.iter_mut().enumerate() {
        for (k, bin) in frame.iter_mut().enumerate() {
            let mask = soft_mask(harm_ref[t][k], params.margin * perc_ref[t][k], split_zeros);
            *bin *= mask;
        }
    }

    istft(&spec, params.n_fft, params.hop, samples.len())
}

/// Power-2 soft mask `x^2 / (x^2 + r^2)`, normalized against overflow
fn soft_mask(x: f32, x_ref: f32, split_zeros: bool) -> f32 {
    let z = x.max(x_ref);
    if z < f32::MIN_POSITIVE {
        return if split_zeros { 0.5 } else { 0.0 };
    }
    let xn = (x / z).powi(2);
    let rn = (x_ref / z).powi(2);
    xn / (xn + rn)
}

/// Map an out-of-range index back inside `0..n` by mirroring at the edges
/// (`-1 -> 0`, `n -> n - 1`).
pub(crate) fn reflect_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    if n == 1 {
        return 0;
    }
    let period = 2 * n;
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - 1 - i;
    }
    i as usize
}

/// Centered running median with mirrored edges
pub(crate) fn median_filter_1d(data: &[f32], kernel: usize) -> Vec<f32> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    let half = (kernel / 2) as isize;
    let mut window = Vec::with_capacity(kernel);
    (0..n as isize)
        .map(|center| {
            window.clear();
            window.extend((center - half..=center + half).map(|i| data[reflect_index(i, n)]));
            let mid = window.len() / 2;
            let (_, median, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
            *median
        })
        .collect()
}

/// Median along the time axis for every frequency bin
fn median_filter_time(mag: &[Vec<f32>], kernel: usize) -> Vec<Vec<f32>> {
    let n_frames = mag.len();
    let n_bins = mag.first().map(Vec::len).unwrap_or(0);
    let mut out = vec![vec![0.0f32; n_bins]; n_frames];

    let mut column = Vec::with_capacity(n_frames);
    for k in 0..n_bins {
        column.clear();
        column.extend(mag.iter().map(|frame| frame[k]));
        for (t, value) in median_filter_1d(&column, kernel).into_iter().enumerate() {
            out[t][k] = value;
        }
    }
    out
}

/// Median along the frequency axis for every frame
fn median_filter_freq(mag: &[Vec<f32>], kernel: usize) -> Vec<Vec<f32>> {
    mag.iter().map(|frame| median_filter_1d(frame, kernel)).collect()
}
