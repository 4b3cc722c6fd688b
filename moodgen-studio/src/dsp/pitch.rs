//! Phase-vocoder time stretching and pitch shifting

use super::stft::{istft, stft};
use super::{validate_signal, DspError, HOP_LENGTH, N_FFT};
use realfft::num_complex::Complex;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::f32::consts::PI;

/// Extra zero frames fed to the resampler so its filter delay can be dropped
const RESAMPLER_TAIL: usize = 64;

/// Stretch `samples` in time by `rate` without changing pitch.
///
/// `rate > 1` speeds up. Output length is `round(len / rate)`.
pub fn time_stretch(samples: &[f32], rate: f32) -> Result<Vec<f32>, DspError> {
    validate_signal(samples)?;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(DspError::InvalidParameter(format!("rate must be positive, got {}", rate)));
    }

    let spec = stft(samples, N_FFT, HOP_LENGTH)?;
    let stretched = phase_vocoder(&spec, rate, HOP_LENGTH, N_FFT);
    let length = (samples.len() as f64 / rate as f64).round() as usize;
    istft(&stretched, N_FFT, HOP_LENGTH, length)
}

/// Shift pitch by `n_steps` semitones keeping duration.
///
/// Time-stretches by `2^(-n_steps/12)` then resamples back so the output has
/// exactly `samples.len()` samples.
pub fn pitch_shift(samples: &[f32], sample_rate: u32, n_steps: f32) -> Result<Vec<f32>, DspError> {
    validate_signal(samples)?;
    if sample_rate == 0 {
        return Err(DspError::InvalidParameter("sample rate must be non-zero".to_string()));
    }
    if !n_steps.is_finite() {
        return Err(DspError::InvalidParameter(format!("n_steps must be finite, got {}", n_steps)));
    }

    let rate = 2.0f32.powf(-n_steps / 12.0);
    let stretched = time_stretch(samples, rate)?;

    // Treat the stretched signal as if recorded at sample_rate / rate and
    // bring it back to sample_rate
    let resampled = resample(&stretched, rate as f64, samples.len())?;
    Ok(resampled)
}

/// Resample a mono signal by `ratio` (output rate / input rate) and fix the
/// result to `target_len` samples.
fn resample(input: &[f32], ratio: f64, target_len: usize) -> Result<Vec<f32>, DspError> {
    if input.is_empty() {
        return Err(DspError::EmptySignal);
    }

    let mut padded = Vec::with_capacity(input.len() + RESAMPLER_TAIL);
    padded.extend_from_slice(input);
    padded.resize(input.len() + RESAMPLER_TAIL, 0.0);

    let mut resampler = FastFixedIn::<f32>::new(
        ratio,
        1.0,
        PolynomialDegree::Septic,
        padded.len(),
        1,
    )
    .map_err(|e| DspError::Resample(format!("Failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let planar = vec![padded];
    let output = resampler
        .process(&planar, None)
        .map_err(|e| DspError::Resample(e.to_string()))?;

    let channel = output.into_iter().next().unwrap_or_default();
    let mut fixed: Vec<f32> = channel.into_iter().skip(delay).take(target_len).collect();
    fixed.resize(target_len, 0.0);
    Ok(fixed)
}

/// Resample frames of a spectrogram at fractional positions `0, rate, 2*rate, ...`,
/// interpolating magnitude and accumulating phase advance.
fn phase_vocoder(spec: &[Vec<Complex<f32>>], rate: f32, hop: usize, n_fft: usize) -> Vec<Vec<Complex<f32>>> {
    let n_frames = spec.len();
    let n_bins = n_fft / 2 + 1;
    if n_frames == 0 {
        return Vec::new();
    }

    // Expected phase advance per hop for each bin
    let phi_advance: Vec<f32> = (0..n_bins)
        .map(|k| PI * hop as f32 * k as f32 / (n_bins - 1) as f32)
        .collect();

    let zero_frame = vec![Complex::new(0.0f32, 0.0); n_bins];

    let mut phase_acc: Vec<f32> = spec[0].iter().map(|c| c.arg()).collect();
    let mut out = Vec::new();

    let mut step = 0usize;
    loop {
        let time = step as f64 * rate as f64;
        if time >= n_frames as f64 {
            break;
        }
        let t0 = time.floor() as usize;
        let alpha = (time - t0 as f64) as f32;
        let left = frame_or_silence(spec, &zero_frame, t0);
        let right = frame_or_silence(spec, &zero_frame, t0 + 1);

        let mut frame = Vec::with_capacity(n_bins);
        for k in 0..n_bins {
            let mag = (1.0 - alpha) * left[k].norm() + alpha * right[k].norm();
            frame.push(Complex::from_polar(mag, phase_acc[k]));

            let mut dphase = right[k].arg() - left[k].arg() - phi_advance[k];
            dphase -= 2.0 * PI * (dphase / (2.0 * PI)).round();
            phase_acc[k] += phi_advance[k] + dphase;
        }
        out.push(frame);
        step += 1;
    }

    out
}

/// Frames past the end read as silence
fn frame_or_silence<'a>(
    spec: &'a [Vec<Complex<f32>>],
    silence: &'a [Complex<f32>],
    t: usize,
) -> &'a [Complex<f32>] {
    spec.get(t).map(Vec::as_slice).unwrap_or(silence)
}
