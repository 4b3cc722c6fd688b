//! Short-time Fourier transform with centered frames
//!
//! Frames are laid out row-major: `spec[frame][bin]`, `n_fft / 2 + 1` bins per
//! frame. The signal is zero-padded by `n_fft / 2` on both sides so frame `t`
//! is centered on sample `t * hop`.

use super::DspError;
use realfft::num_complex::Complex;
use realfft::RealFftPlanner;
use std::f32::consts::PI;

/// Complex spectrogram, `[frame][bin]`
pub type Spectrogram = Vec<Vec<Complex<f32>>>;

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

fn check_params(n_fft: usize, hop: usize) -> Result<(), DspError> {
    if n_fft < 2 || n_fft % 2 != 0 {
        return Err(DspError::InvalidParameter(format!(
            "n_fft must be even and >= 2, got {}",
            n_fft
        )));
    }
    if hop == 0 || hop > n_fft {
        return Err(DspError::InvalidParameter(format!(
            "hop must be in 1..={}, got {}",
            n_fft, hop
        )));
    }
    Ok(())
}

/// Forward STFT
pub fn stft(samples: &[f32], n_fft: usize, hop: usize) -> Result<Spectrogram, DspError> {
    check_params(n_fft, hop)?;
    if samples.is_empty() {
        return Err(DspError::EmptySignal);
    }

    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let n_frames = 1 + (padded.len() - n_fft) / hop;
    let window = hann_window(n_fft);

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let mut frame_buf = fft.make_input_vec();
    let mut scratch = fft.make_scratch_vec();

    let mut spec = Vec::with_capacity(n_frames);
    for t in 0..n_frames {
        let start = t * hop;
        for (i, slot) in frame_buf.iter_mut().enumerate() {
            *slot = padded[start + i] * window[i];
        }
        let mut bins = fft.make_output_vec();
        fft.process_with_scratch(&mut frame_buf, &mut bins, &mut scratch)
            .map_err(|e| DspError::Fft(e.to_string()))?;
        spec.push(bins);
    }

    Ok(spec)
}

/// Inverse STFT by weighted overlap-add.
///
/// Output is trimmed or zero-padded to exactly `length` samples.
pub fn istft(spec: &[Vec<Complex<f32>>], n_fft: usize, hop: usize, length: usize) -> Result<Vec<f32>, DspError> {
    check_params(n_fft, hop)?;
    let n_bins = n_fft / 2 + 1;
    if spec.iter().any(|frame| frame.len() != n_bins) {
        return Err(DspError::InvalidParameter(format!(
            "every frame must have {} bins",
            n_bins
        )));
    }
    if spec.is_empty() {
        return Ok(vec![0.0; length]);
    }

    let window = hann_window(n_fft);
    let total = n_fft + hop * (spec.len() - 1);
    let mut output = vec![0.0f32; total];
    let mut window_sum = vec![0.0f32; total];

    let mut planner = RealFftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(n_fft);
    let mut frame_out = ifft.make_output_vec();
    let mut scratch = ifft.make_scratch_vec();
    let norm = 1.0 / n_fft as f32;

    for (t, frame) in spec.iter().enumerate() {
        let mut bins = frame.clone();
        // DC and Nyquist must be real for a real-valued inverse
        bins[0].im = 0.0;
        bins[n_bins - 1].im = 0.0;
        ifft.process_with_scratch(&mut bins, &mut frame_out, &mut scratch)
            .map_err(|e| DspError::Fft(e.to_string()))?;

        let start = t * hop;
        for i in 0..n_fft {
            output[start + i] += frame_out[i] * norm * window[i];
            window_sum[start + i] += window[i] * window[i];
        }
    }

    for (sample, &w) in output.iter_mut().zip(window_sum.iter()) {
        if w > f32::MIN_POSITIVE {
            *sample /= w;
        }
    }

    let pad = n_fft / 2;
    let mut trimmed: Vec<f32> = output.into_iter().skip(pad).take(length).collect();
    trimmed.resize(length, 0.0);
    Ok(trimmed)
}

/// Magnitude of every bin
pub fn magnitude(spec: &[Vec<Complex<f32>>]) -> Vec<Vec<f32>> {
    spec.iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_frame_count_and_bins() {
        let spec = stft(&vec![0.0; 4096], 2048, 512).unwrap();
        assert_eq!(spec.len(), 1 + 4096 / 512);
        assert_eq!(spec[0].len(), 1025);
    }

    #[test]
    fn test_roundtrip_reconstructs_signal() {
        let signal = sine(440.0, 16000.0, 8000);
        let spec = stft(&signal, 2048, 512).unwrap();
        let back = istft(&spec, 2048, 512, signal.len()).unwrap();

        assert_eq!(back.len(), signal.len());
        let max_err = signal
            .iter()
            .zip(back.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-3, "max reconstruction error {}", max_err);
    }

    #[test]
    fn test_istft_pads_to_length() {
        let spec = stft(&vec![0.1; 100], 256, 64).unwrap();
        let back = istft(&spec, 256, 64, 1000).unwrap();
        assert_eq!(back.len(), 1000);
        assert_eq!(back[999], 0.0);
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(stft(&[0.0; 10], 255, 64), Err(DspError::InvalidParameter(_))));
        assert!(matches!(stft(&[0.0; 10], 256, 0), Err(DspError::InvalidParameter(_))));
        assert_eq!(stft(&[], 256, 64), Err(DspError::EmptySignal));
    }

    #[test]
    fn test_hann_window_periodic() {
        let w = hann_window(4);
        assert!((w[0] - 0.0).abs() < 1e-6);
        assert!((w[1] - 0.5).abs() < 1e-6);
        assert!((w[2] - 1.0).abs() < 1e-6);
        assert!((w[3] - 0.5).abs() < 1e-6);
    }
}
