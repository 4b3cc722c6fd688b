//! Signal processing building blocks for the audio enhancer
//!
//! - [`stft`]: Hann-windowed short-time Fourier transform and its inverse
//! - [`hpss`]: median-filtering harmonic/percussive separation
//! - [`pitch`]: phase-vocoder time stretch and pitch shift
//! - [`filters`]: pre-emphasis and blending helpers

pub mod filters;
pub mod hpss;
pub mod pitch;
pub mod stft;

use thiserror::Error;

pub use filters::{blend, pre_emphasis};
pub use hpss::{harmonic, HpssParams};
pub use pitch::{pitch_shift, time_stretch};
pub use stft::{istft, stft, Spectrogram};

/// Default FFT size for all spectral processing
pub const N_FFT: usize = 2048;

/// Default hop between frames
pub const HOP_LENGTH: usize = 512;

/// Errors raised inside the DSP stage
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DspError {
    #[error("Signal is empty")]
    EmptySignal,

    #[error("Signal contains non-finite sample at index {0}")]
    NonFinite(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("FFT failed: {0}")]
    Fft(String),

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Reject empty input and NaN/infinite samples
pub fn validate_signal(samples: &[f32]) -> Result<(), DspError> {
    if samples.is_empty() {
        return Err(DspError::EmptySignal);
    }
    if let Some(idx) = samples.iter().position(|s| !s.is_finite()) {
        return Err(DspError::NonFinite(idx));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_signal() {
        assert_eq!(validate_signal(&[]), Err(DspError::EmptySignal));
        assert_eq!(validate_signal(&[0.0, f32::NAN]), Err(DspError::NonFinite(1)));
        assert_eq!(validate_signal(&[f32::INFINITY]), Err(DspError::NonFinite(0)));
        assert!(validate_signal(&[0.0, 0.5, -0.5]).is_ok());
    }
}
