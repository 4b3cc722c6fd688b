//! Waveform model shared by the generator, enhancer and file store
//!
//! Samples are stored planar (`channels[channel][frame]`) as `f32`. Values are
//! expected in [-1, 1]; [`quantize_sample`] clips before converting to the
//! 16-bit PCM used on disk.

use crate::{Error, Result};

/// Scale factor between float samples and 16-bit PCM
pub const PCM16_SCALE: f32 = 32767.0;

/// Decoded audio at a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl Waveform {
    /// Single-channel waveform
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: vec![samples],
        }
    }

    /// Multi-channel waveform from planar data.
    ///
    /// Every channel must have the same length and there must be at least one.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::InvalidInput("sample rate must be non-zero".to_string()));
        }
        let Some(first) = channels.first() else {
            return Err(Error::InvalidInput("waveform needs at least one channel".to_string()));
        };
        let frames = first.len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(Error::InvalidInput("channel lengths differ".to_string()));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Build from interleaved frames (`[L, R, L, R, ...]`)
    pub fn from_interleaved(samples: &[f32], channel_count: u16, sample_rate: u32) -> Result<Self> {
        if channel_count == 0 {
            return Err(Error::InvalidInput("channel count must be non-zero".to_string()));
        }
        let n = channel_count as usize;
        if samples.len() % n != 0 {
            return Err(Error::InvalidInput(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                n
            )));
        }
        let frames = samples.len() / n;
        let mut channels = vec![Vec::with_capacity(frames); n];
        for frame in samples.chunks_exact(n) {
            for (ch, &s) in frame.iter().enumerate() {
                channels[ch].push(s);
            }
        }
        Self::from_channels(channels, sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// First channel's samples
    pub fn first_channel(&self) -> &[f32] {
        self.channels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Collapse to a single channel by keeping the first one
    pub fn to_mono(&self) -> Waveform {
        Waveform::mono(self.first_channel().to_vec(), self.sample_rate)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Interleave channels frame by frame
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Largest absolute sample value across all channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

/// Clip to [-1, 1] and scale to 16-bit PCM, truncating toward zero
pub fn quantize_sample(sample: f32) -> i16 {
    let clipped = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    (clipped * PCM16_SCALE) as i16
}

/// Inverse of [`quantize_sample`]
pub fn dequantize_sample(sample: i16) -> f32 {
    (sample as f32 / PCM16_SCALE).clamp(-1.0, 1.0)
}

/// Clip every sample into [-1, 1] in place
pub fn clip_in_place(samples: &mut [f32]) {
    for s in samples.iter_mut() {
        *s = s.clamp(-1.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_roundtrip() {
        let wave = Waveform::from_interleaved(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3], 2, 44100).unwrap();
        assert_eq!(wave.channel_count(), 2);
        assert_eq!(wave.frames(), 3);
        assert_eq!(wave.channels()[1], vec![-0.1, -0.2, -0.3]);
        assert_eq!(wave.interleaved(), vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);
    }

    #[test]
    fn test_to_mono_keeps_first_channel() {
        let wave = Waveform::from_channels(vec![vec![0.5, 0.25], vec![-1.0, -1.0]], 32000).unwrap();
        let mono = wave.to_mono();
        assert_eq!(mono.channel_count(), 1);
        assert_eq!(mono.first_channel(), &[0.5, 0.25]);
        assert_eq!(mono.sample_rate(), 32000);
    }

    #[test]
    fn test_mismatched_channels_rejected() {
        assert!(Waveform::from_channels(vec![vec![0.0; 3], vec![0.0; 2]], 32000).is_err());
        assert!(Waveform::from_channels(vec![], 32000).is_err());
        assert!(Waveform::from_interleaved(&[0.0; 5], 2, 32000).is_err());
    }

    #[test]
    fn test_quantize_clips_and_truncates() {
        assert_eq!(quantize_sample(1.0), 32767);
        assert_eq!(quantize_sample(2.5), 32767);
        assert_eq!(quantize_sample(-1.0), -32767);
        assert_eq!(quantize_sample(-3.0), -32767);
        assert_eq!(quantize_sample(0.0), 0);
        assert_eq!(quantize_sample(f32::NAN), 0);
        // 0.5 * 32767 = 16383.5 truncates to 16383
        assert_eq!(quantize_sample(0.5), 16383);
    }

    #[test]
    fn test_dequantize_within_one_step() {
        for s in [-0.999, -0.5, -0.001, 0.0, 0.123, 0.75, 0.9999] {
            let back = dequantize_sample(quantize_sample(s));
            assert!((back - s).abs() <= 1.0 / PCM16_SCALE, "{} -> {}", s, back);
        }
    }

    #[test]
    fn test_duration_seconds() {
        let wave = Waveform::mono(vec![0.0; 16000], 32000);
        assert_eq!(wave.duration_seconds(), 0.5);
    }
}
