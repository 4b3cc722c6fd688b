//! Harmonic enhancement of generated clips
//!
//! Two blends are offered:
//! - **harmonize**: `0.7 * original + 0.3 * harmonic(original)` (HPSS margin 8)
//! - **reharmonize**: `0.6 * original + 0.4 * harmonic(pitch_shift(original, +2))`
//!   (HPSS margin 12)
//!
//! Both reduce the input to its first channel, keep its length and sample rate
//! and clip to [-1, 1]. Any DSP failure is recovered: the caller gets the
//! original waveform back with [`Outcome::FellBack`].

use crate::dsp::{self, filters::PRE_EMPHASIS_COEF, DspError, HpssParams};
use moodgen_common::waveform::clip_in_place;
use moodgen_common::Waveform;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

const HARMONIZE_MARGIN: f32 = 8.0;
const HARMONIZE_WEIGHTS: (f32, f32) = (0.7, 0.3);

const REHARMONIZE_MARGIN: f32 = 12.0;
const REHARMONIZE_WEIGHTS: (f32, f32) = (0.6, 0.4);
const REHARMONIZE_SEMITONES: f32 = 2.0;

/// Source of the harmonic component of a mono signal
pub trait HarmonicSeparator: Send + Sync {
    /// Harmonic part of `samples`; must return exactly `samples.len()` samples
    fn harmonic(&self, samples: &[f32], margin: f32) -> Result<Vec<f32>, DspError>;
}

/// Median-filtering HPSS with the default STFT geometry
#[derive(Debug, Default, Clone, Copy)]
pub struct MedianHpss;

impl HarmonicSeparator for MedianHpss {
    fn harmonic(&self, samples: &[f32], margin: f32) -> Result<Vec<f32>, DspError> {
        dsp::harmonic(samples, &HpssParams::with_margin(margin))
    }
}

/// Enhancement variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhancementKind {
    Harmonize,
    Reharmonize,
}

impl EnhancementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnhancementKind::Harmonize => "harmonize",
            EnhancementKind::Reharmonize => "reharmonize",
        }
    }
}

impl fmt::Display for EnhancementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the blend was applied or the input came back untouched
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied,
    FellBack { reason: String },
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Result of an enhancement call
#[derive(Debug, Clone)]
pub struct Enhancement {
    pub waveform: Waveform,
    pub outcome: Outcome,
}

/// Harmonize/reharmonize processor
#[derive(Clone)]
pub struct AudioEnhancer {
    separator: Arc<dyn HarmonicSeparator>,
    pre_emphasis: bool,
}

impl Default for AudioEnhancer {
    fn default() -> Self {
        Self::new(false)
    }
}

impl AudioEnhancer {
    pub fn new(pre_emphasis: bool) -> Self {
        Self {
            separator: Arc::new(MedianHpss),
            pre_emphasis,
        }
    }

    /// Use a custom harmonic separator
    pub fn with_separator(separator: Arc<dyn HarmonicSeparator>, pre_emphasis: bool) -> Self {
        Self {
            separator,
            pre_emphasis,
        }
    }

    pub fn enhance(&self, kind: EnhancementKind, waveform: &Waveform, duration_seconds: f64) -> Enhancement {
        match kind {
            EnhancementKind::Harmonize => self.harmonize(waveform, duration_seconds),
            EnhancementKind::Reharmonize => {
                self.reharmonize(waveform, waveform.sample_rate(), duration_seconds)
            }
        }
    }

    /// Light harmonic reinforcement
    pub fn harmonize(&self, waveform: &Waveform, duration_seconds: f64) -> Enhancement {
        debug!(
            frames = waveform.frames(),
            channels = waveform.channel_count(),
            duration_seconds,
            pre_emphasis = self.pre_emphasis,
            "Harmonizing"
        );
        self.finish(EnhancementKind::Harmonize, waveform, self.try_harmonize(waveform))
    }

    /// Heavier reharmonization with a +2 semitone harmonic layer
    pub fn reharmonize(&self, waveform: &Waveform, sample_rate: u32, duration_seconds: f64) -> Enhancement {
        debug!(
            frames = waveform.frames(),
            channels = waveform.channel_count(),
            sample_rate,
            duration_seconds,
            "Reharmonizing"
        );
        self.finish(
            EnhancementKind::Reharmonize,
            waveform,
            self.try_reharmonize(waveform, sample_rate),
        )
    }

    fn finish(&self, kind: EnhancementKind, original: &Waveform, result: Result<Waveform, DspError>) -> Enhancement {
        match result {
            Ok(waveform) => {
                info!(kind = %kind, frames = waveform.frames(), "Enhancement applied");
                Enhancement {
                    waveform,
                    outcome: Outcome::Applied,
                }
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "Enhancement failed, returning original audio");
                Enhancement {
                    waveform: original.clone(),
                    outcome: Outcome::FellBack {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    fn try_harmonize(&self, waveform: &Waveform) -> Result<Waveform, DspError> {
        let mono = waveform.first_channel();
        dsp::validate_signal(mono)?;

        let mut harmonic = self.separated(mono, HARMONIZE_MARGIN)?;
        if self.pre_emphasis {
            harmonic = dsp::pre_emphasis(&harmonic, PRE_EMPHASIS_COEF);
        }

        let (w_orig, w_harm) = HARMONIZE_WEIGHTS;
        let mut out = dsp::blend(mono, w_orig, &harmonic, w_harm)?;
        clip_in_place(&mut out);
        Ok(Waveform::mono(out, waveform.sample_rate()))
    }

    fn try_reharmonize(&self, waveform: &Waveform, sample_rate: u32) -> Result<Waveform, DspError> {
        let mono = waveform.first_channel();
        dsp::validate_signal(mono)?;

        let shifted = dsp::pitch_shift(mono, sample_rate, REHARMONIZE_SEMITONES)?;
        let harmonic = self.separated(&shifted, REHARMONIZE_MARGIN)?;

        let (w_orig, w_harm) = REHARMONIZE_WEIGHTS;
        let mut out = dsp::blend(mono, w_orig, &harmonic, w_harm)?;
        clip_in_place(&mut out);
        Ok(Waveform::mono(out, waveform.sample_rate()))
    }

    fn separated(&self, samples: &[f32], margin: f32) -> Result<Vec<f32>, DspError> {
        let harmonic = self.separator.harmonic(samples, margin)?;
        if harmonic.len() != samples.len() {
            return Err(DspError::LengthMismatch {
                expected: samples.len(),
                actual: harmonic.len(),
            });
        }
        if let Some(idx) = harmonic.iter().position(|s| !s.is_finite()) {
            return Err(DspError::NonFinite(idx));
        }
        Ok(harmonic)
    }
}
