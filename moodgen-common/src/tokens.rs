//! Clip duration to generator token budget mapping
//!
//! The generator produces roughly 256 tokens per 5 seconds of audio. Requests
//! are mapped linearly from that reference point and clamped to the range the
//! model handles well. Clamping is silent; callers report
//! [`effective_duration_seconds`] back to the client instead.

/// Reference clip length in seconds
pub const REFERENCE_SECONDS: f64 = 5.0;

/// Tokens produced for [`REFERENCE_SECONDS`] of audio
pub const REFERENCE_TOKENS: u32 = 256;

/// Smallest budget ever requested from the generator
pub const MIN_TOKENS: u32 = 256;

/// Largest budget ever requested from the generator (60 seconds)
pub const MAX_TOKENS: u32 = 3072;

/// Map a requested clip duration to a token budget.
///
/// `round(duration / 5 * 256)` clamped to `[256, 3072]`. Zero, negative and
/// NaN durations yield the floor; infinite durations yield the ceiling.
pub fn tokens_for_duration(duration_seconds: f64) -> u32 {
    let raw = (duration_seconds / REFERENCE_SECONDS * REFERENCE_TOKENS as f64).round();
    // `as` saturates for infinities and maps NaN to 0
    let raw = raw as i64;
    raw.clamp(MIN_TOKENS as i64, MAX_TOKENS as i64) as u32
}

/// Clip length in seconds that a token budget actually produces
pub fn effective_duration_seconds(tokens: u32) -> f64 {
    tokens as f64 * REFERENCE_SECONDS / REFERENCE_TOKENS as f64
}
