//! WAV encode/decode through hound
//!
//! Writing always produces 16-bit signed PCM (interleaved, clipped, truncated
//! toward zero). Reading accepts integer PCM up to 32 bits and 32-bit float,
//! which covers what inference servers commonly return.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use moodgen_common::waveform::{dequantize_sample, quantize_sample};
use moodgen_common::Waveform;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("WAV format error: {0}")]
    Format(#[from] hound::Error),

    #[error("Invalid waveform: {0}")]
    Waveform(String),

    #[error("Unsupported WAV encoding: {0}")]
    Unsupported(String),
}

fn pcm16_spec(waveform: &Waveform) -> WavSpec {
    WavSpec {
        channels: waveform.channel_count(),
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn write_samples<W: Write + Seek>(mut writer: WavWriter<W>, waveform: &Waveform) -> Result<(), WavError> {
    for sample in waveform.interleaved() {
        writer.write_sample(quantize_sample(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write `waveform` to `path` as 16-bit PCM
pub fn write_pcm16_file(path: &Path, waveform: &Waveform) -> Result<(), WavError> {
    let writer = WavWriter::create(path, pcm16_spec(waveform))?;
    write_samples(writer, waveform)
}

/// Encode `waveform` as an in-memory 16-bit PCM WAV
pub fn encode_pcm16(waveform: &Waveform) -> Result<Vec<u8>, WavError> {
    let mut cursor = Cursor::new(Vec::new());
    let writer = WavWriter::new(&mut cursor, pcm16_spec(waveform))?;
    write_samples(writer, waveform)?;
    Ok(cursor.into_inner())
}

/// Decode a WAV stream into a planar float waveform
pub fn decode<R: Read>(reader: R) -> Result<Waveform, WavError> {
    let mut reader = WavReader::new(reader)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(dequantize_sample))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ 1..=32) => {
            let scale = ((1i64 << (bits - 1)) - 1).max(1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v as f32 / scale).clamp(-1.0, 1.0)))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(WavError::Unsupported(format!("{:?} {}-bit", format, bits)));
        }
    };

    Waveform::from_interleaved(&interleaved, spec.channels, spec.sample_rate)
        .map_err(|e| WavError::Waveform(e.to_string()))
}

/// Decode WAV bytes
pub fn decode_bytes(bytes: &[u8]) -> Result<Waveform, WavError> {
    decode(Cursor::new(bytes))
}

/// Decode a WAV file
pub fn read_file(path: &Path) -> Result<Waveform, WavError> {
    let file = std::fs::File::open(path).map_err(hound::Error::IoError)?;
    decode(std::io::BufReader::new(file))
}
