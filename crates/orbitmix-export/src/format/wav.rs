//! 16-bit PCM WAV encoder using hound
//!
//! Produces the canonical 44-byte-header layout (`RIFF`, a 16-byte `fmt `
//! chunk, `data`) that every recording is saved in.

use crate::error::{ExportError, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// Size of the canonical PCM header in bytes.
pub const WAV_HEADER_LEN: usize = 44;

/// Encode interleaved samples as a 16-bit PCM WAV file in memory.
///
/// # Arguments
/// * `samples` - Interleaved samples (normalized -1.0 to 1.0)
/// * `sample_rate` - Sample rate written to the header
/// * `channels` - 1 (mono) or 2 (stereo)
///
/// # Returns
/// WAV file bytes
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    if !(1..=2).contains(&channels) {
        return Err(ExportError::InvalidData(format!(
            "PCM header supports 1 or 2 channels, got {channels}"
        )));
    }
    if samples.len() % channels as usize != 0 {
        return Err(ExportError::InvalidData(format!(
            "{} samples do not divide into {channels} channels",
            samples.len()
        )));
    }

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec)?;
        for &sample in samples {
            writer.write_sample(to_pcm16(sample))?;
        }

        // Finalize patches the RIFF and data sizes into the header
        writer.finalize()?;
    }

    Ok(buffer)
}

/// Convert a float sample to 16-bit PCM.
///
/// Clamps to [-1, 1]; negatives scale by 32768, the rest by 32767, and the
/// product is truncated toward zero.
#[inline]
fn to_pcm16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}
