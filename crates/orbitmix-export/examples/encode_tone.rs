//! Encode one second of a 440 Hz stereo tone and save it under a generated name.
//!
//! Run with: cargo run -p orbitmix-export --example encode_tone [output-dir]

use orbitmix_export::{
    default_basename, encode_wav, wav_file_name, DirectorySink, ExportSink, DEFAULT_FILE_PREFIX,
};
use std::f32::consts::TAU;

fn main() -> orbitmix_export::Result<()> {
    let dir = std::env::args().nth(1).unwrap_or_else(|| ".".into());
    let sample_rate = 48000u32;

    let samples: Vec<f32> = (0..sample_rate)
        .flat_map(|i| {
            let s = 0.5 * (TAU * 440.0 * i as f32 / sample_rate as f32).sin();
            [s, s]
        })
        .collect();

    let bytes = encode_wav(&samples, sample_rate, 2)?;
    let name = wav_file_name(&default_basename(DEFAULT_FILE_PREFIX, chrono::Utc::now()));
    let path = DirectorySink::new(dir).save(&name, &bytes)?;

    println!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
