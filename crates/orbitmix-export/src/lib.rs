//! # Orbitmix Export
//!
//! Turns captured recordings into files:
//! - **Format encoding**: 16-bit PCM WAV via hound
//! - **Naming**: generated and title-derived basenames
//! - **Sinks**: where encoded bytes are delivered
//!
//! ```
//! use orbitmix_export::{encode_wav, ExportSink, MemorySink};
//!
//! let bytes = encode_wav(&[0.5, -0.5], 48000, 2)?;
//! let sink = MemorySink::new();
//! sink.save("take.wav", &bytes)?;
//! assert_eq!(sink.files()[0].1.len(), 48);
//! # Ok::<(), orbitmix_export::ExportError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `wav` (default): WAV encoding via hound (pure Rust)

pub mod error;
pub mod format;
pub mod naming;
pub mod sink;

pub use error::{ExportError, Result};
pub use naming::{
    basename_from_code, default_basename, extract_title, format_elapsed, sanitize_filename,
    wav_file_name, DEFAULT_FILE_PREFIX,
};
pub use sink::{DirectorySink, ExportSink, MemorySink};

#[cfg(feature = "wav")]
pub use format::wav::encode_wav;

/// Encode interleaved samples as 16-bit PCM WAV.
///
/// Always fails: this build has no WAV support.
#[cfg(not(feature = "wav"))]
pub fn encode_wav(_samples: &[f32], _sample_rate: u32, _channels: u16) -> Result<Vec<u8>> {
    Err(ExportError::UnsupportedFormat(
        "WAV support not enabled. Enable the 'wav' feature.".into(),
    ))
}
