//! Audio format encoders
//!
//! Each encoder is feature-gated:
//! - `wav`: 16-bit PCM WAV via hound (pure Rust)

#[cfg(feature = "wav")]
pub mod wav;
