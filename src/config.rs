//! Engine configuration.
//!
//! Every field has a default, so a TOML file only needs the keys it changes:
//!
//! ```
//! use orbitmix::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str(
//!     r#"
//!     [recording]
//!     file_prefix = "take_"
//!
//!     [orbit]
//!     duck_lookahead = 0.02
//!     "#,
//! )?;
//! assert_eq!(config.recording.file_prefix, "take_");
//! assert_eq!(config.recording.block_size, 4096);
//! # Ok::<(), orbitmix::Error>(())
//! ```

use crate::orbit::MAX_FEEDBACK;
use crate::Result;
use orbitmix_core::DEFAULT_SAMPLE_RATE;
use orbitmix_export::DEFAULT_FILE_PREFIX;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate of the headless host used when no context is supplied.
    pub sample_rate: f64,
    pub recording: RecordingConfig,
    pub orbit: OrbitTuning,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            recording: RecordingConfig::default(),
            orbit: OrbitTuning::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Frames per captured block.
    pub block_size: usize,
    /// Interval between progress callbacks.
    pub progress_interval_ms: u64,
    /// Prefix of generated file names.
    pub file_prefix: String,
    /// Directory the default sink writes into.
    pub output_dir: PathBuf,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            block_size: 4096,
            progress_interval_ms: 100,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

/// Orbit safety limits and timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitTuning {
    /// Upper bound of delay feedback, at most [`MAX_FEEDBACK`].
    pub feedback_ceiling: f32,
    /// Seconds a duck task fires ahead of its schedule time.
    pub duck_lookahead: f64,
    /// Shortest duck release ramp, in seconds.
    pub min_attack: f64,
    /// Lowest gain a duck may dip to.
    pub duck_floor: f32,
}

impl Default for OrbitTuning {
    fn default() -> Self {
        Self {
            feedback_ceiling: MAX_FEEDBACK,
            duck_lookahead: 0.01,
            min_attack: 0.002,
            duck_floor: 0.01,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid =
            |reason: String| -> Result<()> { Err(orbitmix_core::Error::InvalidConfig(reason).into()) };

        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return invalid(format!("sample_rate must be positive, got {}", self.sample_rate));
        }
        if self.recording.block_size == 0 {
            return invalid("recording.block_size must be positive".into());
        }
        if self.recording.progress_interval_ms == 0 {
            return invalid("recording.progress_interval_ms must be positive".into());
        }
        let tuning = &self.orbit;
        if !(0.0..=MAX_FEEDBACK).contains(&tuning.feedback_ceiling) {
            return invalid(format!(
                "orbit.feedback_ceiling must be in [0, {MAX_FEEDBACK}], got {}",
                tuning.feedback_ceiling
            ));
        }
        if !tuning.duck_lookahead.is_finite() || tuning.duck_lookahead < 0.0 {
            return invalid("orbit.duck_lookahead must not be negative".into());
        }
        if !tuning.min_attack.is_finite() || tuning.min_attack <= 0.0 {
            return invalid("orbit.min_attack must be positive".into());
        }
        if tuning.duck_floor.is_nan() || tuning.duck_floor <= 0.0 || tuning.duck_floor > 1.0 {
            return invalid(format!(
                "orbit.duck_floor must be in (0, 1], got {}",
                tuning.duck_floor
            ));
        }
        Ok(())
    }
}
