//! # Orbitmix - Effect Buses for Live Audio
//!
//! Per-orbit effect routing, gain ducking, output mixing and mix-down
//! recording on top of any audio host.
//!
//! ## Architecture
//!
//! Orbitmix is an umbrella crate that coordinates:
//! - **orbitmix-core** - Host capability traits, deferred scheduling, headless host
//! - **orbitmix-export** - WAV encoding, file naming, export sinks
//!
//! and adds the bus engine itself:
//! - [`Orbit`] - one effect bus with lazily built filter, delay and reverb
//! - [`OutputMixer`] - channel merge stage, master gain and [`Recorder`]
//! - [`AudioController`] - the orbit registry and cross-orbit ducking
//! - [`OrbitEngine`] - all of the above bound to one host
//!
//! ## Quick Start
//!
//! ```
//! use orbitmix::prelude::*;
//! use std::sync::Arc;
//!
//! let host = HeadlessContext::new(48000.0);
//! let sink = Arc::new(MemorySink::new());
//! let engine = OrbitEngine::builder()
//!     .context(Arc::new(host.clone()))
//!     .sink(sink.clone())
//!     .build()?;
//!
//! {
//!     let orbit = engine.orbit(0)?;
//!     let mut orbit = orbit.lock();
//!     orbit.get_reverb(&ReverbSettings::new().duration(2.0))?;
//!     orbit.get_filter(0.5, 0.0)?;
//! }
//!
//! engine.start_recording()?;
//! host.render(&[0.25; 4096], &[0.25; 4096]);
//! let file = engine.stop_recording(Some("take"))?.expect("one block captured");
//!
//! assert_eq!(file.file_name, "take.wav");
//! assert_eq!(sink.len(), 1);
//! # Ok::<(), orbitmix::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `wav` (default) - WAV encoding of recordings

/// Re-export of orbitmix-core for direct access
pub use orbitmix_core as core;

/// Re-export of orbitmix-export for direct access
pub use orbitmix_export as export;

// Host types
pub use orbitmix_core::{
    AudioContext, AudioNode, AudioParam, DelayUnit, Destination, FilterUnit, GainNode,
    GainOptions, HeadlessContext, NodeId, ReverbSettings, ReverbUnit, Scheduler, TaskId,
};

// Export types
pub use orbitmix_export::{DirectorySink, ExportSink, MemorySink};

mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{EngineConfig, OrbitTuning, RecordingConfig};

pub mod duck;
pub use duck::{Broadcast, DuckCommand, DuckEnvelope};

pub mod orbit;
pub use orbit::{clamp_feedback, DuckHandle, Orbit, MAX_FEEDBACK};

pub mod output;
pub use output::{ChannelMap, OutputMixer};

pub mod recorder;
pub use recorder::{ProgressCallback, RecordedFile, Recorder};

pub mod controller;
pub use controller::{tracing_error_logger, AudioController, ErrorLogger, SharedOrbit};

mod builder;
mod engine;

pub use builder::OrbitEngineBuilder;
pub use engine::OrbitEngine;

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{OrbitEngine, OrbitEngineBuilder};

    // Buses and commands
    pub use crate::{ChannelMap, DuckCommand, DuckEnvelope, Orbit};

    // Host
    pub use crate::core::{
        AudioContext, AudioNode, AudioParam, GainOptions, HeadlessContext, ReverbSettings,
    };

    // Recording
    pub use crate::export::{DirectorySink, ExportSink, MemorySink};
    pub use crate::RecordedFile;
}
