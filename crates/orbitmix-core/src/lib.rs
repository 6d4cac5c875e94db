//! Host-facing runtime for the orbitmix bus engine.
//!
//! # Primary API
//!
//! - [`AudioContext`]: the audio host; clock, destination and node constructors
//! - [`GainNode`], [`DelayUnit`], [`ReverbUnit`], [`FilterUnit`]: effect units an orbit owns
//! - [`Scheduler`]: deferred one-shot tasks fired against the host clock
//! - [`ParamTimeline`]: time-stamped parameter automation
//! - [`HeadlessContext`]: device-free host for offline use and tests
//!
//! The engine never reaches for a host on its own. A context is resolved once
//! (either supplied explicitly or taken from [`default_context`]) and handed to
//! every component that needs it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use orbitmix_core::{AudioContext, AudioNode, GainOptions, HeadlessContext};
//!
//! let context: Arc<dyn AudioContext> = Arc::new(HeadlessContext::new(48000.0));
//! let gain = context.create_gain(GainOptions::stereo(0.5))?;
//! gain.connect(context.destination().id())?;
//! # Ok::<(), orbitmix_core::Error>(())
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod node;
pub use node::{
    AudioContext, AudioNode, AudioParam, CaptureCallback, DelayUnit, Destination, FilterUnit,
    GainNode, GainOptions, NodeId, ReverbSettings, ReverbUnit,
};

mod context;
pub use context::{
    current_time, default_context, install_default_context, reset_default_context,
    DEFAULT_SAMPLE_RATE,
};

pub mod automation;
pub use automation::{ParamEvent, ParamTimeline};

mod scheduler;
pub use scheduler::{Scheduler, TaskId};

pub(crate) mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag};

pub mod headless;
pub use headless::{Connection, HeadlessContext, NodeKind};
