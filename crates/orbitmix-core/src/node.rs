//! Host capability traits.
//!
//! The bus engine does no sample processing of its own. It asks an audio host
//! for nodes, wires them together and writes time-stamped parameter values
//! ahead of playback. These traits are that boundary: a browser-style graph,
//! a native DSP runtime and [`HeadlessContext`](crate::HeadlessContext) all
//! plug in here.
//!
//! All methods take `&self`. Nodes are shared handles owned by the host, and
//! graph mutation is expected to happen from a single control thread.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identifier of a node inside one host.
pub type NodeId = u64;

/// Callback invoked by a capture tap on the render thread with one planar
/// stereo block (`left`, `right`) of the tap's fixed block size.
pub type CaptureCallback = Box<dyn FnMut(&[f32], &[f32]) + Send>;

/// A node in the host's audio graph.
pub trait AudioNode: Send + Sync {
    fn id(&self) -> NodeId;

    /// Number of channels this node produces.
    fn channel_count(&self) -> usize;

    /// Connect output `output` of this node to input `input` of `target`.
    fn connect_port(&self, target: NodeId, output: usize, input: usize) -> Result<()>;

    /// Connect output 0 to input 0 of `target`.
    fn connect(&self, target: NodeId) -> Result<()> {
        self.connect_port(target, 0, 0)
    }

    /// Remove every outgoing connection.
    fn disconnect(&self);

    /// Remove outgoing connections that end at `target`.
    fn disconnect_from(&self, target: NodeId);
}

/// A schedulable parameter.
///
/// Writes never block; they place an event on the host's automation timeline.
pub trait AudioParam: Send + Sync {
    /// Live value at the host's current time.
    fn value(&self) -> f32;

    fn set_value_at_time(&self, value: f32, time: f64);

    /// Exponential ramp from the previous event, reaching `value` at `time`.
    fn exponential_ramp_to_value_at_time(&self, value: f32, time: f64);

    /// Drop every scheduled event at or after `from`.
    fn cancel_scheduled_values(&self, from: f64);
}

pub trait GainNode: AudioNode {
    fn gain(&self) -> &dyn AudioParam;
}

/// Feedback delay line.
pub trait DelayUnit: AudioNode {
    fn delay_time(&self) -> &dyn AudioParam;

    fn feedback(&self) -> &dyn AudioParam;

    /// Start processing at `time`.
    ///
    /// Hosts without an explicit start primitive keep the default. Callers
    /// treat a failure here as non-fatal.
    fn start(&self, _time: f64) -> Result<()> {
        Ok(())
    }
}

/// Convolution reverb whose impulse response is rebuilt by [`generate`](ReverbUnit::generate).
pub trait ReverbUnit: AudioNode {
    /// Rebuild the reverb from `settings`. Assumed expensive.
    fn generate(&self, settings: &ReverbSettings) -> Result<()>;
}

/// Single-control filter (e.g. a DJ-style low/high-pass sweep).
pub trait FilterUnit: AudioNode {
    fn value(&self) -> &dyn AudioParam;
}

/// The host's final output.
pub trait Destination: AudioNode {
    fn max_channel_count(&self) -> usize;

    fn set_channel_count(&self, count: usize);
}

/// Construction options for gain nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainOptions {
    pub gain: f32,
    /// Explicit channel count; `None` lets the host pick.
    pub channel_count: Option<usize>,
}

impl GainOptions {
    pub fn new(gain: f32) -> Self {
        Self {
            gain,
            channel_count: None,
        }
    }

    /// Gain node with an explicit stereo channel layout.
    pub fn stereo(gain: f32) -> Self {
        Self {
            gain,
            channel_count: Some(2),
        }
    }
}

impl Default for GainOptions {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Reverb configuration snapshot.
///
/// Every field is optional. `None` means "leave as is" and never counts as a
/// change; filling in a concrete default before comparing would make every
/// partial call look different from the last one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbSettings {
    /// Tail length in seconds.
    pub duration: Option<f32>,
    /// Fade-in time of the tail in seconds.
    pub fade: Option<f32>,
    /// Low-pass cutoff of the tail in Hz.
    pub lowpass: Option<f32>,
    /// Stereo dimension (width).
    pub dimension: Option<f32>,
    /// Impulse-response selector (sample name).
    pub ir: Option<String>,
    /// Impulse-response playback speed.
    pub ir_speed: Option<f32>,
    /// Impulse-response start offset (0-1).
    pub ir_begin: Option<f32>,
}

impl ReverbSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn fade(mut self, seconds: f32) -> Self {
        self.fade = Some(seconds);
        self
    }

    pub fn lowpass(mut self, hz: f32) -> Self {
        self.lowpass = Some(hz);
        self
    }

    pub fn dimension(mut self, width: f32) -> Self {
        self.dimension = Some(width);
        self
    }

    pub fn ir(mut self, name: impl Into<String>) -> Self {
        self.ir = Some(name.into());
        self
    }

    pub fn ir_speed(mut self, speed: f32) -> Self {
        self.ir_speed = Some(speed);
        self
    }

    pub fn ir_begin(mut self, begin: f32) -> Self {
        self.ir_begin = Some(begin);
        self
    }

    /// Whether applying `self` on top of `applied` requires a regeneration.
    ///
    /// Numeric fields count only when specified and different. The
    /// impulse-response selector counts whenever it differs, including
    /// switching back to no impulse response.
    pub fn differs_from(&self, applied: &ReverbSettings) -> bool {
        fn changed(now: Option<f32>, before: Option<f32>) -> bool {
            matches!(now, Some(value) if Some(value) != before)
        }

        changed(self.duration, applied.duration)
            || changed(self.fade, applied.fade)
            || changed(self.lowpass, applied.lowpass)
            || changed(self.dimension, applied.dimension)
            || changed(self.ir_speed, applied.ir_speed)
            || changed(self.ir_begin, applied.ir_begin)
            || self.ir != applied.ir
    }

    /// Layer `self` over `base`: unspecified numeric fields keep `base`'s
    /// value, the selector is taken from `self` as is.
    pub fn merged_over(&self, base: &ReverbSettings) -> ReverbSettings {
        ReverbSettings {
            duration: self.duration.or(base.duration),
            fade: self.fade.or(base.fade),
            lowpass: self.lowpass.or(base.lowpass),
            dimension: self.dimension.or(base.dimension),
            ir: self.ir.clone(),
            ir_speed: self.ir_speed.or(base.ir_speed),
            ir_begin: self.ir_begin.or(base.ir_begin),
        }
    }
}

/// An audio host: clock, destination and node constructors.
///
/// Constructor failures propagate to the caller unchanged.
pub trait AudioContext: Send + Sync {
    /// Host clock in seconds.
    fn current_time(&self) -> f64;

    fn sample_rate(&self) -> f64;

    fn destination(&self) -> Arc<dyn Destination>;

    fn create_gain(&self, options: GainOptions) -> Result<Arc<dyn GainNode>>;

    fn create_feedback_delay(
        &self,
        max_delay: f64,
        delay_time: f32,
        feedback: f32,
    ) -> Result<Arc<dyn DelayUnit>>;

    /// Build a reverb; construction counts as the first generation.
    fn create_reverb(&self, settings: &ReverbSettings) -> Result<Arc<dyn ReverbUnit>>;

    fn create_filter(&self, value: f32) -> Result<Arc<dyn FilterUnit>>;

    /// Stereo panner used to normalise arbitrary inputs to two channels.
    fn create_stereo_panner(&self) -> Result<Arc<dyn AudioNode>>;

    fn create_channel_splitter(&self, outputs: usize) -> Result<Arc<dyn AudioNode>>;

    fn create_channel_merger(&self, inputs: usize) -> Result<Arc<dyn AudioNode>>;

    /// Tap that hands its stereo input to `callback` in blocks of exactly
    /// `block_size` frames, in render order.
    fn create_capture_tap(
        &self,
        block_size: usize,
        callback: CaptureCallback,
    ) -> Result<Arc<dyn AudioNode>>;
}
