//! Time-stamped parameter automation.
//!
//! A [`ParamTimeline`] is the per-parameter event list a host keeps when the
//! control thread schedules values ahead of playback. It answers "what is the
//! value at time `t`" for set-value and exponential-ramp events.
//!
//! # Example
//!
//! ```
//! use orbitmix_core::ParamTimeline;
//!
//! let mut gain = ParamTimeline::new(1.0);
//! gain.set_value_at_time(1.0, 0.0);
//! gain.exponential_ramp_to_value_at_time(0.01, 1.0);
//!
//! assert!((gain.value_at(0.5) - 0.1).abs() < 1e-4);
//! assert_eq!(gain.value_at(2.0), 0.01);
//! ```

/// A single scheduled automation event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEvent {
    /// Jump to `value` at `time`.
    SetValue { value: f32, time: f64 },
    /// Exponential ramp from the previous event, arriving at `value` at `time`.
    ExponentialRamp { value: f32, time: f64 },
}

impl ParamEvent {
    #[inline]
    pub fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { time, .. } | ParamEvent::ExponentialRamp { time, .. } => time,
        }
    }

    #[inline]
    pub fn value(&self) -> f32 {
        match *self {
            ParamEvent::SetValue { value, .. } | ParamEvent::ExponentialRamp { value, .. } => value,
        }
    }
}

/// Ordered automation events for one parameter.
#[derive(Debug, Clone)]
pub struct ParamTimeline {
    default: f32,
    events: Vec<ParamEvent>,
}

impl ParamTimeline {
    pub fn new(default: f32) -> Self {
        Self {
            default,
            events: Vec::new(),
        }
    }

    pub fn default_value(&self) -> f32 {
        self.default
    }

    pub fn events(&self) -> &[ParamEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::SetValue { value, time });
    }

    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::ExponentialRamp { value, time });
    }

    /// Remove every event at or after `from`.
    pub fn cancel_from(&mut self, from: f64) {
        self.events.retain(|event| event.time() < from);
    }

    /// Value of the parameter at `time`.
    pub fn value_at(&self, time: f64) -> f32 {
        let mut value = self.default;
        let mut anchor = 0.0;

        for event in &self.events {
            if event.time() > time {
                if let ParamEvent::ExponentialRamp {
                    value: target,
                    time: end,
                } = *event
                {
                    return exponential_between(value, anchor, target, end, time);
                }
                break;
            }
            value = event.value();
            anchor = event.time();
        }

        value
    }

    // Events at equal times keep insertion order.
    fn insert(&mut self, event: ParamEvent) {
        let index = self
            .events
            .partition_point(|existing| existing.time() <= event.time());
        self.events.insert(index, event);
    }
}

/// Geometric interpolation between `(t0, v0)` and `(t1, v1)`.
///
/// Exponential ramps are undefined through zero or across a sign change; the
/// start value is held until the ramp's end in that case.
fn exponential_between(v0: f32, t0: f64, v1: f32, t1: f64, time: f64) -> f32 {
    if t1 <= t0 || v0 == 0.0 || v1 == 0.0 || v0.is_sign_negative() != v1.is_sign_negative() {
        return v0;
    }
    let progress = ((time - t0) / (t1 - t0)).clamp(0.0, 1.0);
    let ratio = (v1 / v0) as f64;
    (v0 as f64 * ratio.powf(progress)) as f32
}
