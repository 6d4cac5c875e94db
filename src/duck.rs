//! Gain ducking.
//!
//! A duck dips an orbit's output gain and lets it recover, typically to
//! make room for a kick. [`DuckCommand`] carries the cross-orbit form where
//! targets and envelope parameters are each either one value for every
//! target or a per-target sequence.

use orbitmix_core::AudioParam;

/// A value given once for every target, or once per target position.
#[derive(Debug, Clone, PartialEq)]
pub enum Broadcast<T> {
    Scalar(T),
    Sequence(Vec<T>),
}

impl<T: Copy> Broadcast<T> {
    /// Value for target position `index`.
    ///
    /// Positions past the end of a sequence fall back to its first element.
    /// `None` only for an empty sequence.
    pub fn resolve(&self, index: usize) -> Option<T> {
        match self {
            Broadcast::Scalar(value) => Some(*value),
            Broadcast::Sequence(values) => values.get(index).or_else(|| values.first()).copied(),
        }
    }

    /// Every value, a scalar counting as one.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let values = match self {
            Broadcast::Scalar(value) => std::slice::from_ref(value),
            Broadcast::Sequence(values) => values.as_slice(),
        };
        values.iter().copied()
    }
}

macro_rules! impl_broadcast_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Broadcast<$ty> {
                fn from(value: $ty) -> Self {
                    Broadcast::Scalar(value)
                }
            }

            impl From<Vec<$ty>> for Broadcast<$ty> {
                fn from(values: Vec<$ty>) -> Self {
                    Broadcast::Sequence(values)
                }
            }

            impl<const N: usize> From<[$ty; N]> for Broadcast<$ty> {
                fn from(values: [$ty; N]) -> Self {
                    Broadcast::Sequence(values.to_vec())
                }
            }

            impl From<&[$ty]> for Broadcast<$ty> {
                fn from(values: &[$ty]) -> Self {
                    Broadcast::Sequence(values.to_vec())
                }
            }
        )*
    };
}

impl_broadcast_from!(usize, f64);

/// Envelope of a single duck.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuckEnvelope {
    /// Seconds from the schedule time until the dip bottoms out.
    pub onset: f64,
    /// Seconds the gain takes to recover to unity.
    pub attack: f64,
    /// 0 leaves the gain alone, 1 dips to the floor.
    pub depth: f64,
}

impl Default for DuckEnvelope {
    fn default() -> Self {
        Self {
            onset: 0.0,
            attack: 0.1,
            depth: 1.0,
        }
    }
}

impl DuckEnvelope {
    pub fn new(onset: f64, attack: f64, depth: f64) -> Self {
        Self {
            onset,
            attack,
            depth,
        }
    }
}

/// A duck fanned out to one or more orbits.
///
/// ```
/// use orbitmix::DuckCommand;
///
/// let command = DuckCommand::new([1, 2]).attack([0.1, 0.2]).depth(0.5);
/// let second = command.envelope(1).unwrap();
/// assert_eq!(second.attack, 0.2);
/// assert_eq!(second.depth, 0.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DuckCommand {
    pub targets: Broadcast<usize>,
    pub onset: Broadcast<f64>,
    pub attack: Broadcast<f64>,
    pub depth: Broadcast<f64>,
}

impl DuckCommand {
    pub fn new(targets: impl Into<Broadcast<usize>>) -> Self {
        let defaults = DuckEnvelope::default();
        Self {
            targets: targets.into(),
            onset: Broadcast::Scalar(defaults.onset),
            attack: Broadcast::Scalar(defaults.attack),
            depth: Broadcast::Scalar(defaults.depth),
        }
    }

    pub fn onset(mut self, onset: impl Into<Broadcast<f64>>) -> Self {
        self.onset = onset.into();
        self
    }

    pub fn attack(mut self, attack: impl Into<Broadcast<f64>>) -> Self {
        self.attack = attack.into();
        self
    }

    pub fn depth(mut self, depth: impl Into<Broadcast<f64>>) -> Self {
        self.depth = depth.into();
        self
    }

    /// Envelope for target position `index`; empty parameter sequences fall
    /// back to the defaults.
    pub fn envelope(&self, index: usize) -> Option<DuckEnvelope> {
        self.targets.iter().nth(index)?;
        let defaults = DuckEnvelope::default();
        Some(DuckEnvelope {
            onset: self.onset.resolve(index).unwrap_or(defaults.onset),
            attack: self.attack.resolve(index).unwrap_or(defaults.attack),
            depth: self.depth.resolve(index).unwrap_or(defaults.depth),
        })
    }
}

/// Limits applied when a duck fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DuckLimits {
    pub floor: f32,
    pub min_attack: f64,
}

/// Write a duck onto `gain`, anchored at the live clock `now`.
///
/// Pending automation is cancelled and the live value pinned at `now` so
/// repeated ducks never stack. The dip starts at `max(time, now)`, bottoms
/// out at the floor after `onset` and ramps back to unity over `attack`
/// (never shorter than the minimum attack).
pub(crate) fn apply_duck(
    gain: &dyn AudioParam,
    now: f64,
    time: f64,
    envelope: DuckEnvelope,
    limits: DuckLimits,
) {
    let current = gain.value();
    gain.cancel_scheduled_values(now);
    gain.set_value_at_time(current, now);

    let start = time.max(now);
    let floor = duck_floor(envelope.depth, limits.floor, current);
    let bottom = start + envelope.onset;

    gain.exponential_ramp_to_value_at_time(floor, bottom);
    gain.exponential_ramp_to_value_at_time(1.0, bottom + envelope.attack.max(limits.min_attack));
}

/// `1 - sqrt(depth)`, raised to `min` and then capped at `current`.
///
/// The cap wins when the gain is already below the floor.
pub(crate) fn duck_floor(depth: f64, min: f32, current: f32) -> f32 {
    let target = (1.0 - depth.max(0.0).sqrt()) as f32;
    target.max(min).min(current)
}
