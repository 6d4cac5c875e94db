//! A single effect bus.
//!
//! Sources connect into the summing point. Summing feeds the output gain,
//! through the filter once one exists. Delay and reverb units feed back into
//! summing and are driven by per-source send gains. Every unit is created on
//! first use and reconfigured in place afterwards.

use crate::config::OrbitTuning;
use crate::duck::{apply_duck, DuckEnvelope, DuckLimits};
use orbitmix_core::{
    AudioContext, AudioNode, DelayUnit, Error, FilterUnit, GainNode, GainOptions, NodeId,
    ReverbSettings, ReverbUnit, Result, Scheduler, TaskId,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Delay time used when a caller has no preference.
pub const DEFAULT_DELAY_TIME: f32 = 0.0;

/// Feedback used when a caller has no preference.
pub const DEFAULT_FEEDBACK: f32 = 0.5;

/// Longest delay time a delay unit is built for, in seconds.
const MAX_DELAY_SECONDS: f64 = 1.0;

/// Highest delay feedback any configuration may allow.
pub const MAX_FEEDBACK: f32 = 0.98;

/// Clamp delay feedback into `[0, ceiling]`, with `ceiling` itself capped at
/// [`MAX_FEEDBACK`]. NaN maps to 0.
#[inline]
pub fn clamp_feedback(feedback: f32, ceiling: f32) -> f32 {
    feedback.max(0.0).min(ceiling.min(MAX_FEEDBACK))
}

pub struct Orbit {
    index: usize,
    context: Arc<dyn AudioContext>,
    scheduler: Arc<Scheduler>,
    tuning: OrbitTuning,
    output: Arc<dyn GainNode>,
    summing: Arc<dyn GainNode>,
    filter: Option<Arc<dyn FilterUnit>>,
    delay: Option<Arc<dyn DelayUnit>>,
    reverb: Option<Arc<dyn ReverbUnit>>,
    reverb_applied: ReverbSettings,
    reverb_sends: HashMap<NodeId, Arc<dyn GainNode>>,
    delay_sends: HashMap<NodeId, Arc<dyn GainNode>>,
}

impl Orbit {
    pub fn new(
        index: usize,
        context: Arc<dyn AudioContext>,
        scheduler: Arc<Scheduler>,
        tuning: OrbitTuning,
    ) -> Result<Self> {
        let output = context.create_gain(GainOptions::stereo(1.0))?;
        let summing = context.create_gain(GainOptions::stereo(1.0))?;
        summing.connect(output.id())?;

        Ok(Self {
            index,
            context,
            scheduler,
            tuning,
            output,
            summing,
            filter: None,
            delay: None,
            reverb: None,
            reverb_applied: ReverbSettings::default(),
            reverb_sends: HashMap::new(),
            delay_sends: HashMap::new(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Final gain of the bus; this is what gets routed to the destination.
    pub fn output(&self) -> &Arc<dyn GainNode> {
        &self.output
    }

    pub fn summing(&self) -> &Arc<dyn GainNode> {
        &self.summing
    }

    pub fn filter(&self) -> Option<&Arc<dyn FilterUnit>> {
        self.filter.as_ref()
    }

    pub fn delay(&self) -> Option<&Arc<dyn DelayUnit>> {
        self.delay.as_ref()
    }

    pub fn reverb(&self) -> Option<&Arc<dyn ReverbUnit>> {
        self.reverb.as_ref()
    }

    /// Settings the reverb was last generated from.
    pub fn reverb_settings(&self) -> &ReverbSettings {
        &self.reverb_applied
    }

    /// Route `node` into the summing point.
    pub fn connect_to_output<N: AudioNode + ?Sized>(&self, node: &N) -> Result<()> {
        node.connect(self.summing.id())
    }

    /// Insert the filter between summing and output on first use, then
    /// schedule its control value at `at`.
    pub fn get_filter(&mut self, value: f32, at: f64) -> Result<Arc<dyn FilterUnit>> {
        let filter = match &self.filter {
            Some(filter) => Arc::clone(filter),
            None => {
                let filter = self.context.create_filter(value)?;
                self.summing.disconnect();
                self.summing.connect(filter.id())?;
                filter.connect(self.output.id())?;
                tracing::debug!(target: "orbitmix", orbit = self.index, "filter inserted");
                self.filter = Some(Arc::clone(&filter));
                filter
            }
        };
        filter.value().set_value_at_time(value, at);
        Ok(filter)
    }

    /// Delay unit of this orbit, created on first use.
    ///
    /// Feedback is clamped to the configured ceiling. Parameters are only
    /// written when they differ from the unit's live values.
    pub fn get_delay(&mut self, delay_time: f32, feedback: f32, at: f64) -> Result<Arc<dyn DelayUnit>> {
        let ceiling = self.tuning.feedback_ceiling.min(MAX_FEEDBACK);
        if feedback > ceiling {
            tracing::warn!(
                target: "orbitmix",
                orbit = self.index,
                feedback,
                ceiling,
                "delay feedback clamped"
            );
        }
        let feedback = clamp_feedback(feedback, ceiling);

        let delay = match &self.delay {
            Some(delay) => Arc::clone(delay),
            None => {
                let delay = self
                    .context
                    .create_feedback_delay(MAX_DELAY_SECONDS, delay_time, feedback)?;
                delay.connect(self.summing.id())?;
                if let Err(error) = delay.start(at) {
                    tracing::warn!(
                        target: "orbitmix",
                        orbit = self.index,
                        %error,
                        "delay start failed, continuing"
                    );
                }
                tracing::debug!(target: "orbitmix", orbit = self.index, "delay unit created");
                self.delay = Some(Arc::clone(&delay));
                delay
            }
        };

        if delay.delay_time().value() != delay_time {
            delay.delay_time().set_value_at_time(delay_time, at);
        }
        if delay.feedback().value() != feedback {
            delay.feedback().set_value_at_time(feedback, at);
        }
        Ok(delay)
    }

    /// Reverb unit of this orbit, created on first use.
    ///
    /// The unit is regenerated only when `settings` specifies something that
    /// differs from what it was last generated from.
    pub fn get_reverb(&mut self, settings: &ReverbSettings) -> Result<Arc<dyn ReverbUnit>> {
        let Some(reverb) = &self.reverb else {
            let reverb = self.context.create_reverb(settings)?;
            reverb.connect(self.summing.id())?;
            tracing::debug!(target: "orbitmix", orbit = self.index, "reverb unit created");
            self.reverb = Some(Arc::clone(&reverb));
            self.reverb_applied = settings.clone();
            return Ok(reverb);
        };

        let reverb = Arc::clone(reverb);
        if settings.differs_from(&self.reverb_applied) {
            let merged = settings.merged_over(&self.reverb_applied);
            reverb.generate(&merged)?;
            tracing::debug!(target: "orbitmix", orbit = self.index, "reverb regenerated");
            self.reverb_applied = merged;
        }
        Ok(reverb)
    }

    /// Send `source` into the reverb at `amount`.
    ///
    /// One send gain exists per source; later calls only update its level.
    pub fn send_reverb<N: AudioNode + ?Sized>(
        &mut self,
        source: &N,
        amount: f32,
    ) -> Result<Arc<dyn GainNode>> {
        let target = self
            .reverb
            .as_ref()
            .map(|reverb| reverb.id())
            .ok_or(Error::EffectNotReady("reverb"))?;
        let now = self.context.current_time();
        effect_send(
            &*self.context,
            &mut self.reverb_sends,
            source,
            target,
            amount,
            now,
        )
    }

    /// Send `source` into the delay at `amount`.
    pub fn send_delay<N: AudioNode + ?Sized>(
        &mut self,
        source: &N,
        amount: f32,
    ) -> Result<Arc<dyn GainNode>> {
        let target = self
            .delay
            .as_ref()
            .map(|delay| delay.id())
            .ok_or(Error::EffectNotReady("delay"))?;
        let now = self.context.current_time();
        effect_send(
            &*self.context,
            &mut self.delay_sends,
            source,
            target,
            amount,
            now,
        )
    }

    /// Drop the sends of a source that is going away.
    pub fn release_sends(&mut self, source: NodeId) {
        for sends in [&mut self.reverb_sends, &mut self.delay_sends] {
            if let Some(send) = sends.remove(&source) {
                send.disconnect();
            }
        }
    }

    /// Schedule a duck of the output gain at `time`.
    pub fn duck(&self, time: f64, envelope: DuckEnvelope) -> TaskId {
        self.duck_handle().schedule(time, envelope)
    }

    /// Handle that ducks this orbit without holding it.
    pub fn duck_handle(&self) -> DuckHandle {
        DuckHandle {
            index: self.index,
            context: Arc::clone(&self.context),
            scheduler: Arc::clone(&self.scheduler),
            tuning: self.tuning,
            output: Arc::clone(&self.output),
        }
    }

    /// Disconnect every unit this orbit owns and drop its pending ducks.
    pub fn disconnect(&mut self) {
        self.output.disconnect();
        self.summing.disconnect();
        if let Some(filter) = &self.filter {
            filter.disconnect();
        }
        if let Some(delay) = &self.delay {
            delay.disconnect();
        }
        if let Some(reverb) = &self.reverb {
            reverb.disconnect();
        }
        for (_, send) in self.reverb_sends.drain().chain(self.delay_sends.drain()) {
            send.disconnect();
        }
        self.scheduler.cancel_key(self.index);
    }
}

/// Everything a duck touches: the output gain, the clock and the scheduler.
///
/// The registry keeps one per orbit so ducking never locks an orbit.
#[derive(Clone)]
pub struct DuckHandle {
    index: usize,
    context: Arc<dyn AudioContext>,
    scheduler: Arc<Scheduler>,
    tuning: OrbitTuning,
    output: Arc<dyn GainNode>,
}

impl DuckHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Schedule a duck of the output gain at `time`.
    ///
    /// The task fires one lookahead ahead of `time` and anchors the envelope
    /// on the clock it reads when it runs.
    pub fn schedule(&self, time: f64, envelope: DuckEnvelope) -> TaskId {
        let context = Arc::clone(&self.context);
        let output = Arc::clone(&self.output);
        let limits = DuckLimits {
            floor: self.tuning.duck_floor,
            min_attack: self.tuning.min_attack,
        };

        self.scheduler
            .schedule(self.index, time - self.tuning.duck_lookahead, move || {
                let now = context.current_time();
                apply_duck(output.gain(), now, time, envelope, limits);
            })
    }
}

impl std::fmt::Debug for DuckHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckHandle")
            .field("index", &self.index)
            .field("output", &self.output.id())
            .finish()
    }
}

fn effect_send<N: AudioNode + ?Sized>(
    context: &dyn AudioContext,
    sends: &mut HashMap<NodeId, Arc<dyn GainNode>>,
    source: &N,
    target: NodeId,
    amount: f32,
    now: f64,
) -> Result<Arc<dyn GainNode>> {
    if let Some(send) = sends.get(&source.id()) {
        send.gain().set_value_at_time(amount, now);
        return Ok(Arc::clone(send));
    }

    let send = context.create_gain(GainOptions::new(amount))?;
    source.connect(send.id())?;
    send.connect(target)?;
    sends.insert(source.id(), Arc::clone(&send));
    Ok(send)
}

impl std::fmt::Debug for Orbit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orbit")
            .field("index", &self.index)
            .field("output", &self.output.id())
            .field("filter", &self.filter.as_ref().map(|n| n.id()))
            .field("delay", &self.delay.as_ref().map(|n| n.id()))
            .field("reverb", &self.reverb.as_ref().map(|n| n.id()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitmix_core::{HeadlessContext, NodeKind};

    fn orbit() -> (HeadlessContext, Arc<Scheduler>, Orbit) {
        let context = HeadlessContext::new(48000.0);
        let scheduler = Arc::new(Scheduler::new());
        let orbit = Orbit::new(
            0,
            Arc::new(context.clone()),
            Arc::clone(&scheduler),
            OrbitTuning::default(),
        )
        .unwrap();
        (context, scheduler, orbit)
    }

    #[test]
    fn test_clamp_feedback() {
        assert_eq!(clamp_feedback(1.5, 0.98), 0.98);
        assert_eq!(clamp_feedback(-0.2, 0.98), 0.0);
        assert_eq!(clamp_feedback(0.4, 0.98), 0.4);
        assert_eq!(clamp_feedback(f32::NAN, 0.98), 0.0);
        assert_eq!(clamp_feedback(5.0, 0.995), MAX_FEEDBACK);
        assert_eq!(clamp_feedback(0.7, 0.5), 0.5);
    }

    #[test]
    fn test_unchecked_tuning_cannot_raise_ceiling() {
        let context = HeadlessContext::new(48000.0);
        let tuning = OrbitTuning {
            feedback_ceiling: 0.995,
            ..OrbitTuning::default()
        };
        let mut orbit = Orbit::new(
            0,
            Arc::new(context.clone()),
            Arc::new(Scheduler::new()),
            tuning,
        )
        .unwrap();

        let delay = orbit.get_delay(0.1, 5.0, 0.0).unwrap();
        let feedback = context.param(delay.id(), "feedback").unwrap();
        assert_eq!(feedback.value_at(1.0), MAX_FEEDBACK);
    }

    #[test]
    fn test_filter_inserted_once() {
        let (context, _, mut orbit) = orbit();
        let summing = orbit.summing().id();
        let output = orbit.output().id();

        let filter = orbit.get_filter(0.3, 0.0).unwrap();
        orbit.get_filter(0.6, 1.0).unwrap();

        assert_eq!(context.created(NodeKind::Filter), 1);
        assert!(!context.is_connected(summing, output));
        assert!(context.is_connected(summing, filter.id()));
        assert!(context.is_connected(filter.id(), output));
        assert_eq!(context.param(filter.id(), "value").unwrap().value_at(1.0), 0.6);
    }

    #[test]
    fn test_delay_writes_only_changed_params() {
        let (context, _, mut orbit) = orbit();
        let delay = orbit.get_delay(0.25, 0.5, 0.0).unwrap();
        let delay_time = context.param(delay.id(), "delay_time").unwrap();
        let feedback = context.param(delay.id(), "feedback").unwrap();

        assert!(delay_time.events().is_empty());
        assert!(feedback.events().is_empty());

        orbit.get_delay(0.25, 0.7, 1.0).unwrap();
        assert!(delay_time.events().is_empty());
        assert_eq!(feedback.events().len(), 1);
        assert_eq!(context.created(NodeKind::FeedbackDelay), 1);
        assert!(context.is_connected(delay.id(), orbit.summing().id()));
    }

    #[test]
    fn test_delay_start_failure_tolerated() {
        let (context, _, mut orbit) = orbit();
        context.set_fail_delay_start(true);
        assert!(orbit.get_delay(0.1, 0.5, 0.0).is_ok());
        assert!(orbit.delay().is_some());
    }

    #[test]
    fn test_reverb_regenerates_on_change_only() {
        let (context, _, mut orbit) = orbit();
        let settings = ReverbSettings::new().duration(2.0).fade(0.1);

        let reverb = orbit.get_reverb(&settings).unwrap();
        orbit.get_reverb(&settings).unwrap();
        assert_eq!(context.regenerations(reverb.id()), 1);

        orbit.get_reverb(&ReverbSettings::new().fade(0.1)).unwrap();
        assert_eq!(context.regenerations(reverb.id()), 1);

        orbit
            .get_reverb(&ReverbSettings::new().duration(4.0).fade(0.1))
            .unwrap();
        assert_eq!(context.regenerations(reverb.id()), 2);
        assert_eq!(orbit.reverb_settings().duration, Some(4.0));
    }

    #[test]
    fn test_send_requires_unit() {
        let (context, _, mut orbit) = orbit();
        let source = context.create_gain(GainOptions::default()).unwrap();

        assert!(matches!(
            orbit.send_delay(&*source, 0.5),
            Err(Error::EffectNotReady("delay"))
        ));
    }

    #[test]
    fn test_send_reused_per_source() {
        let (context, _, mut orbit) = orbit();
        let reverb = orbit.get_reverb(&ReverbSettings::new()).unwrap();
        let source = context.create_gain(GainOptions::default()).unwrap();

        let first = orbit.send_reverb(&*source, 0.3).unwrap();
        let second = orbit.send_reverb(&*source, 0.6).unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(context.created(NodeKind::Gain), 4);
        assert!(context.is_connected(source.id(), first.id()));
        assert!(context.is_connected(first.id(), reverb.id()));

        orbit.release_sends(source.id());
        assert!(!context.is_connected(first.id(), reverb.id()));
    }

    #[test]
    fn test_duck_fires_after_lookahead() {
        let (context, scheduler, orbit) = orbit();
        orbit.duck(1.0, DuckEnvelope::default());

        assert_eq!(scheduler.pending_for(0), 1);
        assert_eq!(scheduler.next_deadline(), Some(1.0 - 0.01));

        context.set_time(0.99);
        assert_eq!(scheduler.run_due(context.current_time()), 1);

        let gain = context.param(orbit.output().id(), "gain").unwrap();
        let events = gain.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].value(), 0.01);
        assert_eq!(events[1].time(), 1.0);
    }

    #[test]
    fn test_disconnect_without_units() {
        let (context, scheduler, mut orbit) = orbit();
        orbit.duck(5.0, DuckEnvelope::default());
        orbit.disconnect();

        assert!(context.connections().is_empty());
        assert_eq!(scheduler.pending(), 0);
    }
}
