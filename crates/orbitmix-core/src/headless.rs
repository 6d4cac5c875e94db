//! Device-free audio host.
//!
//! [`HeadlessContext`] keeps the node graph as plain data: a node table, an
//! edge list and one [`ParamTimeline`] per parameter. Nothing is synthesised;
//! [`render`](HeadlessContext::render) only pushes caller-supplied stereo
//! frames into capture taps that have an inbound connection. The clock is
//! driven by hand with [`set_time`](HeadlessContext::set_time) and
//! [`advance`](HeadlessContext::advance), which makes the host suitable for
//! offline rendering and deterministic tests.

use crate::automation::{ParamEvent, ParamTimeline};
use crate::lockfree::{AtomicDouble, AtomicFlag};
use crate::node::{
    AudioContext, AudioNode, AudioParam, CaptureCallback, DelayUnit, Destination, FilterUnit,
    GainNode, GainOptions, NodeId, ReverbSettings, ReverbUnit,
};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Kind of node created on a [`HeadlessContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Gain,
    FeedbackDelay,
    Reverb,
    Filter,
    StereoPanner,
    ChannelSplitter,
    ChannelMerger,
    CaptureTap,
    Destination,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Gain => "gain",
            NodeKind::FeedbackDelay => "feedback delay",
            NodeKind::Reverb => "reverb",
            NodeKind::Filter => "filter",
            NodeKind::StereoPanner => "stereo panner",
            NodeKind::ChannelSplitter => "channel splitter",
            NodeKind::ChannelMerger => "channel merger",
            NodeKind::CaptureTap => "capture tap",
            NodeKind::Destination => "destination",
        }
    }
}

/// One edge of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    pub from: NodeId,
    pub to: NodeId,
    pub output: usize,
    pub input: usize,
}

#[derive(Debug, Clone, Copy)]
struct NodeEntry {
    kind: NodeKind,
    inputs: usize,
    outputs: usize,
}

struct Tap {
    block_size: usize,
    callback: CaptureCallback,
    left: Vec<f32>,
    right: Vec<f32>,
}

struct HeadlessGraph {
    clock: Arc<AtomicDouble>,
    sample_rate: f64,
    next_id: AtomicU64,
    nodes: Mutex<HashMap<NodeId, NodeEntry>>,
    edges: Mutex<Vec<Connection>>,
    created: Mutex<HashMap<NodeKind, usize>>,
    regenerations: Mutex<HashMap<NodeId, (usize, ReverbSettings)>>,
    params: Mutex<HashMap<(NodeId, &'static str), Arc<HeadlessParam>>>,
    taps: Mutex<HashMap<NodeId, Tap>>,
    fail_delay_start: AtomicFlag,
}

impl HeadlessGraph {
    fn register(&self, kind: NodeKind, inputs: usize, outputs: usize) -> NodeId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.nodes.lock().insert(
            id,
            NodeEntry {
                kind,
                inputs,
                outputs,
            },
        );
        if kind != NodeKind::Destination {
            *self.created.lock().entry(kind).or_insert(0) += 1;
        }
        id
    }

    fn param(&self, node: NodeId, name: &'static str, default: f32) -> Arc<HeadlessParam> {
        let param = Arc::new(HeadlessParam {
            clock: Arc::clone(&self.clock),
            timeline: Mutex::new(ParamTimeline::new(default)),
        });
        self.params.lock().insert((node, name), Arc::clone(&param));
        param
    }

    fn connect(&self, from: NodeId, to: NodeId, output: usize, input: usize) -> Result<()> {
        {
            let nodes = self.nodes.lock();
            let source = nodes.get(&from).ok_or(Error::UnknownNode(from))?;
            if output >= source.outputs {
                return Err(Error::InvalidPort {
                    node: from,
                    direction: "output",
                    port: output,
                });
            }
            let target = nodes.get(&to).ok_or(Error::UnknownNode(to))?;
            if input >= target.inputs {
                return Err(Error::InvalidPort {
                    node: to,
                    direction: "input",
                    port: input,
                });
            }
        }

        let edge = Connection {
            from,
            to,
            output,
            input,
        };
        let mut edges = self.edges.lock();
        if !edges.contains(&edge) {
            edges.push(edge);
        }
        Ok(())
    }

    fn disconnect(&self, from: NodeId) {
        self.edges.lock().retain(|edge| edge.from != from);
    }

    fn disconnect_from(&self, from: NodeId, to: NodeId) {
        self.edges
            .lock()
            .retain(|edge| !(edge.from == from && edge.to == to));
    }
}

/// Parameter backed by a [`ParamTimeline`] evaluated against the host clock.
pub struct HeadlessParam {
    clock: Arc<AtomicDouble>,
    timeline: Mutex<ParamTimeline>,
}

impl HeadlessParam {
    /// Scheduled events, in time order.
    pub fn events(&self) -> Vec<ParamEvent> {
        self.timeline.lock().events().to_vec()
    }

    /// Value at an arbitrary time, independent of the clock.
    pub fn value_at(&self, time: f64) -> f32 {
        self.timeline.lock().value_at(time)
    }
}

impl AudioParam for HeadlessParam {
    fn value(&self) -> f32 {
        self.timeline.lock().value_at(self.clock.get())
    }

    fn set_value_at_time(&self, value: f32, time: f64) {
        self.timeline.lock().set_value_at_time(value, time);
    }

    fn exponential_ramp_to_value_at_time(&self, value: f32, time: f64) {
        self.timeline
            .lock()
            .exponential_ramp_to_value_at_time(value, time);
    }

    fn cancel_scheduled_values(&self, from: f64) {
        self.timeline.lock().cancel_from(from);
    }
}

impl std::fmt::Debug for HeadlessParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessParam")
            .field("events", &self.events())
            .finish()
    }
}

struct NodeCore {
    id: NodeId,
    channels: usize,
    graph: Arc<HeadlessGraph>,
}

macro_rules! impl_audio_node {
    ($($node:ty),* $(,)?) => {
        $(
            impl AudioNode for $node {
                fn id(&self) -> NodeId {
                    self.core.id
                }

                fn channel_count(&self) -> usize {
                    self.core.channels
                }

                fn connect_port(&self, target: NodeId, output: usize, input: usize) -> Result<()> {
                    self.core.graph.connect(self.core.id, target, output, input)
                }

                fn disconnect(&self) {
                    self.core.graph.disconnect(self.core.id);
                }

                fn disconnect_from(&self, target: NodeId) {
                    self.core.graph.disconnect_from(self.core.id, target);
                }
            }
        )*
    };
}

struct HeadlessNode {
    core: NodeCore,
}

struct HeadlessGain {
    core: NodeCore,
    gain: Arc<HeadlessParam>,
}

struct HeadlessDelay {
    core: NodeCore,
    delay_time: Arc<HeadlessParam>,
    feedback: Arc<HeadlessParam>,
}

struct HeadlessReverb {
    core: NodeCore,
}

struct HeadlessFilter {
    core: NodeCore,
    value: Arc<HeadlessParam>,
}

impl_audio_node!(HeadlessNode, HeadlessGain, HeadlessDelay, HeadlessReverb, HeadlessFilter);

impl GainNode for HeadlessGain {
    fn gain(&self) -> &dyn AudioParam {
        self.gain.as_ref()
    }
}

impl DelayUnit for HeadlessDelay {
    fn delay_time(&self) -> &dyn AudioParam {
        self.delay_time.as_ref()
    }

    fn feedback(&self) -> &dyn AudioParam {
        self.feedback.as_ref()
    }

    fn start(&self, time: f64) -> Result<()> {
        if self.core.graph.fail_delay_start.get() {
            return Err(Error::StartFailed(format!(
                "delay {} refused to start at {time}",
                self.core.id
            )));
        }
        Ok(())
    }
}

impl ReverbUnit for HeadlessReverb {
    fn generate(&self, settings: &ReverbSettings) -> Result<()> {
        let mut regenerations = self.core.graph.regenerations.lock();
        let entry = regenerations
            .entry(self.core.id)
            .or_insert((0, ReverbSettings::default()));
        entry.0 += 1;
        entry.1 = settings.clone();
        Ok(())
    }
}

impl FilterUnit for HeadlessFilter {
    fn value(&self) -> &dyn AudioParam {
        self.value.as_ref()
    }
}

struct HeadlessDestination {
    id: NodeId,
    max_channels: usize,
    channels: AtomicUsize,
    graph: Arc<HeadlessGraph>,
}

impl AudioNode for HeadlessDestination {
    fn id(&self) -> NodeId {
        self.id
    }

    fn channel_count(&self) -> usize {
        self.channels.load(Ordering::Acquire)
    }

    fn connect_port(&self, target: NodeId, output: usize, input: usize) -> Result<()> {
        self.graph.connect(self.id, target, output, input)
    }

    fn disconnect(&self) {
        self.graph.disconnect(self.id);
    }

    fn disconnect_from(&self, target: NodeId) {
        self.graph.disconnect_from(self.id, target);
    }
}

impl Destination for HeadlessDestination {
    fn max_channel_count(&self) -> usize {
        self.max_channels
    }

    fn set_channel_count(&self, count: usize) {
        self.channels
            .store(count.min(self.max_channels), Ordering::Release);
    }
}

/// Device-free [`AudioContext`].
#[derive(Clone)]
pub struct HeadlessContext {
    graph: Arc<HeadlessGraph>,
    destination: Arc<HeadlessDestination>,
}

impl HeadlessContext {
    /// Stereo host at `sample_rate`.
    pub fn new(sample_rate: f64) -> Self {
        Self::with_channels(sample_rate, 2)
    }

    /// Host whose destination supports up to `max_channels` channels.
    pub fn with_channels(sample_rate: f64, max_channels: usize) -> Self {
        let max_channels = max_channels.max(1);
        let graph = Arc::new(HeadlessGraph {
            clock: Arc::new(AtomicDouble::new(0.0)),
            sample_rate,
            next_id: AtomicU64::new(0),
            nodes: Mutex::new(HashMap::new()),
            edges: Mutex::new(Vec::new()),
            created: Mutex::new(HashMap::new()),
            regenerations: Mutex::new(HashMap::new()),
            params: Mutex::new(HashMap::new()),
            taps: Mutex::new(HashMap::new()),
            fail_delay_start: AtomicFlag::new(false),
        });
        let id = graph.register(NodeKind::Destination, 1, 0);
        let destination = Arc::new(HeadlessDestination {
            id,
            max_channels,
            channels: AtomicUsize::new(2.min(max_channels)),
            graph: Arc::clone(&graph),
        });
        Self { graph, destination }
    }

    pub fn set_time(&self, seconds: f64) {
        self.graph.clock.set(seconds);
    }

    /// Move the clock forward by `seconds`; returns the new time.
    pub fn advance(&self, seconds: f64) -> f64 {
        self.graph.clock.add(seconds)
    }

    /// Snapshot of every edge in the graph.
    pub fn connections(&self) -> Vec<Connection> {
        self.graph.edges.lock().clone()
    }

    /// Edges leaving `from`.
    pub fn outgoing(&self, from: NodeId) -> Vec<Connection> {
        self.graph
            .edges
            .lock()
            .iter()
            .filter(|edge| edge.from == from)
            .copied()
            .collect()
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.graph
            .edges
            .lock()
            .iter()
            .any(|edge| edge.from == from && edge.to == to)
    }

    pub fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        self.graph.nodes.lock().get(&node).map(|entry| entry.kind)
    }

    /// Number of nodes of `kind` created so far.
    pub fn created(&self, kind: NodeKind) -> usize {
        self.graph.created.lock().get(&kind).copied().unwrap_or(0)
    }

    /// Number of times reverb `node` has been generated, construction included.
    pub fn regenerations(&self, node: NodeId) -> usize {
        self.graph
            .regenerations
            .lock()
            .get(&node)
            .map_or(0, |(count, _)| *count)
    }

    /// Settings of the most recent generation of reverb `node`.
    pub fn reverb_settings(&self, node: NodeId) -> Option<ReverbSettings> {
        self.graph
            .regenerations
            .lock()
            .get(&node)
            .map(|(_, settings)| settings.clone())
    }

    /// Parameter `name` of `node`. Names are `gain`, `delay_time`, `feedback` and `value`.
    pub fn param(&self, node: NodeId, name: &str) -> Option<Arc<HeadlessParam>> {
        self.graph
            .params
            .lock()
            .iter()
            .find(|((id, param), _)| *id == node && *param == name)
            .map(|(_, param)| Arc::clone(param))
    }

    /// Make every subsequent [`DelayUnit::start`] call fail.
    pub fn set_fail_delay_start(&self, fail: bool) {
        self.graph.fail_delay_start.set(fail);
    }

    /// Push planar stereo frames through every connected capture tap and
    /// advance the clock by their duration.
    ///
    /// Taps buffer partial blocks; a callback only ever sees exactly
    /// `block_size` frames.
    pub fn render(&self, left: &[f32], right: &[f32]) {
        let frames = left.len().min(right.len());
        if frames == 0 {
            return;
        }

        let fed: Vec<NodeId> = {
            let edges = self.graph.edges.lock();
            let taps = self.graph.taps.lock();
            taps.keys()
                .filter(|tap| edges.iter().any(|edge| edge.to == **tap))
                .copied()
                .collect()
        };

        {
            let mut taps = self.graph.taps.lock();
            for id in fed {
                let Some(tap) = taps.get_mut(&id) else {
                    continue;
                };
                tap.left.extend_from_slice(&left[..frames]);
                tap.right.extend_from_slice(&right[..frames]);
                while tap.left.len() >= tap.block_size {
                    let block_left: Vec<f32> = tap.left.drain(..tap.block_size).collect();
                    let block_right: Vec<f32> = tap.right.drain(..tap.block_size).collect();
                    (tap.callback)(&block_left, &block_right);
                }
            }
        }

        self.graph.clock.add(frames as f64 / self.graph.sample_rate);
    }

    fn core(&self, kind: NodeKind, inputs: usize, outputs: usize, channels: usize) -> NodeCore {
        NodeCore {
            id: self.graph.register(kind, inputs, outputs),
            channels,
            graph: Arc::clone(&self.graph),
        }
    }
}

impl AudioContext for HeadlessContext {
    fn current_time(&self) -> f64 {
        self.graph.clock.get()
    }

    fn sample_rate(&self) -> f64 {
        self.graph.sample_rate
    }

    fn destination(&self) -> Arc<dyn Destination> {
        self.destination.clone()
    }

    fn create_gain(&self, options: GainOptions) -> Result<Arc<dyn GainNode>> {
        let core = self.core(NodeKind::Gain, 1, 1, options.channel_count.unwrap_or(2));
        let gain = self.graph.param(core.id, "gain", options.gain);
        Ok(Arc::new(HeadlessGain { core, gain }))
    }

    fn create_feedback_delay(
        &self,
        max_delay: f64,
        delay_time: f32,
        feedback: f32,
    ) -> Result<Arc<dyn DelayUnit>> {
        if max_delay.is_nan() || max_delay <= 0.0 || f64::from(delay_time) > max_delay {
            return Err(Error::NodeConstruction {
                kind: NodeKind::FeedbackDelay.name(),
                reason: format!("delay time {delay_time} outside 0..={max_delay}"),
            });
        }
        let core = self.core(NodeKind::FeedbackDelay, 1, 1, 2);
        let delay_time = self.graph.param(core.id, "delay_time", delay_time);
        let feedback = self.graph.param(core.id, "feedback", feedback);
        Ok(Arc::new(HeadlessDelay {
            core,
            delay_time,
            feedback,
        }))
    }

    fn create_reverb(&self, settings: &ReverbSettings) -> Result<Arc<dyn ReverbUnit>> {
        let core = self.core(NodeKind::Reverb, 1, 1, 2);
        self.graph
            .regenerations
            .lock()
            .insert(core.id, (1, settings.clone()));
        Ok(Arc::new(HeadlessReverb { core }))
    }

    fn create_filter(&self, value: f32) -> Result<Arc<dyn FilterUnit>> {
        let core = self.core(NodeKind::Filter, 1, 1, 2);
        let value = self.graph.param(core.id, "value", value);
        Ok(Arc::new(HeadlessFilter { core, value }))
    }

    fn create_stereo_panner(&self) -> Result<Arc<dyn AudioNode>> {
        let core = self.core(NodeKind::StereoPanner, 1, 1, 2);
        Ok(Arc::new(HeadlessNode { core }))
    }

    fn create_channel_splitter(&self, outputs: usize) -> Result<Arc<dyn AudioNode>> {
        if outputs == 0 {
            return Err(Error::NodeConstruction {
                kind: NodeKind::ChannelSplitter.name(),
                reason: "a splitter needs at least one output".into(),
            });
        }
        let core = self.core(NodeKind::ChannelSplitter, 1, outputs, outputs);
        Ok(Arc::new(HeadlessNode { core }))
    }

    fn create_channel_merger(&self, inputs: usize) -> Result<Arc<dyn AudioNode>> {
        if inputs == 0 {
            return Err(Error::NodeConstruction {
                kind: NodeKind::ChannelMerger.name(),
                reason: "a merger needs at least one input".into(),
            });
        }
        let core = self.core(NodeKind::ChannelMerger, inputs, 1, inputs);
        Ok(Arc::new(HeadlessNode { core }))
    }

    fn create_capture_tap(
        &self,
        block_size: usize,
        callback: CaptureCallback,
    ) -> Result<Arc<dyn AudioNode>> {
        if block_size == 0 {
            return Err(Error::NodeConstruction {
                kind: NodeKind::CaptureTap.name(),
                reason: "block size must be positive".into(),
            });
        }
        let core = self.core(NodeKind::CaptureTap, 1, 1, 2);
        self.graph.taps.lock().insert(
            core.id,
            Tap {
                block_size,
                callback,
                left: Vec::with_capacity(block_size),
                right: Vec::with_capacity(block_size),
            },
        );
        Ok(Arc::new(HeadlessNode { core }))
    }
}

impl std::fmt::Debug for HeadlessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessContext")
            .field("sample_rate", &self.graph.sample_rate)
            .field("time", &self.graph.clock.get())
            .field("nodes", &self.graph.nodes.lock().len())
            .field("edges", &self.graph.edges.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_validates_ports() {
        let context = HeadlessContext::new(48000.0);
        let gain = context.create_gain(GainOptions::stereo(1.0)).unwrap();
        let merger = context.create_channel_merger(2).unwrap();

        assert!(gain.connect_port(merger.id(), 0, 1).is_ok());
        assert!(matches!(
            gain.connect_port(merger.id(), 0, 2),
            Err(Error::InvalidPort { direction: "input", port: 2, .. })
        ));
        assert!(matches!(
            gain.connect_port(merger.id(), 1, 0),
            Err(Error::InvalidPort { direction: "output", .. })
        ));
        assert!(matches!(gain.connect(999), Err(Error::UnknownNode(999))));
    }

    #[test]
    fn test_duplicate_edges_ignored() {
        let context = HeadlessContext::new(48000.0);
        let gain = context.create_gain(GainOptions::default()).unwrap();
        let destination = context.destination();

        gain.connect(destination.id()).unwrap();
        gain.connect(destination.id()).unwrap();
        assert_eq!(context.outgoing(gain.id()).len(), 1);

        gain.disconnect_from(destination.id());
        assert!(!context.is_connected(gain.id(), destination.id()));
    }

    #[test]
    fn test_param_value_follows_clock() {
        let context = HeadlessContext::new(48000.0);
        let gain = context.create_gain(GainOptions::new(1.0)).unwrap();
        gain.gain().set_value_at_time(0.5, 1.0);

        assert_eq!(gain.gain().value(), 1.0);
        context.set_time(1.0);
        assert_eq!(gain.gain().value(), 0.5);

        let param = context.param(gain.id(), "gain").unwrap();
        assert_eq!(param.events().len(), 1);
    }

    #[test]
    fn test_destination_channel_count_clamped() {
        let context = HeadlessContext::with_channels(48000.0, 8);
        let destination = context.destination();
        assert_eq!(destination.max_channel_count(), 8);

        destination.set_channel_count(16);
        assert_eq!(destination.channel_count(), 8);
    }

    #[test]
    fn test_tap_emits_exact_blocks_only_when_connected() {
        let context = HeadlessContext::new(48000.0);
        let blocks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&blocks);
        let tap = context
            .create_capture_tap(
                4,
                Box::new(move |left: &[f32], right: &[f32]| {
                    sink.lock().push((left.to_vec(), right.to_vec()))
                }),
            )
            .unwrap();

        context.render(&[1.0; 4], &[1.0; 4]);
        assert!(blocks.lock().is_empty());

        let source = context.create_gain(GainOptions::default()).unwrap();
        source.connect(tap.id()).unwrap();

        context.render(&[0.1, 0.2, 0.3], &[0.0; 3]);
        assert!(blocks.lock().is_empty());
        context.render(&[0.4, 0.5, 0.6], &[0.0; 3]);

        let blocks = blocks.lock();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].0, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_render_advances_clock() {
        let context = HeadlessContext::new(100.0);
        context.render(&[0.0; 50], &[0.0; 50]);
        assert_eq!(context.current_time(), 0.5);
    }

    #[test]
    fn test_reverb_generation_counted() {
        let context = HeadlessContext::new(48000.0);
        let reverb = context
            .create_reverb(&ReverbSettings::new().duration(2.0))
            .unwrap();
        assert_eq!(context.regenerations(reverb.id()), 1);

        reverb.generate(&ReverbSettings::new().duration(3.0)).unwrap();
        assert_eq!(context.regenerations(reverb.id()), 2);
        assert_eq!(
            context.reverb_settings(reverb.id()).unwrap().duration,
            Some(3.0)
        );
        assert_eq!(context.created(NodeKind::Reverb), 1);
    }

    #[test]
    fn test_delay_start_failure_switch() {
        let context = HeadlessContext::new(48000.0);
        let delay = context.create_feedback_delay(1.0, 0.0, 0.5).unwrap();
        assert!(delay.start(0.0).is_ok());

        context.set_fail_delay_start(true);
        assert!(matches!(delay.start(0.0), Err(Error::StartFailed(_))));
    }
}
