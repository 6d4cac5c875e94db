//! Final mix stage.
//!
//! Every routed input is normalised to stereo, split into mono channels and
//! merged onto the destination's channel layout, then passes a master gain
//! on its way to the destination. The recorder taps the master gain.

use crate::recorder::{ProgressCallback, RecordedFile, Recorder};
use crate::Result;
use orbitmix_core::{AudioContext, AudioNode, GainNode, GainOptions};
use std::sync::Arc;

/// Destination channel for each channel of a routed input.
///
/// Position `i` maps input channel `i` to the destination channel at that
/// value. Both sides wrap around the available channel counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap(Vec<usize>);

impl ChannelMap {
    pub fn new(channels: Vec<usize>) -> Self {
        Self(channels)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self(vec![0, 1])
    }
}

impl From<Vec<usize>> for ChannelMap {
    fn from(channels: Vec<usize>) -> Self {
        Self(channels)
    }
}

impl<const N: usize> From<[usize; N]> for ChannelMap {
    fn from(channels: [usize; N]) -> Self {
        Self(channels.to_vec())
    }
}

struct MixBus {
    merger: Arc<dyn AudioNode>,
    gain: Arc<dyn GainNode>,
    channels: usize,
    /// Panner and splitter created for each routed input.
    stems: Vec<(Arc<dyn AudioNode>, Arc<dyn AudioNode>)>,
}

impl MixBus {
    fn build(context: &dyn AudioContext) -> Result<Self> {
        let destination = context.destination();
        destination.set_channel_count(destination.max_channel_count());
        let channels = destination.channel_count().max(1);

        let merger = context.create_channel_merger(channels)?;
        let gain = context.create_gain(GainOptions::default())?;
        merger.connect(gain.id())?;
        gain.connect(destination.id())?;

        tracing::debug!(target: "orbitmix", channels, "mix bus built");
        Ok(Self {
            merger,
            gain,
            channels,
            stems: Vec::new(),
        })
    }

    fn teardown(&mut self) {
        for (panner, splitter) in self.stems.drain(..) {
            panner.disconnect();
            splitter.disconnect();
        }
        self.merger.disconnect();
        self.gain.disconnect();
    }
}

pub struct OutputMixer {
    context: Arc<dyn AudioContext>,
    bus: MixBus,
    recorder: Recorder,
}

impl OutputMixer {
    pub fn new(context: Arc<dyn AudioContext>, recorder: Recorder) -> Result<Self> {
        let bus = MixBus::build(&*context)?;
        Ok(Self {
            context,
            bus,
            recorder,
        })
    }

    /// Number of destination channels the merge stage feeds.
    pub fn channels(&self) -> usize {
        self.bus.channels
    }

    pub fn merger(&self) -> &Arc<dyn AudioNode> {
        &self.bus.merger
    }

    pub fn master_gain(&self) -> &Arc<dyn GainNode> {
        &self.bus.gain
    }

    /// Route `input` onto the destination channels named by `map`.
    pub fn connect_to_destination<N: AudioNode + ?Sized>(
        &mut self,
        input: &N,
        map: &ChannelMap,
    ) -> Result<()> {
        let panner = self.context.create_stereo_panner()?;
        input.connect(panner.id())?;

        let stereo = panner.channel_count().max(1);
        let splitter = self.context.create_channel_splitter(stereo)?;
        panner.connect(splitter.id())?;

        for (i, &channel) in map.as_slice().iter().enumerate() {
            splitter.connect_port(self.bus.merger.id(), i % stereo, channel % self.bus.channels)?;
        }

        self.bus.stems.push((panner, splitter));
        Ok(())
    }

    /// Start recording the master bus. Does nothing while already recording.
    pub fn start_recording(&mut self, progress: Option<ProgressCallback>) -> Result<()> {
        self.recorder.start(&*self.bus.gain, progress)
    }

    /// Stop recording and save the capture under `filename` (or a generated name).
    pub fn stop_recording(&mut self, filename: Option<&str>) -> Result<Option<RecordedFile>> {
        self.recorder.stop(&*self.bus.gain, filename)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Stop any recording, tear the mix bus down and build it again.
    ///
    /// Used after the destination changed. The graph is rebuilt even when
    /// saving the interrupted recording fails; that error is returned
    /// afterwards.
    pub fn reset(&mut self) -> Result<Option<RecordedFile>> {
        let stopped = self.stop_recording(None);
        self.bus.teardown();
        self.bus = MixBus::build(&*self.context)?;
        stopped
    }
}

impl std::fmt::Debug for OutputMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputMixer")
            .field("channels", &self.bus.channels)
            .field("stems", &self.bus.stems.len())
            .field("recorder", &self.recorder)
            .finish()
    }
}
