//! OrbitEngine that ties orbits, mixing and recording to one audio host

use crate::config::EngineConfig;
use crate::controller::{AudioController, SharedOrbit};
use crate::duck::DuckCommand;
use crate::output::ChannelMap;
use crate::recorder::RecordedFile;
use crate::Result;
use orbitmix_core::AudioContext;
use parking_lot::Mutex;
use std::sync::Arc;

/// Entry point of the bus engine.
///
/// Methods take `&self`; graph mutation is serialised internally, so the
/// engine can be shared with the thread that drives [`tick`](Self::tick).
///
/// # Example
///
/// ```
/// use orbitmix::prelude::*;
/// use std::sync::Arc;
///
/// let host = HeadlessContext::new(48000.0);
/// let engine = OrbitEngine::builder()
///     .context(Arc::new(host.clone()))
///     .sink(Arc::new(MemorySink::new()))
///     .build()?;
///
/// let orbit = engine.orbit(1)?;
/// orbit.lock().get_delay(0.25, 0.4, 0.0)?;
///
/// engine.duck(0.5, &DuckCommand::new(1).attack(0.05));
/// host.set_time(0.5);
/// assert_eq!(engine.tick(), 1);
/// # Ok::<(), orbitmix::Error>(())
/// ```
pub struct OrbitEngine {
    context: Arc<dyn AudioContext>,
    config: EngineConfig,
    controller: Mutex<AudioController>,
}

impl OrbitEngine {
    pub fn builder() -> crate::OrbitEngineBuilder {
        crate::OrbitEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        context: Arc<dyn AudioContext>,
        config: EngineConfig,
        controller: AudioController,
    ) -> Self {
        Self {
            context,
            config,
            controller: Mutex::new(controller),
        }
    }

    pub fn context(&self) -> &Arc<dyn AudioContext> {
        &self.context
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.context.sample_rate()
    }

    /// Host clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.context.current_time()
    }

    /// Orbit `index`, routed to destination channels 0 and 1 on first use.
    pub fn orbit(&self, index: usize) -> Result<SharedOrbit> {
        self.controller.lock().get_orbit(index, None)
    }

    /// Orbit `index`, routed through `channels` on first use.
    pub fn orbit_with_channels(
        &self,
        index: usize,
        channels: impl Into<ChannelMap>,
    ) -> Result<SharedOrbit> {
        let channels = channels.into();
        self.controller.lock().get_orbit(index, Some(&channels))
    }

    /// Duck the command's targets at `time`. Returns how many were scheduled.
    pub fn duck(&self, time: f64, command: &DuckCommand) -> usize {
        self.controller.lock().duck(time, command)
    }

    /// Fire deferred tasks due on the host clock. Call this regularly,
    /// e.g. once per scheduling cycle.
    pub fn tick(&self) -> usize {
        self.controller.lock().tick()
    }

    pub fn start_recording(&self) -> Result<()> {
        self.controller.lock().output_mut().start_recording(None)
    }

    /// Start recording and report elapsed milliseconds to `on_progress`.
    pub fn start_recording_with_progress<F>(&self, on_progress: F) -> Result<()>
    where
        F: FnMut(u64) + Send + 'static,
    {
        self.controller
            .lock()
            .output_mut()
            .start_recording(Some(Box::new(on_progress)))
    }

    /// Stop recording and save it as `<filename>.wav`, or under a generated
    /// name when `filename` is `None`.
    pub fn stop_recording(&self, filename: Option<&str>) -> Result<Option<RecordedFile>> {
        self.controller.lock().output_mut().stop_recording(filename)
    }

    pub fn is_recording(&self) -> bool {
        self.controller.lock().output().is_recording()
    }

    /// Drop every orbit and rebuild the output stage.
    pub fn reset(&self) -> Result<Option<RecordedFile>> {
        self.controller.lock().reset()
    }

    /// Run `f` with exclusive access to the orbit registry.
    pub fn controller<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut AudioController) -> R,
    {
        f(&mut self.controller.lock())
    }
}

impl std::fmt::Debug for OrbitEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrbitEngine")
            .field("sample_rate", &self.context.sample_rate())
            .field("controller", &*self.controller.lock())
            .finish()
    }
}
