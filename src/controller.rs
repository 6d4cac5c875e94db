//! Orbit registry.

use crate::config::OrbitTuning;
use crate::duck::{DuckCommand, DuckEnvelope};
use crate::orbit::{DuckHandle, Orbit};
use crate::output::{ChannelMap, OutputMixer};
use crate::recorder::RecordedFile;
use crate::{Error, Result};
use orbitmix_core::{AudioContext, Scheduler};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// An orbit shared between the registry and its callers.
pub type SharedOrbit = Arc<Mutex<Orbit>>;

/// Side channel for errors that must not interrupt processing.
///
/// Receives the error and the name of the subsystem reporting it.
pub type ErrorLogger = Arc<dyn Fn(&Error, &str) + Send + Sync>;

/// Subsystem name reported to the [`ErrorLogger`].
pub const LOG_ORIGIN: &str = "orbitmix";

/// Logger that forwards to `tracing`.
pub fn tracing_error_logger() -> ErrorLogger {
    Arc::new(|error: &Error, origin: &str| {
        tracing::error!(target: "orbitmix", origin, %error, "operation skipped");
    })
}

/// Owns every orbit and the output mixer they feed.
pub struct AudioController {
    context: Arc<dyn AudioContext>,
    scheduler: Arc<Scheduler>,
    tuning: OrbitTuning,
    output: OutputMixer,
    orbits: HashMap<usize, SharedOrbit>,
    duck_handles: HashMap<usize, DuckHandle>,
    error_logger: ErrorLogger,
}

impl AudioController {
    pub fn new(
        context: Arc<dyn AudioContext>,
        scheduler: Arc<Scheduler>,
        tuning: OrbitTuning,
        output: OutputMixer,
        error_logger: ErrorLogger,
    ) -> Self {
        Self {
            context,
            scheduler,
            tuning,
            output,
            orbits: HashMap::new(),
            duck_handles: HashMap::new(),
            error_logger,
        }
    }

    /// Orbit `index`, created and routed to the destination on first use.
    ///
    /// `channels` only applies when the orbit is created; it defaults to
    /// destination channels 0 and 1.
    pub fn get_orbit(&mut self, index: usize, channels: Option<&ChannelMap>) -> Result<SharedOrbit> {
        if let Some(orbit) = self.orbits.get(&index) {
            return Ok(Arc::clone(orbit));
        }

        let orbit = Orbit::new(
            index,
            Arc::clone(&self.context),
            Arc::clone(&self.scheduler),
            self.tuning,
        )?;
        let default_map = ChannelMap::default();
        self.output
            .connect_to_destination(&**orbit.output(), channels.unwrap_or(&default_map))?;

        tracing::debug!(target: "orbitmix", orbit = index, "orbit created");
        self.duck_handles.insert(index, orbit.duck_handle());
        let orbit = Arc::new(Mutex::new(orbit));
        self.orbits.insert(index, Arc::clone(&orbit));
        Ok(orbit)
    }

    /// Existing orbit `index`, if any.
    pub fn orbit(&self, index: usize) -> Option<SharedOrbit> {
        self.orbits.get(&index).cloned()
    }

    pub fn orbit_count(&self) -> usize {
        self.orbits.len()
    }

    /// Indices of every orbit, ascending.
    pub fn orbit_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.orbits.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Duck every target of `command` at `time`.
    ///
    /// A missing target is reported to the error logger and skipped; the
    /// remaining targets are still ducked. Returns how many were scheduled.
    ///
    /// Orbits are not locked, so a caller may hold any orbit guard.
    pub fn duck(&self, time: f64, command: &DuckCommand) -> usize {
        let mut scheduled = 0;
        for (position, target) in command.targets.iter().enumerate() {
            let Some(handle) = self.duck_handles.get(&target) else {
                (self.error_logger)(&Error::OrbitNotFound(target), LOG_ORIGIN);
                continue;
            };
            let Some(envelope) = command.envelope(position) else {
                continue;
            };
            let envelope = DuckEnvelope {
                attack: envelope.attack.max(self.tuning.min_attack),
                ..envelope
            };
            handle.schedule(time, envelope);
            scheduled += 1;
        }
        scheduled
    }

    /// Fire deferred tasks that are due on the host clock.
    pub fn tick(&self) -> usize {
        self.scheduler.run_due(self.context.current_time())
    }

    pub fn output(&self) -> &OutputMixer {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputMixer {
        &mut self.output
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Disconnect and drop every orbit, then reset the output mixer.
    pub fn reset(&mut self) -> Result<Option<RecordedFile>> {
        self.duck_handles.clear();
        for (_, orbit) in self.orbits.drain() {
            orbit.lock().disconnect();
        }
        self.output.reset()
    }
}

impl std::fmt::Debug for AudioController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioController")
            .field("orbits", &self.orbit_indices())
            .field("output", &self.output)
            .finish()
    }
}
