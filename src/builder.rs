//! Builder for configuring and constructing an `OrbitEngine`.

use crate::config::EngineConfig;
use crate::controller::{tracing_error_logger, AudioController, ErrorLogger};
use crate::output::OutputMixer;
use crate::recorder::Recorder;
use crate::{OrbitEngine, Result};
use orbitmix_core::{default_context, AudioContext, HeadlessContext, Scheduler};
use orbitmix_export::{DirectorySink, ExportSink};
use std::sync::Arc;

/// Every part is optional.
///
/// Without a context the process-wide default host is used, unless the
/// config asks for a sample rate other than the default host's, in which
/// case a private headless host is built at that rate. Without a sink,
/// recordings are written to `config.recording.output_dir`. Without an
/// error logger, skipped operations are reported through `tracing`.
///
/// # Example
///
/// ```
/// use orbitmix::{EngineConfig, OrbitEngine};
/// use orbitmix::export::MemorySink;
/// use std::sync::Arc;
///
/// let mut config = EngineConfig::default();
/// config.recording.block_size = 1024;
///
/// let engine = OrbitEngine::builder()
///     .config(config)
///     .sink(Arc::new(MemorySink::new()))
///     .error_logger(Arc::new(|error: &orbitmix::Error, origin: &str| {
///         eprintln!("[{origin}] {error}")
///     }))
///     .build()?;
/// assert_eq!(engine.config().recording.block_size, 1024);
/// # Ok::<(), orbitmix::Error>(())
/// ```
#[derive(Default)]
pub struct OrbitEngineBuilder {
    context: Option<Arc<dyn AudioContext>>,
    config: Option<EngineConfig>,
    sink: Option<Arc<dyn ExportSink>>,
    error_logger: Option<ErrorLogger>,
}

impl OrbitEngineBuilder {
    /// Audio host the engine drives.
    pub fn context(mut self, context: Arc<dyn AudioContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Where finished recordings go.
    pub fn sink(mut self, sink: Arc<dyn ExportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Receiver of errors that are reported instead of returned.
    pub fn error_logger(mut self, logger: ErrorLogger) -> Self {
        self.error_logger = Some(logger);
        self
    }

    pub fn build(self) -> Result<OrbitEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let context: Arc<dyn AudioContext> = match self.context {
            Some(context) => context,
            None => {
                let shared = default_context();
                if shared.sample_rate() == config.sample_rate {
                    shared
                } else {
                    Arc::new(HeadlessContext::new(config.sample_rate))
                }
            }
        };

        let sink: Arc<dyn ExportSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(DirectorySink::new(config.recording.output_dir.clone())),
        };
        let error_logger = self.error_logger.unwrap_or_else(tracing_error_logger);

        let recorder = Recorder::new(Arc::clone(&context), config.recording.clone(), sink);
        let output = OutputMixer::new(Arc::clone(&context), recorder)?;
        let controller = AudioController::new(
            Arc::clone(&context),
            Arc::new(Scheduler::new()),
            config.orbit,
            output,
            error_logger,
        );

        tracing::debug!(
            target: "orbitmix",
            sample_rate = context.sample_rate(),
            "engine built"
        );
        Ok(OrbitEngine::from_parts(context, config, controller))
    }
}

impl std::fmt::Debug for OrbitEngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrbitEngineBuilder")
            .field("context", &self.context.is_some())
            .field("config", &self.config)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
