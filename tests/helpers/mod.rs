//! Shared test utilities for orbitmix integration tests
//!
//! Every engine here runs on a `HeadlessContext`, so tests drive the clock
//! and the render loop by hand.

#![allow(dead_code)]

use orbitmix::prelude::*;
use orbitmix::{Error, ErrorLogger};
use parking_lot::Mutex;
use std::sync::Arc;

/// Standard test sample rate
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Capture block size used by the engine defaults
pub const BLOCK_SIZE: usize = 4096;

/// Errors reported through the engine's error logger.
#[derive(Clone, Default)]
pub struct LoggedErrors(Arc<Mutex<Vec<String>>>);

impl LoggedErrors {
    pub fn logger(&self) -> ErrorLogger {
        let entries = Arc::clone(&self.0);
        Arc::new(move |error: &Error, origin: &str| {
            entries.lock().push(format!("{origin}: {error}"));
        })
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Engine wired to a headless host, an in-memory sink and a logger.
pub struct Fixture {
    pub host: HeadlessContext,
    pub sink: Arc<MemorySink>,
    pub errors: LoggedErrors,
    pub engine: OrbitEngine,
}

/// Create a stereo test engine.
pub fn test_engine() -> Fixture {
    test_engine_with_channels(2)
}

/// Create a test engine whose destination offers `channels` channels.
pub fn test_engine_with_channels(channels: usize) -> Fixture {
    let host = HeadlessContext::with_channels(TEST_SAMPLE_RATE, channels);
    let sink = Arc::new(MemorySink::new());
    let errors = LoggedErrors::default();
    let engine = OrbitEngine::builder()
        .context(Arc::new(host.clone()))
        .sink(sink.clone())
        .error_logger(errors.logger())
        .build()
        .expect("Failed to create test engine");

    Fixture {
        host,
        sink,
        errors,
        engine,
    }
}

/// Generate `frames` of a constant stereo signal.
pub fn constant(frames: usize, value: f32) -> (Vec<f32>, Vec<f32>) {
    (vec![value; frames], vec![-value; frames])
}

/// Generate `frames` of a ramp in [0, 1) on the left, inverted on the right.
pub fn ramp(frames: usize) -> (Vec<f32>, Vec<f32>) {
    let left: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
    let right = left.iter().map(|v| -v).collect();
    (left, right)
}
