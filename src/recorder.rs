//! Mix-down recording.
//!
//! A capture tap on the master bus hands fixed-size stereo blocks to the
//! recorder on the host's render thread. Blocks travel over an unbounded
//! channel in render order and are drained, encoded and saved when the
//! recording stops. The render side never locks: it passes a
//! [`CaptureGate`] and sends.

use crate::config::RecordingConfig;
use crate::Result;
use crossbeam_channel::{select, Receiver, Sender};
use orbitmix_core::{AudioContext, AudioNode, CaptureCallback};
use orbitmix_export::{default_basename, encode_wav, wav_file_name, ExportSink};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Receives elapsed recording time in milliseconds.
pub type ProgressCallback = Box<dyn FnMut(u64) + Send>;

/// A saved recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFile {
    pub file_name: String,
    /// Where the sink put it.
    pub location: PathBuf,
    /// Stereo frames captured.
    pub frames: usize,
    pub blocks: usize,
    /// Encoded size, header included.
    pub bytes: usize,
}

/// Interleave planar stereo into `L, R, L, R, ...`.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    left.iter()
        .zip(right)
        .flat_map(|(&l, &r)| [l, r])
        .collect()
}

/// Admission control between the render thread and the control thread.
///
/// [`close`](Self::close) returns only once no callback is still between
/// its flag check and its send, so everything admitted is already queued.
#[derive(Debug, Default)]
pub struct CaptureGate {
    open: AtomicBool,
    in_flight: AtomicUsize,
}

impl CaptureGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    /// Run `f` if the gate is open. Returns whether it ran.
    pub fn pass<F: FnOnce()>(&self, f: F) -> bool {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let admitted = self.open.load(Ordering::SeqCst);
        if admitted {
            f();
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        admitted
    }

    /// Stop admitting and wait out callbacks already admitted.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            thread::yield_now();
        }
    }
}

struct ProgressTimer {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressTimer {
    fn spawn(interval: Duration, started: Instant, mut callback: ProgressCallback) -> Result<Self> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let ticker = crossbeam_channel::tick(interval);

        let handle = thread::Builder::new()
            .name("orbitmix-progress".into())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => callback(started.elapsed().as_millis() as u64),
                    recv(stop_rx) -> _ => break,
                }
            })?;

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }
}

impl Drop for ProgressTimer {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub struct Recorder {
    context: Arc<dyn AudioContext>,
    settings: RecordingConfig,
    sink: Arc<dyn ExportSink>,
    gate: Arc<CaptureGate>,
    blocks: Option<Receiver<Vec<f32>>>,
    tap: Option<Arc<dyn AudioNode>>,
    started_at: Option<Instant>,
    progress: Option<ProgressTimer>,
    pending_filename: Option<String>,
}

impl Recorder {
    pub fn new(
        context: Arc<dyn AudioContext>,
        settings: RecordingConfig,
        sink: Arc<dyn ExportSink>,
    ) -> Self {
        Self {
            context,
            settings,
            sink,
            gate: Arc::new(CaptureGate::new()),
            blocks: None,
            tap: None,
            started_at: None,
            progress: None,
            pending_filename: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.gate.is_open()
    }

    /// Time since the current recording started.
    pub fn elapsed(&self) -> Option<Duration> {
        if self.is_recording() {
            self.started_at.map(|started| started.elapsed())
        } else {
            None
        }
    }

    /// Start capturing `source`. Does nothing while already recording.
    pub fn start<N: AudioNode + ?Sized>(
        &mut self,
        source: &N,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        if self.is_recording() {
            return Ok(());
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let gate = Arc::clone(&self.gate);
        let callback: CaptureCallback = Box::new(move |left: &[f32], right: &[f32]| {
            gate.pass(|| {
                let _ = tx.send(interleave(left, right));
            });
        });

        let tap = self
            .context
            .create_capture_tap(self.settings.block_size, callback)?;
        let started = Instant::now();

        // Nothing is committed until every fallible step has succeeded.
        let attached = tap
            .connect(self.context.destination().id())
            .and_then(|()| source.connect(tap.id()))
            .map_err(crate::Error::from)
            .and_then(|()| match progress {
                Some(callback) => {
                    let interval = Duration::from_millis(self.settings.progress_interval_ms);
                    ProgressTimer::spawn(interval, started, callback).map(Some)
                }
                None => Ok(None),
            });
        let timer = match attached {
            Ok(timer) => timer,
            Err(error) => {
                tap.disconnect();
                source.disconnect_from(tap.id());
                return Err(error);
            }
        };

        self.blocks = Some(rx);
        self.tap = Some(tap);
        self.started_at = Some(started);
        self.progress = timer;
        self.gate.open();

        tracing::debug!(
            target: "orbitmix",
            block_size = self.settings.block_size,
            "recording started"
        );
        Ok(())
    }

    /// Stop capturing and save what was captured.
    ///
    /// Returns `None` when not recording or when no block arrived. An empty
    /// `filename` counts as none; a generated name is used instead.
    pub fn stop<N: AudioNode + ?Sized>(
        &mut self,
        source: &N,
        filename: Option<&str>,
    ) -> Result<Option<RecordedFile>> {
        if !self.is_recording() {
            return Ok(None);
        }

        self.pending_filename = filename.filter(|name| !name.is_empty()).map(str::to_owned);
        self.progress = None;

        if let Some(tap) = self.tap.take() {
            tap.disconnect();
            source.disconnect_from(tap.id());
        }
        // Blocks admitted before this point are queued once it returns.
        self.gate.close();

        self.export()
    }

    fn export(&mut self) -> Result<Option<RecordedFile>> {
        let basename = self.pending_filename.take();
        let Some(blocks) = self.blocks.take() else {
            return Ok(None);
        };
        let blocks: Vec<Vec<f32>> = blocks.try_iter().collect();
        if blocks.is_empty() {
            tracing::debug!(target: "orbitmix", "recording stopped with nothing captured");
            return Ok(None);
        }

        let samples = blocks.concat();
        let sample_rate = self.context.sample_rate().round() as u32;
        let encoded = encode_wav(&samples, sample_rate, 2)?;

        let basename = basename
            .unwrap_or_else(|| default_basename(&self.settings.file_prefix, chrono::Utc::now()));
        let file_name = wav_file_name(&basename);
        let location = self.sink.save(&file_name, &encoded)?;

        let file = RecordedFile {
            file_name,
            location,
            frames: samples.len() / 2,
            blocks: blocks.len(),
            bytes: encoded.len(),
        };
        tracing::info!(
            target: "orbitmix",
            file = %file.file_name,
            frames = file.frames,
            "recording saved"
        );
        Ok(Some(file))
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("recording", &self.is_recording())
            .field("block_size", &self.settings.block_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitmix_core::{GainOptions, HeadlessContext};
    use orbitmix_export::MemorySink;

    fn recorder(context: &HeadlessContext) -> Recorder {
        Recorder::new(
            Arc::new(context.clone()),
            RecordingConfig::default(),
            Arc::new(MemorySink::new()),
        )
    }

    #[test]
    fn test_interleave() {
        assert_eq!(
            interleave(&[1.0, 2.0], &[-1.0, -2.0]),
            vec![1.0, -1.0, 2.0, -2.0]
        );
    }

    #[test]
    fn test_progress_timer_ticks_and_stops() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let timer = ProgressTimer::spawn(
            Duration::from_millis(5),
            Instant::now(),
            Box::new(move |elapsed: u64| {
                let _ = tx.send(elapsed);
            }),
        )
        .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(second >= first);

        drop(timer);
        // The callback was dropped with the thread, closing the channel.
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_gate_close_waits_for_admitted_send() {
        let gate = Arc::new(CaptureGate::new());
        gate.open();
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let (block_tx, block_rx) = crossbeam_channel::unbounded();

        let render = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.pass(|| {
                    let _ = entered_tx.send(());
                    thread::sleep(Duration::from_millis(50));
                    let _ = block_tx.send(7u32);
                })
            })
        };

        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        gate.close();
        assert_eq!(block_rx.try_recv(), Ok(7));
        assert!(render.join().unwrap());

        assert!(!gate.pass(|| panic!("gate is closed")));
    }

    #[test]
    fn test_failed_start_leaves_recorder_idle() {
        let context = HeadlessContext::new(48000.0);
        let mut recorder = recorder(&context);
        for _ in 0..4 {
            context.create_gain(GainOptions::default()).unwrap();
        }

        // A node from another host cannot feed this host's tap, whose id
        // that host has never issued.
        let foreign = HeadlessContext::new(48000.0)
            .create_gain(GainOptions::default())
            .unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let progress: ProgressCallback = Box::new(move |elapsed: u64| {
            let _ = tx.send(elapsed);
        });

        assert!(recorder.start(&*foreign, Some(progress)).is_err());
        assert!(!recorder.is_recording());
        assert!(recorder.elapsed().is_none());
        assert!(context.connections().is_empty());
        // The callback was dropped without a timer thread.
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_rejected_tap_leaves_recorder_idle() {
        let context = HeadlessContext::new(48000.0);
        let mut recorder = Recorder::new(
            Arc::new(context.clone()),
            RecordingConfig {
                block_size: 0,
                ..RecordingConfig::default()
            },
            Arc::new(MemorySink::new()),
        );
        let source = context.create_gain(GainOptions::default()).unwrap();

        assert!(recorder.start(&*source, None).is_err());
        assert!(!recorder.is_recording());
        assert!(recorder.stop(&*source, None).unwrap().is_none());
    }

    #[test]
    fn test_stop_keeps_every_delivered_block() {
        let context = HeadlessContext::new(48000.0);
        let mut recorder = Recorder::new(
            Arc::new(context.clone()),
            RecordingConfig {
                block_size: 64,
                ..RecordingConfig::default()
            },
            Arc::new(MemorySink::new()),
        );
        let source = context.create_gain(GainOptions::default()).unwrap();

        recorder.start(&*source, None).unwrap();
        for _ in 0..5 {
            context.render(&[0.1; 64], &[0.1; 64]);
        }
        let file = recorder.stop(&*source, Some("five")).unwrap().unwrap();

        assert_eq!(file.blocks, 5);
        assert_eq!(file.frames, 5 * 64);
        assert!(context.connections().is_empty());
    }
}
