//! Mix-down recording through the output mixer
//!
//! Run with:
//! ```bash
//! cargo test -p orbitmix --test recording
//! ```

mod helpers;

use helpers::*;
use orbitmix::prelude::*;
use orbitmix::EngineConfig;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

/// Read the data chunk size out of a canonical 44-byte-header WAV.
fn data_chunk_size(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]])
}

/// Only whole blocks are captured; the partial tail is dropped.
#[test]
fn test_whole_blocks_are_saved() {
    let fixture = test_engine();
    fixture.engine.start_recording().unwrap();
    assert!(fixture.engine.is_recording());

    let (left, right) = constant(BLOCK_SIZE, 0.5);
    for _ in 0..3 {
        fixture.host.render(&left, &right);
    }
    let (left, right) = constant(1000, 0.5);
    fixture.host.render(&left, &right);

    let file = fixture
        .engine
        .stop_recording(Some("three_blocks"))
        .unwrap()
        .expect("blocks were captured");
    assert!(!fixture.engine.is_recording());

    assert_eq!(file.file_name, "three_blocks.wav");
    assert_eq!(file.blocks, 3);
    assert_eq!(file.frames, 3 * BLOCK_SIZE);
    assert_eq!(file.bytes, 44 + 49152);

    let files = fixture.sink.files();
    assert_eq!(files.len(), 1);
    let (name, bytes) = &files[0];
    assert_eq!(name, "three_blocks.wav");
    assert_eq!(data_chunk_size(bytes), 49152);

    let mut reader = hound::WavReader::new(Cursor::new(bytes.clone())).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 48000);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 2 * 3 * BLOCK_SIZE);
    assert_eq!(&samples[..4], &[16383, -16384, 16383, -16384]);
}

/// Blocks keep render order in the file.
#[test]
fn test_blocks_keep_render_order() {
    let fixture = test_engine();
    fixture.engine.start_recording().unwrap();

    let (first, _) = constant(BLOCK_SIZE, 0.25);
    let (second, _) = constant(BLOCK_SIZE, -0.25);
    fixture.host.render(&first, &first);
    fixture.host.render(&second, &second);

    fixture.engine.stop_recording(Some("order")).unwrap();
    let (_, bytes) = fixture.sink.take().remove(0);
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();

    assert!(samples[..2 * BLOCK_SIZE].iter().all(|&s| s > 0));
    assert!(samples[2 * BLOCK_SIZE..].iter().all(|&s| s < 0));
}

/// Stopping before a full block arrives saves nothing.
#[test]
fn test_no_blocks_saves_nothing() {
    let fixture = test_engine();
    fixture.engine.start_recording().unwrap();

    let (left, right) = constant(BLOCK_SIZE - 1, 0.5);
    fixture.host.render(&left, &right);

    assert!(fixture.engine.stop_recording(None).unwrap().is_none());
    assert!(fixture.sink.is_empty());
}

/// Start while recording and stop while idle are no-ops.
#[test]
fn test_start_stop_idempotent() {
    let fixture = test_engine();
    assert!(fixture.engine.stop_recording(None).unwrap().is_none());

    fixture.engine.start_recording().unwrap();
    fixture.engine.start_recording().unwrap();
    assert_eq!(fixture.host.created(orbitmix::core::NodeKind::CaptureTap), 1);

    let (left, right) = ramp(BLOCK_SIZE);
    fixture.host.render(&left, &right);

    assert!(fixture.engine.stop_recording(Some("once")).unwrap().is_some());
    assert!(fixture.engine.stop_recording(Some("twice")).unwrap().is_none());
    assert_eq!(fixture.sink.len(), 1);
}

/// Rendering after stop does not leak into the next recording.
#[test]
fn test_tap_detached_after_stop() {
    let fixture = test_engine();
    fixture.engine.start_recording().unwrap();
    let (left, right) = constant(BLOCK_SIZE, 0.5);
    fixture.host.render(&left, &right);
    fixture.engine.stop_recording(Some("first")).unwrap();

    fixture.host.render(&left, &right);

    fixture.engine.start_recording().unwrap();
    fixture.host.render(&left, &right);
    let file = fixture
        .engine
        .stop_recording(Some("second"))
        .unwrap()
        .unwrap();
    assert_eq!(file.blocks, 1);
}

/// Without a filename the recording gets a timestamped name.
#[test]
fn test_generated_file_name() {
    let fixture = test_engine();
    fixture.engine.start_recording().unwrap();
    let (left, right) = ramp(BLOCK_SIZE);
    fixture.host.render(&left, &right);

    let file = fixture.engine.stop_recording(Some("")).unwrap().unwrap();

    assert!(file.file_name.starts_with("bulka_"));
    assert!(file.file_name.ends_with(".wav"));
    // prefix + YYYY-MM-DDTHH-MM-SS + extension
    assert_eq!(file.file_name.len(), "bulka_".len() + 19 + ".wav".len());
    assert!(!file.file_name.contains(':'));
}

/// The default sink writes into the configured output directory.
#[test]
fn test_directory_sink_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let host = HeadlessContext::new(TEST_SAMPLE_RATE);

    let mut config = EngineConfig::default();
    config.recording.block_size = 256;
    config.recording.output_dir = dir.path().join("takes");

    let engine = OrbitEngine::builder()
        .context(Arc::new(host.clone()))
        .config(config)
        .build()
        .unwrap();

    engine.start_recording().unwrap();
    let (left, right) = ramp(512);
    host.render(&left, &right);
    let file = engine.stop_recording(Some("jam")).unwrap().unwrap();

    let expected = dir.path().join("takes").join("jam.wav");
    assert_eq!(file.location, expected);
    assert_eq!(file.blocks, 2);

    let reader = hound::WavReader::open(&expected).unwrap();
    assert_eq!(reader.duration(), 512);
}

/// Progress reports elapsed milliseconds until the recording stops.
#[test]
fn test_progress_callback() {
    let fixture = test_engine();
    let (tx, rx) = crossbeam_channel::unbounded();

    fixture
        .engine
        .start_recording_with_progress(move |elapsed: u64| {
            let _ = tx.send(elapsed);
        })
        .unwrap();

    let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(second >= first);

    fixture.engine.stop_recording(None).unwrap();
    while rx.try_recv().is_ok() {}
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
}

/// Reset while recording saves the take and rebuilds the output stage.
#[test]
fn test_reset_while_recording() {
    let fixture = test_engine();
    fixture.engine.orbit(0).unwrap();
    fixture.engine.start_recording().unwrap();
    let (left, right) = constant(BLOCK_SIZE, 0.1);
    fixture.host.render(&left, &right);

    let saved = fixture.engine.reset().unwrap();

    assert!(saved.is_some());
    assert!(!fixture.engine.is_recording());
    assert_eq!(fixture.sink.len(), 1);
}
