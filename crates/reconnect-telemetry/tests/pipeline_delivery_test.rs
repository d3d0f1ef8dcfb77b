// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crossbeam_channel::{Receiver, Sender};
use reconnect_core::{ClinicalNote, TelemetryChunk, TelemetrySample};
use reconnect_telemetry::{
    ChunkUploader, FlushOutcome, PipelineConfig, TelemetryPipeline, UploadError, Watermarks,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// --- MOCK UPLOADERS ---

/// Answers from a script and records every chunk it sees.
#[derive(Default)]
struct Scripted {
    results: Mutex<VecDeque<Result<(), UploadError>>>,
    received: Mutex<Vec<TelemetryChunk>>,
}

impl Scripted {
    fn new(results: Vec<Result<(), UploadError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            received: Mutex::new(Vec::new()),
        })
    }

    fn received(&self) -> Vec<TelemetryChunk> {
        self.received.lock().unwrap().clone()
    }
}

impl ChunkUploader for Scripted {
    fn upload(&self, chunk: &TelemetryChunk) -> Result<(), UploadError> {
        self.received.lock().unwrap().push(chunk.clone());
        self.results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Blocks every request until the test releases it.
struct Gated {
    release: Receiver<()>,
}

impl Gated {
    fn new() -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { release: rx }, tx)
    }
}

impl ChunkUploader for Gated {
    fn upload(&self, _chunk: &TelemetryChunk) -> Result<(), UploadError> {
        self.release
            .recv_timeout(Duration::from_secs(10))
            .map_err(|_| UploadError::Transport("gate closed".into()))
    }
}

// --- HELPERS ---

fn secs(v: u64) -> Duration {
    Duration::from_secs(v)
}

fn sample(t: f32) -> TelemetrySample {
    TelemetrySample { t, val: 90.0, vel: 0.01 }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        upload_interval: secs(8),
        flush_timeout: Duration::from_millis(500),
    }
}

/// Ticks (without hitting a periodic slot) until the worker has answered.
fn settle(pipeline: &mut TelemetryPipeline, now: Duration) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while pipeline.upload_in_flight() && Instant::now() < deadline {
        pipeline.tick(now);
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(!pipeline.upload_in_flight(), "upload never completed");
}

// --- TESTS ---

#[test]
fn test_failed_upload_is_retried_with_the_same_suffix() {
    let uploader = Scripted::new(vec![Err(UploadError::Http {
        status: 503,
        message: "unavailable".into(),
    })]);
    let mut pipeline = TelemetryPipeline::new("session-a", Box::new(uploader.clone()), config());
    pipeline.start(Duration::ZERO);

    pipeline.record_sample(sample(0.125));
    pipeline.record_sample(sample(0.25));
    pipeline.record_note(ClinicalNote::new(0.3, "[EVENT] Rep 1 Completed."));

    assert!(pipeline.tick(secs(8)).submitted);
    settle(&mut pipeline, secs(9));
    assert_eq!(pipeline.watermarks(), Watermarks::default(), "failure must not move watermarks");

    pipeline.record_sample(sample(9.0));
    assert!(pipeline.tick(secs(16)).submitted);
    settle(&mut pipeline, secs(17));
    assert_eq!(pipeline.watermarks(), Watermarks { samples: 3, notes: 1 });

    let received = uploader.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].telemetry.len(), 2);
    // The retry carries the failed suffix plus what arrived since.
    assert_eq!(received[1].telemetry.len(), 3);
    assert_eq!(received[1].notes, vec!["[0.3s] [EVENT] Rep 1 Completed.".to_string()]);
    assert!(received.iter().all(|c| c.session_id == "session-a"));
}

#[test]
fn test_periodic_slot_skipped_while_upload_in_flight() {
    let (gated, release) = Gated::new();
    let mut pipeline = TelemetryPipeline::new("session-b", Box::new(gated), config());
    pipeline.start(Duration::ZERO);

    pipeline.record_sample(sample(1.0));
    pipeline.record_sample(sample(2.0));
    assert!(pipeline.tick(secs(8)).submitted);

    pipeline.record_sample(sample(12.0));
    let report = pipeline.tick(secs(16));
    assert!(report.skipped_in_flight);
    assert!(!report.submitted);

    release.send(()).unwrap();
    settle(&mut pipeline, secs(17));

    // Watermarks land on the log ends at snapshot time, not the current ends.
    assert_eq!(pipeline.watermarks(), Watermarks { samples: 2, notes: 0 });
    assert!(pipeline.watermarks().samples <= pipeline.log().samples().len());
    assert!(pipeline.log().has_pending());
}

#[test]
fn test_flush_is_bounded_by_its_timeout() {
    let (gated, _release) = Gated::new();
    let mut pipeline = TelemetryPipeline::new("session-c", Box::new(gated), config());
    pipeline.start(Duration::ZERO);
    pipeline.record_sample(sample(0.5));

    let started = Instant::now();
    let outcome = pipeline.flush(secs(3));
    let waited = started.elapsed();

    assert_eq!(outcome, FlushOutcome::TimedOut);
    assert!(waited >= Duration::from_millis(400), "gave up too early: {waited:?}");
    assert!(waited < Duration::from_secs(3), "flush overran its timeout: {waited:?}");
    assert_eq!(pipeline.watermarks(), Watermarks::default());
    assert!(!pipeline.is_running());
}

#[test]
fn test_flush_delivers_the_remaining_suffix() {
    let uploader = Scripted::new(vec![]);
    let mut pipeline = TelemetryPipeline::new("session-d", Box::new(uploader.clone()), config());
    pipeline.start(Duration::ZERO);
    pipeline.record_sample(sample(0.125));
    pipeline.record_note(ClinicalNote::new(2.0, "[CALIBRATION] Baseline set."));

    assert_eq!(pipeline.flush(secs(5)), FlushOutcome::Delivered);
    assert_eq!(pipeline.watermarks(), pipeline.log().ends());

    let received = uploader.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].timestamp_start, 0.125);
    assert_eq!(received[0].timestamp_end, 5.0);

    // Nothing left for a second flush.
    assert_eq!(pipeline.flush(secs(6)), FlushOutcome::NothingToSend);
}

#[test]
fn test_flush_retries_after_a_failed_periodic_upload() {
    let uploader = Scripted::new(vec![Err(UploadError::Transport("reset".into())), Ok(())]);
    let mut pipeline = TelemetryPipeline::new("session-e", Box::new(uploader.clone()), config());
    pipeline.start(Duration::ZERO);
    pipeline.record_sample(sample(1.0));
    assert!(pipeline.tick(secs(8)).submitted);

    assert_eq!(pipeline.flush(secs(9)), FlushOutcome::Delivered);
    assert_eq!(pipeline.watermarks(), Watermarks { samples: 1, notes: 0 });
    assert_eq!(uploader.received().len(), 2);
}

#[test]
fn test_flush_reports_final_failure() {
    let uploader = Scripted::new(vec![Err(UploadError::Http {
        status: 500,
        message: "boom".into(),
    })]);
    let mut pipeline = TelemetryPipeline::new("session-f", Box::new(uploader), config());
    pipeline.record_sample(sample(1.0));

    match pipeline.flush(secs(2)) {
        FlushOutcome::Failed(UploadError::Http { status, .. }) => assert_eq!(status, 500),
        other => panic!("unexpected flush outcome {other:?}"),
    }
    assert_eq!(pipeline.watermarks(), Watermarks::default());
}
