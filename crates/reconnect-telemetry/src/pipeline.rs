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

//! The incremental report pipeline of one session.
//!
//! The session's single writer owns a [`TelemetryPipeline`]: it appends
//! records, calls [`TelemetryPipeline::tick`] every cycle, and calls
//! [`TelemetryPipeline::flush`] once on teardown. The network only ever
//! happens on the upload worker; the writer applies outcomes to the
//! watermarks when it next ticks.

use crate::store::{TelemetryLog, Watermarks};
use crate::upload::{ChunkUploader, UploadError, UploadJob, UploadOutcome, UploadWorker};
use reconnect_core::{ClinicalNote, PeriodicTask, TelemetrySample};
use std::time::{Duration, Instant};

/// Default period between chunk uploads.
pub const DEFAULT_UPLOAD_INTERVAL: Duration = Duration::from_secs(8);
/// Default bound on the teardown flush.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(2000);

/// Timing of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Period of the chunk upload task.
    pub upload_interval: Duration,
    /// Wall-clock bound on [`TelemetryPipeline::flush`].
    pub flush_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_interval: DEFAULT_UPLOAD_INTERVAL,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }
}

/// How the teardown flush ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Everything recorded was delivered.
    Delivered,
    /// The logs were already fully delivered.
    NothingToSend,
    /// The final upload failed. The suffix stays unsent.
    Failed(UploadError),
    /// The endpoint did not answer before the timeout.
    TimedOut,
}

/// What one [`TelemetryPipeline::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Outcomes applied from the worker.
    pub outcomes_applied: usize,
    /// Whether a new chunk was handed to the worker.
    pub submitted: bool,
    /// Whether the periodic slot was skipped because an upload was in flight.
    pub skipped_in_flight: bool,
}

/// Telemetry logs, their watermarks and the periodic uploader of one session.
pub struct TelemetryPipeline {
    session_id: String,
    log: TelemetryLog,
    worker: UploadWorker,
    upload_task: PeriodicTask,
    flush_timeout: Duration,
    in_flight: Option<u64>,
    next_job_id: u64,
}

impl TelemetryPipeline {
    /// Creates a pipeline with its own upload worker. Periodic uploads start
    /// with [`TelemetryPipeline::start`].
    pub fn new(session_id: impl Into<String>, uploader: Box<dyn ChunkUploader>, config: PipelineConfig) -> Self {
        Self {
            session_id: session_id.into(),
            log: TelemetryLog::new(),
            worker: UploadWorker::spawn(uploader),
            upload_task: PeriodicTask::new("chunk-upload", config.upload_interval),
            flush_timeout: config.flush_timeout,
            in_flight: None,
            next_job_id: 0,
        }
    }

    /// Session the chunks are tagged with.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Starts the periodic upload task. Idempotent.
    pub fn start(&mut self, now: Duration) -> bool {
        self.upload_task.start(now)
    }

    /// Whether the periodic upload task is running.
    pub fn is_running(&self) -> bool {
        self.upload_task.is_running()
    }

    /// Appends a sample.
    pub fn record_sample(&mut self, sample: TelemetrySample) {
        self.log.push_sample(sample);
    }

    /// Appends a note.
    pub fn record_note(&mut self, note: ClinicalNote) {
        log::debug!("Note {}", note);
        self.log.push_note(note);
    }

    /// The logs.
    pub fn log(&self) -> &TelemetryLog {
        &self.log
    }

    /// Delivered prefixes of both logs.
    pub fn watermarks(&self) -> Watermarks {
        self.log.watermarks()
    }

    /// Whether a chunk is with the worker.
    pub fn upload_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// One cooperative step: applies finished uploads, then submits the
    /// unsent suffix if the periodic slot is due and nothing is in flight.
    pub fn tick(&mut self, now: Duration) -> TickReport {
        let mut report = TickReport::default();

        // 1. Apply whatever the worker has finished.
        for outcome in self.worker.try_outcomes() {
            self.apply(outcome);
            report.outcomes_applied += 1;
        }

        // 2. Periodic slot.
        if !self.upload_task.poll(now) {
            return report;
        }
        if self.in_flight.is_some() {
            log::debug!("Skipping chunk upload for {}: previous upload still in flight.", self.session_id);
            report.skipped_in_flight = true;
            return report;
        }
        report.submitted = self.submit_pending(now).is_some();
        report
    }

    /// Stops periodic uploads and delivers the remaining suffix, giving up
    /// after the flush timeout.
    ///
    /// Never blocks longer than the configured timeout, whatever the network
    /// does. A timed-out flush leaves the watermarks where they were.
    pub fn flush(&mut self, now: Duration) -> FlushOutcome {
        self.upload_task.stop();
        let deadline = Instant::now() + self.flush_timeout;

        for outcome in self.worker.try_outcomes() {
            self.apply(outcome);
        }

        // 1. Let a periodic upload that is already running finish first.
        let mut last_error = None;
        let mut delivered_earlier = false;
        while self.in_flight.is_some() {
            let Some(outcome) = self.wait_until(deadline) else {
                log::warn!(
                    "Telemetry flush for {} timed out waiting on a previous upload.",
                    self.session_id
                );
                return FlushOutcome::TimedOut;
            };
            match &outcome.result {
                Ok(()) => delivered_earlier = true,
                Err(e) => last_error = Some(e.clone()),
            }
            self.apply(outcome);
        }

        // 2. Ship whatever is still unsent, including a failed suffix.
        let Some(job_id) = self.submit_pending(now) else {
            if self.log.has_pending() {
                return FlushOutcome::Failed(last_error.unwrap_or(UploadError::WorkerGone));
            }
            return if delivered_earlier {
                FlushOutcome::Delivered
            } else {
                FlushOutcome::NothingToSend
            };
        };

        while self.in_flight == Some(job_id) {
            let Some(outcome) = self.wait_until(deadline) else {
                log::warn!(
                    "Telemetry flush for {} abandoned after {:?}.",
                    self.session_id,
                    self.flush_timeout
                );
                return FlushOutcome::TimedOut;
            };
            if outcome.id != job_id {
                self.apply(outcome);
                continue;
            }
            let result = outcome.result.clone();
            self.apply(outcome);
            return match result {
                Ok(()) => {
                    log::info!("Telemetry for session {} flushed.", self.session_id);
                    FlushOutcome::Delivered
                }
                Err(e) => FlushOutcome::Failed(e),
            };
        }
        FlushOutcome::Delivered
    }

    fn wait_until(&mut self, deadline: Instant) -> Option<UploadOutcome> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        self.worker.recv_timeout(remaining)
    }

    fn submit_pending(&mut self, now: Duration) -> Option<u64> {
        let pending = self.log.pending_chunk(&self.session_id, now.as_secs_f32())?;
        let id = self.next_job_id;
        self.next_job_id += 1;

        log::trace!(
            "Submitting chunk {} for {}: {} samples, {} notes.",
            id,
            self.session_id,
            pending.chunk.telemetry.len(),
            pending.chunk.notes.len()
        );
        let job = UploadJob {
            id,
            chunk: pending.chunk,
            ends: pending.ends,
        };
        match self.worker.submit(job) {
            Ok(()) => {
                self.in_flight = Some(id);
                Some(id)
            }
            Err(e) => {
                log::error!("Could not hand chunk to the upload worker: {e}");
                None
            }
        }
    }

    fn apply(&mut self, outcome: UploadOutcome) {
        if self.in_flight == Some(outcome.id) {
            self.in_flight = None;
        }
        match outcome.result {
            Ok(()) => {
                self.log.mark_uploaded(outcome.ends);
                log::debug!(
                    "Chunk {} delivered; watermarks now {:?}.",
                    outcome.id,
                    self.log.watermarks()
                );
            }
            Err(e) => {
                log::warn!(
                    "Chunk {} for {} not delivered, will retry: {e}",
                    outcome.id,
                    self.session_id
                );
            }
        }
    }
}

impl std::fmt::Debug for TelemetryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPipeline")
            .field("session_id", &self.session_id)
            .field("watermarks", &self.log.watermarks())
            .field("ends", &self.log.ends())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}
