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

//! Chunk delivery off the landmark thread.
//!
//! The [`UploadWorker`] owns a dedicated thread that runs a
//! [`ChunkUploader`] for each submitted job and reports the outcome back over
//! a channel. The submitting side polls outcomes between cycles, so the
//! thread that owns the logs never blocks on the network.

use crate::store::Watermarks;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use reconnect_core::TelemetryChunk;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Why a chunk was not delivered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The endpoint answered with a non-success status.
    #[error("ingestion endpoint returned HTTP {status}: {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },
    /// The request never got a response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The uploader could not be configured.
    #[error("invalid uploader configuration: {0}")]
    Config(String),
    /// The worker thread is gone.
    #[error("upload worker is not running")]
    WorkerGone,
}

/// Delivers one chunk to the ingestion endpoint.
///
/// Implementations may block; they run on the worker thread. Delivery is
/// at-least-once, so the receiving side must tolerate overlapping chunks.
pub trait ChunkUploader: Send {
    /// Sends `chunk`. Any error leaves the watermarks unchanged.
    fn upload(&self, chunk: &TelemetryChunk) -> Result<(), UploadError>;
}

impl<T: ChunkUploader + Sync + ?Sized> ChunkUploader for std::sync::Arc<T> {
    fn upload(&self, chunk: &TelemetryChunk) -> Result<(), UploadError> {
        (**self).upload(chunk)
    }
}

/// An uploader that only logs. Used when no endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUploader;

impl ChunkUploader for LogUploader {
    fn upload(&self, chunk: &TelemetryChunk) -> Result<(), UploadError> {
        log::info!(
            "Telemetry chunk for session {} [{:.1}s..{:.1}s]: {} samples, {} notes.",
            chunk.session_id,
            chunk.timestamp_start,
            chunk.timestamp_end,
            chunk.telemetry.len(),
            chunk.notes.len()
        );
        Ok(())
    }
}

/// A chunk handed to the worker.
#[derive(Debug, Clone)]
pub struct UploadJob {
    /// Caller-assigned id echoed in the outcome.
    pub id: u64,
    /// The payload.
    pub chunk: TelemetryChunk,
    /// Log ends the chunk was cut at.
    pub ends: Watermarks,
}

/// The result of one job.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Id of the job.
    pub id: u64,
    /// Log ends the job's chunk was cut at.
    pub ends: Watermarks,
    /// Delivery result.
    pub result: Result<(), UploadError>,
}

/// A dedicated delivery thread.
pub struct UploadWorker {
    job_tx: Option<Sender<UploadJob>>,
    outcome_rx: Receiver<UploadOutcome>,
    handle: Option<thread::JoinHandle<()>>,
    outstanding: usize,
}

impl UploadWorker {
    /// Spawns the worker thread around `uploader`.
    pub fn spawn(uploader: Box<dyn ChunkUploader>) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<UploadJob>();
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<UploadOutcome>();

        let handle = thread::Builder::new()
            .name("reconnect-upload".into())
            .spawn(move || {
                log::debug!("Upload worker started.");
                for job in job_rx.iter() {
                    log::trace!(
                        "Uploading chunk {} ({} samples, {} notes).",
                        job.id,
                        job.chunk.telemetry.len(),
                        job.chunk.notes.len()
                    );
                    let result = uploader.upload(&job.chunk);
                    let outcome = UploadOutcome {
                        id: job.id,
                        ends: job.ends,
                        result,
                    };
                    if outcome_tx.send(outcome).is_err() {
                        break;
                    }
                }
                log::debug!("Upload worker stopped.");
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn upload worker: {e}");
                None
            }
        };

        Self {
            job_tx: handle.as_ref().map(|_| job_tx),
            outcome_rx,
            handle,
            outstanding: 0,
        }
    }

    /// Queues a job.
    pub fn submit(&mut self, job: UploadJob) -> Result<(), UploadError> {
        let tx = self.job_tx.as_ref().ok_or(UploadError::WorkerGone)?;
        tx.send(job).map_err(|_| UploadError::WorkerGone)?;
        self.outstanding += 1;
        Ok(())
    }

    /// Number of submitted jobs whose outcome has not been collected.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Collects every outcome that is ready, without blocking.
    pub fn try_outcomes(&mut self) -> Vec<UploadOutcome> {
        let outcomes: Vec<_> = self.outcome_rx.try_iter().collect();
        self.outstanding = self.outstanding.saturating_sub(outcomes.len());
        outcomes
    }

    /// Waits up to `timeout` for the next outcome.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<UploadOutcome> {
        match self.outcome_rx.recv_timeout(timeout) {
            Ok(outcome) => {
                self.outstanding = self.outstanding.saturating_sub(1);
                Some(outcome)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.outstanding = 0;
                None
            }
        }
    }

    /// Stops accepting jobs and joins the thread if it is idle.
    ///
    /// A thread still blocked on a request is detached instead, so teardown
    /// never waits on the network beyond the flush timeout.
    pub fn shutdown(&mut self) {
        self.job_tx = None;
        if let Some(handle) = self.handle.take() {
            if self.outstanding == 0 {
                let _ = handle.join();
            } else {
                log::warn!(
                    "Detaching upload worker with {} request(s) still in flight.",
                    self.outstanding
                );
            }
        }
    }
}

impl Drop for UploadWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for UploadWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadWorker")
            .field("running", &self.handle.is_some())
            .field("outstanding", &self.outstanding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl ChunkUploader for Failing {
        fn upload(&self, _chunk: &TelemetryChunk) -> Result<(), UploadError> {
            Err(UploadError::Transport("connection refused".into()))
        }
    }

    fn job(id: u64) -> UploadJob {
        UploadJob {
            id,
            chunk: TelemetryChunk {
                session_id: "s".into(),
                timestamp_start: 0.0,
                timestamp_end: 1.0,
                telemetry: vec![],
                notes: vec!["[0.5s] note".into()],
            },
            ends: Watermarks { samples: 0, notes: 1 },
        }
    }

    #[test]
    fn test_outcomes_are_reported() {
        let mut worker = UploadWorker::spawn(Box::new(LogUploader));
        worker.submit(job(1)).unwrap();
        worker.submit(job(2)).unwrap();
        assert_eq!(worker.outstanding(), 2);

        let first = worker.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = worker.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        assert!(first.result.is_ok());
        assert_eq!(worker.outstanding(), 0);
    }

    #[test]
    fn test_failure_is_an_outcome_not_a_panic() {
        let mut worker = UploadWorker::spawn(Box::new(Failing));
        worker.submit(job(7)).unwrap();
        let outcome = worker.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(outcome.result, Err(UploadError::Transport(_))));
    }

    #[test]
    fn test_submit_after_shutdown() {
        let mut worker = UploadWorker::spawn(Box::new(LogUploader));
        worker.shutdown();
        assert_eq!(worker.submit(job(1)), Err(UploadError::WorkerGone));
    }
}
