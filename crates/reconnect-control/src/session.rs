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

//! The state owned by one active session.

use crate::calibration::CalibrationManager;
use crate::config::ReconnectConfig;
use reconnect_core::{
    ConfigError, ExerciseEngine, FeedbackState, OutboundChannel, SessionDomain, SessionStats, StatsSnapshot,
};
use reconnect_lanes::{create_engine, SchemaError, UniversalEngine, UniversalSchema};
use reconnect_telemetry::{ChunkUploader, FlushOutcome, TelemetryPipeline, Watermarks};
use std::time::Duration;
use thiserror::Error;

/// Which rule engine a session runs.
#[derive(Debug, Clone)]
pub enum ExerciseSpec {
    /// A built-in strategy, by id (`abduction`, `bicep_curl`, ...).
    Builtin(String),
    /// A declarative schema for the universal engine.
    Schema(Box<UniversalSchema>),
}

impl ExerciseSpec {
    /// Parses a schema document into a spec.
    pub fn from_schema_json(json: &str) -> Result<Self, SchemaError> {
        Ok(ExerciseSpec::Schema(Box::new(UniversalSchema::from_json(json)?)))
    }
}

/// Arguments of a session start.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// Session id. A UUID v4 is generated when absent.
    pub session_id: Option<String>,
    /// Landmark model of the session.
    pub domain: SessionDomain,
    /// Rule engine to run.
    pub exercise: ExerciseSpec,
}

/// Why a session operation was refused.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No built-in strategy has this id.
    #[error("unknown exercise '{0}'")]
    UnknownExercise(String),
    /// A strategy or monitor rejected its configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An end was requested with no session running.
    #[error("no active session")]
    NoActiveSession,
    /// An end named a different session than the active one.
    #[error("session '{requested}' is not active (active: '{active}')")]
    SessionMismatch {
        /// The running session.
        active: String,
        /// The id the caller asked to end.
        requested: String,
    },
}

/// What a finished session leaves behind.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Id of the session.
    pub session_id: String,
    /// Final stats.
    pub stats: StatsSnapshot,
    /// Result of the teardown flush.
    pub flush: FlushOutcome,
    /// Delivered prefixes after the flush.
    pub watermarks: Watermarks,
    /// Records in the logs.
    pub samples_recorded: usize,
    /// Notes in the logs.
    pub notes_recorded: usize,
}

/// Everything the landmark task mutates, owned in one place.
pub struct ActiveSession {
    pub(crate) id: String,
    pub(crate) domain: SessionDomain,
    pub(crate) started_at: Duration,
    pub(crate) stats: SessionStats,
    pub(crate) calibration: CalibrationManager,
    pub(crate) engine: Box<dyn ExerciseEngine>,
    pub(crate) feedback: FeedbackState,
    pub(crate) pipeline: TelemetryPipeline,
    pub(crate) outbound: Box<dyn OutboundChannel>,
    pub(crate) outbound_failed: bool,
}

impl ActiveSession {
    /// Builds a fresh session starting at `now` (scheduler clock).
    pub(crate) fn open(
        spec: SessionSpec,
        config: &ReconnectConfig,
        outbound: Box<dyn OutboundChannel>,
        uploader: Box<dyn ChunkUploader>,
        now: Duration,
    ) -> Result<Self, SessionError> {
        let mut engine: Box<dyn ExerciseEngine> = match spec.exercise {
            ExerciseSpec::Builtin(id) => create_engine(&id, config.calibration.lean_tolerance_deg)?
                .ok_or(SessionError::UnknownExercise(id))?,
            ExerciseSpec::Schema(schema) => Box::new(UniversalEngine::new(*schema, config.universal_settings())),
        };
        engine.reset();

        let id = spec
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let calibration = if spec.domain.requires_calibration() {
            CalibrationManager::new(config.calibration.buffer_size)
        } else {
            CalibrationManager::exempt()
        };

        let mut pipeline = TelemetryPipeline::new(id.clone(), uploader, config.pipeline_config());
        pipeline.start(Duration::ZERO);

        log::info!(
            "Session {} started: exercise '{}', domain {}.",
            id,
            engine.name(),
            spec.domain
        );

        Ok(Self {
            id,
            domain: spec.domain,
            started_at: now,
            stats: SessionStats::new(),
            calibration,
            engine,
            feedback: FeedbackState::new(config.feedback_durations()),
            pipeline,
            outbound,
            outbound_failed: false,
        })
    }

    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Landmark model of the session.
    pub fn domain(&self) -> SessionDomain {
        self.domain
    }

    /// Name of the running rule engine.
    pub fn exercise(&self) -> &str {
        self.engine.name()
    }

    /// The aggregate stats.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Calibration state.
    pub fn calibration(&self) -> &CalibrationManager {
        &self.calibration
    }

    /// The telemetry pipeline.
    pub fn pipeline(&self) -> &TelemetryPipeline {
        &self.pipeline
    }

    /// Session-relative time for a scheduler-clock instant.
    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started_at)
    }

    /// Sends on the outbound channel, logging the first failure only.
    pub(crate) fn send(&mut self, message: reconnect_core::OutboundMessage) {
        match self.outbound.send(message) {
            Ok(()) => self.outbound_failed = false,
            Err(e) if !self.outbound_failed => {
                log::error!("Outbound send failed for session {}: {e}", self.id);
                self.outbound_failed = true;
            }
            Err(_) => {}
        }
    }

    /// Releases calibration, flushes telemetry and closes the channel.
    pub(crate) fn close(mut self, now: Duration) -> SessionSummary {
        let elapsed = self.elapsed(now);
        self.calibration.release();
        let flush = self.pipeline.flush(elapsed);
        match &flush {
            FlushOutcome::Delivered | FlushOutcome::NothingToSend => {}
            FlushOutcome::Failed(e) => log::warn!("Final telemetry flush for {} failed: {e}", self.id),
            FlushOutcome::TimedOut => log::warn!("Final telemetry flush for {} timed out.", self.id),
        }
        self.outbound.close();

        log::info!(
            "Session {} ended after {:.1}s: {} reps over {} frames.",
            self.id,
            elapsed.as_secs_f32(),
            self.stats.rep_count,
            self.stats.frame_count
        );
        SessionSummary {
            session_id: self.id.clone(),
            stats: self.stats.snapshot(),
            flush,
            watermarks: self.pipeline.watermarks(),
            samples_recorded: self.pipeline.log().samples().len(),
            notes_recorded: self.pipeline.log().notes().len(),
        }
    }
}

impl std::fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .field("exercise", &self.engine.name())
            .field("calibration", &self.calibration.phase())
            .field("rep_count", &self.stats.rep_count)
            .finish()
    }
}
