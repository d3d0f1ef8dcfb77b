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

//! The dual-rate sampling scheduler.
//!
//! [`SamplingScheduler`] drives two cooperative periodic tasks against the
//! active session: a coarse image task that only feeds passive context, and
//! a landmark task that runs calibration, safety and the rule engine. It is
//! the single writer of the session's stats, calibration buffer and
//! telemetry logs; nothing else mutates them.
//!
//! The scheduler owns no thread and reads no clock. Its owner calls
//! [`SamplingScheduler::tick`] with the current time, so the same code runs
//! on the service thread against a wall clock and in tests or replays
//! against a simulated one.

use crate::config::ReconnectConfig;
use crate::imaging::{encode_frame, FrameEncoding};
use crate::safety::{SafetyEvent, SafetyMonitor};
use crate::session::{ActiveSession, SessionError, SessionSpec, SessionSummary};
use image::DynamicImage;
use reconnect_core::landmark::body;
use reconnect_core::{
    tags, ClinicalNote, FeedbackStatus, Landmark, LandmarkFrame, OutboundChannel, OutboundMessage, PeriodicTask,
    PointRef, SessionDomain, TelemetrySample,
};
use reconnect_lanes::strategy::reference_angle;
use reconnect_telemetry::ChunkUploader;
use std::time::Duration;

/// The external vision model.
pub trait LandmarkSource: Send {
    /// Runs one detection. `None` when nothing was detected this cycle.
    fn detect(&mut self) -> Option<Vec<Option<Landmark>>>;
}

/// The camera feeding passive image frames.
pub trait ImageSource: Send {
    /// Grabs the current frame, if one is available.
    fn capture(&mut self) -> Option<DynamicImage>;
}

/// Builds the uploader of each new session.
pub type UploaderFactory = Box<dyn Fn() -> Box<dyn ChunkUploader> + Send + Sync>;

/// What one landmark cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// Session-relative time of the frame.
    pub elapsed: Duration,
    /// Whether the rule engine ran on this frame.
    pub evaluated: bool,
    /// Set on the cycle that completed calibration.
    pub calibrated: bool,
    /// Velocity check result, when it fired.
    pub safety: Option<SafetyEvent>,
    /// The out-of-band message, when one was sent.
    pub message: Option<String>,
    /// Status raised by this cycle.
    pub status: FeedbackStatus,
    /// Repetitions after this cycle.
    pub rep_count: u32,
}

impl CycleOutcome {
    /// Whether an out-of-band event went out.
    pub fn triggered(&self) -> bool {
        self.message.is_some()
    }
}

/// What one [`SamplingScheduler::tick`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Set when the landmark task ran and a frame was detected.
    pub landmark: Option<CycleOutcome>,
    /// Whether the image task sent a frame.
    pub image_sent: bool,
}

/// Single owner of the active session and of both sampling tasks.
pub struct SamplingScheduler {
    config: ReconnectConfig,
    landmark_task: PeriodicTask,
    image_task: PeriodicTask,
    landmarks: Box<dyn LandmarkSource>,
    images: Option<Box<dyn ImageSource>>,
    safety: SafetyMonitor,
    encoding: FrameEncoding,
    session: Option<ActiveSession>,
}

impl SamplingScheduler {
    /// Creates a scheduler with both tasks stopped and no session.
    pub fn new(
        config: ReconnectConfig,
        landmarks: Box<dyn LandmarkSource>,
        images: Option<Box<dyn ImageSource>>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let tracked = match config.safety.tracked_point.trim().parse::<usize>() {
            Ok(index) => PointRef::Index(index),
            Err(_) => PointRef::Name(config.safety.tracked_point.trim().to_string()),
        };
        let safety = SafetyMonitor::new(tracked, config.safety.velocity_threshold)?;
        let encoding = FrameEncoding {
            max_width: config.scheduler.image_max_width,
            max_height: config.scheduler.image_max_height,
            jpeg_quality: config.scheduler.jpeg_quality,
        };
        Ok(Self {
            landmark_task: PeriodicTask::new("landmarks", config.landmark_interval()),
            image_task: PeriodicTask::new("image-frames", config.image_interval()),
            config,
            landmarks,
            images,
            safety,
            encoding,
            session: None,
        })
    }

    /// The configuration.
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// The active session.
    pub fn session(&self) -> Option<&ActiveSession> {
        self.session.as_ref()
    }

    // --- Session lifecycle ---

    /// Opens a session. An already active session is ended first.
    ///
    /// Returns the id of the new session.
    pub fn start_session(
        &mut self,
        spec: SessionSpec,
        outbound: Box<dyn OutboundChannel>,
        uploader: Box<dyn ChunkUploader>,
        now: Duration,
    ) -> Result<String, SessionError> {
        if let Some(previous) = self.session.take() {
            log::warn!("Starting a new session while {} is active; ending it first.", previous.id());
            self.stop_sampling();
            previous.close(now);
        }
        let session = ActiveSession::open(spec, &self.config, outbound, uploader, now)?;
        let id = session.id().to_string();
        self.session = Some(session);
        Ok(id)
    }

    /// Ends the active session.
    ///
    /// Stops both tasks, releases calibration, runs the bounded flush and
    /// closes the outbound channel. With `Some(id)`, only that session may be
    /// ended.
    pub fn end_session(&mut self, session_id: Option<&str>, now: Duration) -> Result<SessionSummary, SessionError> {
        let active = self.session.as_ref().ok_or(SessionError::NoActiveSession)?;
        if let Some(requested) = session_id {
            if requested != active.id() {
                return Err(SessionError::SessionMismatch {
                    active: active.id().to_string(),
                    requested: requested.to_string(),
                });
            }
        }
        self.stop_sampling();
        let session = self.session.take().ok_or(SessionError::NoActiveSession)?;
        Ok(session.close(now))
    }

    // --- Task control ---

    /// Starts the landmark task. Returns `false` if it was already running.
    pub fn start_landmark_task(&mut self, now: Duration) -> bool {
        self.landmark_task.start(now)
    }

    /// Stops the landmark task.
    pub fn stop_landmark_task(&mut self) {
        self.landmark_task.stop();
    }

    /// Starts the image task. Returns `false` if it was already running.
    pub fn start_image_task(&mut self, now: Duration) -> bool {
        self.image_task.start(now)
    }

    /// Stops the image task.
    pub fn stop_image_task(&mut self) {
        self.image_task.stop();
    }

    /// Starts both tasks. Safe to call repeatedly.
    pub fn start_sampling(&mut self, now: Duration) {
        self.start_landmark_task(now);
        self.start_image_task(now);
    }

    /// Stops both tasks.
    pub fn stop_sampling(&mut self) {
        self.stop_landmark_task();
        self.stop_image_task();
    }

    /// Whether the landmark task is running.
    pub fn is_sampling(&self) -> bool {
        self.landmark_task.is_running()
    }

    /// Status the UI should show at `now`.
    pub fn feedback(&self, now: Duration) -> FeedbackStatus {
        self.session
            .as_ref()
            .map(|s| s.feedback.current(s.elapsed(now)))
            .unwrap_or_default()
    }

    // --- Cycles ---

    /// Runs whatever is due at `now`.
    pub fn tick(&mut self, now: Duration) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.image_task.poll(now) {
            outcome.image_sent = self.image_cycle();
        }
        if self.landmark_task.poll(now) {
            outcome.landmark = self.landmark_cycle(now);
        }
        if let Some(session) = self.session.as_mut() {
            let elapsed = session.elapsed(now);
            session.pipeline.tick(elapsed);
        }
        outcome
    }

    fn image_cycle(&mut self) -> bool {
        let (Some(session), Some(images)) = (self.session.as_mut(), self.images.as_mut()) else {
            return false;
        };
        let Some(frame) = images.capture() else {
            return false;
        };
        match encode_frame(frame, &self.encoding) {
            Ok(data) => {
                session.send(OutboundMessage::jpeg(data));
                true
            }
            Err(e) => {
                log::warn!("Dropping image frame: {e}");
                false
            }
        }
    }

    fn landmark_cycle(&mut self, now: Duration) -> Option<CycleOutcome> {
        let session = self.session.as_mut()?;
        let points = self.landmarks.detect()?;
        let elapsed = session.elapsed(now);
        let frame = LandmarkFrame::new(points, session.domain, elapsed);
        Some(run_cycle(session, &self.safety, &frame))
    }
}

/// One landmark cycle: calibration, safety, rule engine, bookkeeping, send.
fn run_cycle(session: &mut ActiveSession, safety: &SafetyMonitor, frame: &LandmarkFrame) -> CycleOutcome {
    let elapsed = frame.timestamp();
    let t = elapsed.as_secs_f32();
    session.stats.frame_count += 1;

    if session.domain == SessionDomain::Body {
        if let Some(shoulder) = frame.get(body::RIGHT_SHOULDER) {
            session.stats.record_shoulder_y(shoulder.y);
        }
    }

    // 1. Calibration. The frame that completes it is not evaluated.
    let evaluate = session.calibration.allows_evaluation();
    let mut calibrated = false;
    if !evaluate {
        if let Some(baseline) = session.calibration.observe(reference_angle(frame)) {
            calibrated = true;
            let reference = match session.domain {
                SessionDomain::Hand => "hand",
                _ => "torso",
            };
            session.pipeline.record_note(ClinicalNote::new(
                t,
                format!(
                    "{} Baseline established (resting {} angle {:.1}°).",
                    tags::CALIBRATION,
                    reference,
                    baseline.resting_reference_angle
                ),
            ));
        }
    }

    // 2. Safety, whatever the calibration state.
    let check = safety.check(frame, &mut session.stats);

    // 3. Rule engine.
    let output = if evaluate {
        Some(
            session
                .engine
                .calculate(frame, &session.stats, session.calibration.baseline()),
        )
    } else {
        None
    };

    let mut message = None;
    let mut status = FeedbackStatus::Neutral;
    let mut primary = None;
    if let Some(output) = output {
        primary = output.stats_update.primary_value;
        session.stats.apply(output.stats_update);
        // Untriggered messages (stage progress) are kept as notes only.
        if let Some(text) = output.message {
            session.pipeline.record_note(ClinicalNote::new(t, text.clone()));
            if output.trigger {
                message = Some(text);
            }
        }
        status = output.feedback;
    }

    // 4. Safety takes precedence over whatever the engine said.
    if let Some(event) = &check.event {
        session.pipeline.record_note(ClinicalNote::new(t, event.message.clone()));
        message = Some(event.message.clone());
        status = FeedbackStatus::Critical;
    }
    session.feedback.raise(status, elapsed);

    if let Some(val) = primary {
        session.pipeline.record_sample(TelemetrySample {
            t,
            val,
            vel: check.displacement.unwrap_or(0.0),
        });
    }

    // 5. Out-of-band event or passive context.
    let outbound = match &message {
        Some(text) => OutboundMessage::event(text.clone()),
        None => OutboundMessage::passive(format!("{} {}", frame.domain().context_tag(), frame.to_json())),
    };
    session.send(outbound);

    log::trace!(
        "Cycle {} at {:.3}s: evaluated={}, reps={}, status={:?}",
        session.stats.frame_count,
        t,
        evaluate,
        session.stats.rep_count,
        status
    );

    CycleOutcome {
        elapsed,
        evaluated: evaluate,
        calibrated,
        safety: check.event,
        message,
        status,
        rep_count: session.stats.rep_count,
    }
}
