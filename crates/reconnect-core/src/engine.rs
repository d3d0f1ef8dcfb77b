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

//! The contract shared by every exercise rule engine.

use crate::landmark::LandmarkFrame;
use crate::stats::{SessionStats, StatsUpdate};
use serde::{Deserialize, Serialize};

/// Fixed prefixes of outbound text messages.
pub mod tags {
    /// A completed repetition or stage transition.
    pub const EVENT: &str = "[EVENT]";
    /// A form correction.
    pub const CORRECTION: &str = "[CORRECTION]";
    /// A safety stop. Always takes precedence.
    pub const SAFETY_STOP: &str = "[SAFETY_STOP]";
    /// Passive pose or hand landmark context.
    pub const POSE_DATA: &str = "[POSE_DATA]";
    /// Passive face landmark context.
    pub const FACE_DATA: &str = "[FACE_DATA]";
    /// Calibration progress.
    pub const CALIBRATION: &str = "[CALIBRATION]";
}

/// Severity of the feedback shown to the user, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    /// Nothing to report.
    #[default]
    Neutral,
    /// Something went well (a completed repetition).
    Success,
    /// A form problem.
    Warning,
    /// A safety stop.
    Critical,
}

/// The resting value of the reference metric, fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBaseline {
    /// Mean torso lean from vertical during calibration, in degrees.
    pub resting_reference_angle: f32,
}

impl CalibrationBaseline {
    /// Creates a baseline.
    pub fn new(resting_reference_angle: f32) -> Self {
        Self {
            resting_reference_angle,
        }
    }
}

/// The result of one engine evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOutput {
    /// `true` if `message` should go out immediately as an out-of-band event.
    pub trigger: bool,
    /// Tagged text describing what happened, if anything.
    pub message: Option<String>,
    /// Severity to display.
    pub feedback: FeedbackStatus,
    /// Changes to fold into the session stats.
    pub stats_update: StatsUpdate,
}

impl EngineOutput {
    /// An output that only carries a stats update.
    pub fn quiet(stats_update: StatsUpdate) -> Self {
        Self {
            stats_update,
            ..Default::default()
        }
    }

    /// An output that fires `message` with the given severity.
    pub fn triggered(message: impl Into<String>, feedback: FeedbackStatus, stats_update: StatsUpdate) -> Self {
        Self {
            trigger: true,
            message: Some(message.into()),
            feedback,
            stats_update,
        }
    }
}

/// A rule engine deciding when repetitions and violations occur.
///
/// Implementations keep only their own private state (a stage index, timers).
/// Everything session-wide is read from `stats` and written back through
/// [`EngineOutput::stats_update`].
pub trait ExerciseEngine: Send {
    /// Identifier of the exercise this engine evaluates.
    fn name(&self) -> &str;

    /// Evaluates one frame.
    ///
    /// Only called once a baseline exists, except for domains exempt from
    /// calibration, where `baseline` is `None`.
    fn calculate(
        &mut self,
        frame: &LandmarkFrame,
        stats: &SessionStats,
        baseline: Option<&CalibrationBaseline>,
    ) -> EngineOutput;

    /// Clears private state before a new session.
    fn reset(&mut self) {}
}
