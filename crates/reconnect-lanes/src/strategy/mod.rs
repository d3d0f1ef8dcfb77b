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

//! Strategy Lane
//!
//! Fixed per-exercise engines. Each one reduces a frame to one primary metric,
//! runs it through a DOWN→UP→DOWN machine with separate enter and exit
//! thresholds, and re-checks torso lean against the calibrated baseline.

mod abduction;
mod bicep_curl;
mod rotation;
mod wall_slide;

pub use abduction::Abduction;
pub use bicep_curl::BicepCurl;
pub use rotation::ExternalRotation;
pub use wall_slide::WallSlide;

use reconnect_core::landmark::{body, hand};
use reconnect_core::math::{round1, Vec2, EPSILON};
use reconnect_core::{
    tags, CalibrationBaseline, ConfigError, EngineOutput, ExerciseEngine, FeedbackStatus,
    LandmarkFrame, MotionState, SessionDomain, SessionStats, StatsUpdate,
};
use std::fmt;
use std::str::FromStr;

/// Natural scale of angle metrics, in degrees.
pub const ANGLE_SCALE: f32 = 180.0;

/// Natural scale of metrics in normalized image units.
pub const NORMALIZED_SCALE: f32 = 1.0;

/// A hysteresis band must span at least this fraction of its metric's scale.
pub const MIN_BAND_FRACTION: f32 = 0.1;

/// Default allowed torso lean beyond the baseline, in degrees.
pub const DEFAULT_LEAN_TOLERANCE_DEG: f32 = 15.0;

/// A validated pair of thresholds with `high - low` wide enough to prevent
/// oscillation at the boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    low: f32,
    high: f32,
}

impl Band {
    /// Builds a band, rejecting it if `high - low` is below
    /// [`MIN_BAND_FRACTION`] of `scale`.
    pub fn new(low: f32, high: f32, scale: f32) -> Result<Self, ConfigError> {
        let min_gap = scale * MIN_BAND_FRACTION;
        // NaN thresholds fail this comparison too.
        let wide_enough = high - low + EPSILON >= min_gap;
        if !wide_enough {
            return Err(ConfigError::BandTooNarrow { low, high, min_gap });
        }
        Ok(Self { low, high })
    }

    /// Lower threshold.
    pub fn low(&self) -> f32 {
        self.low
    }

    /// Upper threshold.
    pub fn high(&self) -> f32 {
        self.high
    }
}

/// Which way the primary metric moves when entering the UP state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// UP is entered above `high` and left below `low`.
    Rising,
    /// UP is entered below `low` and left above `high`.
    Falling,
}

/// A state change produced by [`Hysteresis::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// DOWN → UP.
    Entered,
    /// UP → DOWN. One repetition.
    Completed,
}

/// The two-state repetition machine shared by every fixed strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hysteresis {
    band: Band,
    direction: Direction,
}

impl Hysteresis {
    /// Creates the machine.
    pub fn new(band: Band, direction: Direction) -> Self {
        Self { band, direction }
    }

    /// The thresholds.
    pub fn band(&self) -> Band {
        self.band
    }

    /// Advances the machine.
    ///
    /// `enter` is tested against the enter threshold and `exit` against the
    /// exit threshold. Bilateral strategies pass the weaker side for each so
    /// both sides must agree. Any non-UP state is treated as DOWN.
    pub fn step(&self, state: MotionState, enter: f32, exit: f32) -> Option<Transition> {
        let up = state == MotionState::Up;
        let (entering, exiting) = match self.direction {
            Direction::Rising => (enter > self.band.high, exit < self.band.low),
            Direction::Falling => (enter < self.band.low, exit > self.band.high),
        };
        match (up, entering, exiting) {
            (false, true, _) => Some(Transition::Entered),
            (true, _, true) => Some(Transition::Completed),
            _ => None,
        }
    }
}

/// Lean of the right torso side from vertical, in degrees.
///
/// This is the calibration reference metric. `None` if the right hip or
/// shoulder is missing.
pub fn torso_lean(frame: &LandmarkFrame) -> Option<f32> {
    let hip = frame.get(body::RIGHT_HIP)?.xy();
    let shoulder = frame.get(body::RIGHT_SHOULDER)?.xy();
    Some(Vec2::between(hip, shoulder).angle_deg(Vec2::UP))
}

/// Tilt of the hand from vertical, wrist to middle-finger base knuckle.
pub fn hand_tilt(frame: &LandmarkFrame) -> Option<f32> {
    let wrist = frame.get(hand::WRIST)?.xy();
    let knuckle = frame.get(hand::MIDDLE_FINGER_MCP)?.xy();
    Some(Vec2::between(wrist, knuckle).angle_deg(Vec2::UP))
}

/// The calibration reference metric for the frame's domain. Face frames
/// have none.
pub fn reference_angle(frame: &LandmarkFrame) -> Option<f32> {
    match frame.domain() {
        SessionDomain::Body => torso_lean(frame),
        SessionDomain::Hand => hand_tilt(frame),
        SessionDomain::Face => None,
    }
}

/// Torso lean relative to the baseline, when one exists.
pub fn relative_lean(frame: &LandmarkFrame, baseline: Option<&CalibrationBaseline>) -> Option<f32> {
    let lean = torso_lean(frame)?;
    Some(match baseline {
        Some(b) => (lean - b.resting_reference_angle).abs(),
        None => lean,
    })
}

/// One frame reduced to what the shared cycle logic needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reading {
    /// Value tested against the enter threshold.
    pub enter: f32,
    /// Value tested against the exit threshold.
    pub exit: f32,
    /// Value tracked as min/max and sent as telemetry.
    pub primary: f32,
    /// Value pushed to the history on sampling frames.
    pub history: f32,
}

/// Runs lean check, state machine and stats assembly for one reading.
///
/// A completed repetition replaces a same-cycle lean correction as the
/// outgoing message. Counting is never blocked by the correction.
pub(crate) fn run_cycle(
    hysteresis: &Hysteresis,
    reading: Reading,
    stats: &SessionStats,
    lean: Option<f32>,
    lean_tolerance: f32,
    rep_message: impl Fn(u32) -> String,
    mut update: StatsUpdate,
) -> EngineOutput {
    let mut output = EngineOutput::default();

    if let Some(lean) = lean {
        update.variables.insert("torso_lean".into(), round1(lean));
        if lean > lean_tolerance {
            output.trigger = true;
            output.message = Some(format!(
                "{} Torso Lean Detected ({:.0}°). Keep your back straight!",
                tags::CORRECTION,
                lean
            ));
            output.feedback = FeedbackStatus::Warning;
        }
    }

    let mut state = stats.state;
    let mut reps = stats.rep_count;
    match hysteresis.step(state, reading.enter, reading.exit) {
        Some(Transition::Entered) => {
            state = MotionState::Up;
            update.state = Some(state);
        }
        Some(Transition::Completed) => {
            state = MotionState::Down;
            reps += 1;
            update.state = Some(state);
            update.rep_count = Some(reps);
            output.trigger = true;
            output.message = Some(rep_message(reps));
            output.feedback = FeedbackStatus::Success;
        }
        None => {}
    }

    update.primary_value = Some(reading.primary);
    if stats.is_history_frame() {
        update.history_sample = Some(round1(reading.history));
    }
    update
        .variables
        .insert("rep_state".into(), if state == MotionState::Up { 1.0 } else { 0.0 });
    output.stats_update = update;
    output
}

/// The built-in exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExerciseKind {
    /// Bilateral shoulder abduction.
    Abduction,
    /// Right elbow flexion.
    BicepCurl,
    /// Bilateral wall slide.
    WallSlide,
    /// Shoulder external rotation.
    ExternalRotation,
}

impl ExerciseKind {
    /// Every built-in exercise.
    pub const ALL: [ExerciseKind; 4] = [
        ExerciseKind::Abduction,
        ExerciseKind::BicepCurl,
        ExerciseKind::WallSlide,
        ExerciseKind::ExternalRotation,
    ];

    /// Canonical identifier.
    pub fn id(&self) -> &'static str {
        match self {
            ExerciseKind::Abduction => "abduction",
            ExerciseKind::BicepCurl => "bicep_curl",
            ExerciseKind::WallSlide => "wall_slide",
            ExerciseKind::ExternalRotation => "rotation",
        }
    }

    /// Builds the engine with its default thresholds.
    pub fn build(&self, lean_tolerance: f32) -> Result<Box<dyn ExerciseEngine>, ConfigError> {
        let engine: Box<dyn ExerciseEngine> = match self {
            ExerciseKind::Abduction => Box::new(Abduction::new(lean_tolerance)?),
            ExerciseKind::BicepCurl => Box::new(BicepCurl::new(lean_tolerance)?),
            ExerciseKind::WallSlide => Box::new(WallSlide::new(lean_tolerance)?),
            ExerciseKind::ExternalRotation => Box::new(ExternalRotation::new(lean_tolerance)?),
        };
        Ok(engine)
    }
}

impl FromStr for ExerciseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "abduction" | "shoulder_abduction" | "lateral_raise" => Ok(ExerciseKind::Abduction),
            "bicep_curl" | "bicep" | "curl" => Ok(ExerciseKind::BicepCurl),
            "wall_slide" | "wallslide" => Ok(ExerciseKind::WallSlide),
            "rotation" | "external_rotation" => Ok(ExerciseKind::ExternalRotation),
            other => Err(format!("unknown exercise '{other}'")),
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use reconnect_core::landmark::body;
    use reconnect_core::{Landmark, LandmarkFrame, SessionDomain};
    use std::time::Duration;

    /// A body frame with only the given points present.
    pub fn body_frame(points: &[(usize, f32, f32)]) -> LandmarkFrame {
        let mut slots = vec![None; body::POINT_COUNT];
        for &(index, x, y) in points {
            slots[index] = Some(Landmark::new(x, y));
        }
        LandmarkFrame::new(slots, SessionDomain::Body, Duration::ZERO)
    }
}
