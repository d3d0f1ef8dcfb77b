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

//! Right elbow flexion.

use super::{relative_lean, run_cycle, Band, Direction, Hysteresis, Reading, ANGLE_SCALE};
use reconnect_core::landmark::body;
use reconnect_core::math::round1;
use reconnect_core::metric::angle_at;
use reconnect_core::{
    tags, CalibrationBaseline, ConfigError, EngineOutput, ExerciseEngine, LandmarkFrame,
    SessionStats, StatsUpdate,
};

/// Elbow angle below which the arm counts as curled.
pub const FLEXED_DEG: f32 = 50.0;
/// Elbow angle above which the arm counts as extended again.
pub const EXTENDED_DEG: f32 = 165.0;

/// Bicep curl tracked through the right elbow angle (shoulder, elbow, wrist).
///
/// DOWN→UP when the angle drops below the flexed threshold, UP→DOWN (one
/// repetition) when it rises above the extended threshold.
#[derive(Debug, Clone)]
pub struct BicepCurl {
    hysteresis: Hysteresis,
    lean_tolerance: f32,
}

impl BicepCurl {
    /// Creates the strategy with the default thresholds.
    pub fn new(lean_tolerance: f32) -> Result<Self, ConfigError> {
        Self::with_thresholds(FLEXED_DEG, EXTENDED_DEG, lean_tolerance)
    }

    /// Creates the strategy with custom thresholds.
    pub fn with_thresholds(flexed: f32, extended: f32, lean_tolerance: f32) -> Result<Self, ConfigError> {
        let band = Band::new(flexed, extended, ANGLE_SCALE)?;
        Ok(Self {
            hysteresis: Hysteresis::new(band, Direction::Falling),
            lean_tolerance,
        })
    }
}

impl ExerciseEngine for BicepCurl {
    fn name(&self) -> &str {
        "bicep_curl"
    }

    fn calculate(
        &mut self,
        frame: &LandmarkFrame,
        stats: &SessionStats,
        baseline: Option<&CalibrationBaseline>,
    ) -> EngineOutput {
        let (Some(shoulder), Some(elbow), Some(wrist)) = (
            frame.get(body::RIGHT_SHOULDER),
            frame.get(body::RIGHT_ELBOW),
            frame.get(body::RIGHT_WRIST),
        ) else {
            return EngineOutput::default();
        };

        let angle = angle_at(shoulder.xy(), elbow.xy(), wrist.xy());
        run_cycle(
            &self.hysteresis,
            Reading {
                enter: angle,
                exit: angle,
                primary: angle,
                history: angle,
            },
            stats,
            relative_lean(frame, baseline),
            self.lean_tolerance,
            |n| format!("{} Bicep Curl {} Completed.", tags::EVENT, n),
            StatsUpdate::default().with_variable("elbow_angle", round1(angle)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::body_frame;
    use super::*;
    use reconnect_core::{FeedbackStatus, MotionState};

    /// An arm whose elbow angle is `deg`.
    fn arm(deg: f32) -> LandmarkFrame {
        let rad = deg.to_radians();
        body_frame(&[
            (body::RIGHT_SHOULDER, 0.5, 0.3),
            (body::RIGHT_ELBOW, 0.5, 0.5),
            (body::RIGHT_WRIST, 0.5 + 0.2 * rad.sin(), 0.5 - 0.2 * rad.cos()),
        ])
    }

    fn run(engine: &mut BicepCurl, angles: &[f32]) -> (SessionStats, Vec<EngineOutput>) {
        let mut stats = SessionStats::new();
        let mut outputs = Vec::new();
        for &deg in angles {
            stats.frame_count += 1;
            let out = engine.calculate(&arm(deg), &stats, None);
            stats.apply(out.stats_update.clone());
            outputs.push(out);
        }
        (stats, outputs)
    }

    #[test]
    fn test_reference_sequence_counts_one_rep() {
        let mut engine = BicepCurl::with_thresholds(70.0, 165.0, 15.0).unwrap();
        let (stats, outputs) = run(&mut engine, &[170.0, 150.0, 90.0, 60.0, 90.0, 150.0, 170.0]);
        assert_eq!(stats.rep_count, 1);
        assert_eq!(stats.state, MotionState::Down);
        let last = outputs.last().unwrap();
        assert!(last.trigger);
        assert_eq!(last.feedback, FeedbackStatus::Success);
        assert_eq!(last.message.as_deref(), Some("[EVENT] Bicep Curl 1 Completed."));
    }

    #[test]
    fn test_oscillation_at_threshold_counts_once() {
        let mut engine = BicepCurl::new(15.0).unwrap();
        let (stats, _) = run(
            &mut engine,
            &[170.0, 40.0, 55.0, 45.0, 55.0, 45.0, 170.0, 160.0, 170.0, 164.0, 170.0],
        );
        assert_eq!(stats.rep_count, 1);
    }

    #[test]
    fn test_min_max_and_history() {
        let mut engine = BicepCurl::new(15.0).unwrap();
        let (stats, _) = run(&mut engine, &[170.0, 120.0, 40.0, 120.0, 170.0]);
        assert!((stats.min_value.unwrap() - 40.0).abs() < 0.01);
        assert!((stats.max_value.unwrap() - 170.0).abs() < 0.01);
        // Only frame 5 is a history frame.
        assert_eq!(stats.history.count(), 1);
    }

    #[test]
    fn test_band_too_narrow_rejected() {
        assert!(BicepCurl::with_thresholds(160.0, 165.0, 15.0).is_err());
    }
}
