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

//! Bilateral shoulder abduction.

use super::{relative_lean, run_cycle, Band, Direction, Hysteresis, Reading, ANGLE_SCALE};
use reconnect_core::landmark::body;
use reconnect_core::math::round1;
use reconnect_core::metric::angle_at;
use reconnect_core::{
    tags, CalibrationBaseline, ConfigError, EngineOutput, ExerciseEngine, LandmarkFrame,
    SessionStats, StatsUpdate,
};

/// Both arms must rise above this angle from the torso to enter UP. A T-pose
/// reads `90°`.
pub const RAISED_DEG: f32 = 70.0;
/// Both arms must drop below this angle to complete the repetition.
pub const LOWERED_DEG: f32 = 45.0;

/// Abduction measured on each side as the angle between the torso and the
/// upper arm.
///
/// The state machine uses the weaker arm, so a repetition only counts when
/// both arms make the full range. History records the bilateral average.
#[derive(Debug, Clone)]
pub struct Abduction {
    hysteresis: Hysteresis,
    lean_tolerance: f32,
}

impl Abduction {
    /// Creates the strategy with the default thresholds.
    pub fn new(lean_tolerance: f32) -> Result<Self, ConfigError> {
        Self::with_thresholds(LOWERED_DEG, RAISED_DEG, lean_tolerance)
    }

    /// Creates the strategy with custom thresholds.
    pub fn with_thresholds(lowered: f32, raised: f32, lean_tolerance: f32) -> Result<Self, ConfigError> {
        let band = Band::new(lowered, raised, ANGLE_SCALE)?;
        Ok(Self {
            hysteresis: Hysteresis::new(band, Direction::Rising),
            lean_tolerance,
        })
    }
}

/// Angle at the shoulder between the torso line (towards the hip) and the
/// upper arm. `0°` with the arm hanging, `90°` held out sideways.
fn side_angle(frame: &LandmarkFrame, hip: usize, shoulder: usize, elbow: usize) -> Option<f32> {
    Some(angle_at(
        frame.get(hip)?.xy(),
        frame.get(shoulder)?.xy(),
        frame.get(elbow)?.xy(),
    ))
}

impl ExerciseEngine for Abduction {
    fn name(&self) -> &str {
        "abduction"
    }

    fn calculate(
        &mut self,
        frame: &LandmarkFrame,
        stats: &SessionStats,
        baseline: Option<&CalibrationBaseline>,
    ) -> EngineOutput {
        let right = side_angle(frame, body::RIGHT_HIP, body::RIGHT_SHOULDER, body::RIGHT_ELBOW);
        let left = side_angle(frame, body::LEFT_HIP, body::LEFT_SHOULDER, body::LEFT_ELBOW);
        let (Some(right), Some(left)) = (right, left) else {
            return EngineOutput::default();
        };

        let average = (right + left) / 2.0;
        let update = StatsUpdate::default()
            .with_variable("right_arm", round1(right))
            .with_variable("left_arm", round1(left))
            .with_variable("avg_abduction", round1(average));

        run_cycle(
            &self.hysteresis,
            Reading {
                enter: right.min(left),
                exit: right.max(left),
                primary: average,
                history: average,
            },
            stats,
            relative_lean(frame, baseline),
            self.lean_tolerance,
            |n| format!("{} Abduction Rep {} Completed. Good form.", tags::EVENT, n),
            update,
        )
    }
}
