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

//! Shoulder external rotation.

use super::{relative_lean, run_cycle, Band, Direction, Hysteresis, Reading, NORMALIZED_SCALE};
use reconnect_core::landmark::body;
use reconnect_core::math::round1;
use reconnect_core::{
    tags, CalibrationBaseline, ConfigError, EngineOutput, ExerciseEngine, LandmarkFrame,
    SessionStats, StatsUpdate,
};

/// Horizontal wrist offset from the elbow that counts as rotated out.
pub const ROTATED_OFFSET: f32 = 0.15;
/// Offset that counts as back to neutral.
pub const NEUTRAL_OFFSET: f32 = 0.05;

const HISTORY_SCALE: f32 = 500.0;

/// External rotation with the elbow tucked in, tracked through the signed
/// horizontal offset `wrist.x - elbow.x` of the right arm.
#[derive(Debug, Clone)]
pub struct ExternalRotation {
    hysteresis: Hysteresis,
    lean_tolerance: f32,
}

impl ExternalRotation {
    /// Creates the strategy with the default thresholds.
    pub fn new(lean_tolerance: f32) -> Result<Self, ConfigError> {
        let band = Band::new(NEUTRAL_OFFSET, ROTATED_OFFSET, NORMALIZED_SCALE)?;
        Ok(Self {
            hysteresis: Hysteresis::new(band, Direction::Rising),
            lean_tolerance,
        })
    }
}

impl ExerciseEngine for ExternalRotation {
    fn name(&self) -> &str {
        "rotation"
    }

    fn calculate(
        &mut self,
        frame: &LandmarkFrame,
        stats: &SessionStats,
        baseline: Option<&CalibrationBaseline>,
    ) -> EngineOutput {
        let (Some(elbow), Some(wrist)) = (frame.get(body::RIGHT_ELBOW), frame.get(body::RIGHT_WRIST)) else {
            return EngineOutput::default();
        };

        let offset = wrist.x - elbow.x;
        run_cycle(
            &self.hysteresis,
            Reading {
                enter: offset,
                exit: offset,
                primary: offset,
                history: offset * HISTORY_SCALE,
            },
            stats,
            relative_lean(frame, baseline),
            self.lean_tolerance,
            |n| format!("{} Ext. Rotation Rep {} Completed.", tags::EVENT, n),
            StatsUpdate::default().with_variable("wrist_offset", round1(offset * HISTORY_SCALE)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::body_frame;
    use super::*;
    use reconnect_core::MotionState;

    fn offset(dx: f32) -> LandmarkFrame {
        body_frame(&[(body::RIGHT_ELBOW, 0.4, 0.6), (body::RIGHT_WRIST, 0.4 + dx, 0.55)])
    }

    #[test]
    fn test_rotation_cycle() {
        let mut engine = ExternalRotation::new(15.0).unwrap();
        let mut stats = SessionStats::new();
        let mut reps_seen = Vec::new();
        for dx in [0.0, 0.1, 0.2, 0.1, 0.03, 0.2, 0.0] {
            stats.frame_count += 1;
            let out = engine.calculate(&offset(dx), &stats, None);
            if let Some(msg) = &out.message {
                reps_seen.push(msg.clone());
            }
            stats.apply(out.stats_update);
        }
        assert_eq!(stats.rep_count, 2);
        assert_eq!(stats.state, MotionState::Down);
        assert_eq!(reps_seen.last().map(String::as_str), Some("[EVENT] Ext. Rotation Rep 2 Completed."));
    }

    #[test]
    fn test_no_lean_check_without_hip() {
        let mut engine = ExternalRotation::new(15.0).unwrap();
        let out = engine.calculate(&offset(0.0), &SessionStats::new(), None);
        assert!(!out.trigger);
        assert!(!out.stats_update.variables.contains_key("torso_lean"));
    }
}
