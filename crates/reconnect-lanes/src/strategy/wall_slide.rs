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

//! Bilateral wall slide.

use super::{relative_lean, run_cycle, Band, Direction, Hysteresis, Reading, NORMALIZED_SCALE};
use reconnect_core::landmark::body;
use reconnect_core::math::round1;
use reconnect_core::{
    tags, CalibrationBaseline, ConfigError, EngineOutput, ExerciseEngine, LandmarkFrame,
    SessionStats, StatsUpdate,
};

/// Average wrist height above the shoulders that counts as extended.
pub const EXTENDED_HEIGHT: f32 = 0.25;
/// Average wrist height that counts as back at shoulder level.
pub const RESTING_HEIGHT: f32 = 0.05;

/// History is recorded in hundredths of the frame height.
const HISTORY_SCALE: f32 = 100.0;

/// Wall slide tracked through how far both wrists sit above their shoulders.
///
/// Image `y` grows downwards, so height is `shoulder.y - wrist.y` and is
/// positive with the wrist above the shoulder.
#[derive(Debug, Clone)]
pub struct WallSlide {
    hysteresis: Hysteresis,
    lean_tolerance: f32,
}

impl WallSlide {
    /// Creates the strategy with the default thresholds.
    pub fn new(lean_tolerance: f32) -> Result<Self, ConfigError> {
        let band = Band::new(RESTING_HEIGHT, EXTENDED_HEIGHT, NORMALIZED_SCALE)?;
        Ok(Self {
            hysteresis: Hysteresis::new(band, Direction::Rising),
            lean_tolerance,
        })
    }
}

fn height(frame: &LandmarkFrame, shoulder: usize, wrist: usize) -> Option<f32> {
    Some(frame.get(shoulder)?.y - frame.get(wrist)?.y)
}

impl ExerciseEngine for WallSlide {
    fn name(&self) -> &str {
        "wall_slide"
    }

    fn calculate(
        &mut self,
        frame: &LandmarkFrame,
        stats: &SessionStats,
        baseline: Option<&CalibrationBaseline>,
    ) -> EngineOutput {
        let (Some(right), Some(left)) = (
            height(frame, body::RIGHT_SHOULDER, body::RIGHT_WRIST),
            height(frame, body::LEFT_SHOULDER, body::LEFT_WRIST),
        ) else {
            return EngineOutput::default();
        };

        let average = (right + left) / 2.0;
        run_cycle(
            &self.hysteresis,
            Reading {
                enter: average,
                exit: average,
                primary: average,
                history: average * HISTORY_SCALE,
            },
            stats,
            relative_lean(frame, baseline),
            self.lean_tolerance,
            |n| format!("{} Wall Slide Rep {} Completed. Nice extension.", tags::EVENT, n),
            StatsUpdate::default().with_variable("avg_height", round1(average * HISTORY_SCALE)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::body_frame;
    use super::*;

    fn hands_at(height: f32) -> LandmarkFrame {
        body_frame(&[
            (body::RIGHT_SHOULDER, 0.4, 0.5),
            (body::LEFT_SHOULDER, 0.6, 0.5),
            (body::RIGHT_WRIST, 0.4, 0.5 - height),
            (body::LEFT_WRIST, 0.6, 0.5 - height),
        ])
    }

    #[test]
    fn test_slide_cycle() {
        let mut engine = WallSlide::new(15.0).unwrap();
        let mut stats = SessionStats::new();
        let mut last = EngineOutput::default();
        for h in [0.0, 0.1, 0.3, 0.2, 0.1, 0.02, 0.0] {
            stats.frame_count += 1;
            last = engine.calculate(&hands_at(h), &stats, None);
            if last.trigger {
                assert_eq!(
                    last.message.as_deref(),
                    Some("[EVENT] Wall Slide Rep 1 Completed. Nice extension.")
                );
            }
            stats.apply(last.stats_update.clone());
        }
        assert_eq!(stats.rep_count, 1);
        assert!(!last.trigger);
        // Frame 5 sampled height 0.1 as 10.0.
        assert_eq!(stats.history.to_vec(), vec![10.0]);
    }

    #[test]
    fn test_one_wrist_missing() {
        let mut engine = WallSlide::new(15.0).unwrap();
        let frame = body_frame(&[(body::RIGHT_SHOULDER, 0.4, 0.5), (body::RIGHT_WRIST, 0.4, 0.1)]);
        assert_eq!(engine.calculate(&frame, &SessionStats::new(), None), EngineOutput::default());
    }
}
