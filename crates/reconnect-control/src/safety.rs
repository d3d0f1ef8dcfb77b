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

//! Exercise-independent velocity check.
//!
//! Sudden displacement of the tracked point between two consecutive cycles
//! (a spasm, a dropped weight) stops the session regardless of what the rule
//! engine is doing.

use reconnect_core::{tags, ConfigError, LandmarkFrame, PointRef, SessionStats};

/// Default displacement per cycle that counts as a jerk.
pub const DEFAULT_VELOCITY_THRESHOLD: f32 = 0.35;

/// A detected jerk.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyEvent {
    /// Displacement that exceeded the threshold.
    pub displacement: f32,
    /// Tagged message for the collaborator.
    pub message: String,
}

/// Result of one check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafetyCheck {
    /// Displacement since the previous sighting, when both exist.
    pub displacement: Option<f32>,
    /// Set when the displacement exceeded the threshold.
    pub event: Option<SafetyEvent>,
}

/// Compares the tracked point against its last known position.
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    tracked: PointRef,
    threshold: f32,
}

impl SafetyMonitor {
    /// Creates a monitor. The threshold must be positive.
    pub fn new(tracked: PointRef, threshold: f32) -> Result<Self, ConfigError> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(ConfigError::invalid(
                "safety.velocity_threshold",
                format!("must be a positive number, got {threshold}"),
            ));
        }
        Ok(Self { tracked, threshold })
    }

    /// The velocity threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Checks `frame` and records the tracked point's position in `stats`.
    ///
    /// A frame without the tracked point leaves the last position in place.
    pub fn check(&self, frame: &LandmarkFrame, stats: &mut SessionStats) -> SafetyCheck {
        let Some(current) = frame.point(&self.tracked).map(|p| p.xy()) else {
            return SafetyCheck::default();
        };
        let displacement = stats.last_wrist.map(|previous| previous.distance(current));
        stats.last_wrist = Some(current);

        let event = displacement.filter(|d| *d > self.threshold).map(|d| {
            log::warn!("Safety stop: tracked point moved {:.3} in one cycle.", d);
            SafetyEvent {
                displacement: d,
                message: format!(
                    "{} High Velocity Detected (Speed: {:.2}). Possible Spasm or Drop. STOP IMMEDIATELY.",
                    tags::SAFETY_STOP,
                    d
                ),
            }
        });
        SafetyCheck { displacement, event }
    }
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self {
            tracked: PointRef::Name("RIGHT_WRIST".to_string()),
            threshold: DEFAULT_VELOCITY_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use reconnect_core::landmark::body;
    use reconnect_core::{Landmark, SessionDomain};
    use std::time::Duration;

    fn wrist_at(x: f32, y: f32) -> LandmarkFrame {
        let mut points = vec![None; body::POINT_COUNT];
        points[body::RIGHT_WRIST] = Some(Landmark::new(x, y));
        LandmarkFrame::new(points, SessionDomain::Body, Duration::ZERO)
    }

    #[test]
    fn test_fires_only_above_threshold() {
        let monitor = SafetyMonitor::new("RIGHT_WRIST".into(), 0.5).unwrap();
        let mut stats = SessionStats::new();

        let first = monitor.check(&wrist_at(0.2, 0.2), &mut stats);
        assert_eq!(first, SafetyCheck::default());

        let slow = monitor.check(&wrist_at(0.2, 0.6), &mut stats);
        assert_relative_eq!(slow.displacement.unwrap(), 0.4, epsilon = 1e-5);
        assert!(slow.event.is_none());

        let jerk = monitor.check(&wrist_at(0.8, 0.6), &mut stats);
        let event = jerk.event.unwrap();
        assert_relative_eq!(event.displacement, 0.6, epsilon = 1e-5);
        assert_eq!(
            event.message,
            "[SAFETY_STOP] High Velocity Detected (Speed: 0.60). Possible Spasm or Drop. STOP IMMEDIATELY."
        );
    }

    #[test]
    fn test_missing_point_keeps_last_position() {
        let monitor = SafetyMonitor::default();
        let mut stats = SessionStats::new();
        monitor.check(&wrist_at(0.1, 0.1), &mut stats);

        let empty = LandmarkFrame::new(vec![None; body::POINT_COUNT], SessionDomain::Body, Duration::ZERO);
        assert_eq!(monitor.check(&empty, &mut stats), SafetyCheck::default());

        let back = monitor.check(&wrist_at(0.1, 0.2), &mut stats);
        assert_relative_eq!(back.displacement.unwrap(), 0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_hand_frames_track_the_wrist() {
        use reconnect_core::landmark::hand;

        let hand_at = |x: f32, y: f32| {
            let mut points = vec![None; hand::POINT_COUNT];
            points[hand::WRIST] = Some(Landmark::new(x, y));
            LandmarkFrame::new(points, SessionDomain::Hand, Duration::ZERO)
        };
        let monitor = SafetyMonitor::default();
        let mut stats = SessionStats::new();
        monitor.check(&hand_at(0.1, 0.1), &mut stats);
        let jerk = monitor.check(&hand_at(0.9, 0.1), &mut stats);
        assert_relative_eq!(jerk.event.unwrap().displacement, 0.8, epsilon = 1e-5);
    }

    #[test]
    fn test_threshold_must_be_positive() {
        assert!(SafetyMonitor::new("RIGHT_WRIST".into(), 0.0).is_err());
        assert!(SafetyMonitor::new("RIGHT_WRIST".into(), f32::NAN).is_err());
    }
}
