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

//! The metric evaluator.
//!
//! Evaluation is pure: a [`MetricDefinition`] plus a [`LandmarkFrame`] yields
//! `Some(value)` or `None` when a referenced point is absent. `None` means
//! "cannot evaluate this frame" and must never be read as zero.

use crate::landmark::{LandmarkFrame, PointRef};
use crate::math::Vec2;
use serde::{Deserialize, Serialize};

/// The geometric quantity a metric measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    /// Angle at the middle of three points, in degrees `[0, 180]`.
    Angle,
    /// Euclidean image-plane distance between two points.
    Distance,
    /// `|A.y - B.y|`.
    VerticalDiff,
    /// `|A.x - B.x|`.
    HorizontalDiff,
}

impl MetricKind {
    /// Number of points this kind consumes.
    pub fn arity(&self) -> usize {
        match self {
            MetricKind::Angle => 3,
            MetricKind::Distance | MetricKind::VerticalDiff | MetricKind::HorizontalDiff => 2,
        }
    }
}

/// A named measurement over a fixed set of landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Identifier referenced by stage conditions and safety rules.
    #[serde(default)]
    pub id: String,
    /// What is measured.
    #[serde(rename = "type", alias = "kind")]
    pub kind: MetricKind,
    /// The landmarks involved, in order.
    pub points: Vec<PointRef>,
}

impl MetricDefinition {
    /// Creates a metric definition.
    pub fn new(id: impl Into<String>, kind: MetricKind, points: Vec<PointRef>) -> Self {
        Self {
            id: id.into(),
            kind,
            points,
        }
    }

    /// Evaluates this metric against a frame.
    pub fn evaluate(&self, frame: &LandmarkFrame) -> Option<f32> {
        evaluate(frame, self)
    }
}

/// Evaluates `metric` on `frame`.
///
/// Returns `None` if the definition has too few points or any referenced
/// point is missing from the frame. Extra points beyond the kind's arity are
/// ignored.
pub fn evaluate(frame: &LandmarkFrame, metric: &MetricDefinition) -> Option<f32> {
    if metric.points.len() < metric.kind.arity() {
        return None;
    }
    let mut resolved = [Vec2::ZERO; 3];
    for (slot, point) in resolved.iter_mut().zip(&metric.points[..metric.kind.arity()]) {
        *slot = frame.point(point)?.xy();
    }

    let value = match metric.kind {
        MetricKind::Angle => angle_at(resolved[0], resolved[1], resolved[2]),
        MetricKind::Distance => resolved[0].distance(resolved[1]),
        MetricKind::VerticalDiff => (resolved[0].y - resolved[1].y).abs(),
        MetricKind::HorizontalDiff => (resolved[0].x - resolved[1].x).abs(),
    };
    Some(value)
}

/// Angle at `b` between `b→a` and `b→c`, in degrees.
#[inline]
pub fn angle_at(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    Vec2::between(b, a).angle_deg(Vec2::between(b, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{Landmark, SessionDomain};
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn frame(points: &[Option<(f32, f32)>]) -> LandmarkFrame {
        LandmarkFrame::new(
            points
                .iter()
                .map(|p| p.map(|(x, y)| Landmark::new(x, y)))
                .collect(),
            SessionDomain::Body,
            Duration::ZERO,
        )
    }

    #[test]
    fn test_angle_right_angle() {
        let f = frame(&[Some((1.0, 0.0)), Some((0.0, 0.0)), Some((0.0, 1.0))]);
        let m = MetricDefinition::new("a", MetricKind::Angle, vec![0.into(), 1.into(), 2.into()]);
        assert_relative_eq!(m.evaluate(&f).unwrap(), 90.0, epsilon = 1e-3);
    }

    #[test]
    fn test_angle_degenerate_returns_zero() {
        let f = frame(&[Some((0.5, 0.5)), Some((0.5, 0.5)), Some((0.9, 0.1))]);
        let m = MetricDefinition::new("a", MetricKind::Angle, vec![0.into(), 1.into(), 2.into()]);
        assert_eq!(m.evaluate(&f), Some(0.0));
    }

    #[test]
    fn test_missing_point_is_none_not_zero() {
        let f = frame(&[Some((0.1, 0.1)), None, Some((0.3, 0.3))]);
        let m = MetricDefinition::new("a", MetricKind::Angle, vec![0.into(), 1.into(), 2.into()]);
        assert_eq!(m.evaluate(&f), None);
        let d = MetricDefinition::new("d", MetricKind::Distance, vec![0.into(), 9.into()]);
        assert_eq!(d.evaluate(&f), None);
    }

    #[test]
    fn test_diffs_and_distance() {
        let f = frame(&[Some((0.2, 0.9)), Some((0.5, 0.5))]);
        let pts = vec![PointRef::Index(0), PointRef::Index(1)];
        let v = MetricDefinition::new("v", MetricKind::VerticalDiff, pts.clone());
        let h = MetricDefinition::new("h", MetricKind::HorizontalDiff, pts.clone());
        let d = MetricDefinition::new("d", MetricKind::Distance, pts);
        assert_relative_eq!(v.evaluate(&f).unwrap(), 0.4, epsilon = 1e-6);
        assert_relative_eq!(h.evaluate(&f).unwrap(), 0.3, epsilon = 1e-6);
        assert_relative_eq!(d.evaluate(&f).unwrap(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_too_few_points() {
        let f = frame(&[Some((0.2, 0.9)), Some((0.5, 0.5))]);
        let m = MetricDefinition::new("a", MetricKind::Angle, vec![0.into(), 1.into()]);
        assert_eq!(m.evaluate(&f), None);
    }

    #[test]
    fn test_definition_from_json() {
        let m: MetricDefinition = serde_json::from_str(
            r#"{"id":"elbow","type":"ANGLE","points":["RIGHT_SHOULDER","RIGHT_ELBOW",16]}"#,
        )
        .unwrap();
        assert_eq!(m.kind, MetricKind::Angle);
        assert_eq!(m.points[2], PointRef::Index(16));
    }
}
