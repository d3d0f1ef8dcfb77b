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

//! Landmark frames produced by the external vision model.
//!
//! A [`LandmarkFrame`] is one detection cycle: an ordered list of points,
//! some of which may be absent, stamped with the session-relative time at
//! which the scheduler pulled it. Frames are immutable once built.

mod names;

pub use self::names::{body, hand, lookup};

use crate::math::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which landmark model a session is tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionDomain {
    /// Full-body pose (33 points).
    #[default]
    Body,
    /// Single hand (21 points).
    Hand,
    /// Face mesh (468 points). Face sessions skip calibration.
    Face,
}

impl SessionDomain {
    /// Parses a domain, falling back to [`SessionDomain::Body`] for unknown input.
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            log::warn!("Unknown session domain '{}', falling back to BODY", s);
            SessionDomain::Body
        })
    }

    /// Returns `true` if sessions in this domain must calibrate before evaluating rules.
    pub fn requires_calibration(&self) -> bool {
        !matches!(self, SessionDomain::Face)
    }

    /// The tag that prefixes passive landmark context for this domain.
    pub fn context_tag(&self) -> &'static str {
        match self {
            SessionDomain::Face => crate::tags::FACE_DATA,
            SessionDomain::Body | SessionDomain::Hand => crate::tags::POSE_DATA,
        }
    }
}

impl FromStr for SessionDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BODY" => Ok(SessionDomain::Body),
            "HAND" => Ok(SessionDomain::Hand),
            "FACE" | "HARMONY" => Ok(SessionDomain::Face),
            other => Err(format!("unknown session domain '{other}'")),
        }
    }
}

impl fmt::Display for SessionDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionDomain::Body => "BODY",
            SessionDomain::Hand => "HAND",
            SessionDomain::Face => "FACE",
        };
        f.write_str(name)
    }
}

/// One point reported by the vision model, in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal position, `0.0` at the left edge.
    pub x: f32,
    /// Vertical position, `0.0` at the top edge.
    pub y: f32,
    /// Relative depth. Carried through but ignored by the metric evaluator.
    #[serde(default)]
    pub z: f32,
    /// Detection confidence, when the model provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    /// Creates a landmark from its image-plane coordinates.
    pub const fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility: None,
        }
    }

    /// The image-plane projection of this point.
    #[inline]
    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A reference to a landmark, either by index or by symbolic name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointRef {
    /// A raw landmark index.
    Index(usize),
    /// A symbolic name resolved through the domain's name table.
    Name(String),
}

impl PointRef {
    /// Resolves this reference to a landmark index for the given domain.
    ///
    /// Returns `None` for names the domain does not know.
    pub fn resolve(&self, domain: SessionDomain) -> Option<usize> {
        match self {
            PointRef::Index(index) => Some(*index),
            PointRef::Name(name) => lookup(domain, name),
        }
    }
}

impl From<usize> for PointRef {
    fn from(index: usize) -> Self {
        PointRef::Index(index)
    }
}

impl From<&str> for PointRef {
    fn from(name: &str) -> Self {
        PointRef::Name(name.to_string())
    }
}

/// One detection cycle's worth of landmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points: Vec<Option<Landmark>>,
    domain: SessionDomain,
    timestamp: Duration,
}

impl LandmarkFrame {
    /// Builds a frame from possibly-missing points.
    pub fn new(points: Vec<Option<Landmark>>, domain: SessionDomain, timestamp: Duration) -> Self {
        Self {
            points,
            domain,
            timestamp,
        }
    }

    /// Builds a frame in which every point is present.
    pub fn complete(points: Vec<Landmark>, domain: SessionDomain, timestamp: Duration) -> Self {
        Self::new(points.into_iter().map(Some).collect(), domain, timestamp)
    }

    /// The landmark model this frame belongs to.
    pub fn domain(&self) -> SessionDomain {
        self.domain
    }

    /// Session-relative time at which the frame was sampled.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Number of point slots, present or not.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the frame has no point slots.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the landmark at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index).and_then(Option::as_ref)
    }

    /// Resolves a [`PointRef`] against this frame.
    pub fn point(&self, point: &PointRef) -> Option<&Landmark> {
        point.resolve(self.domain).and_then(|index| self.get(index))
    }

    /// Serializes the points as a JSON array, with `null` for absent slots.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.points).unwrap_or_else(|_| "[]".to_string())
    }
}
