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

//! Fixed name → index tables for each landmark model.

use super::SessionDomain;

/// Pose landmark indices.
pub mod body {
    /// Nose tip.
    pub const NOSE: usize = 0;
    /// Left shoulder.
    pub const LEFT_SHOULDER: usize = 11;
    /// Right shoulder.
    pub const RIGHT_SHOULDER: usize = 12;
    /// Left elbow.
    pub const LEFT_ELBOW: usize = 13;
    /// Right elbow.
    pub const RIGHT_ELBOW: usize = 14;
    /// Left wrist.
    pub const LEFT_WRIST: usize = 15;
    /// Right wrist.
    pub const RIGHT_WRIST: usize = 16;
    /// Left hip.
    pub const LEFT_HIP: usize = 23;
    /// Right hip.
    pub const RIGHT_HIP: usize = 24;
    /// Number of points in a full pose frame.
    pub const POINT_COUNT: usize = 33;
}

/// Hand landmark indices.
pub mod hand {
    /// Wrist base.
    pub const WRIST: usize = 0;
    /// Base knuckle of the middle finger.
    pub const MIDDLE_FINGER_MCP: usize = 9;
    /// Number of points in a full hand frame.
    pub const POINT_COUNT: usize = 21;
}

const BODY_NAMES: [&str; body::POINT_COUNT] = [
    "NOSE",
    "LEFT_EYE_INNER",
    "LEFT_EYE",
    "LEFT_EYE_OUTER",
    "RIGHT_EYE_INNER",
    "RIGHT_EYE",
    "RIGHT_EYE_OUTER",
    "LEFT_EAR",
    "RIGHT_EAR",
    "MOUTH_LEFT",
    "MOUTH_RIGHT",
    "LEFT_SHOULDER",
    "RIGHT_SHOULDER",
    "LEFT_ELBOW",
    "RIGHT_ELBOW",
    "LEFT_WRIST",
    "RIGHT_WRIST",
    "LEFT_PINKY",
    "RIGHT_PINKY",
    "LEFT_INDEX",
    "RIGHT_INDEX",
    "LEFT_THUMB",
    "RIGHT_THUMB",
    "LEFT_HIP",
    "RIGHT_HIP",
    "LEFT_KNEE",
    "RIGHT_KNEE",
    "LEFT_ANKLE",
    "RIGHT_ANKLE",
    "LEFT_HEEL",
    "RIGHT_HEEL",
    "LEFT_FOOT_INDEX",
    "RIGHT_FOOT_INDEX",
];

const HAND_NAMES: [&str; hand::POINT_COUNT] = [
    "WRIST",
    "THUMB_CMC",
    "THUMB_MCP",
    "THUMB_IP",
    "THUMB_TIP",
    "INDEX_FINGER_MCP",
    "INDEX_FINGER_PIP",
    "INDEX_FINGER_DIP",
    "INDEX_FINGER_TIP",
    "MIDDLE_FINGER_MCP",
    "MIDDLE_FINGER_PIP",
    "MIDDLE_FINGER_DIP",
    "MIDDLE_FINGER_TIP",
    "RING_FINGER_MCP",
    "RING_FINGER_PIP",
    "RING_FINGER_DIP",
    "RING_FINGER_TIP",
    "PINKY_MCP",
    "PINKY_PIP",
    "PINKY_DIP",
    "PINKY_TIP",
];

// Face mesh anchors used for head pose and scale normalization.
const FACE_ANCHORS: [(&str, usize); 4] = [
    ("NOSE_TIP", 1),
    ("CHIN", 152),
    ("LEFT_CHEEK", 234),
    ("RIGHT_CHEEK", 454),
];

/// Resolves a symbolic landmark name for a domain. Matching is case-insensitive.
///
/// The hand model tracks one hand, so side-qualified names such as
/// `RIGHT_WRIST` resolve to the unqualified hand point.
pub fn lookup(domain: SessionDomain, name: &str) -> Option<usize> {
    let name = name.trim();
    match domain {
        SessionDomain::Body => BODY_NAMES
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name)),
        SessionDomain::Hand => {
            let find = |name: &str| HAND_NAMES.iter().position(|n| n.eq_ignore_ascii_case(name));
            find(name).or_else(|| find(unsided(name)?))
        }
        SessionDomain::Face => FACE_ANCHORS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, index)| *index),
    }
}

fn unsided(name: &str) -> Option<&str> {
    ["RIGHT_", "LEFT_"].iter().find_map(|prefix| {
        let head = name.get(..prefix.len())?;
        head.eq_ignore_ascii_case(prefix).then(|| name.get(prefix.len()..)).flatten()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_table_matches_constants() {
        assert_eq!(lookup(SessionDomain::Body, "RIGHT_WRIST"), Some(body::RIGHT_WRIST));
        assert_eq!(lookup(SessionDomain::Body, "left_hip"), Some(body::LEFT_HIP));
        assert_eq!(lookup(SessionDomain::Body, "RIGHT_FOOT_INDEX"), Some(32));
    }

    #[test]
    fn test_hand_and_face_tables() {
        assert_eq!(lookup(SessionDomain::Hand, "WRIST"), Some(hand::WRIST));
        assert_eq!(lookup(SessionDomain::Hand, "PINKY_TIP"), Some(20));
        assert_eq!(lookup(SessionDomain::Hand, "RIGHT_WRIST"), Some(hand::WRIST));
        assert_eq!(lookup(SessionDomain::Hand, "left_wrist"), Some(hand::WRIST));
        assert_eq!(lookup(SessionDomain::Hand, "Middle_Finger_MCP"), Some(hand::MIDDLE_FINGER_MCP));
        assert_eq!(lookup(SessionDomain::Hand, "RIGHT_HIP"), None);
        assert_eq!(lookup(SessionDomain::Face, "chin"), Some(152));
        assert_eq!(lookup(SessionDomain::Face, "RIGHT_WRIST"), None);
    }
}
