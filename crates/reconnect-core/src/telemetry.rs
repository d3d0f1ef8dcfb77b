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

//! Records appended to the telemetry logs and the chunk shape sent upstream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One metric sample taken at the landmark cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Seconds since session start.
    pub t: f32,
    /// Primary metric value.
    pub val: f32,
    /// Displacement of the tracked point since the previous cycle.
    pub vel: f32,
}

/// A short timestamped note produced by rule evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNote {
    /// Seconds since session start.
    pub elapsed: f32,
    /// The tagged message.
    pub text: String,
}

impl ClinicalNote {
    /// Creates a note.
    pub fn new(elapsed: f32, text: impl Into<String>) -> Self {
        Self {
            elapsed,
            text: text.into(),
        }
    }
}

impl fmt::Display for ClinicalNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.1}s] {}", self.elapsed, self.text)
    }
}

/// The unsent suffix of both logs, as delivered to the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryChunk {
    /// Session the chunk belongs to.
    pub session_id: String,
    /// Seconds since session start of the oldest record in the chunk.
    pub timestamp_start: f32,
    /// Seconds since session start when the chunk was cut.
    pub timestamp_end: f32,
    /// Unsent samples, oldest first.
    pub telemetry: Vec<TelemetrySample>,
    /// Unsent notes rendered as `"[12.3s] text"`.
    pub notes: Vec<String>,
}

impl TelemetryChunk {
    /// Returns `true` if the chunk carries no records.
    pub fn is_empty(&self) -> bool {
        self.telemetry.is_empty() && self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_rendering() {
        let note = ClinicalNote::new(12.34, "[EVENT] Rep 1 Completed.");
        assert_eq!(note.to_string(), "[12.3s] [EVENT] Rep 1 Completed.");
    }

    #[test]
    fn test_chunk_wire_shape() {
        let chunk = TelemetryChunk {
            session_id: "abc".into(),
            timestamp_start: 0.0,
            timestamp_end: 8.0,
            telemetry: vec![TelemetrySample {
                t: 0.5,
                val: 90.0,
                vel: 0.0,
            }],
            notes: vec![],
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["session_id"], "abc");
        assert_eq!(value["telemetry"][0]["val"], 90.0);
        assert!(value["notes"].as_array().unwrap().is_empty());
    }
}
