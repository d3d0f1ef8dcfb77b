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

//! # Reconnect Lanes
//!
//! Hot-path rule engines. Everything here implements
//! [`reconnect_core::ExerciseEngine`]:
//!
//! - [`strategy`]: fixed per-exercise state machines with hard-coded thresholds.
//! - [`universal`]: an engine that interprets a declarative exercise schema.
//!
//! [`create_engine`] picks the right one from an exercise id.

#![warn(missing_docs)]

pub mod strategy;
pub mod universal;

pub use strategy::{Band, ExerciseKind, Hysteresis};
pub use universal::{SchemaError, UniversalEngine, UniversalSchema, UniversalSettings};

use reconnect_core::{ConfigError, ExerciseEngine};

/// Builds the fixed strategy registered under `exercise_id`.
///
/// Returns `Ok(None)` for ids with no built-in strategy; callers then need a
/// schema for the universal engine.
pub fn create_engine(
    exercise_id: &str,
    lean_tolerance: f32,
) -> Result<Option<Box<dyn ExerciseEngine>>, ConfigError> {
    match exercise_id.parse::<ExerciseKind>() {
        Ok(kind) => kind.build(lean_tolerance).map(Some),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_engine() {
        let engine = create_engine("bicep_curl", 15.0).unwrap().unwrap();
        assert_eq!(engine.name(), "bicep_curl");
        assert!(create_engine("tai_chi", 15.0).unwrap().is_none());
    }
}
