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

//! Session-lifetime aggregates and the rolling metric history.

use crate::math::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of samples kept in the metric history.
pub const HISTORY_CAPACITY: usize = 200;

/// Engines push a history sample once every this many frames.
pub const HISTORY_STRIDE: u64 = 5;

/// A fixed-size circular buffer for storing numerical samples.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    data: [T; N],
    index: usize,
    count: usize,
}

impl<T: Default + Copy, const N: usize> RingBuffer<T, N> {
    /// Creates a new, empty ring buffer.
    pub fn new() -> Self {
        Self {
            data: [T::default(); N],
            index: 0,
            count: 0,
        }
    }

    /// Pushes a new value into the buffer, overwriting the oldest if full.
    pub fn push(&mut self, value: T) {
        self.data[self.index] = value;
        self.index = (self.index + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Returns the number of elements currently in the buffer.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns `true` if nothing has been pushed since creation or the last clear.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Forgets every stored value.
    pub fn clear(&mut self) {
        self.index = 0;
        self.count = 0;
    }

    /// The most recently pushed value.
    pub fn latest(&self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        Some(self.data[(self.index + N - 1) % N])
    }

    /// Returns an iterator over the values in chronological order (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (left, right) = self.data.split_at(self.index);
        if self.count < N {
            // Not full yet: everything lives before the write cursor.
            right[N - self.index..]
                .iter()
                .chain(left[..self.index].iter())
        } else {
            right.iter().chain(left.iter())
        }
    }

    /// Copies the contents out, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().copied().collect()
    }
}

impl<T: Default + Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The discrete position of an exercise state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotionState {
    /// Resting position.
    #[default]
    Down,
    /// Peak position.
    Up,
    /// Index into a schema's ordered stage list.
    Stage(usize),
}

/// Changes an engine wants applied to [`SessionStats`] after one cycle.
///
/// Engines never mutate stats directly. The scheduler applies this update,
/// which keeps a single writer for the session aggregate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsUpdate {
    /// New discrete state, if it changed.
    pub state: Option<MotionState>,
    /// New repetition total, if it changed.
    pub rep_count: Option<u32>,
    /// This cycle's primary metric, folded into min/max and telemetry.
    pub primary_value: Option<f32>,
    /// A value to append to the rolling history.
    pub history_sample: Option<f32>,
    /// Diagnostic values merged into the variable map.
    pub variables: BTreeMap<String, f32>,
}

impl StatsUpdate {
    /// Returns `true` if applying this update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.rep_count.is_none()
            && self.primary_value.is_none()
            && self.history_sample.is_none()
            && self.variables.is_empty()
    }

    /// Adds a diagnostic variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: f32) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

/// Mutable aggregate owned by the active session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Lowest primary metric seen.
    pub min_value: Option<f32>,
    /// Highest primary metric seen.
    pub max_value: Option<f32>,
    /// Downsampled primary metric, capped at [`HISTORY_CAPACITY`].
    pub history: RingBuffer<f32, HISTORY_CAPACITY>,
    /// Completed repetitions.
    pub rep_count: u32,
    /// Current state machine position.
    pub state: MotionState,
    /// Last seen position of the velocity-tracked point.
    pub last_wrist: Option<Vec2>,
    /// Last seen right-shoulder height.
    pub last_shoulder_y: Option<f32>,
    /// Accumulated frame-to-frame shoulder height changes.
    pub shoulder_y_travel: f32,
    /// Landmark cycles processed.
    pub frame_count: u64,
    /// Free-form diagnostics.
    pub variables: BTreeMap<String, f32>,
}

impl SessionStats {
    /// Creates empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` on frames where engines should push a history sample.
    pub fn is_history_frame(&self) -> bool {
        self.frame_count % HISTORY_STRIDE == 0
    }

    /// Folds an engine's update into the aggregate.
    pub fn apply(&mut self, update: StatsUpdate) {
        if let Some(state) = update.state {
            self.state = state;
        }
        if let Some(reps) = update.rep_count {
            self.rep_count = reps;
        }
        if let Some(value) = update.primary_value {
            self.min_value = Some(self.min_value.map_or(value, |m| m.min(value)));
            self.max_value = Some(self.max_value.map_or(value, |m| m.max(value)));
        }
        if let Some(sample) = update.history_sample {
            self.history.push(sample);
        }
        self.variables.extend(update.variables);
    }

    /// Records a shoulder height and accumulates its travel since the previous one.
    pub fn record_shoulder_y(&mut self, y: f32) {
        if let Some(previous) = self.last_shoulder_y {
            self.shoulder_y_travel += (y - previous).abs();
        }
        self.last_shoulder_y = Some(y);
    }

    /// A serializable copy for readers outside the landmark task.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rep_count: self.rep_count,
            state: self.state,
            min_value: self.min_value,
            max_value: self.max_value,
            history: self.history.to_vec(),
            frame_count: self.frame_count,
            shoulder_y_travel: self.shoulder_y_travel,
            variables: self.variables.clone(),
        }
    }
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Completed repetitions.
    pub rep_count: u32,
    /// Current state machine position.
    pub state: MotionState,
    /// Lowest primary metric seen.
    pub min_value: Option<f32>,
    /// Highest primary metric seen.
    pub max_value: Option<f32>,
    /// Downsampled history, oldest first.
    pub history: Vec<f32>,
    /// Landmark cycles processed.
    pub frame_count: u64,
    /// Accumulated shoulder height changes.
    pub shoulder_y_travel: f32,
    /// Diagnostics.
    pub variables: BTreeMap<String, f32>,
}
