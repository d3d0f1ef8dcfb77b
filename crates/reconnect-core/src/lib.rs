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

//! # Reconnect Core
//!
//! Foundational crate containing the landmark data model, the pure metric
//! geometry, and the contracts shared by the rule engines, the session
//! scheduler and the telemetry pipeline.
//!
//! Nothing in here owns a thread or touches the network. Higher-level crates
//! (`reconnect-lanes`, `reconnect-control`, `reconnect-telemetry`) build on
//! these types.

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod event;
pub mod feedback;
pub mod landmark;
pub mod math;
pub mod metric;
pub mod outbound;
pub mod schedule;
pub mod stats;
pub mod telemetry;

pub use engine::{tags, CalibrationBaseline, EngineOutput, ExerciseEngine, FeedbackStatus};
pub use error::ConfigError;
pub use event::EventBus;
pub use feedback::{FeedbackDurations, FeedbackState};
pub use landmark::{Landmark, LandmarkFrame, PointRef, SessionDomain};
pub use metric::{MetricDefinition, MetricKind};
pub use outbound::{ChannelOutbound, OutboundChannel, OutboundError, OutboundMessage};
pub use schedule::PeriodicTask;
pub use stats::{MotionState, RingBuffer, SessionStats, StatsSnapshot, StatsUpdate};
pub use telemetry::{ClinicalNote, TelemetryChunk, TelemetrySample};
