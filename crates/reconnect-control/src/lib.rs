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

//! # Reconnect Control
//!
//! Session orchestration. Owns the single writer of every session: the
//! [`scheduler::SamplingScheduler`] drives the landmark and image tasks,
//! running calibration, the velocity safety check and the rule engine in
//! that order, and feeds the telemetry pipeline. [`service::SessionService`]
//! runs it on a dedicated thread behind a command channel.

#![warn(missing_docs)]

pub mod calibration;
pub mod config;
pub mod imaging;
pub mod safety;
pub mod scheduler;
pub mod service;
pub mod session;

pub use calibration::{CalibrationManager, CalibrationPhase};
pub use config::ReconnectConfig;
pub use safety::{SafetyCheck, SafetyEvent, SafetyMonitor};
pub use scheduler::{CycleOutcome, ImageSource, LandmarkSource, SamplingScheduler, TickOutcome, UploaderFactory};
pub use service::{ServiceConfig, SessionCommand, SessionEvent, SessionService};
pub use session::{ActiveSession, ExerciseSpec, SessionError, SessionSpec, SessionSummary};
