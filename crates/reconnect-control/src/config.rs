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

//! Runtime configuration, loadable from TOML.

use reconnect_core::{ConfigError, FeedbackDurations};
use reconnect_lanes::UniversalSettings;
use reconnect_telemetry::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Cadences and image encoding of the two sampling tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period of the passive image task.
    pub image_interval_ms: u64,
    /// Period of the landmark task.
    pub landmark_interval_ms: u64,
    /// Bounding box passive frames are downscaled into.
    pub image_max_width: u32,
    /// See `image_max_width`.
    pub image_max_height: u32,
    /// JPEG quality, 1 to 100.
    pub jpeg_quality: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            image_interval_ms: 1000,
            landmark_interval_ms: 125,
            image_max_width: 320,
            image_max_height: 240,
            jpeg_quality: 50,
        }
    }
}

/// Baseline collection before rule evaluation starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Valid samples collected before the baseline is fixed.
    pub buffer_size: usize,
    /// Torso lean beyond the baseline that triggers a correction.
    pub lean_tolerance_deg: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            buffer_size: 24,
            lean_tolerance_deg: 15.0,
        }
    }
}

/// Velocity safety check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Displacement per landmark cycle, in normalized image units.
    pub velocity_threshold: f32,
    /// Landmark name or index tracked for velocity.
    pub tracked_point: String,
    /// How long a critical status stays displayed.
    pub critical_display_ms: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            velocity_threshold: 0.35,
            tracked_point: "RIGHT_WRIST".to_string(),
            critical_display_ms: 4000,
        }
    }
}

/// Display times of the non-critical statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Display time of a warning.
    pub warning_display_ms: u64,
    /// Display time of a success.
    pub success_display_ms: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            warning_display_ms: 3000,
            success_display_ms: 2000,
        }
    }
}

/// Defaults of the schema-driven engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniversalConfig {
    /// Hold time of stages that do not set one.
    pub default_hold_time_secs: f32,
    /// Minimum time between counted repetitions.
    pub min_rep_interval_secs: f32,
}

impl Default for UniversalConfig {
    fn default() -> Self {
        Self {
            default_hold_time_secs: 0.5,
            min_rep_interval_secs: 1.5,
        }
    }
}

/// Chunk delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Period of the chunk upload task.
    pub upload_interval_secs: u64,
    /// Bound on the teardown flush.
    pub flush_timeout_ms: u64,
    /// Base URL of the ingestion service. Chunks are only logged without one.
    pub endpoint: Option<String>,
    /// Per-request timeout of the HTTP uploader.
    pub request_timeout_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            upload_interval_secs: 8,
            flush_timeout_ms: 2000,
            endpoint: None,
            request_timeout_ms: 5000,
        }
    }
}

/// Complete configuration. Every section and field falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Sampling tasks.
    pub scheduler: SchedulerConfig,
    /// Calibration.
    pub calibration: CalibrationConfig,
    /// Safety monitor.
    pub safety: SafetyConfig,
    /// Feedback display.
    pub feedback: FeedbackConfig,
    /// Universal engine.
    pub universal: UniversalConfig,
    /// Telemetry delivery.
    pub telemetry: TelemetryConfig,
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be a positive number, got {value}")))
    }
}

fn seconds(field: &'static str, value: f32) -> Result<(), ConfigError> {
    match Duration::try_from_secs_f32(value) {
        Ok(_) => Ok(()),
        Err(e) => Err(ConfigError::invalid(field, format!("must be a duration in seconds, got {value} ({e})"))),
    }
}

fn nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::invalid(field, "must be greater than zero"))
    } else {
        Ok(())
    }
}

impl ReconnectConfig {
    /// Parses a TOML document and validates it.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    ///
    /// A file that exists but is invalid is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => {
                log::info!("Loading configuration from {}.", path.display());
                Self::load(path)
            }
            Some(path) => {
                log::info!("No configuration at {}, using defaults.", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Rejects values no session could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scheduler;
        nonzero("scheduler.image_interval_ms", s.image_interval_ms)?;
        nonzero("scheduler.landmark_interval_ms", s.landmark_interval_ms)?;
        nonzero("scheduler.image_max_width", s.image_max_width.into())?;
        nonzero("scheduler.image_max_height", s.image_max_height.into())?;
        if !(1..=100).contains(&s.jpeg_quality) {
            return Err(ConfigError::invalid(
                "scheduler.jpeg_quality",
                format!("must be within 1..=100, got {}", s.jpeg_quality),
            ));
        }

        if self.calibration.buffer_size == 0 {
            return Err(ConfigError::invalid("calibration.buffer_size", "must hold at least one sample"));
        }
        positive("calibration.lean_tolerance_deg", self.calibration.lean_tolerance_deg)?;

        positive("safety.velocity_threshold", self.safety.velocity_threshold)?;
        if self.safety.tracked_point.trim().is_empty() {
            return Err(ConfigError::invalid("safety.tracked_point", "must name a landmark"));
        }
        nonzero("safety.critical_display_ms", self.safety.critical_display_ms)?;
        nonzero("feedback.warning_display_ms", self.feedback.warning_display_ms)?;
        nonzero("feedback.success_display_ms", self.feedback.success_display_ms)?;

        seconds("universal.default_hold_time_secs", self.universal.default_hold_time_secs)?;
        seconds("universal.min_rep_interval_secs", self.universal.min_rep_interval_secs)?;

        let t = &self.telemetry;
        nonzero("telemetry.upload_interval_secs", t.upload_interval_secs)?;
        nonzero("telemetry.flush_timeout_ms", t.flush_timeout_ms)?;
        nonzero("telemetry.request_timeout_ms", t.request_timeout_ms)?;
        if matches!(&t.endpoint, Some(e) if e.trim().is_empty()) {
            return Err(ConfigError::invalid("telemetry.endpoint", "must not be blank when set"));
        }
        Ok(())
    }

    /// Landmark task period.
    pub fn landmark_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.landmark_interval_ms)
    }

    /// Image task period.
    pub fn image_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.image_interval_ms)
    }

    /// Status display times.
    pub fn feedback_durations(&self) -> FeedbackDurations {
        FeedbackDurations {
            critical: Duration::from_millis(self.safety.critical_display_ms),
            warning: Duration::from_millis(self.feedback.warning_display_ms),
            success: Duration::from_millis(self.feedback.success_display_ms),
        }
    }

    /// Universal engine defaults. Values that are not valid durations keep
    /// the engine's own defaults.
    pub fn universal_settings(&self) -> UniversalSettings {
        let defaults = UniversalSettings::default();
        UniversalSettings {
            default_hold_time: Duration::try_from_secs_f32(self.universal.default_hold_time_secs)
                .unwrap_or(defaults.default_hold_time),
            min_rep_interval: Duration::try_from_secs_f32(self.universal.min_rep_interval_secs)
                .unwrap_or(defaults.min_rep_interval),
        }
    }

    /// Telemetry pipeline timing.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            upload_interval: Duration::from_secs(self.telemetry.upload_interval_secs),
            flush_timeout: Duration::from_millis(self.telemetry.flush_timeout_ms),
        }
    }

    /// HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.telemetry.request_timeout_ms)
    }
}
