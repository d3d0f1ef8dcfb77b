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

//! Errors raised while validating configuration.

use thiserror::Error;

/// A configuration value was rejected at construction time.
///
/// These are only raised by constructors and loaders. Nothing inside a running
/// session produces a `ConfigError`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A hysteresis band is too narrow to prevent oscillation at its boundary.
    #[error("hysteresis band [{low}, {high}] is narrower than the required margin {min_gap}")]
    BandTooNarrow {
        /// Lower threshold.
        low: f32,
        /// Upper threshold.
        high: f32,
        /// Minimum required separation.
        min_gap: f32,
    },
    /// A numeric setting is outside its valid range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Human-readable explanation.
        reason: String,
    },
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(String),
    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
