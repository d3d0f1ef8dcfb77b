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

//! Session-visible feedback status with a bounded display time.

use crate::engine::FeedbackStatus;
use std::time::Duration;

/// How long each status stays visible before reverting to neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackDurations {
    /// Display time of a critical status.
    pub critical: Duration,
    /// Display time of a warning.
    pub warning: Duration,
    /// Display time of a success.
    pub success: Duration,
}

impl Default for FeedbackDurations {
    fn default() -> Self {
        Self {
            critical: Duration::from_millis(4000),
            warning: Duration::from_millis(3000),
            success: Duration::from_millis(2000),
        }
    }
}

impl FeedbackDurations {
    fn for_status(&self, status: FeedbackStatus) -> Duration {
        match status {
            FeedbackStatus::Critical => self.critical,
            FeedbackStatus::Warning => self.warning,
            FeedbackStatus::Success => self.success,
            FeedbackStatus::Neutral => Duration::ZERO,
        }
    }
}

/// The currently displayed status. Times are session-relative.
#[derive(Debug, Clone, Default)]
pub struct FeedbackState {
    durations: FeedbackDurations,
    status: FeedbackStatus,
    expires_at: Duration,
}

impl FeedbackState {
    /// Creates a neutral state with the given display durations.
    pub fn new(durations: FeedbackDurations) -> Self {
        Self {
            durations,
            status: FeedbackStatus::Neutral,
            expires_at: Duration::ZERO,
        }
    }

    /// Shows `status` from `now` on.
    ///
    /// Ignored if a more severe status is still displayed. An equal status
    /// extends the display time.
    pub fn raise(&mut self, status: FeedbackStatus, now: Duration) {
        if status == FeedbackStatus::Neutral {
            return;
        }
        if self.current(now) > status {
            return;
        }
        self.status = status;
        self.expires_at = now + self.durations.for_status(status);
    }

    /// The status visible at `now`.
    pub fn current(&self, now: Duration) -> FeedbackStatus {
        if now < self.expires_at {
            self.status
        } else {
            FeedbackStatus::Neutral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    #[test]
    fn test_status_expires() {
        let mut state = FeedbackState::new(FeedbackDurations::default());
        state.raise(FeedbackStatus::Critical, secs(1.0));
        assert_eq!(state.current(secs(4.9)), FeedbackStatus::Critical);
        assert_eq!(state.current(secs(5.0)), FeedbackStatus::Neutral);
    }

    #[test]
    fn test_lower_status_does_not_overwrite() {
        let mut state = FeedbackState::new(FeedbackDurations::default());
        state.raise(FeedbackStatus::Critical, secs(0.0));
        state.raise(FeedbackStatus::Success, secs(1.0));
        assert_eq!(state.current(secs(1.5)), FeedbackStatus::Critical);
        state.raise(FeedbackStatus::Success, secs(4.5));
        assert_eq!(state.current(secs(5.0)), FeedbackStatus::Success);
    }
}
