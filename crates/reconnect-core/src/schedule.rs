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

//! A cooperative periodic timer driven by an external clock.
//!
//! [`PeriodicTask`] owns no thread. Its owner calls [`PeriodicTask::poll`]
//! with the current time and runs the task body when it returns `true`. Times
//! are offsets from an arbitrary origin so the same code runs against a wall
//! clock or a simulated one.

use std::time::Duration;

/// A start/stoppable interval timer.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    next_due: Option<Duration>,
}

impl PeriodicTask {
    /// Creates a stopped task.
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            next_due: None,
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The interval between firings.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Starts the timer. The first firing is one period after `now`.
    ///
    /// Returns `false` without touching the schedule if already running, so a
    /// second start never creates a second timer.
    pub fn start(&mut self, now: Duration) -> bool {
        if self.next_due.is_some() {
            log::debug!("Periodic task '{}' already running.", self.name);
            return false;
        }
        log::debug!("Starting periodic task '{}' every {:?}.", self.name, self.period);
        self.next_due = Some(now + self.period);
        true
    }

    /// Stops the timer. Stopping a stopped task is a no-op.
    pub fn stop(&mut self) {
        if self.next_due.take().is_some() {
            log::debug!("Stopped periodic task '{}'.", self.name);
        }
    }

    /// Whether the timer is running.
    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Returns `true` if the task is due at `now` and schedules the next firing.
    ///
    /// Fires at most once per call. Missed periods are skipped, not replayed.
    pub fn poll(&mut self, now: Duration) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }
        let mut next = due + self.period;
        if next <= now {
            next = now + self.period;
        }
        self.next_due = Some(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_fires_on_period() {
        let mut task = PeriodicTask::new("landmarks", ms(125));
        assert!(!task.poll(ms(500)));
        assert!(task.start(ms(0)));
        assert!(!task.poll(ms(100)));
        assert!(task.poll(ms(125)));
        assert!(!task.poll(ms(130)));
        assert!(task.poll(ms(250)));
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut task = PeriodicTask::new("landmarks", ms(125));
        assert!(task.start(ms(0)));
        assert!(!task.start(ms(60)));
        let fired = (0..=8).filter(|i| task.poll(ms(i * 125))).count();
        assert_eq!(fired, 8);
    }

    #[test]
    fn test_no_catch_up_after_stall() {
        let mut task = PeriodicTask::new("images", ms(1000));
        task.start(ms(0));
        assert!(task.poll(ms(5500)));
        assert!(!task.poll(ms(5600)));
        assert!(task.poll(ms(6500)));
    }

    #[test]
    fn test_stop() {
        let mut task = PeriodicTask::new("images", ms(1000));
        task.start(ms(0));
        task.stop();
        assert!(!task.is_running());
        assert!(!task.poll(ms(2000)));
        assert!(task.start(ms(2000)));
    }
}
