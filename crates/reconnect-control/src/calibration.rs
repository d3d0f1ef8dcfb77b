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

//! Baseline collection at the start of a session.

use reconnect_core::CalibrationBaseline;

/// Where a session's calibration stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    /// Buffering the reference metric. Rule evaluation is suppressed.
    Calibrating,
    /// The baseline is fixed.
    Calibrated,
    /// The domain does not calibrate. Rules run from the first frame.
    Exempt,
}

/// Collects a fixed number of reference readings and fixes their mean.
#[derive(Debug, Clone)]
pub struct CalibrationManager {
    capacity: usize,
    buffer: Vec<f32>,
    phase: CalibrationPhase,
    baseline: Option<CalibrationBaseline>,
}

impl CalibrationManager {
    /// Starts calibrating with room for `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Vec::with_capacity(capacity),
            phase: CalibrationPhase::Calibrating,
            baseline: None,
        }
    }

    /// A manager for domains that skip calibration.
    pub fn exempt() -> Self {
        Self {
            capacity: 0,
            buffer: Vec::new(),
            phase: CalibrationPhase::Exempt,
            baseline: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// The fixed baseline, once calibrated.
    pub fn baseline(&self) -> Option<&CalibrationBaseline> {
        self.baseline.as_ref()
    }

    /// Whether exercise rules may run.
    pub fn allows_evaluation(&self) -> bool {
        self.phase != CalibrationPhase::Calibrating
    }

    /// Valid samples buffered so far.
    pub fn samples_collected(&self) -> usize {
        self.buffer.len()
    }

    /// Number of valid samples needed.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Feeds one cycle's reading. `None` readings are not counted.
    ///
    /// Returns the baseline on the one call that completes calibration.
    pub fn observe(&mut self, reading: Option<f32>) -> Option<CalibrationBaseline> {
        if self.phase != CalibrationPhase::Calibrating {
            return None;
        }
        let value = reading.filter(|v| v.is_finite())?;
        self.buffer.push(value);
        log::trace!("Calibration sample {}/{}: {:.2}", self.buffer.len(), self.capacity, value);
        if self.buffer.len() < self.capacity {
            return None;
        }

        let mean = self.buffer.iter().sum::<f32>() / self.buffer.len() as f32;
        let baseline = CalibrationBaseline::new(mean);
        self.baseline = Some(baseline);
        self.phase = CalibrationPhase::Calibrated;
        self.buffer.clear();
        log::info!("Calibration complete: resting reference angle {:.1}°.", mean);
        Some(baseline)
    }

    /// Drops the buffer and baseline. The next session calibrates again.
    pub fn release(&mut self) {
        self.buffer = Vec::new();
        self.baseline = None;
        if self.phase == CalibrationPhase::Calibrated {
            self.phase = CalibrationPhase::Calibrating;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_completes_after_exactly_capacity_valid_samples() {
        let mut calibration = CalibrationManager::new(3);
        assert!(!calibration.allows_evaluation());
        assert!(calibration.observe(Some(2.0)).is_none());
        assert!(calibration.observe(None).is_none());
        assert!(calibration.observe(Some(f32::NAN)).is_none());
        assert!(calibration.observe(Some(4.0)).is_none());
        assert_eq!(calibration.samples_collected(), 2);

        let baseline = calibration.observe(Some(6.0)).unwrap();
        assert_relative_eq!(baseline.resting_reference_angle, 4.0);
        assert_eq!(calibration.phase(), CalibrationPhase::Calibrated);
        assert!(calibration.allows_evaluation());

        // The transition happens once.
        assert!(calibration.observe(Some(100.0)).is_none());
        assert_relative_eq!(calibration.baseline().unwrap().resting_reference_angle, 4.0);
    }

    #[test]
    fn test_release_forces_recalibration() {
        let mut calibration = CalibrationManager::new(1);
        calibration.observe(Some(5.0));
        calibration.release();
        assert!(calibration.baseline().is_none());
        assert_eq!(calibration.phase(), CalibrationPhase::Calibrating);
    }

    #[test]
    fn test_exempt_never_calibrates() {
        let mut calibration = CalibrationManager::exempt();
        assert!(calibration.allows_evaluation());
        assert!(calibration.observe(Some(1.0)).is_none());
        assert!(calibration.baseline().is_none());
    }
}
