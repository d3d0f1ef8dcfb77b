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

//! The two append-only logs and their delivery watermarks.

use reconnect_core::{ClinicalNote, TelemetryChunk, TelemetrySample};

/// Per-log index up to which records have been delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermarks {
    /// Delivered prefix of the sample log.
    pub samples: usize,
    /// Delivered prefix of the note log.
    pub notes: usize,
}

/// An unsent suffix cut from the logs, plus the log ends it was cut at.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChunk {
    /// What goes over the wire.
    pub chunk: TelemetryChunk,
    /// Log lengths at snapshot time. Watermarks move here on success.
    pub ends: Watermarks,
}

/// Append-only sample and note logs.
///
/// Records are never mutated or removed. The watermarks are the only mutable
/// cursor, they only move forward, and never past the log lengths.
#[derive(Debug, Default)]
pub struct TelemetryLog {
    samples: Vec<TelemetrySample>,
    notes: Vec<ClinicalNote>,
    uploaded: Watermarks,
}

impl TelemetryLog {
    /// Creates empty logs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample.
    pub fn push_sample(&mut self, sample: TelemetrySample) {
        self.samples.push(sample);
    }

    /// Appends a note.
    pub fn push_note(&mut self, note: ClinicalNote) {
        self.notes.push(note);
    }

    /// All samples, oldest first.
    pub fn samples(&self) -> &[TelemetrySample] {
        &self.samples
    }

    /// All notes, oldest first.
    pub fn notes(&self) -> &[ClinicalNote] {
        &self.notes
    }

    /// Current log lengths.
    pub fn ends(&self) -> Watermarks {
        Watermarks {
            samples: self.samples.len(),
            notes: self.notes.len(),
        }
    }

    /// Delivered prefixes.
    pub fn watermarks(&self) -> Watermarks {
        self.uploaded
    }

    /// Whether anything has not been delivered yet.
    pub fn has_pending(&self) -> bool {
        self.uploaded != self.ends()
    }

    /// Cuts the unsent suffix of both logs. `None` if there is nothing to send.
    pub fn pending_chunk(&self, session_id: &str, now_secs: f32) -> Option<PendingChunk> {
        if !self.has_pending() {
            return None;
        }
        let samples = &self.samples[self.uploaded.samples..];
        let notes = &self.notes[self.uploaded.notes..];

        let first_sample = samples.first().map(|s| s.t);
        let first_note = notes.first().map(|n| n.elapsed);
        let timestamp_start = match (first_sample, first_note) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => now_secs,
        };

        Some(PendingChunk {
            chunk: TelemetryChunk {
                session_id: session_id.to_string(),
                timestamp_start,
                timestamp_end: now_secs.max(timestamp_start),
                telemetry: samples.to_vec(),
                notes: notes.iter().map(ToString::to_string).collect(),
            },
            ends: self.ends(),
        })
    }

    /// Records a successful delivery up to `ends`.
    ///
    /// Outcomes may arrive out of order, so each watermark only moves forward.
    pub fn mark_uploaded(&mut self, ends: Watermarks) {
        self.uploaded.samples = self.uploaded.samples.max(ends.samples.min(self.samples.len()));
        self.uploaded.notes = self.uploaded.notes.max(ends.notes.min(self.notes.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: f32) -> TelemetrySample {
        TelemetrySample { t, val: 90.0, vel: 0.0 }
    }

    #[test]
    fn test_empty_log_has_no_chunk() {
        let log = TelemetryLog::new();
        assert!(log.pending_chunk("s", 1.0).is_none());
    }

    #[test]
    fn test_suffix_and_watermarks() {
        let mut log = TelemetryLog::new();
        log.push_sample(sample(0.125));
        log.push_sample(sample(0.25));
        log.push_note(ClinicalNote::new(0.2, "[EVENT] Rep 1 Completed."));

        let pending = log.pending_chunk("s", 8.0).unwrap();
        assert_eq!(pending.chunk.telemetry.len(), 2);
        assert_eq!(pending.chunk.notes, vec!["[0.2s] [EVENT] Rep 1 Completed.".to_string()]);
        assert_eq!(pending.chunk.timestamp_start, 0.125);
        assert_eq!(pending.chunk.timestamp_end, 8.0);

        // Appended while the upload is in flight.
        log.push_sample(sample(0.375));
        log.mark_uploaded(pending.ends);
        assert_eq!(log.watermarks(), Watermarks { samples: 2, notes: 1 });

        let next = log.pending_chunk("s", 9.0).unwrap();
        assert_eq!(next.chunk.telemetry, vec![sample(0.375)]);
        assert!(next.chunk.notes.is_empty());
    }

    #[test]
    fn test_watermarks_never_regress_or_overrun() {
        let mut log = TelemetryLog::new();
        for i in 0..4 {
            log.push_sample(sample(i as f32));
        }
        log.mark_uploaded(Watermarks { samples: 3, notes: 0 });
        log.mark_uploaded(Watermarks { samples: 1, notes: 0 });
        assert_eq!(log.watermarks().samples, 3);
        log.mark_uploaded(Watermarks { samples: 99, notes: 99 });
        assert_eq!(log.watermarks(), log.ends());
        assert!(!log.has_pending());
    }
}
