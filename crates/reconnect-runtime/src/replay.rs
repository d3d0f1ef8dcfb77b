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

//! Offline replay on a simulated clock.

use anyhow::{Context, Result};
use reconnect_control::{ExerciseSpec, LandmarkSource, ReconnectConfig, SamplingScheduler, SessionSpec};
use reconnect_core::{ChannelOutbound, Landmark, SessionDomain};
use reconnect_telemetry::{ChunkUploader, FlushOutcome};
use serde_json::json;
use std::collections::VecDeque;
use std::io::Write;
use std::time::Duration;

/// One recorded cycle: the detected points, or `None` when nothing was seen.
pub type RecordedFrame = Option<Vec<Option<Landmark>>>;

/// What session to replay into.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub session_id: Option<String>,
    pub domain: SessionDomain,
    pub exercise: ExerciseSpec,
}

/// Feeds recorded frames to the scheduler, one per landmark cycle.
struct Recording(VecDeque<RecordedFrame>);

impl LandmarkSource for Recording {
    fn detect(&mut self) -> Option<Vec<Option<Landmark>>> {
        self.0.pop_front().flatten()
    }
}

/// Parses a JSONL recording. Blank lines are skipped.
pub fn parse_frames(text: &str) -> Result<Vec<RecordedFrame>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<RecordedFrame>(line).with_context(|| format!("invalid frame on line {}", i + 1))
        })
        .collect()
}

/// Runs the whole recording through one session.
///
/// Every outbound message is written to `out` as a JSON line, followed by a
/// summary object. Returns the teardown flush result.
pub fn run(
    config: ReconnectConfig,
    options: ReplayOptions,
    frames: Vec<RecordedFrame>,
    uploader: Box<dyn ChunkUploader>,
    out: &mut impl Write,
) -> Result<FlushOutcome> {
    let interval = config.landmark_interval();
    let cycles = frames.len() as u32;
    let mut scheduler = SamplingScheduler::new(config, Box::new(Recording(frames.into())), None)?;

    let (outbound, rx) = ChannelOutbound::new();
    let spec = SessionSpec {
        session_id: options.session_id,
        domain: options.domain,
        exercise: options.exercise,
    };
    let session_id = scheduler.start_session(spec, Box::new(outbound), uploader, Duration::ZERO)?;
    scheduler.start_landmark_task(Duration::ZERO);
    log::info!("Replaying {} cycles into session {}.", cycles, session_id);

    for cycle in 1..=cycles {
        scheduler.tick(interval * cycle);
        for message in rx.drain() {
            writeln!(out, "{}", message.to_json())?;
        }
    }

    let summary = scheduler.end_session(Some(&session_id), interval * (cycles + 1))?;
    for message in rx.drain() {
        writeln!(out, "{}", message.to_json())?;
    }
    let report = json!({
        "session_id": summary.session_id,
        "stats": summary.stats,
        "samples": summary.samples_recorded,
        "notes": summary.notes_recorded,
        "flush": format!("{:?}", summary.flush),
    });
    writeln!(out, "{report}")?;
    Ok(summary.flush)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconnect_telemetry::LogUploader;

    /// Upright torso, right arm hanging with the wrist at `wrist_y`.
    fn arm_line(wrist_y: f32) -> String {
        let mut points = vec![serde_json::Value::Null; 33];
        points[12] = json!({"x": 0.5, "y": 0.3});
        points[14] = json!({"x": 0.5, "y": 0.5});
        points[16] = json!({"x": 0.5, "y": wrist_y});
        points[24] = json!({"x": 0.5, "y": 0.8});
        serde_json::Value::Array(points).to_string()
    }

    #[test]
    fn test_parse_frames_accepts_null_and_blank_lines() {
        let text = format!("{}\n\nnull\n{}\n", arm_line(0.9), arm_line(0.35));
        let frames = parse_frames(&text).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames[1].is_none());
        let first = frames[0].as_ref().unwrap();
        assert_eq!(first.len(), 33);
        assert!(first[0].is_none());
        assert_eq!(first[16].unwrap().y, 0.9);
    }

    #[test]
    fn test_parse_frames_reports_line() {
        let err = parse_frames("null\n{oops").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn test_replay_counts_curl() {
        let mut config = ReconnectConfig::default();
        config.calibration.buffer_size = 2;
        let lines = [0.95, 0.95, 0.9, 0.7, 0.45, 0.35, 0.45, 0.7, 0.9, 0.95]
            .map(arm_line)
            .join("\n");
        let frames = parse_frames(&format!("{lines}\nnull\n")).unwrap();
        let options = ReplayOptions {
            session_id: Some("replay".into()),
            domain: SessionDomain::Body,
            exercise: ExerciseSpec::Builtin("bicep_curl".into()),
        };

        let mut out = Vec::new();
        let flush = run(config, options, frames, Box::new(LogUploader), &mut out).unwrap();
        assert_eq!(flush, FlushOutcome::Delivered);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // Ten detections, one empty cycle, one summary.
        assert_eq!(lines.len(), 11);
        assert!(lines
            .iter()
            .any(|l| l.contains("[EVENT] Bicep Curl 1 Completed.") && l.contains("\"trigger\":true")));

        let summary: serde_json::Value = serde_json::from_str(lines[10]).unwrap();
        assert_eq!(summary["session_id"], "replay");
        assert_eq!(summary["stats"]["rep_count"], 1);
        assert_eq!(summary["stats"]["frame_count"], 10);
        assert_eq!(summary["flush"], "Delivered");
    }
}
