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

//! Universal Lane
//!
//! An [`ExerciseEngine`] that interprets a [`UniversalSchema`] at runtime.
//!
//! Per frame:
//! 1. every schema metric is evaluated into an `id → value` map;
//! 2. safety rules run first and pre-empt everything else on a match;
//! 3. the conditions of the *current* stage are tested together;
//! 4. once they have held for the stage's hold time, the engine advances to
//!    the next stage (cyclically), counting a repetition on entry to the
//!    counting stage if the minimum interval since the last one has passed.
//!
//! A hold that breaks before completing restarts from zero the next time the
//! conditions hold.

pub mod condition;
pub mod schema;

pub use condition::{parse_expression, Condition, Op, Target};
pub use schema::{CountingLogic, SafetyKind, SafetyRule, SchemaError, Stage, UniversalSchema};

use reconnect_core::math::round1;
use reconnect_core::{
    tags, CalibrationBaseline, EngineOutput, ExerciseEngine, FeedbackStatus, LandmarkFrame,
    MotionState, SessionStats, StatsUpdate,
};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Timing defaults applied where the schema is silent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniversalSettings {
    /// Hold time for stages without `hold_time`.
    pub default_hold_time: Duration,
    /// Minimum time between counted repetitions.
    pub min_rep_interval: Duration,
}

impl Default for UniversalSettings {
    fn default() -> Self {
        Self {
            default_hold_time: Duration::from_millis(500),
            min_rep_interval: Duration::from_millis(1500),
        }
    }
}

/// Seconds from a schema as a duration. Missing, negative, non-finite and
/// out-of-range values fall back to `fallback`.
fn duration_or(seconds: Option<f32>, fallback: Duration, field: &str) -> Duration {
    let Some(seconds) = seconds else {
        return fallback;
    };
    match Duration::try_from_secs_f32(seconds) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("Ignoring duration {} for '{}' ({}); using {:?}.", seconds, field, e, fallback);
            fallback
        }
    }
}

/// The schema-interpreting engine.
#[derive(Debug)]
pub struct UniversalEngine {
    name: String,
    schema: UniversalSchema,
    settings: UniversalSettings,
    hold_times: Vec<Duration>,
    rep_stage: usize,
    stage_index: usize,
    met_since: Option<Duration>,
    last_state_change: Option<Duration>,
    last_rep: Option<Duration>,
    previous: HashMap<String, (f32, Duration)>,
}

impl UniversalEngine {
    /// Builds an engine for `schema`.
    pub fn new(schema: UniversalSchema, settings: UniversalSettings) -> Self {
        let rep_stage = match schema.counting.reset_state.as_deref() {
            Some(name) => schema.stage_index(name).unwrap_or_else(|| {
                log::warn!("Counting stage '{}' not found; counting on return to the first stage.", name);
                0
            }),
            None => 0,
        };
        let min_rep_interval = duration_or(
            schema.counting.min_rep_interval,
            settings.min_rep_interval,
            "counting_logic.min_rep_interval",
        );
        let hold_times = schema
            .stages
            .iter()
            .map(|stage| duration_or(stage.hold_time, settings.default_hold_time, &stage.name))
            .collect();

        for id in schema::unreferenced_metrics(&schema) {
            log::debug!("Schema metric '{}' is not referenced by any stage or rule.", id);
        }

        Self {
            name: schema.name.clone().unwrap_or_else(|| "universal".to_string()),
            schema,
            settings: UniversalSettings {
                min_rep_interval,
                ..settings
            },
            hold_times,
            rep_stage,
            stage_index: 0,
            met_since: None,
            last_state_change: None,
            last_rep: None,
            previous: HashMap::new(),
        }
    }

    /// Parses `json` and builds an engine from it.
    pub fn from_json(json: &str, settings: UniversalSettings) -> Result<Self, SchemaError> {
        Ok(Self::new(UniversalSchema::from_json(json)?, settings))
    }

    /// The interpreted schema.
    pub fn schema(&self) -> &UniversalSchema {
        &self.schema
    }

    /// Index of the stage whose conditions are currently being tested.
    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    fn evaluate_metrics(&self, frame: &LandmarkFrame) -> BTreeMap<String, f32> {
        self.schema
            .metrics
            .iter()
            .filter_map(|m| m.evaluate(frame).map(|v| (m.id.clone(), v)))
            .collect()
    }

    /// Absolute rate of change per second against the last evaluated frame.
    fn rates(&self, values: &BTreeMap<String, f32>, now: Duration) -> BTreeMap<String, f32> {
        values
            .iter()
            .filter_map(|(id, &v)| {
                let &(prev, at) = self.previous.get(id)?;
                let dt = now.checked_sub(at)?.as_secs_f32();
                (dt > 0.0).then(|| (id.clone(), (v - prev).abs() / dt))
            })
            .collect()
    }

    fn check_safety(
        &self,
        values: &BTreeMap<String, f32>,
        rates: &BTreeMap<String, f32>,
    ) -> Option<&SafetyRule> {
        self.schema.safety_rules.iter().find(|rule| match rule.kind {
            SafetyKind::Threshold => rule.condition.holds_in(values),
            SafetyKind::Velocity => rule.condition.holds_in(rates),
        })
    }

    /// Runs the stage machine. Returns `(advanced, counted)`.
    fn advance_stages(&mut self, values: &BTreeMap<String, f32>, now: Duration) -> (bool, bool) {
        let Some(stage) = self.schema.stages.get(self.stage_index) else {
            return (false, false);
        };
        let all_met = !stage.conditions.is_empty() && stage.conditions.iter().all(|c| c.holds_in(values));
        if !all_met {
            self.met_since = None;
            return (false, false);
        }

        let since = *self.met_since.get_or_insert(now);
        let start = self.last_state_change.map_or(since, |changed| since.max(changed));
        if now.saturating_sub(start) < self.hold_times[self.stage_index] {
            return (false, false);
        }

        let next = (self.stage_index + 1) % self.schema.stages.len();
        log::debug!(
            "Stage '{}' -> '{}' at {:?}.",
            stage.name,
            self.schema.stages[next].name,
            now
        );
        self.stage_index = next;
        self.last_state_change = Some(now);
        self.met_since = None;

        if next != self.rep_stage {
            return (true, false);
        }
        let interval_ok = self
            .last_rep
            .map_or(true, |last| now.saturating_sub(last) >= self.settings.min_rep_interval);
        if !interval_ok {
            log::debug!("Repetition suppressed: within the minimum interval of the previous one.");
            return (true, false);
        }
        self.last_rep = Some(now);
        (true, true)
    }
}

impl ExerciseEngine for UniversalEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn calculate(
        &mut self,
        frame: &LandmarkFrame,
        stats: &SessionStats,
        _baseline: Option<&CalibrationBaseline>,
    ) -> EngineOutput {
        let now = frame.timestamp();

        // 1. Metrics
        let values = self.evaluate_metrics(frame);
        let rates = self.rates(&values, now);
        for (id, &v) in &values {
            self.previous.insert(id.clone(), (v, now));
        }

        let mut update = StatsUpdate {
            primary_value: self
                .schema
                .metrics
                .first()
                .and_then(|m| values.get(&m.id).copied()),
            variables: values.iter().map(|(k, &v)| (k.clone(), round1(v))).collect(),
            ..Default::default()
        };
        if stats.is_history_frame() {
            update.history_sample = update.primary_value.map(round1);
        }

        // 2. Safety rules pre-empt stage logic.
        if let Some(rule) = self.check_safety(&values, &rates) {
            update.variables.insert("stage_index".into(), self.stage_index as f32);
            return EngineOutput::triggered(
                format!("{} {}", tags::SAFETY_STOP, rule.message),
                FeedbackStatus::Critical,
                update,
            );
        }

        // 3. Stage machine
        let (advanced, counted) = self.advance_stages(&values, now);
        update.variables.insert("stage_index".into(), self.stage_index as f32);
        if !advanced {
            return EngineOutput::quiet(update);
        }

        update.state = Some(MotionState::Stage(self.stage_index));
        if counted {
            let reps = stats.rep_count + 1;
            update.rep_count = Some(reps);
            return EngineOutput::triggered(
                format!("{} Rep {} Completed.", tags::EVENT, reps),
                FeedbackStatus::Success,
                update,
            );
        }

        let stage_name = &self.schema.stages[self.stage_index].name;
        EngineOutput {
            message: Some(format!("{} Stage '{}' reached.", tags::EVENT, stage_name)),
            ..EngineOutput::quiet(update)
        }
    }

    fn reset(&mut self) {
        self.stage_index = 0;
        self.met_since = None;
        self.last_state_change = None;
        self.last_rep = None;
        self.previous.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconnect_core::{Landmark, SessionDomain};

    /// A two-point vertical-diff metric whose value equals `value / 100`.
    fn frame(value: f32, t_ms: u64) -> LandmarkFrame {
        LandmarkFrame::complete(
            vec![Landmark::new(0.0, 0.0), Landmark::new(0.0, value / 100.0)],
            SessionDomain::Body,
            Duration::from_millis(t_ms),
        )
    }

    fn two_stage(hold: f32, extra: &str) -> UniversalEngine {
        let json = format!(
            r#"{{
                "metrics": [{{"id": "m", "type": "VERTICAL_DIFF", "points": [0, 1]}}],
                "stages": [
                    {{"name": "top", "conditions": [{{"metric": "m", "op": "GT", "target": 0.90}}], "hold_time": {hold}}},
                    {{"name": "bottom", "conditions": [{{"metric": "m", "op": "LT", "target": 0.30}}], "hold_time": {hold}}}
                ]
                {extra}
            }}"#
        );
        UniversalEngine::from_json(&json, UniversalSettings::default()).unwrap()
    }

    fn feed(engine: &mut UniversalEngine, values: &[(f32, u64)]) -> (SessionStats, Vec<EngineOutput>) {
        let mut stats = SessionStats::new();
        let mut outputs = Vec::new();
        for &(v, t) in values {
            stats.frame_count += 1;
            let out = engine.calculate(&frame(v, t), &stats, None);
            stats.apply(out.stats_update.clone());
            outputs.push(out);
        }
        (stats, outputs)
    }

    #[test]
    fn test_hold_time_must_elapse() {
        let mut engine = two_stage(0.5, "");
        let (_, outputs) = feed(&mut engine, &[(95.0, 0), (95.0, 250), (95.0, 500)]);
        assert!(outputs[0].stats_update.state.is_none());
        assert!(outputs[1].stats_update.state.is_none());
        assert_eq!(outputs[2].stats_update.state, Some(MotionState::Stage(1)));
    }

    #[test]
    fn test_broken_hold_restarts() {
        let mut engine = two_stage(0.5, "");
        feed(&mut engine, &[(95.0, 0), (95.0, 400), (50.0, 450), (95.0, 500), (95.0, 900)]);
        assert_eq!(engine.stage_index(), 0);
        feed(&mut engine, &[(95.0, 1000)]);
        assert_eq!(engine.stage_index(), 1);
    }

    #[test]
    fn test_out_of_range_durations_use_defaults() {
        let mut engine = two_stage(1e30, r#", "counting_logic": {"min_rep_interval": 1e30}"#);
        // Default hold is 500ms.
        let (_, outputs) = feed(&mut engine, &[(95.0, 0), (95.0, 250), (95.0, 500)]);
        assert!(outputs[1].stats_update.state.is_none());
        assert_eq!(outputs[2].stats_update.state, Some(MotionState::Stage(1)));
        // Default minimum interval is 1500ms.
        let (stats, _) = feed(&mut engine, &[(20.0, 600), (20.0, 1100)]);
        assert_eq!(stats.rep_count, 1);

        let mut engine = two_stage(-2.0, "");
        feed(&mut engine, &[(95.0, 0), (95.0, 499)]);
        assert_eq!(engine.stage_index(), 0);
    }

    #[test]
    fn test_min_rep_interval_gates_count_not_advance() {
        let mut engine = two_stage(0.0, "");
        let (stats, _) = feed(
            &mut engine,
            &[(95.0, 0), (20.0, 100), (95.0, 200), (20.0, 300), (95.0, 2000), (20.0, 2100)],
        );
        // The second cycle completes 200ms after the first and is not counted.
        assert_eq!(stats.rep_count, 2);
        assert_eq!(engine.stage_index(), 0);
    }

    #[test]
    fn test_counting_on_reset_state() {
        let mut engine = two_stage(0.0, r#", "counting_logic": {"reset_state": "bottom"}"#);
        let (stats, outputs) = feed(&mut engine, &[(95.0, 0)]);
        assert_eq!(stats.rep_count, 1);
        assert_eq!(outputs[0].message.as_deref(), Some("[EVENT] Rep 1 Completed."));
    }

    #[test]
    fn test_velocity_safety_rule() {
        let mut engine = two_stage(
            0.0,
            r#", "safety_rules": [{"metric_id": "m", "type": "VELOCITY", "condition": "> 2.0", "message": "Too fast"}]"#,
        );
        // 0.10 -> 0.95 in 250ms is 3.4 units/s.
        let (stats, outputs) = feed(&mut engine, &[(10.0, 0), (95.0, 250)]);
        assert!(outputs[1].trigger);
        assert_eq!(outputs[1].feedback, FeedbackStatus::Critical);
        assert_eq!(outputs[1].message.as_deref(), Some("[SAFETY_STOP] Too fast"));
        // Pre-empted: no stage advance on that frame.
        assert_eq!(engine.stage_index(), 0);
        assert_eq!(stats.rep_count, 0);
    }

    #[test]
    fn test_missing_metric_never_meets() {
        let mut engine = two_stage(0.0, "");
        let empty = LandmarkFrame::new(vec![None, None], SessionDomain::Body, Duration::ZERO);
        let out = engine.calculate(&empty, &SessionStats::new(), None);
        assert!(!out.trigger);
        assert_eq!(engine.stage_index(), 0);
        assert!(out.stats_update.primary_value.is_none());
    }

    #[test]
    fn test_reset_clears_progress() {
        let mut engine = two_stage(0.0, "");
        feed(&mut engine, &[(95.0, 0)]);
        assert_eq!(engine.stage_index(), 1);
        engine.reset();
        assert_eq!(engine.stage_index(), 0);
    }
}
