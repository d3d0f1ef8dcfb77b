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

//! Declarative exercise definitions.
//!
//! The document is produced by an external generation service and comes in
//! a couple of shapes. Parsing normalizes all of them into
//! [`UniversalSchema`]. Only a document that is not JSON at all, or that has
//! no stage list, is rejected. Anything malformed below that level is logged
//! and degraded to "never met".

use super::condition::{parse_expression, Condition, Op, Target};
use reconnect_core::{MetricDefinition, SessionDomain};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// Why a schema document was rejected.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The document is not valid JSON for the top-level schema shape.
    #[error("invalid schema document: {0}")]
    Parse(#[from] serde_json::Error),
    /// The document has neither `stages` nor `states`.
    #[error("schema defines no stages")]
    MissingStages,
}

/// One position in the cyclic stage sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// Display name, referenced by the counting policy.
    pub name: String,
    /// All must hold to leave this stage. Empty means never met.
    pub conditions: Vec<Condition>,
    /// How long the conditions must hold continuously, in seconds.
    pub hold_time: Option<f32>,
    /// Coaching text for this stage, if any.
    pub instruction: Option<String>,
}

/// What a safety rule measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyKind {
    /// The metric value itself.
    Threshold,
    /// Absolute rate of change of the metric, in units per second.
    Velocity,
}

/// A condition that pre-empts stage logic with a critical stop.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyRule {
    /// What is compared.
    pub kind: SafetyKind,
    /// The comparison.
    pub condition: Condition,
    /// Text sent after the `[SAFETY_STOP]` tag.
    pub message: String,
}

/// Repetition counting policy.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CountingLogic {
    /// Stage marking the midpoint of a repetition. Informational.
    #[serde(default)]
    pub trigger_state: Option<String>,
    /// Entering this stage completes a repetition. Defaults to wrapping to stage 0.
    #[serde(default)]
    pub reset_state: Option<String>,
    /// Minimum seconds between counted repetitions.
    #[serde(default)]
    pub min_rep_interval: Option<f32>,
}

/// A normalized exercise definition.
#[derive(Debug, Clone, PartialEq)]
pub struct UniversalSchema {
    /// Exercise name.
    pub name: Option<String>,
    /// Free text description.
    pub description: Option<String>,
    /// Landmark model the metrics refer to.
    pub domain: SessionDomain,
    /// Metrics evaluated every frame. List order, or key order for the keyed form.
    pub metrics: Vec<MetricDefinition>,
    /// Ordered, cyclic stages.
    pub stages: Vec<Stage>,
    /// Rules checked before stage logic.
    pub safety_rules: Vec<SafetyRule>,
    /// Repetition counting policy.
    pub counting: CountingLogic,
}

#[derive(Deserialize)]
struct RawSchema {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    metrics: Option<Value>,
    #[serde(default)]
    stages: Option<Vec<RawStage>>,
    #[serde(default)]
    states: Option<Vec<LegacyState>>,
    #[serde(default)]
    safety_rules: Vec<Value>,
    #[serde(default)]
    counting_logic: Option<CountingLogic>,
}

#[derive(Deserialize)]
struct RawStage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    conditions: Vec<Value>,
    #[serde(default)]
    hold_time: Option<f32>,
    #[serde(default)]
    instruction: Option<String>,
}

#[derive(Deserialize)]
struct LegacyState {
    #[serde(default)]
    name: String,
    #[serde(default)]
    condition: String,
    #[serde(default)]
    instruction: Option<String>,
}

#[derive(Deserialize)]
struct RawSafetyRule {
    #[serde(default)]
    metric_id: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    op: Option<Op>,
    #[serde(default)]
    target: Option<f32>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    message: String,
}

impl UniversalSchema {
    /// Parses and normalizes a schema document.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let raw: RawSchema = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    /// Normalizes an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let raw: RawSchema = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSchema) -> Result<Self, SchemaError> {
        let stages = match (raw.stages, raw.states) {
            (Some(stages), _) => stages.into_iter().map(normalize_stage).collect(),
            (None, Some(states)) => convert_legacy_states(states),
            (None, None) => return Err(SchemaError::MissingStages),
        };
        if stages.is_empty() {
            log::warn!("Schema has an empty stage list; no repetitions will be counted.");
        }

        let schema = Self {
            name: raw.name,
            description: raw.description,
            domain: raw
                .domain
                .as_deref()
                .map(SessionDomain::from_str_lossy)
                .unwrap_or_default(),
            metrics: raw.metrics.map(normalize_metrics).unwrap_or_default(),
            stages,
            safety_rules: raw.safety_rules.into_iter().filter_map(normalize_safety_rule).collect(),
            counting: raw.counting_logic.unwrap_or_default(),
        };
        log::debug!(
            "Loaded schema '{}': {} metrics, {} stages, {} safety rules.",
            schema.name.as_deref().unwrap_or("unnamed"),
            schema.metrics.len(),
            schema.stages.len(),
            schema.safety_rules.len()
        );
        Ok(schema)
    }

    /// Index of the stage with this name.
    pub fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// Accepts a list of definitions with `id`, or an object keyed by id.
fn normalize_metrics(value: Value) -> Vec<MetricDefinition> {
    let entries: Vec<(Option<String>, Value)> = match value {
        Value::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
        Value::Object(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
        other => {
            log::warn!("Ignoring schema metrics of unexpected shape: {other}");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|(key, v)| match serde_json::from_value::<MetricDefinition>(v) {
            Ok(mut metric) => {
                if let Some(key) = key {
                    metric.id = key;
                }
                if metric.id.is_empty() {
                    log::warn!("Ignoring schema metric without an id.");
                    return None;
                }
                Some(metric)
            }
            Err(e) => {
                log::warn!("Ignoring malformed schema metric {:?}: {e}", key);
                None
            }
        })
        .collect()
}

fn normalize_stage(raw: RawStage) -> Stage {
    let mut conditions = Vec::with_capacity(raw.conditions.len());
    for value in raw.conditions {
        match serde_json::from_value::<Condition>(value) {
            Ok(c) if c.is_well_formed() => conditions.push(c),
            Ok(c) => {
                log::warn!("Stage '{}' has an unsatisfiable condition {:?}; it will never be met.", raw.name, c);
                conditions.clear();
                break;
            }
            Err(e) => {
                log::warn!("Stage '{}' has a malformed condition ({e}); it will never be met.", raw.name);
                conditions.clear();
                break;
            }
        }
    }
    Stage {
        name: raw.name,
        conditions,
        hold_time: raw.hold_time,
        instruction: raw.instruction,
    }
}

/// Legacy states carry the condition for *entering* them. Stages carry the
/// condition for *leaving* them, so stage `i` takes the condition of state `i + 1`.
fn convert_legacy_states(states: Vec<LegacyState>) -> Vec<Stage> {
    let n = states.len();
    let entry_conditions: Vec<Option<Condition>> = states
        .iter()
        .map(|s| {
            let parsed = parse_expression(&s.condition, None);
            if parsed.is_none() {
                log::warn!("Unparseable condition '{}' on state '{}'.", s.condition, s.name);
            }
            parsed
        })
        .collect();

    states
        .into_iter()
        .enumerate()
        .map(|(i, state)| Stage {
            name: state.name,
            conditions: entry_conditions[(i + 1) % n].clone().into_iter().collect(),
            hold_time: None,
            instruction: state.instruction,
        })
        .collect()
}

fn normalize_safety_rule(value: Value) -> Option<SafetyRule> {
    let raw: RawSafetyRule = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("Ignoring malformed safety rule: {e}");
            return None;
        }
    };

    let kind = match raw.kind.as_deref().map(str::to_ascii_uppercase).as_deref() {
        Some("VELOCITY") | Some("SPEED") => SafetyKind::Velocity,
        _ => SafetyKind::Threshold,
    };

    let condition = match (&raw.metric_id, raw.op, raw.target, &raw.condition) {
        (Some(metric), Some(op), Some(target), _) => Some(Condition::new(
            metric.clone(),
            op,
            Target::Scalar(target),
        )),
        (metric, _, _, Some(expr)) => parse_expression(expr, metric.as_deref()),
        _ => None,
    };

    match condition {
        Some(condition) if condition.is_well_formed() => Some(SafetyRule {
            kind,
            condition,
            message: raw.message,
        }),
        _ => {
            log::warn!("Ignoring safety rule without a usable condition: '{}'", raw.message);
            None
        }
    }
}

/// Metric ids no stage or safety rule refers to. Harmless, but usually a
/// generation mistake worth logging.
pub fn unreferenced_metrics(schema: &UniversalSchema) -> Vec<&str> {
    let referenced: BTreeSet<&str> = schema
        .stages
        .iter()
        .flat_map(|stage| stage.conditions.iter())
        .chain(schema.safety_rules.iter().map(|rule| &rule.condition))
        .map(|c| c.metric.as_str())
        .collect();
    schema
        .metrics
        .iter()
        .map(|m| m.id.as_str())
        .filter(|id| !referenced.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconnect_core::MetricKind;

    const TYPED: &str = r#"{
        "name": "Squat",
        "domain": "BODY",
        "metrics": {
            "knee": {"type": "ANGLE", "points": ["RIGHT_HIP", "RIGHT_KNEE", "RIGHT_ANKLE"]}
        },
        "stages": [
            {"name": "standing", "conditions": [{"metric": "knee", "op": "LT", "target": 100}]},
            {"name": "squatting", "conditions": [{"metric": "knee", "op": "GT", "target": 160}], "hold_time": 0.2}
        ],
        "safety_rules": [
            {"metric_id": "knee", "type": "VELOCITY", "op": "GT", "target": 400, "message": "Slow down"}
        ]
    }"#;

    #[test]
    fn test_typed_schema() {
        let schema = UniversalSchema::from_json(TYPED).unwrap();
        assert_eq!(schema.name.as_deref(), Some("Squat"));
        assert_eq!(schema.metrics.len(), 1);
        assert_eq!(schema.metrics[0].id, "knee");
        assert_eq!(schema.metrics[0].kind, MetricKind::Angle);
        assert_eq!(schema.stages[1].hold_time, Some(0.2));
        assert_eq!(schema.safety_rules[0].kind, SafetyKind::Velocity);
        assert_eq!(schema.stage_index("SQUATTING"), Some(1));
        assert!(unreferenced_metrics(&schema).is_empty());
    }

    #[test]
    fn test_legacy_states_shift_conditions() {
        let schema = UniversalSchema::from_json(
            r#"{
                "metrics": [{"id": "elbow", "type": "ANGLE", "points": [12, 14, 16]}],
                "states": [
                    {"name": "START", "condition": "elbow > 160"},
                    {"name": "MIDDLE", "condition": "elbow < 50"}
                ],
                "safety_rules": [{"metric_id": "elbow", "type": "ANGLE", "condition": "> 175", "message": "Hyperextension"}],
                "counting_logic": {"trigger_state": "MIDDLE", "reset_state": "START"}
            }"#,
        )
        .unwrap();

        // Leaving START means entering MIDDLE.
        assert_eq!(schema.stages[0].conditions[0].op, Op::Lt);
        assert_eq!(schema.stages[1].conditions[0].target, Target::Scalar(160.0));
        assert_eq!(schema.safety_rules[0].condition.metric, "elbow");
        assert_eq!(schema.safety_rules[0].kind, SafetyKind::Threshold);
        assert_eq!(schema.counting.reset_state.as_deref(), Some("START"));
    }

    #[test]
    fn test_malformed_parts_degrade() {
        let schema = UniversalSchema::from_json(
            r#"{
                "metrics": [{"id": "a", "type": "CURVATURE", "points": [1]}, {"type": "ANGLE", "points": [1,2,3]}],
                "stages": [
                    {"name": "s0", "conditions": [{"metric": "a", "op": "EQ", "target": 3}]},
                    {"name": "s1", "conditions": []},
                    {"name": "s2", "conditions": [{"metric": "a", "op": "GT", "target": [1, 2]}]}
                ],
                "safety_rules": [{"message": "no condition"}]
            }"#,
        )
        .unwrap();
        assert!(schema.metrics.is_empty());
        assert!(schema.stages.iter().all(|s| s.conditions.is_empty()));
        assert!(schema.safety_rules.is_empty());
    }

    #[test]
    fn test_rejects_non_schema() {
        assert!(matches!(UniversalSchema::from_json("not json"), Err(SchemaError::Parse(_))));
        assert!(matches!(
            UniversalSchema::from_json(r#"{"metrics": []}"#),
            Err(SchemaError::MissingStages)
        ));
    }
}
