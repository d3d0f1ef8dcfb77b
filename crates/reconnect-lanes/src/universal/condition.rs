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

//! The closed comparison language of schema conditions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Op {
    /// Strictly greater than the target.
    Gt,
    /// Strictly less than the target.
    Lt,
    /// Within the target (± tolerance).
    Between,
}

impl FromStr for Op {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GT" | ">" | ">=" | "GTE" => Ok(Op::Gt),
            "LT" | "<" | "<=" | "LTE" => Ok(Op::Lt),
            "BETWEEN" | "IN" | "RANGE" => Ok(Op::Between),
            other => Err(format!("unknown operator '{other}'")),
        }
    }
}

impl TryFrom<String> for Op {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Op> for String {
    fn from(op: Op) -> Self {
        op.to_string()
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Gt => "GT",
            Op::Lt => "LT",
            Op::Between => "BETWEEN",
        })
    }
}

/// What a metric is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    /// A single value.
    Scalar(f32),
    /// An inclusive `[low, high]` range.
    Range([f32; 2]),
}

/// `metric <op> target`, optionally widened by a tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Id of the metric being compared.
    #[serde(alias = "metric_id", alias = "variable")]
    pub metric: String,
    /// The comparison.
    pub op: Op,
    /// The comparison target.
    #[serde(alias = "value")]
    pub target: Target,
    /// Widening applied to `BETWEEN` targets.
    #[serde(default)]
    pub tolerance: Option<f32>,
}

impl Condition {
    /// Creates a condition without tolerance.
    pub fn new(metric: impl Into<String>, op: Op, target: Target) -> Self {
        Self {
            metric: metric.into(),
            op,
            target,
            tolerance: None,
        }
    }

    /// Whether this condition can ever hold. `GT`/`LT` need a scalar target.
    pub fn is_well_formed(&self) -> bool {
        !self.metric.is_empty()
            && match (self.op, self.target) {
                (Op::Gt | Op::Lt, Target::Range(_)) => false,
                (_, Target::Range([low, high])) => low <= high,
                _ => true,
            }
    }

    /// Tests a single value. `None` never satisfies a condition.
    pub fn holds(&self, value: Option<f32>) -> bool {
        let Some(v) = value else {
            return false;
        };
        let tolerance = self.tolerance.unwrap_or(0.0).abs();
        match (self.op, self.target) {
            (Op::Gt, Target::Scalar(t)) => v > t,
            (Op::Lt, Target::Scalar(t)) => v < t,
            (Op::Between, Target::Scalar(t)) => (v - t).abs() <= tolerance,
            (Op::Between, Target::Range([low, high])) => low - tolerance <= v && v <= high + tolerance,
            (Op::Gt | Op::Lt, Target::Range(_)) => false,
        }
    }

    /// Looks up this condition's metric in `values` and tests it.
    pub fn holds_in(&self, values: &BTreeMap<String, f32>) -> bool {
        self.holds(values.get(&self.metric).copied())
    }
}

/// Parses the compact `"<metric> <op> <number>"` form.
///
/// The metric name may be omitted (`"> 2.0"`), in which case
/// `default_metric` is used. Returns `None` for anything else.
pub fn parse_expression(expr: &str, default_metric: Option<&str>) -> Option<Condition> {
    let expr = expr.trim();
    let op_at = expr.find(['<', '>'])?;
    let name = expr[..op_at].trim();
    let rest = &expr[op_at..];
    let op_len = if rest[1..].starts_with('=') { 2 } else { 1 };
    let op: Op = rest[..op_len].parse().ok()?;
    let number: f32 = rest[op_len..].trim().parse().ok()?;

    let metric = if name.is_empty() {
        default_metric?.to_string()
    } else if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        return None;
    };
    Some(Condition::new(metric, op, Target::Scalar(number)))
}
