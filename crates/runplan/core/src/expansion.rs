// Runplan
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Parameter-space expansion
//!
//! Globals are partitioned into axes. Every zip key forms one axis whose
//! members iterate in lock-step, every `outer` global forms an axis of its
//! own, and untagged globals share a single one-row axis. Shots are the
//! cartesian product of all axes.

use crate::evaluator::EvaluatedGlobals;
use crate::globals::{ExpansionTag, SequenceGlobals};
use rand::Rng;
use rand::seq::SliceRandom;
use runplan_expr::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Flat assignment of a value to every global for one run
pub type Shot = BTreeMap<String, Value>;

/// Identity of an axis
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AxisKey {
    /// Globals sharing a zip key; the empty key holds untagged globals
    Zip(String),
    /// A single `outer` global
    Outer(String),
}

impl fmt::Display for AxisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisKey::Zip(key) => write!(f, "zip {key}"),
            AxisKey::Outer(name) => write!(f, "outer {name}"),
        }
    }
}

impl FromStr for AxisKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(key) = s.strip_prefix("zip ") {
            Ok(AxisKey::Zip(key.to_string()))
        } else if let Some(name) = s.strip_prefix("outer ") {
            Ok(AxisKey::Outer(name.to_string()))
        } else {
            Err(format!("axis name must start with 'zip ' or 'outer ': '{s}'"))
        }
    }
}

/// User settings for one axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSettings {
    /// Nesting position; lower orders vary slowest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default)]
    pub shuffle: bool,
}

/// Per-axis settings keyed by the axis' display name (`zip a`, `outer b`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpansionConfig {
    axes: BTreeMap<String, AxisSettings>,
}

impl ExpansionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &AxisKey, settings: AxisSettings) {
        self.axes.insert(key.to_string(), settings);
    }

    pub fn get(&self, key: &AxisKey) -> Option<&AxisSettings> {
        self.axes.get(&key.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }
}

/// Shots plus the length of every axis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expanded {
    pub shots: Vec<Shot>,
    pub dimensions: BTreeMap<AxisKey, usize>,
}

#[derive(Debug)]
struct Axis {
    key: AxisKey,
    names: Vec<String>,
    rows: Vec<Vec<Value>>,
    settings: AxisSettings,
}

/// Elements of a value, treating anything that cannot be iterated as a
/// single element
fn elements(value: &Value) -> Vec<Value> {
    value.iterate(usize::MAX).unwrap_or_else(|_| vec![value.clone()])
}

/// Expand with thread-local randomness for shuffled axes
pub fn expand_globals(sequence_globals: &SequenceGlobals, evaluated: &EvaluatedGlobals, config: &ExpansionConfig) -> Vec<Shot> {
    expand_globals_with(sequence_globals, evaluated, config, &mut rand::thread_rng()).shots
}

pub fn expand_globals_with<R: Rng + ?Sized>(
    sequence_globals: &SequenceGlobals,
    evaluated: &EvaluatedGlobals,
    config: &ExpansionConfig,
    rng: &mut R,
) -> Expanded {
    let mut members: BTreeMap<AxisKey, Vec<(String, Vec<Value>)>> = BTreeMap::new();
    for (group, globals) in sequence_globals {
        for (name, spec) in globals {
            let Some(Ok(value)) = evaluated.get(group).and_then(|results| results.get(name)) else {
                continue;
            };
            let (key, sequence) = match spec.tag() {
                ExpansionTag::Single => (AxisKey::Zip(String::new()), vec![value.clone()]),
                ExpansionTag::Zip(key) => (AxisKey::Zip(key), elements(value)),
                ExpansionTag::Outer => (AxisKey::Outer(name.clone()), elements(value)),
            };
            members.entry(key).or_default().push((name.clone(), sequence));
        }
    }

    let mut axes: Vec<Axis> = members
        .into_iter()
        .map(|(key, members)| {
            let length = members.iter().map(|(_, seq)| seq.len()).min().unwrap_or(0);
            let rows = (0..length).map(|i| members.iter().map(|(_, seq)| seq[i].clone()).collect()).collect();
            let settings = config.get(&key).copied().unwrap_or_default();
            Axis {
                key,
                names: members.into_iter().map(|(name, _)| name).collect(),
                rows,
                settings,
            }
        })
        .collect();

    for axis in axes.iter_mut().filter(|axis| axis.settings.shuffle) {
        axis.rows.shuffle(rng);
    }
    // Configured axes first by order, then the rest by key
    axes.sort_by(|a, b| {
        (a.settings.order.is_none(), a.settings.order, &a.key).cmp(&(b.settings.order.is_none(), b.settings.order, &b.key))
    });

    let dimensions = axes.iter().map(|axis| (axis.key.clone(), axis.rows.len())).collect();
    Expanded {
        shots: cartesian_product(&axes),
        dimensions,
    }
}

/// Outer product of the axes, the first axis varying slowest
fn cartesian_product(axes: &[Axis]) -> Vec<Shot> {
    if axes.iter().any(|axis| axis.rows.is_empty()) {
        return Vec::new();
    }
    let total: usize = axes.iter().map(|axis| axis.rows.len()).product();
    let mut shots = Vec::with_capacity(total);
    let mut cursor = vec![0usize; axes.len()];
    for _ in 0..total {
        let mut shot = Shot::new();
        for (axis, &row) in axes.iter().zip(&cursor) {
            for (name, value) in axis.names.iter().zip(&axis.rows[row]) {
                shot.insert(name.clone(), value.clone());
            }
        }
        shots.push(shot);

        for (position, axis) in cursor.iter_mut().zip(axes).rev() {
            *position += 1;
            if *position < axis.rows.len() {
                break;
            }
            *position = 0;
        }
    }
    shots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::GlobalSpec;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ints(values: &[i64]) -> Value {
        Value::Array(values.iter().copied().map(Value::Int).collect())
    }

    fn setup(globals: &[(&str, &str, Value)]) -> (SequenceGlobals, EvaluatedGlobals) {
        let mut sequence = SequenceGlobals::new();
        let mut evaluated = EvaluatedGlobals::new();
        for (name, expansion, value) in globals {
            sequence
                .entry("g".to_string())
                .or_default()
                .insert(name.to_string(), GlobalSpec::new("", "", *expansion));
            evaluated.entry("g".to_string()).or_default().insert(name.to_string(), Ok(value.clone()));
        }
        (sequence, evaluated)
    }

    #[test]
    fn test_zip_times_outer() {
        let (sequence, evaluated) = setup(&[
            ("a", "z", ints(&[1, 2, 3])),
            ("b", "z", ints(&[10, 20, 30])),
            ("c", "outer", ints(&[5, 6, 7, 8])),
            ("d", "", Value::Int(0)),
        ]);
        let expanded = expand_globals_with(&sequence, &evaluated, &ExpansionConfig::new(), &mut StdRng::seed_from_u64(1));
        assert_eq!(expanded.shots.len(), 12);
        assert_eq!(expanded.dimensions[&AxisKey::Zip("z".to_string())], 3);
        assert_eq!(expanded.dimensions[&AxisKey::Outer("c".to_string())], 4);
        assert_eq!(expanded.dimensions[&AxisKey::Zip(String::new())], 1);
        for shot in &expanded.shots {
            let a = shot["a"].as_i64().unwrap();
            assert_eq!(shot["b"].as_i64().unwrap(), a * 10);
            assert_eq!(shot["d"], Value::Int(0));
        }
    }

    #[test]
    fn test_order_controls_nesting() {
        let (sequence, evaluated) = setup(&[("x", "outer", ints(&[1, 2])), ("y", "outer", ints(&[3, 4]))]);
        let mut config = ExpansionConfig::new();
        config.set(&AxisKey::Outer("y".to_string()), AxisSettings { order: Some(0), shuffle: false });

        let shots = expand_globals(&sequence, &evaluated, &config);
        let pairs: Vec<(i64, i64)> = shots.iter().map(|s| (s["x"].as_i64().unwrap(), s["y"].as_i64().unwrap())).collect();
        // y is configured so it nests outermost and varies slowest
        assert_eq!(pairs, vec![(1, 3), (2, 3), (1, 4), (2, 4)]);
    }

    #[test]
    fn test_default_nesting_follows_axis_key() {
        let (sequence, evaluated) = setup(&[("x", "outer", ints(&[1, 2])), ("y", "outer", ints(&[3, 4]))]);
        let shots = expand_globals(&sequence, &evaluated, &ExpansionConfig::new());
        assert_eq!(shots[1]["x"], Value::Int(1));
        assert_eq!(shots[1]["y"], Value::Int(4));
    }

    #[test]
    fn test_shuffle_permutes_axis() {
        let (sequence, evaluated) = setup(&[("x", "outer", ints(&(0..20).collect::<Vec<_>>()))]);
        let mut config = ExpansionConfig::new();
        config.set(&AxisKey::Outer("x".to_string()), AxisSettings { order: None, shuffle: true });
        let expanded = expand_globals_with(&sequence, &evaluated, &config, &mut StdRng::seed_from_u64(7));
        let mut seen: Vec<i64> = expanded.shots.iter().map(|s| s["x"].as_i64().unwrap()).collect();
        assert_ne!(seen, (0..20).collect::<Vec<_>>());
        seen.sort();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_errors_are_skipped_and_zip_truncates() {
        let (mut sequence, mut evaluated) = setup(&[("a", "k", ints(&[1, 2, 3])), ("b", "k", ints(&[4, 5]))]);
        sequence.get_mut("g").unwrap().insert("bad".to_string(), GlobalSpec::new("", "", "outer"));
        evaluated
            .get_mut("g")
            .unwrap()
            .insert("bad".to_string(), Err(runplan_expr::EvalError::name("nope")));
        let shots = expand_globals(&sequence, &evaluated, &ExpansionConfig::new());
        assert_eq!(shots.len(), 2);
        assert!(shots.iter().all(|s| !s.contains_key("bad")));
    }

    #[test]
    fn test_no_globals_gives_one_empty_shot() {
        let shots = expand_globals(&SequenceGlobals::new(), &EvaluatedGlobals::new(), &ExpansionConfig::new());
        assert_eq!(shots, vec![Shot::new()]);
    }

    #[test]
    fn test_axis_key_names() {
        assert_eq!(AxisKey::Zip("a".to_string()).to_string(), "zip a");
        assert_eq!("outer b".parse::<AxisKey>().unwrap(), AxisKey::Outer("b".to_string()));
        assert!("sideways c".parse::<AxisKey>().is_err());
    }
}
