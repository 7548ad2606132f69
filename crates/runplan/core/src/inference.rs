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

//! Expansion-mode inference
//!
//! Looks at the values globals evaluate to and at which globals read which,
//! and rewrites expansion tags so that a global computed from an iterated
//! global iterates with it. Runs interleaved with evaluation until it stops
//! reporting changes; the state carried between rounds is [`InferenceState`].

use crate::error::{StoreError, StoreResult};
use crate::evaluator::{EvaluatedGlobals, Evaluation, GlobalResult};
use crate::globals::{ActiveGroups, ExpansionTag};
use crate::graph::DependencyGraph;
use crate::store::GroupStore;
use runplan_expr::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Guessed tags of a global whose value is an array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guess {
    pub group: String,
    pub previous_guess: String,
    pub new_guess: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    New,
    Previous,
}

/// Everything inference remembers from its previous round
#[derive(Debug, Clone, Default)]
pub struct InferenceState {
    pub previous_results: EvaluatedGlobals,
    pub previous_hierarchy: DependencyGraph,
    pub previous_guesses: BTreeMap<String, Guess>,
    pub previous_expansions: BTreeMap<String, String>,
}

/// Result of one inference round
#[derive(Debug, Clone)]
pub struct Inference {
    pub changed: bool,
    pub state: InferenceState,
}

/// Tag a value suggests on its own: arrays iterate, everything else doesn't
pub fn guess_expansion_type(result: &GlobalResult) -> &'static str {
    match result {
        Ok(Value::Array(_)) => ExpansionTag::OUTER,
        _ => "",
    }
}

fn is_zip(tag: Option<&String>) -> bool {
    tag.is_some_and(|t| ExpansionTag::parse(t).is_zip())
}

fn depends_on_tagged(hierarchy: &DependencyGraph, name: &str, expansions: &BTreeMap<String, String>) -> bool {
    hierarchy.depends_on_any(name, |dep| expansions.get(dep).is_some_and(|tag| !tag.is_empty()))
}

/// Key a root shares with its dependents: its own zip key if it has one
fn zip_key_for(name: &str, expansions: &BTreeMap<String, String>) -> String {
    match expansions.get(name) {
        Some(tag) if is_zip(Some(tag)) => tag.clone(),
        _ => name.to_string(),
    }
}

/// Record `key` as a guess, unless the global already carries a zip key
fn set_guess(guesses: &mut BTreeMap<String, Guess>, expansions: &mut BTreeMap<String, String>, name: &str, key: &str, slot: Slot) {
    let existing = expansions.get(name).filter(|tag| is_zip(Some(tag))).cloned();
    let chosen = match existing {
        Some(tag) => tag,
        None => {
            expansions.insert(name.to_string(), key.to_string());
            key.to_string()
        }
    };
    if let Some(guess) = guesses.get_mut(name) {
        match slot {
            Slot::New => guess.new_guess = chosen,
            Slot::Previous => guess.previous_guess = chosen,
        }
    }
}

/// Dependency propagation shared by the current and the replayed round
fn propagate(
    roots: &[String],
    hierarchy: &DependencyGraph,
    candidates: impl Fn(&str) -> bool,
    guesses: &mut BTreeMap<String, Guess>,
    expansions: &mut BTreeMap<String, String>,
    slot: Slot,
) {
    for root in roots {
        if depends_on_tagged(hierarchy, root, expansions) {
            continue;
        }
        let dependents = hierarchy.transitive_dependents(root, &candidates);
        if dependents.is_empty() {
            continue;
        }
        let key = zip_key_for(root, expansions);
        for dependent in &dependents {
            if guesses.contains_key(dependent) {
                set_guess(guesses, expansions, dependent, &key, slot);
            }
        }
        if guesses.contains_key(root) {
            set_guess(guesses, expansions, root, &key, slot);
        }
    }
}

/// Writes expansion tags, skipping ones already stored
struct TagWriter<'a> {
    store: &'a dyn GroupStore,
    active: &'a ActiveGroups,
    stored: BTreeMap<String, String>,
    changed: bool,
}

impl TagWriter<'_> {
    fn write(&mut self, group: &str, name: &str, tag: &str) -> StoreResult<()> {
        if self.stored.get(name).map(String::as_str) == Some(tag) {
            return Ok(());
        }
        let container = self.active.get(group).ok_or_else(|| StoreError::GroupNotFound {
            container: Default::default(),
            group: group.to_string(),
        })?;
        debug!(group, global = name, expansion = tag, "inferred expansion");
        self.store.set_expansion(container, group, name, tag)?;
        self.stored.insert(name.to_string(), tag.to_string());
        self.changed = true;
        Ok(())
    }
}

impl InferenceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one round of inference against `evaluation`, writing any
    /// changed tags to `store`.
    pub fn infer(&self, store: &dyn GroupStore, active: &ActiveGroups, evaluation: &Evaluation) -> StoreResult<Inference> {
        let blocked = evaluation.errors().any(|(_, _, error)| !error.is_expansion_error());
        if blocked {
            return Ok(Inference {
                changed: false,
                state: self.clone(),
            });
        }

        let mut writer = TagWriter {
            store,
            active,
            stored: evaluation.expansions.clone(),
            changed: false,
        };
        let mut expansions = evaluation.expansions.clone();
        let mut guesses: BTreeMap<String, Guess> = BTreeMap::new();

        for (group, globals) in &evaluation.results {
            for (name, result) in globals {
                let tagged = expansions.get(name).is_some_and(|tag| !tag.is_empty());
                let previous_guess = match self.previous_results.get(group).and_then(|g| g.get(name)) {
                    Some(previous) => guess_expansion_type(previous),
                    None if tagged => guess_expansion_type(result),
                    None => guess_expansion_type(&Ok(Value::Int(0))),
                };
                let new_guess = guess_expansion_type(result);
                if new_guess == ExpansionTag::OUTER {
                    guesses.insert(
                        name.clone(),
                        Guess {
                            group: group.clone(),
                            previous_guess: previous_guess.to_string(),
                            new_guess: new_guess.to_string(),
                        },
                    );
                } else if new_guess != previous_guess {
                    writer.write(group, name, new_guess)?;
                    expansions.insert(name.clone(), new_guess.to_string());
                }
            }
        }

        let roots: Vec<String> = guesses.keys().cloned().collect();
        let current: BTreeSet<String> = roots.iter().cloned().collect();
        propagate(
            &roots,
            &evaluation.hierarchy,
            |name| current.contains(name),
            &mut guesses,
            &mut expansions,
            Slot::New,
        );

        let mut previous_expansions = self.previous_expansions.clone();
        let previous_roots: Vec<String> = self.previous_guesses.keys().cloned().collect();
        propagate(
            &previous_roots,
            &self.previous_hierarchy,
            |name| self.previous_guesses.contains_key(name),
            &mut guesses,
            &mut previous_expansions,
            Slot::Previous,
        );

        for (name, guess) in &guesses {
            if guess.new_guess != guess.previous_guess {
                writer.write(&guess.group, name, &guess.new_guess)?;
                expansions.insert(name.clone(), guess.new_guess.clone());
            }
        }

        // A zip key on a value that cannot be iterated is dropped
        for (group, globals) in &evaluation.results {
            for (name, result) in globals {
                let iterable = matches!(result, Ok(value) if value.is_iterable());
                if is_zip(expansions.get(name)) && !iterable {
                    writer.write(group, name, "")?;
                    expansions.insert(name.clone(), String::new());
                }
            }
        }

        Ok(Inference {
            changed: writer.changed,
            state: InferenceState {
                previous_results: evaluation.results.clone(),
                previous_hierarchy: evaluation.hierarchy.clone(),
                previous_guesses: guesses,
                previous_expansions: expansions,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{EvalMode, evaluate_globals};
    use crate::globals::{GlobalSpec, GroupGlobals};
    use crate::store::{MemoryGroupStore, MockGroupStore, get_globals};
    use runplan_expr::EvalError;
    use std::path::{Path, PathBuf};

    const CONTAINER: &str = "globals";

    /// Store holding `(group, name, expression, expansion)` rows
    fn store_with(rows: &[(&str, &str, &str, &str)]) -> (MemoryGroupStore, ActiveGroups) {
        let mut contents: BTreeMap<String, GroupGlobals> = BTreeMap::new();
        let mut active = ActiveGroups::new();
        for (group, name, expr, expansion) in rows {
            contents
                .entry(group.to_string())
                .or_default()
                .insert(name.to_string(), GlobalSpec::new(*expr, "", *expansion));
            active.insert(group.to_string(), PathBuf::from(CONTAINER));
        }
        (MemoryGroupStore::with_groups(CONTAINER, contents), active)
    }

    fn evaluate(store: &MemoryGroupStore, active: &ActiveGroups) -> Evaluation {
        evaluate_globals(&get_globals(store, active).unwrap(), EvalMode::Lenient).unwrap()
    }

    /// Run rounds until nothing changes, returning the final state and round count
    fn converge(store: &MemoryGroupStore, active: &ActiveGroups) -> (InferenceState, usize) {
        let mut state = InferenceState::new();
        for round in 1..=10 {
            let inference = state.infer(store, active, &evaluate(store, active)).unwrap();
            state = inference.state;
            if !inference.changed {
                return (state, round);
            }
        }
        panic!("inference did not converge");
    }

    fn expansion(store: &MemoryGroupStore, group: &str, name: &str) -> String {
        store.get_expansion(Path::new(CONTAINER), group, name).unwrap()
    }

    #[test]
    fn test_guess_expansion_type() {
        assert_eq!(guess_expansion_type(&Ok(Value::Array(vec![]))), "outer");
        assert_eq!(guess_expansion_type(&Ok(Value::Tuple(vec![Value::Int(1)]))), "");
        assert_eq!(guess_expansion_type(&Ok(Value::Int(1))), "");
        assert_eq!(guess_expansion_type(&Err(EvalError::name("x"))), "");
    }

    #[test]
    fn test_dependent_is_zipped_with_root() {
        let (store, active) = store_with(&[("G1", "a", "[1, 2]", "outer"), ("G2", "b", "a * 10", "")]);
        let (_, rounds) = converge(&store, &active);
        assert_eq!(rounds, 2);
        assert_eq!(expansion(&store, "G1", "a"), "a");
        assert_eq!(expansion(&store, "G2", "b"), "a");
    }

    #[test]
    fn test_explicit_zip_key_is_preserved() {
        let (store, active) = store_with(&[("g", "a", "[1, 2]", "scan"), ("g", "b", "a + 1", "")]);
        converge(&store, &active);
        assert_eq!(expansion(&store, "g", "a"), "scan");
        assert_eq!(expansion(&store, "g", "b"), "scan");
    }

    #[test]
    fn test_array_becoming_scalar_clears_tag() {
        let (store, active) = store_with(&[("g", "a", "[1, 2]", "outer")]);
        let (state, _) = converge(&store, &active);
        store.set_value(Path::new(CONTAINER), "g", "a", "3").unwrap();
        // An outer tag on a scalar is an expansion error, which does not block inference
        let inference = state.infer(&store, &active, &evaluate(&store, &active)).unwrap();
        assert!(inference.changed);
        assert_eq!(expansion(&store, "g", "a"), "");
    }

    #[test]
    fn test_scalar_under_zip_key_is_released() {
        let (store, active) = store_with(&[("g", "a", "5", "k")]);
        converge(&store, &active);
        assert_eq!(expansion(&store, "g", "a"), "");
    }

    #[test]
    fn test_evaluation_errors_block_inference() {
        let (store, active) = store_with(&[("g", "a", "[1, 2]", ""), ("g", "b", "nope", "")]);
        let inference = InferenceState::new().infer(&store, &active, &evaluate(&store, &active)).unwrap();
        assert!(!inference.changed);
        assert_eq!(expansion(&store, "g", "a"), "");
    }

    #[test]
    fn test_stable_configuration_writes_nothing() {
        let (store, active) = store_with(&[
            ("G1", "a", "[1, 2]", "outer"),
            ("G1", "c", "[3, 4, 5]", "outer"),
            ("G2", "b", "a * 10", ""),
        ]);
        let (state, _) = converge(&store, &active);
        let evaluation = evaluate(&store, &active);

        let mut mock = MockGroupStore::new();
        mock.expect_set_expansion().never();
        let inference = state.infer(&mock, &active, &evaluation).unwrap();
        assert!(!inference.changed);

        // A fresh state over an already inferred configuration is stable too
        let inference = InferenceState::new().infer(&mock, &active, &evaluation).unwrap();
        assert!(!inference.changed);
    }
}
