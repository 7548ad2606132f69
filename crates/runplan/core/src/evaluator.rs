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

//! Evaluation of globals to values
//!
//! All globals share one namespace. Evaluation repeats until every global
//! resolves or a pass fails to reduce the number of failures, so globals may
//! refer to each other in any order.

use crate::error::{GlobalsError, GlobalsResult};
use crate::globals::{ExpansionTag, SequenceGlobals};
use crate::graph::DependencyGraph;
use metrics::counter;
use runplan_expr::{AstNode, DEFAULT_MAX_ITERATOR_LENGTH, EvalError, Interpreter, Scope, Value, builtins, parse};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Outcome of evaluating one global
pub type GlobalResult = Result<Value, EvalError>;

/// Per-group results, shaped like [`SequenceGlobals`]
pub type EvaluatedGlobals = BTreeMap<String, BTreeMap<String, GlobalResult>>;

/// How failures are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMode {
    /// Any failure aborts the whole evaluation
    #[default]
    Strict,
    /// Failures are stored as the failing global's result
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    pub mode: EvalMode,
    /// Longest generator that is materialized before giving up
    pub max_iterator_length: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            mode: EvalMode::Strict,
            max_iterator_length: DEFAULT_MAX_ITERATOR_LENGTH,
        }
    }
}

impl EvalOptions {
    pub fn lenient() -> Self {
        Self {
            mode: EvalMode::Lenient,
            ..Self::default()
        }
    }
}

/// Values, dependencies and tags produced by [`evaluate_globals`]
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub results: EvaluatedGlobals,
    pub hierarchy: DependencyGraph,
    /// Expansion tag string of every global, keyed by name
    pub expansions: BTreeMap<String, String>,
}

impl Evaluation {
    pub fn get(&self, group: &str, name: &str) -> Option<&GlobalResult> {
        self.results.get(group)?.get(name)
    }

    /// Every result keyed by global name alone
    pub fn flat_results(&self) -> BTreeMap<String, GlobalResult> {
        crate::globals::flatten_groups(&self.results)
    }

    /// `(group, name, error)` for every failed global
    pub fn errors(&self) -> impl Iterator<Item = (&str, &str, &EvalError)> {
        self.results.iter().flat_map(|(group, globals)| {
            globals
                .iter()
                .filter_map(move |(name, result)| result.as_ref().err().map(|e| (group.as_str(), name.as_str(), e)))
        })
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

/// Namespace that records which bound names are read.
///
/// Helper library names resolve too but are never recorded.
#[derive(Debug, Default)]
pub struct TraceNamespace {
    values: HashMap<String, Value>,
    trace: RefCell<Option<BTreeSet<String>>>,
}

impl TraceNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn start_trace(&self) {
        *self.trace.borrow_mut() = Some(BTreeSet::new());
    }

    /// Stop recording and return every name read since [`start_trace`](Self::start_trace)
    pub fn stop_trace(&self) -> BTreeSet<String> {
        self.trace.borrow_mut().take().unwrap_or_default()
    }
}

impl Scope for TraceNamespace {
    fn lookup(&self, name: &str) -> Option<Value> {
        match self.values.get(name) {
            Some(value) => {
                if let Some(trace) = self.trace.borrow_mut().as_mut() {
                    trace.insert(name.to_string());
                }
                Some(value.clone())
            }
            None => builtins::lookup(name),
        }
    }
}

/// Evaluate every global with the default iterator bound
pub fn evaluate_globals(sequence_globals: &SequenceGlobals, mode: EvalMode) -> GlobalsResult<Evaluation> {
    evaluate_globals_with(sequence_globals, EvalOptions { mode, ..EvalOptions::default() })
}

pub fn evaluate_globals_with(sequence_globals: &SequenceGlobals, options: EvalOptions) -> GlobalsResult<Evaluation> {
    let mut results: EvaluatedGlobals = sequence_globals.keys().map(|group| (group.clone(), BTreeMap::new())).collect();
    let mut expressions: BTreeMap<&str, &str> = BTreeMap::new();
    let mut expansions = BTreeMap::new();
    let mut multiply_defined = BTreeSet::new();

    for globals in sequence_globals.values() {
        for (name, spec) in globals {
            if expressions.contains_key(name.as_str()) && multiply_defined.insert(name.clone()) {
                let groups: Vec<String> = sequence_globals
                    .iter()
                    .filter(|(_, globals)| globals.contains_key(name))
                    .map(|(group, _)| group.clone())
                    .collect();
                if options.mode == EvalMode::Strict {
                    return Err(GlobalsError::MultiplyDefined { name: name.clone(), groups });
                }
                warn!(global = %name, groups = ?groups, "global defined in multiple active groups");
                for group in &groups {
                    if let Some(group_results) = results.get_mut(group) {
                        group_results.insert(
                            name.clone(),
                            Err(EvalError::MultiplyDefined {
                                name: name.clone(),
                                groups: groups.clone(),
                            }),
                        );
                    }
                }
            }
            expressions.insert(name.as_str(), spec.expression.as_str());
            expansions.insert(name.clone(), spec.expansion.clone());
        }
    }
    for name in &multiply_defined {
        expressions.remove(name.as_str());
    }

    let parsed: BTreeMap<&str, Result<AstNode, EvalError>> =
        expressions.iter().map(|(name, source)| (*name, parse(source).map_err(EvalError::from))).collect();

    let mut namespace = TraceNamespace::new();
    let mut hierarchy = DependencyGraph::new();
    let mut evaluated: BTreeMap<String, GlobalResult> = BTreeMap::new();
    let mut pending: BTreeSet<&str> = expressions.keys().copied().collect();
    let mut previous_errors = None;
    let max_passes = expressions.len() + 1;
    let mut passes = 0;

    while !pending.is_empty() {
        passes += 1;
        let mut errors = Vec::new();
        for name in pending.clone() {
            namespace.start_trace();
            let outcome = match &parsed[name] {
                Ok(ast) => evaluate_one(&namespace, ast, expansions.get(name).map(String::as_str), options.max_iterator_length),
                Err(e) => Err(e.clone()),
            };
            let trace = namespace.stop_trace();
            match outcome {
                Ok(value) => {
                    namespace.bind(name, value.clone());
                    pending.remove(name);
                    evaluated.insert(name.to_string(), Ok(value));
                    for dependency in trace.iter().filter(|d| expressions.contains_key(d.as_str())) {
                        hierarchy.add_dependency(name, dependency);
                    }
                }
                Err(error) => errors.push((name.to_string(), error)),
            }
        }
        debug!(pass = passes, resolved = evaluated.len(), failed = errors.len(), "evaluated globals");

        if errors.is_empty() {
            break;
        }
        if previous_errors == Some(errors.len()) || passes >= max_passes {
            if options.mode == EvalMode::Strict {
                counter!("runplan_evaluation_passes", passes as u64);
                return Err(GlobalsError::Unresolved { failures: errors });
            }
            for (name, error) in errors {
                warn!(global = %name, error = %error, "global did not evaluate");
                evaluated.insert(name, Err(error));
            }
            break;
        }
        previous_errors = Some(errors.len());
    }
    counter!("runplan_evaluation_passes", passes as u64);

    for (group, globals) in sequence_globals {
        let Some(group_results) = results.get_mut(group) else { continue };
        for name in globals.keys() {
            if !group_results.contains_key(name) {
                let result = evaluated.get(name).cloned().unwrap_or_else(|| Err(EvalError::name(name.as_str())));
                group_results.insert(name.clone(), result);
            }
        }
    }

    Ok(Evaluation {
        results,
        hierarchy,
        expansions,
    })
}

fn evaluate_one(namespace: &TraceNamespace, ast: &AstNode, expansion: Option<&str>, limit: usize) -> GlobalResult {
    let mut value = Interpreter::new(namespace).with_max_iterator_length(limit).eval(ast)?;
    // Generators must have a known length before expansion
    if let Value::Generator(generator) = &value {
        value = Value::Tuple(generator.materialize(limit)?);
    }
    if expansion.map(ExpansionTag::parse) == Some(ExpansionTag::Outer) && !value.is_iterable() {
        return Err(EvalError::expansion(format!("'{}' object is not iterable", value.type_name())));
    }
    Ok(value)
}
