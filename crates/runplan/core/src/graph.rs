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

//! Dependency graph between globals
//!
//! Edges point from a global to each global whose value it read while
//! being evaluated.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.indices.get(name) {
            return index;
        }
        let index = self.graph.add_node(name.to_string());
        self.indices.insert(name.to_string(), index);
        index
    }

    /// Record that `global` consumed the value of `dependency`
    pub fn add_dependency(&mut self, global: &str, dependency: &str) {
        let from = self.node(global);
        let to = self.node(dependency);
        self.graph.update_edge(from, to, ());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.graph.edge_count() == 0
    }

    fn neighbors(&self, name: &str, direction: Direction) -> BTreeSet<String> {
        match self.indices.get(name) {
            Some(&index) => self.graph.neighbors_directed(index, direction).map(|n| self.graph[n].clone()).collect(),
            None => BTreeSet::new(),
        }
    }

    /// Globals `name` read directly
    pub fn dependencies_of(&self, name: &str) -> BTreeSet<String> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Globals that read `name` directly
    pub fn dependents_of(&self, name: &str) -> BTreeSet<String> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Globals that depend on `name`, directly or through other accepted
    /// dependents. Only globals passing `accept` are followed or returned.
    pub fn transitive_dependents(&self, name: &str, accept: impl Fn(&str) -> bool) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([name.to_string()]);
        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents_of(&current) {
                if dependent != name && accept(&dependent) && found.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        found
    }

    /// Whether any direct dependency of `name` satisfies `predicate`
    pub fn depends_on_any(&self, name: &str, predicate: impl Fn(&str) -> bool) -> bool {
        self.dependencies_of(name).iter().any(|dep| predicate(dep))
    }

    /// Every global with at least one dependency, with its dependencies
    pub fn iter(&self) -> impl Iterator<Item = (String, BTreeSet<String>)> + '_ {
        let mut names: Vec<&String> = self.indices.keys().collect();
        names.sort();
        names.into_iter().filter_map(|name| {
            let deps = self.dependencies_of(name);
            (!deps.is_empty()).then(|| (name.clone(), deps))
        })
    }
}
