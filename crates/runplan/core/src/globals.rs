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

//! Globals data model
//!
//! A global is a named expression with units and an expansion tag. Globals
//! live in named groups, and each group lives in one globals container.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub use runplan_expr::is_valid_identifier as is_valid_global_name;

/// Stored definition of a single global
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSpec {
    pub expression: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub expansion: String,
}

impl GlobalSpec {
    pub fn new(expression: impl Into<String>, units: impl Into<String>, expansion: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            units: units.into(),
            expansion: expansion.into(),
        }
    }

    pub fn tag(&self) -> ExpansionTag {
        ExpansionTag::parse(&self.expansion)
    }
}

/// How a global is iterated when shots are expanded
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExpansionTag {
    /// Not expanded; the value is used as-is in every shot
    Single,
    /// Iterated across its own axis
    Outer,
    /// Iterated in lock-step with every global sharing the key
    Zip(String),
}

impl ExpansionTag {
    pub const OUTER: &'static str = "outer";

    pub fn parse(tag: &str) -> Self {
        match tag {
            "" => ExpansionTag::Single,
            Self::OUTER => ExpansionTag::Outer,
            key => ExpansionTag::Zip(key.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExpansionTag::Single => "",
            ExpansionTag::Outer => Self::OUTER,
            ExpansionTag::Zip(key) => key,
        }
    }

    pub fn is_zip(&self) -> bool {
        matches!(self, ExpansionTag::Zip(_))
    }
}

impl fmt::Display for ExpansionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ExpansionTag {
    fn from(tag: &str) -> Self {
        Self::parse(tag)
    }
}

/// Globals of one group, keyed by global name
pub type GroupGlobals = BTreeMap<String, GlobalSpec>;

/// Globals of every active group, keyed by group name
pub type SequenceGlobals = BTreeMap<String, GroupGlobals>;

/// Active group name mapped to the container holding it
pub type ActiveGroups = BTreeMap<String, PathBuf>;

/// Whether `name` can be used as a group name
pub fn is_valid_group_name(name: &str) -> bool {
    !name.is_empty() && name.is_ascii() && !name.contains(['.', '/'])
}

/// Collapse the group structure into name -> expression
pub fn flatten_globals(sequence_globals: &SequenceGlobals) -> BTreeMap<String, String> {
    sequence_globals
        .values()
        .flat_map(|group| group.iter().map(|(name, spec)| (name.clone(), spec.expression.clone())))
        .collect()
}

/// Collapse any per-group map into name -> item, later groups winning
pub fn flatten_groups<T: Clone>(grouped: &BTreeMap<String, BTreeMap<String, T>>) -> BTreeMap<String, T> {
    grouped
        .values()
        .flat_map(|group| group.iter().map(|(name, item)| (name.clone(), item.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion_tag_round_trip() {
        for tag in ["", "outer", "a", "scan_1"] {
            assert_eq!(ExpansionTag::parse(tag).as_str(), tag);
        }
        assert_eq!(ExpansionTag::parse("outer"), ExpansionTag::Outer);
        assert!(ExpansionTag::parse("x").is_zip());
        assert!(!ExpansionTag::Single.is_zip());
    }

    #[test]
    fn test_group_names() {
        assert!(is_valid_group_name("MOT loading"));
        assert!(!is_valid_group_name("a.b"));
        assert!(!is_valid_group_name("a/b"));
        assert!(!is_valid_group_name("détente"));
        assert!(!is_valid_group_name(""));
    }

    #[test]
    fn test_flatten_globals() {
        let mut sequence = SequenceGlobals::new();
        sequence.entry("g1".to_string()).or_default().insert("a".to_string(), GlobalSpec::new("1", "", ""));
        sequence.entry("g2".to_string()).or_default().insert("b".to_string(), GlobalSpec::new("a + 1", "V", "outer"));
        let flat = flatten_globals(&sequence);
        assert_eq!(flat.get("a").map(String::as_str), Some("1"));
        assert_eq!(flat.get("b").map(String::as_str), Some("a + 1"));
    }

    #[test]
    fn test_legacy_spec_defaults() {
        let spec: GlobalSpec = serde_json::from_str(r#"{"expression": "5"}"#).unwrap();
        assert_eq!(spec, GlobalSpec::new("5", "", ""));
    }
}
