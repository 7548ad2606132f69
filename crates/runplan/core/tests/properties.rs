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

use proptest::prelude::*;
use runplan_core::evaluator::{EvalMode, evaluate_globals};
use runplan_core::expansion::{ExpansionConfig, expand_globals};
use runplan_core::sequence::next_sequence_index;
use runplan_core::{GlobalSpec, GlobalsError, SequenceGlobals};
use runplan_expr::{EvalError, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

fn single_group(globals: &[(String, String, String)]) -> SequenceGlobals {
    let group = globals
        .iter()
        .map(|(name, expr, expansion)| (name.clone(), GlobalSpec::new(expr.as_str(), "", expansion.as_str())))
        .collect();
    SequenceGlobals::from([("g".to_string(), group)])
}

fn list(values: impl IntoIterator<Item = i64>) -> String {
    let items: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

proptest! {
    /// However a dependency chain is named, every link resolves to its depth
    #[test]
    fn chain_resolves_in_any_order(names in Just((0..8).map(|i| format!("v{i}")).collect::<Vec<_>>()).prop_shuffle()) {
        let globals: Vec<(String, String, String)> = names
            .iter()
            .enumerate()
            .map(|(depth, name)| {
                let expr = if depth == 0 { "1".to_string() } else { format!("{} + 1", names[depth - 1]) };
                (name.clone(), expr, String::new())
            })
            .collect();
        let evaluation = evaluate_globals(&single_group(&globals), EvalMode::Strict).unwrap();
        for (depth, name) in names.iter().enumerate() {
            prop_assert_eq!(evaluation.get("g", name), Some(&Ok(Value::Int(depth as i64 + 1))));
        }
    }

    /// Shot count is the product of the axis lengths
    #[test]
    fn shot_count_is_product_of_axes(zip_len in 1usize..6, outer_len in 1usize..6, other_len in 1usize..4) {
        let globals = vec![
            ("a".to_string(), list(0..zip_len as i64), "z".to_string()),
            ("b".to_string(), "a * 10".to_string(), "z".to_string()),
            ("c".to_string(), list(0..outer_len as i64), "outer".to_string()),
            ("d".to_string(), list(0..other_len as i64), "outer".to_string()),
            ("e".to_string(), "c + 0.5".to_string(), String::new()),
        ];
        let sequence = single_group(&globals);
        let evaluation = evaluate_globals(&sequence, EvalMode::Strict).unwrap();
        let shots = expand_globals(&sequence, &evaluation.results, &ExpansionConfig::new());
        prop_assert_eq!(shots.len(), zip_len * outer_len * other_len);

        let distinct: BTreeSet<String> = shots.iter().map(|shot| format!("{shot:?}")).collect();
        prop_assert_eq!(distinct.len(), shots.len());
    }
}

#[test]
fn zip_and_outer_cardinality() {
    let globals = vec![
        ("a".to_string(), "[1, 2, 3]".to_string(), "k".to_string()),
        ("b".to_string(), "[10, 20, 30]".to_string(), "k".to_string()),
        ("c".to_string(), "[0, 1, 2, 3]".to_string(), "outer".to_string()),
    ];
    let sequence = single_group(&globals);
    let evaluation = evaluate_globals(&sequence, EvalMode::Strict).unwrap();
    let shots = expand_globals(&sequence, &evaluation.results, &ExpansionConfig::new());
    assert_eq!(shots.len(), 12);
    for shot in &shots {
        let (Value::Int(a), Value::Int(b)) = (&shot["a"], &shot["b"]) else {
            panic!("expected integers in {shot:?}");
        };
        assert_eq!(*b, a * 10);
    }
}

#[test]
fn global_defined_in_two_groups_is_rejected() {
    let sequence = SequenceGlobals::from([
        ("g1".to_string(), [("x".to_string(), GlobalSpec::new("1", "", ""))].into()),
        ("g2".to_string(), [("x".to_string(), GlobalSpec::new("2", "", ""))].into()),
    ]);
    match evaluate_globals(&sequence, EvalMode::Strict) {
        Err(GlobalsError::MultiplyDefined { name, groups }) => {
            assert_eq!(name, "x");
            assert_eq!(groups, vec!["g1".to_string(), "g2".to_string()]);
        }
        other => panic!("expected multiply defined error, got {other:?}"),
    }

    let lenient = evaluate_globals(&sequence, EvalMode::Lenient).unwrap();
    assert!(matches!(lenient.get("g1", "x"), Some(Err(EvalError::MultiplyDefined { .. }))));
    assert!(matches!(lenient.get("g2", "x"), Some(Err(EvalError::MultiplyDefined { .. }))));
}

#[test]
fn concurrent_claims_are_unique() {
    let dir = Arc::new(TempDir::new().unwrap());
    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dir = dir.clone();
            std::thread::spawn(move || (0..5).map(|_| next_sequence_index(dir.path(), date, true).unwrap()).collect::<Vec<_>>())
        })
        .collect();

    let mut claimed: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    claimed.sort_unstable();
    assert_eq!(claimed, (0..40).collect::<Vec<u64>>());
    assert_eq!(next_sequence_index(dir.path(), date, false).unwrap(), 40);
}
