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

//! Diff of two sets of globals, by evaluated value and by expression

use crate::error::GlobalsResult;
use crate::evaluator::{EvalOptions, GlobalResult, evaluate_globals_with};
use crate::globals::{ActiveGroups, SequenceGlobals, flatten_globals};
use crate::store::{GroupStore, get_globals};
use runplan_expr::lexer::Token;
use runplan_expr::tokenize_with_comments;
use std::collections::BTreeMap;

pub const IDENTICAL_MESSAGE: &str = "Evaluated globals are identical to those of selected file.\n";

const MISSING: &str = "-";
const HEADERS: [&str; 4] = ["Prev (Eval)", "Current (Eval)", "Prev (Raw)", "Current (Raw)"];

/// Keys whose values differ, or that only one side has (`None` on the other)
pub fn dict_diff<T: PartialEq + Clone>(first: &BTreeMap<String, T>, second: &BTreeMap<String, T>) -> BTreeMap<String, (Option<T>, Option<T>)> {
    let mut diff = BTreeMap::new();
    for (key, value) in first {
        match second.get(key) {
            Some(other) if other == value => {}
            other => {
                diff.insert(key.clone(), (Some(value.clone()), other.cloned()));
            }
        }
    }
    for (key, value) in second {
        if !first.contains_key(key) {
            diff.insert(key.clone(), (None, Some(value.clone())));
        }
    }
    diff
}

/// Byte ranges of the comments in `source`.
///
/// Comments separated only by whitespace are merged, each range takes in
/// the whitespace before it, and the last one also the trailing whitespace.
pub fn find_comments(source: &str) -> Vec<(usize, usize)> {
    let Ok(tokens) = tokenize_with_comments(source) else {
        return Vec::new();
    };
    let mut comments: Vec<(usize, usize)> = Vec::new();
    for token in tokens.iter().filter(|t| matches!(t.token, Token::Comment(_))) {
        let (start, end) = (token.offset, token.offset + token.lexeme.len());
        match comments.last_mut() {
            Some(last) if source[last.1..start].trim().is_empty() => last.1 = end,
            _ => comments.push((start, end)),
        }
    }
    for range in &mut comments {
        range.0 = source[..range.0].trim_end().len();
    }
    if let Some(last) = comments.last_mut() {
        if source[last.1..].trim().is_empty() {
            last.1 = source.len();
        }
    }
    comments
}

/// Source with comments removed, plus its tokens for whitespace-blind comparison
pub fn remove_comments_and_tokenify(source: &str) -> (String, Vec<String>) {
    let mut stripped = source.to_string();
    for (start, end) in find_comments(source).into_iter().rev() {
        stripped.replace_range(start..end, "");
    }
    let tokens = match tokenize_with_comments(&stripped) {
        Ok(tokens) => tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Eof | Token::Comment(_)))
            .map(|t| t.lexeme)
            .collect(),
        Err(_) => stripped.split_whitespace().map(str::to_string).collect(),
    };
    (stripped, tokens)
}

/// One line of a globals diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalDiff {
    pub name: String,
    pub previous_value: String,
    pub current_value: String,
    pub previous_expression: String,
    pub current_expression: String,
}

impl GlobalDiff {
    fn cells(&self) -> [&str; 4] {
        [&self.previous_value, &self.current_value, &self.previous_expression, &self.current_expression]
    }
}

fn render_result(result: Option<&GlobalResult>) -> String {
    match result {
        Some(Ok(value)) => value.to_string(),
        Some(Err(error)) => error.to_string(),
        None => MISSING.to_string(),
    }
}

/// Globals whose evaluated value and expression tokens both differ
/// between `previous` and `current`
pub fn globals_diff_sequences(current: &SequenceGlobals, previous: &SequenceGlobals, options: EvalOptions) -> GlobalsResult<Vec<GlobalDiff>> {
    let current_values = evaluate_globals_with(current, options)?.flat_results();
    let previous_values = evaluate_globals_with(previous, options)?.flat_results();
    let current_expressions = flatten_globals(current);
    let previous_expressions = flatten_globals(previous);

    let mut rows = Vec::new();
    for (name, (previous_value, current_value)) in dict_diff(&previous_values, &current_values) {
        let current_source = current_expressions.get(&name).map_or(MISSING, String::as_str);
        let previous_source = previous_expressions.get(&name).map_or(MISSING, String::as_str);
        let (current_expression, current_tokens) = remove_comments_and_tokenify(current_source);
        let (previous_expression, previous_tokens) = remove_comments_and_tokenify(previous_source);
        if current_tokens != previous_tokens {
            rows.push(GlobalDiff {
                previous_value: render_result(previous_value.as_ref()),
                current_value: render_result(current_value.as_ref()),
                previous_expression,
                current_expression,
                name,
            });
        }
    }
    Ok(rows)
}

/// Diff the active groups against `other` groups, both read from `store`
pub fn globals_diff_groups(store: &dyn GroupStore, active: &ActiveGroups, other: &ActiveGroups) -> GlobalsResult<Vec<GlobalDiff>> {
    let current = get_globals(store, active)?;
    let previous = get_globals(store, other)?;
    globals_diff_sequences(&current, &previous, EvalOptions::lenient())
}

/// Fixed-width table of `rows`, sorted by name
pub fn render_diff(rows: &[GlobalDiff]) -> String {
    if rows.is_empty() {
        return IDENTICAL_MESSAGE.to_string();
    }
    let mut rows: Vec<&GlobalDiff> = rows.iter().collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    let name_width = rows.iter().map(|row| row.name.chars().count()).max().unwrap_or(0);
    let mut widths = HEADERS.map(|header| header.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.cells()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = format!("{:name_width$}", "");
    for (header, width) in HEADERS.iter().zip(widths) {
        out.push_str(&format!("  {header:>width$}"));
    }
    out.push('\n');
    for row in rows {
        out.push_str(&format!("{:<name_width$}", row.name));
        for (cell, width) in row.cells().iter().zip(widths) {
            out.push_str(&format!("  {cell:>width$}"));
        }
        out.push('\n');
    }
    out.push('\n');
    out
}
