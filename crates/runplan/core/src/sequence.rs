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

//! Sequence identity: the per-day sequence index ledger and the output
//! locations derived from it.

use crate::config::RunplanConfig;
use crate::error::{SequenceError, SequenceResult};
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use fs2::FileExt;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Ledger holding `["YYYY-MM-DD", next_index]` in each script's shot directory
pub const LEDGER_FILE: &str = ".next_sequence_index";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)(?::([^{}]*))?\}").expect("placeholder pattern is valid"));

/// Top-level attributes written into every shot of a sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceAttrs {
    pub script_basename: String,
    pub sequence_date: String,
    pub sequence_index: u64,
    pub sequence_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceDetails {
    pub attrs: SequenceAttrs,
    pub output_dir: PathBuf,
    pub filename_prefix: String,
}

/// Advisory lock on the ledger, released on drop
struct LedgerLock {
    file: File,
}

impl LedgerLock {
    fn acquire(path: &Path, exclusive: bool) -> SequenceResult<Self> {
        let lock_error = |source| SequenceError::Lock {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path).map_err(lock_error)?;
        if exclusive {
            FileExt::lock_exclusive(&file).map_err(lock_error)?;
        } else {
            FileExt::lock_shared(&file).map_err(lock_error)?;
        }
        Ok(Self { file })
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path(ledger: &Path) -> PathBuf {
    let mut name = ledger.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn read_ledger(ledger: &Path, today: &str) -> SequenceResult<u64> {
    let content = match std::fs::read_to_string(ledger) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let (date, index): (String, u64) = serde_json::from_str(&content).map_err(|source| SequenceError::Ledger {
        path: ledger.to_path_buf(),
        source,
    })?;
    Ok(if date == today { index } else { 0 })
}

/// Next sequence index for scripts stored under `shot_basedir` on `date`.
///
/// With `increment` the index is claimed: the ledger is advanced under an
/// exclusive lock before it is released. Without it the result is only a
/// preview and nothing on disk changes.
pub fn next_sequence_index(shot_basedir: &Path, date: NaiveDate, increment: bool) -> SequenceResult<u64> {
    let ledger = shot_basedir.join(LEDGER_FILE);
    let today = date.format(DATE_FORMAT).to_string();

    if !increment && !shot_basedir.exists() {
        return Ok(0);
    }
    if increment {
        std::fs::create_dir_all(shot_basedir)?;
    }

    let _lock = LedgerLock::acquire(&lock_path(&ledger), increment)?;
    let index = read_ledger(&ledger, &today)?;
    if increment {
        let content = serde_json::to_string(&(&today, index + 1)).map_err(|source| SequenceError::Ledger {
            path: ledger.clone(),
            source,
        })?;
        std::fs::write(&ledger, content)?;
        debug!(ledger = %ledger.display(), index, "claimed sequence index");
    }
    Ok(index)
}

fn strftime(format: &str, now: &NaiveDateTime) -> SequenceResult<String> {
    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(SequenceError::Template {
            format: format.to_string(),
            message: "invalid strftime directive".to_string(),
        });
    }
    Ok(now.format_with_items(items.into_iter()).to_string())
}

/// Value available to `{name}` placeholders
enum Field<'a> {
    Int(u64),
    Text(&'a str),
}

fn format_field(field: &Field, spec: &str) -> Option<String> {
    match field {
        Field::Text(text) if spec.is_empty() => Some(text.to_string()),
        Field::Text(_) => None,
        Field::Int(value) => {
            let digits = spec.strip_suffix('d').unwrap_or(spec);
            if digits.is_empty() {
                return Some(value.to_string());
            }
            let zero_pad = digits.starts_with('0');
            let width: usize = digits.parse().ok()?;
            Some(if zero_pad { format!("{value:0width$}") } else { format!("{value:>width$}") })
        }
    }
}

/// Render a folder or prefix template: strftime first, then `{placeholders}`
fn render_template(format: &str, now: &NaiveDateTime, fields: &[(&str, Field)]) -> SequenceResult<String> {
    let stamped = strftime(format, now)?;
    let mut failure = None;
    let rendered = PLACEHOLDER.replace_all(&stamped, |caps: &Captures| {
        let whole = &caps[0];
        if whole == "{{" || whole == "}}" {
            return whole[..1].to_string();
        }
        let name = &caps[1];
        let spec = caps.get(2).map_or("", |m| m.as_str());
        let rendered = fields
            .iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, value)| format_field(value, spec));
        rendered.unwrap_or_else(|| {
            failure.get_or_insert_with(|| format!("cannot substitute '{whole}'"));
            String::new()
        })
    });
    match failure {
        Some(message) => Err(SequenceError::Template {
            format: format.to_string(),
            message,
        }),
        None => Ok(rendered.into_owned()),
    }
}

/// Identity, output folder and filename prefix for a new sequence of
/// `script_path`. See [`next_sequence_index`] for `increment`.
pub fn new_sequence_details(script_path: &Path, config: &RunplanConfig, increment: bool, now: NaiveDateTime) -> SequenceResult<SequenceDetails> {
    let script_basename = script_path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let shot_basedir = config.experiment_shot_storage.join(&script_basename);
    let sequence_timestamp = now.format(TIMESTAMP_FORMAT).to_string();
    let sequence_index = next_sequence_index(&shot_basedir, now.date(), increment)?;

    let fields = [
        ("sequence_index", Field::Int(sequence_index)),
        ("sequence_timestamp", Field::Text(&sequence_timestamp)),
        ("script_basename", Field::Text(&script_basename)),
    ];
    let subdir = render_template(&config.output_folder_format, &now, &fields)?;
    let filename_prefix = render_template(&config.filename_prefix_format, &now, &fields)?;

    Ok(SequenceDetails {
        attrs: SequenceAttrs {
            sequence_id: format!("{sequence_timestamp}_{script_basename}"),
            sequence_date: now.format(DATE_FORMAT).to_string(),
            sequence_index,
            script_basename,
        },
        output_dir: shot_basedir.join(subdir),
        filename_prefix,
    })
}
