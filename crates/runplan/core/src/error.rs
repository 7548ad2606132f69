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

//! Error types for the runplan core

use runplan_expr::EvalError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for group store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for evaluating a set of globals
pub type GlobalsResult<T> = Result<T, GlobalsError>;

/// Result type for sequence index allocation
pub type SequenceResult<T> = Result<T, SequenceError>;

/// Result type for writing shot records
pub type MaterializeResult<T> = Result<T, MaterializeError>;

/// Result type for compile actions
pub type CompileResult<T> = Result<T, CompileError>;

/// Result type for loading and saving configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised by a group store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Globals file not found: {}", .0.display())]
    ContainerNotFound(PathBuf),

    #[error("Globals file already exists: {}", .0.display())]
    ContainerExists(PathBuf),

    #[error("No group '{group}' in {}", container.display())]
    GroupNotFound { container: PathBuf, group: String },

    #[error("Group '{group}' already exists in {}", container.display())]
    GroupExists { container: PathBuf, group: String },

    #[error("No global '{name}' in group '{group}'")]
    GlobalNotFound { group: String, name: String },

    #[error("Global '{name}' already exists in group '{group}'")]
    GlobalExists { group: String, name: String },

    #[error("Invalid group name '{0}': group names must contain only ASCII characters and cannot include '/' or '.'")]
    InvalidGroupName(String),

    #[error("'{0}' is not a valid global name")]
    InvalidGlobalName(String),

    #[error(
        "Group '{group}' is defined in both {} and {}. Only uniquely named groups can be used together",
        first.display(),
        second.display()
    )]
    DuplicateGroup { group: String, first: PathBuf, second: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while evaluating a complete set of globals
#[derive(Error, Debug)]
pub enum GlobalsError {
    #[error("Global '{name}' is defined in multiple active groups: {}", .groups.join(", "))]
    MultiplyDefined { name: String, groups: Vec<String> },

    #[error("Error parsing globals:\n{}", format_failures(.failures))]
    Unresolved { failures: Vec<(String, EvalError)> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn format_failures(failures: &[(String, EvalError)]) -> String {
    failures.iter().map(|(name, error)| format!("{name}: {error}\n")).collect()
}

/// Errors raised while claiming or previewing a sequence index
#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("Failed to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt sequence index ledger {}: {source}", path.display())]
    Ledger {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid format string '{format}': {message}")]
    Template { format: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while writing shot records
#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error(
        "Global '{name}' cannot be saved in a shot file. Globals can only have relatively simple datatypes, \
         with no nested structures. Original error was: {message}"
    )]
    Unrepresentable { name: String, message: String },

    #[error("I/O error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

/// Errors raised by the compile pipelines
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Cannot compile to a single run file: The following globals are a sequence: {}", .0.join(", "))]
    MultipleShots(Vec<String>),

    #[error("Expansion produced no shots")]
    NoShots,

    #[error("Shot consumer failed on {}: {message}", path.display())]
    Consumer { path: PathBuf, message: String },

    #[error(transparent)]
    Globals(#[from] GlobalsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

/// Errors raised while loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
