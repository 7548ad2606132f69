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

//! Runplan Core
//!
//! Globals are named expressions kept in groups. This crate evaluates them
//! against each other, infers how each one should be iterated, expands
//! them into the shots of a sequence and writes one record per shot.

pub mod config;
pub mod diff;
pub mod error;
pub mod evaluator;
pub mod expansion;
pub mod globals;
pub mod graph;
pub mod inference;
pub mod preparse;
pub mod sequence;
pub mod shots;
pub mod store;

pub use config::RunplanConfig;
pub use diff::{GlobalDiff, globals_diff_groups, render_diff};
pub use error::{CompileError, ConfigError, GlobalsError, MaterializeError, SequenceError, StoreError};
pub use evaluator::{EvalMode, EvalOptions, Evaluation, GlobalResult, evaluate_globals, evaluate_globals_with};
pub use expansion::{AxisKey, AxisSettings, ExpansionConfig, Expanded, Shot, expand_globals, expand_globals_with};
pub use globals::{ActiveGroups, ExpansionTag, GlobalSpec, GroupGlobals, SequenceGlobals};
pub use graph::DependencyGraph;
pub use inference::{Inference, InferenceState};
pub use preparse::{PreparseReport, PreparseWorker, Preparsed, preparse_globals};
pub use sequence::{SequenceAttrs, SequenceDetails, new_sequence_details, next_sequence_index};
pub use shots::{RunFiles, ShotConsumer, ShotRecord, StoredValue, engage, make_run_file_from_globals_files, make_run_files};
pub use store::{GroupStore, JsonGroupStore, MemoryGroupStore, get_all_groups, get_globals};
