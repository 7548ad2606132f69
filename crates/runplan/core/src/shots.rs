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

//! Shot materializer
//!
//! Writes one JSON record per shot: the sequence identity, the run number,
//! the full group metadata and the shot's concrete values. Files are
//! produced lazily so a failed compile leaves few files behind.

use crate::config::RunplanConfig;
use crate::error::{CompileError, CompileResult, MaterializeError, MaterializeResult};
use crate::evaluator::{EvalMode, EvalOptions, evaluate_globals_with};
use crate::expansion::{Shot, expand_globals};
use crate::globals::{ActiveGroups, SequenceGlobals};
use crate::sequence::{SequenceAttrs, SequenceDetails, new_sequence_details};
use crate::store::{GroupStore, get_all_groups, get_globals};
use chrono::Local;
use metrics::counter;
use rand::seq::SliceRandom;
use runplan_expr::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extension of shot record files
pub const SHOT_EXTENSION: &str = "json";

/// Scalar element of a stored array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredScalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Value as it appears in a shot record. `None` is stored as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<StoredScalar>),
}

fn scalar(value: &Value) -> Result<StoredScalar, String> {
    match value {
        Value::None => Ok(StoredScalar::Null),
        Value::Bool(b) => Ok(StoredScalar::Bool(*b)),
        Value::Int(i) => Ok(StoredScalar::Int(*i)),
        Value::Float(f) => Ok(StoredScalar::Float(*f)),
        Value::Str(s) => Ok(StoredScalar::Str(s.clone())),
        other => Err(format!("TypeError: nested '{}' value in an array", other.type_name())),
    }
}

impl TryFrom<&Value> for StoredValue {
    type Error = String;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::None => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => Self::Float(*f),
            Value::Str(s) => Self::Str(s.clone()),
            Value::Array(items) | Value::Tuple(items) => Self::Array(items.iter().map(scalar).collect::<Result<_, _>>()?),
            other => return Err(format!("TypeError: '{}' values are not storable", other.type_name())),
        })
    }
}

impl From<StoredScalar> for Value {
    fn from(stored: StoredScalar) -> Self {
        match stored {
            StoredScalar::Null => Value::None,
            StoredScalar::Bool(b) => Value::Bool(b),
            StoredScalar::Int(i) => Value::Int(i),
            StoredScalar::Float(f) => Value::Float(f),
            StoredScalar::Str(s) => Value::Str(s),
        }
    }
}

impl From<StoredValue> for Value {
    fn from(stored: StoredValue) -> Self {
        match stored {
            StoredValue::Null => Value::None,
            StoredValue::Bool(b) => Value::Bool(b),
            StoredValue::Int(i) => Value::Int(i),
            StoredValue::Float(f) => Value::Float(f),
            StoredValue::Str(s) => Value::Str(s),
            StoredValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
        }
    }
}

/// `globals` section of a shot record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShotGlobals {
    /// Expression, units and expansion of every global, per group
    #[serde(default)]
    pub groups: SequenceGlobals,
    /// The shot's concrete values
    #[serde(default)]
    pub values: BTreeMap<String, StoredValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotRecord {
    #[serde(flatten)]
    pub attrs: SequenceAttrs,
    #[serde(rename = "run number")]
    pub run_number: u64,
    pub n_runs: u64,
    #[serde(rename = "run repeat", default)]
    pub run_repeat: u64,
    pub globals: ShotGlobals,
}

/// Paths of `n_runs` shot files, numbered from zero and padded to a common width
pub fn make_run_filenames(output_folder: &Path, filename_prefix: &str, n_runs: usize) -> Vec<PathBuf> {
    let width = if n_runs <= 1 { 0 } else { (n_runs - 1).to_string().len() };
    (0..n_runs)
        .map(|i| output_folder.join(format!("{filename_prefix}_{i:0width$}.{SHOT_EXTENSION}")))
        .collect()
}

/// Write one shot record to `path`, creating its folder if needed
pub fn make_single_run_file(
    path: &Path,
    sequence_globals: Option<&SequenceGlobals>,
    shot: &Shot,
    attrs: &SequenceAttrs,
    run_number: u64,
    n_runs: u64,
    run_repeat: u64,
) -> MaterializeResult<()> {
    let values: BTreeMap<String, StoredValue> = shot
        .iter()
        .map(|(name, value)| {
            StoredValue::try_from(value)
                .map(|stored| (name.clone(), stored))
                .map_err(|message| MaterializeError::Unrepresentable {
                    name: name.clone(),
                    message,
                })
        })
        .collect::<MaterializeResult<_>>()?;

    let record = ShotRecord {
        attrs: attrs.clone(),
        run_number,
        n_runs,
        run_repeat,
        globals: ShotGlobals {
            groups: sequence_globals.cloned().unwrap_or_default(),
            values,
        },
    };

    let io_error = |source| MaterializeError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let content = serde_json::to_vec_pretty(&record)?;
    std::fs::write(path, content).map_err(io_error)?;
    counter!("runplan_shot_files_written", 1);
    debug!(path = %path.display(), run_number, "wrote shot file");
    Ok(())
}

/// Lazily written shot files. Each call to `next` writes one file and
/// yields its path; iteration ends after the first error.
pub struct RunFiles {
    pending: std::iter::Zip<std::vec::IntoIter<PathBuf>, std::vec::IntoIter<Shot>>,
    sequence_globals: SequenceGlobals,
    attrs: SequenceAttrs,
    run_number: u64,
    n_runs: u64,
    failed: bool,
}

impl RunFiles {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for RunFiles {
    type Item = MaterializeResult<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (path, shot) = self.pending.next()?;
        let written = make_single_run_file(&path, Some(&self.sequence_globals), &shot, &self.attrs, self.run_number, self.n_runs, 0);
        self.run_number += 1;
        match written {
            Ok(()) => Some(Ok(path)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Shot files for `shots`, written only as the returned iterator is
/// consumed. `shuffle` randomizes which shot gets which run number.
pub fn make_run_files(
    output_folder: &Path,
    sequence_globals: &SequenceGlobals,
    mut shots: Vec<Shot>,
    attrs: &SequenceAttrs,
    filename_prefix: &str,
    shuffle: bool,
) -> RunFiles {
    if shuffle {
        shots.shuffle(&mut rand::thread_rng());
    }
    let filenames = make_run_filenames(output_folder, filename_prefix, shots.len());
    RunFiles {
        n_runs: shots.len() as u64,
        pending: filenames.into_iter().zip(shots),
        sequence_globals: sequence_globals.clone(),
        attrs: attrs.clone(),
        run_number: 0,
        failed: false,
    }
}

pub fn read_shot_record(path: &Path) -> MaterializeResult<ShotRecord> {
    let content = std::fs::read(path).map_err(|source| MaterializeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&content)?)
}

/// Concrete values of a shot, with `null` read back as `None`
pub fn read_shot_globals(path: &Path) -> MaterializeResult<BTreeMap<String, Value>> {
    let record = read_shot_record(path)?;
    Ok(record.globals.values.into_iter().map(|(name, stored)| (name, Value::from(stored))).collect())
}

/// Path for a repeat of the shot at `path` and its repeat number.
///
/// Uses the lowest `_repNNNNN` suffix above the shot's own that is free, and
/// creates an empty file there so concurrent callers never pick the same one.
pub fn new_rep_name(path: &Path) -> MaterializeResult<(PathBuf, u64)> {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let is_shot = path.extension().is_some_and(|ext| ext == SHOT_EXTENSION);
    let (base, mut repeat) = match stem.rsplit_once("_rep") {
        Some((base, number)) if is_shot => match number.parse::<u64>() {
            Ok(number) => (base.to_string(), number),
            Err(_) => (stem.clone(), 0),
        },
        _ => (stem.clone(), 0),
    };
    loop {
        repeat += 1;
        let candidate = path.with_file_name(format!("{base}_rep{repeat:05}.{SHOT_EXTENSION}"));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok((candidate, repeat)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(MaterializeError::Io { path: candidate, source }),
        }
    }
}

/// Evaluate strictly and expand, failing when nothing is left to run
fn evaluate_and_expand(sequence_globals: &SequenceGlobals, config: &RunplanConfig) -> CompileResult<(Vec<Shot>, BTreeMap<String, String>)> {
    let options = EvalOptions {
        mode: EvalMode::Strict,
        max_iterator_length: config.max_iterator_length,
    };
    let evaluation = evaluate_globals_with(sequence_globals, options)?;
    let shots = expand_globals(sequence_globals, &evaluation.results, &config.expansion);
    if shots.is_empty() {
        return Err(CompileError::NoShots);
    }
    Ok((shots, evaluation.expansions))
}

/// Compile every global in `containers` into the single shot file
/// `output_path`. Fails if the globals describe more than one shot.
pub fn make_run_file_from_globals_files(
    store: &dyn GroupStore,
    script_path: &Path,
    containers: &[PathBuf],
    output_path: &Path,
    config: &RunplanConfig,
) -> CompileResult<SequenceAttrs> {
    let active = get_all_groups(store, containers)?;
    let sequence_globals = get_globals(store, &active)?;
    let (shots, expansions) = evaluate_and_expand(&sequence_globals, config)?;
    if shots.len() > 1 {
        let scanning = expansions.into_iter().filter(|(_, tag)| !tag.is_empty()).map(|(name, _)| name).collect();
        return Err(CompileError::MultipleShots(scanning));
    }

    let details = new_sequence_details(script_path, config, true, Local::now().naive_local())?;
    make_single_run_file(output_path, Some(&sequence_globals), &shots[0], &details.attrs, 1, 1, 0)?;
    Ok(details.attrs)
}

/// Receives the shot files of a compile action, in run order
pub trait ShotConsumer {
    fn consume(&mut self, script_path: &Path, shot_path: &Path) -> Result<(), String>;
}

/// What an [`engage`] produced
#[derive(Debug, Clone)]
pub struct EngageReport {
    pub details: SequenceDetails,
    pub shot_paths: Vec<PathBuf>,
}

/// Compile the active groups for `script_path`: claim a sequence index, then
/// write shot files one at a time, handing each to `consumer` before the
/// next is written.
pub fn engage(
    store: &dyn GroupStore,
    script_path: &Path,
    active: &ActiveGroups,
    config: &RunplanConfig,
    consumer: &mut dyn ShotConsumer,
) -> CompileResult<EngageReport> {
    let sequence_globals = get_globals(store, active)?;
    let (shots, _) = evaluate_and_expand(&sequence_globals, config)?;
    let details = new_sequence_details(script_path, config, true, Local::now().naive_local())?;
    info!(
        script = %script_path.display(),
        sequence_index = details.attrs.sequence_index,
        shots = shots.len(),
        "engaging sequence"
    );

    let run_files = make_run_files(
        &details.output_dir,
        &sequence_globals,
        shots,
        &details.attrs,
        &details.filename_prefix,
        config.shuffle_runs,
    );
    let mut shot_paths = Vec::with_capacity(run_files.len());
    for path in run_files {
        let path = path?;
        consumer.consume(script_path, &path).map_err(|message| CompileError::Consumer {
            path: path.clone(),
            message,
        })?;
        shot_paths.push(path);
    }
    counter!("runplan_sequences_engaged", 1);
    Ok(EngageReport { details, shot_paths })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::GlobalSpec;
    use crate::store::MemoryGroupStore;
    use tempfile::TempDir;

    fn attrs() -> SequenceAttrs {
        SequenceAttrs {
            script_basename: "ramsey".into(),
            sequence_date: "2024-03-01".into(),
            sequence_index: 4,
            sequence_id: "20240301T140309_ramsey".into(),
        }
    }

    fn shot(pairs: &[(&str, Value)]) -> Shot {
        pairs.iter().map(|(name, value)| (name.to_string(), value.clone())).collect()
    }

    #[test]
    fn test_filename_width() {
        let folder = Path::new("/out");
        assert_eq!(make_run_filenames(folder, "p", 1), vec![PathBuf::from("/out/p_0.json")]);
        let ten = make_run_filenames(folder, "p", 10);
        assert_eq!(ten[9], PathBuf::from("/out/p_9.json"));
        let twelve = make_run_filenames(folder, "p", 12);
        assert_eq!(twelve[0], PathBuf::from("/out/p_00.json"));
        assert_eq!(twelve[11], PathBuf::from("/out/p_11.json"));
        assert!(make_run_filenames(folder, "p", 0).is_empty());
    }

    #[test]
    fn test_record_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("shot.json");
        let mut groups = SequenceGlobals::new();
        groups.entry("G1".into()).or_default().insert("a".into(), GlobalSpec::new("[1, 2]", "MHz", "a"));
        let values = shot(&[("a", Value::Int(1)), ("flag", Value::None), ("xs", Value::Tuple(vec![Value::Float(0.5)]))]);

        make_single_run_file(&path, Some(&groups), &values, &attrs(), 3, 12, 0).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["sequence_index"], 4);
        assert_eq!(json["run number"], 3);
        assert_eq!(json["n_runs"], 12);
        assert_eq!(json["run repeat"], 0);
        assert_eq!(json["globals"]["groups"]["G1"]["a"]["units"], "MHz");
        assert!(json["globals"]["values"]["flag"].is_null());

        let read = read_shot_globals(&path).unwrap();
        assert_eq!(read["a"], Value::Int(1));
        assert_eq!(read["flag"], Value::None);
        assert_eq!(read["xs"], Value::Array(vec![Value::Float(0.5)]));
    }

    #[test]
    fn test_nested_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let nested = Value::Array(vec![Value::Array(vec![Value::Int(1)])]);
        let result = make_single_run_file(&dir.path().join("s.json"), None, &shot(&[("m", nested)]), &attrs(), 0, 1, 0);
        match result {
            Err(MaterializeError::Unrepresentable { name, .. }) => assert_eq!(name, "m"),
            other => panic!("expected unrepresentable error, got {other:?}"),
        }
        assert!(!dir.path().join("s.json").exists());
    }

    #[test]
    fn test_run_files_are_lazy() {
        let dir = TempDir::new().unwrap();
        let shots = vec![shot(&[("a", Value::Int(1))]), shot(&[("a", Value::Int(2))])];
        let mut files = make_run_files(dir.path(), &SequenceGlobals::new(), shots, &attrs(), "p", false);
        assert_eq!(files.len(), 2);
        assert!(!dir.path().join("p_0.json").exists());

        let first = files.next().unwrap().unwrap();
        assert!(first.exists());
        assert!(!dir.path().join("p_1.json").exists());

        let second = files.next().unwrap().unwrap();
        assert_eq!(read_shot_record(&second).unwrap().run_number, 1);
        assert!(files.next().is_none());
    }

    #[test]
    fn test_run_files_stop_after_error() {
        let dir = TempDir::new().unwrap();
        let bad = shot(&[("a", Value::Array(vec![Value::Tuple(vec![])]))]);
        let shots = vec![bad, shot(&[("a", Value::Int(2))])];
        let mut files = make_run_files(dir.path(), &SequenceGlobals::new(), shots, &attrs(), "p", false);
        assert!(files.next().unwrap().is_err());
        assert!(files.next().is_none());
    }

    #[test]
    fn test_new_rep_name() {
        let dir = TempDir::new().unwrap();
        let shot_path = dir.path().join("seq_0.json");

        let (first, repeat) = new_rep_name(&shot_path).unwrap();
        assert_eq!(first, dir.path().join("seq_0_rep00001.json"));
        assert_eq!(repeat, 1);
        assert!(first.exists());

        let (second, repeat) = new_rep_name(&shot_path).unwrap();
        assert_eq!(second, dir.path().join("seq_0_rep00002.json"));
        assert_eq!(repeat, 2);

        let (third, _) = new_rep_name(&first).unwrap();
        assert_eq!(third, dir.path().join("seq_0_rep00003.json"));
    }

    struct Recorder(Vec<PathBuf>);

    impl ShotConsumer for Recorder {
        fn consume(&mut self, _script_path: &Path, shot_path: &Path) -> Result<(), String> {
            // Each shot is handed over before the next one is written
            assert!(shot_path.exists());
            if let Some(next) = self.0.last() {
                assert_ne!(next, shot_path);
            }
            self.0.push(shot_path.to_path_buf());
            Ok(())
        }
    }

    fn scan_store() -> (MemoryGroupStore, ActiveGroups) {
        let mut groups = BTreeMap::new();
        let mut globals = crate::globals::GroupGlobals::new();
        globals.insert("a".to_string(), GlobalSpec::new("[1, 2, 3]", "", "outer"));
        globals.insert("b".to_string(), GlobalSpec::new("a * 2", "", ""));
        groups.insert("g".to_string(), globals);
        let mut active = ActiveGroups::new();
        active.insert("g".to_string(), PathBuf::from("mem"));
        (MemoryGroupStore::with_groups("mem", groups), active)
    }

    #[test]
    fn test_engage_feeds_consumer_in_order() {
        let dir = TempDir::new().unwrap();
        let (store, active) = scan_store();
        let config = RunplanConfig {
            experiment_shot_storage: dir.path().to_path_buf(),
            ..RunplanConfig::default()
        };
        let mut recorder = Recorder(Vec::new());

        let report = engage(&store, Path::new("ramsey.py"), &active, &config, &mut recorder).unwrap();
        assert_eq!(report.shot_paths.len(), 3);
        assert_eq!(recorder.0, report.shot_paths);
        for (i, path) in report.shot_paths.iter().enumerate() {
            let values = read_shot_globals(path).unwrap();
            assert_eq!(values["a"], Value::Int(i as i64 + 1));
            assert!(path.starts_with(dir.path().join("ramsey")));
        }
        assert_eq!(report.details.attrs.sequence_index, 0);
    }

    #[test]
    fn test_single_run_compile_rejects_scans() {
        let dir = TempDir::new().unwrap();
        let (store, _) = scan_store();
        let config = RunplanConfig {
            experiment_shot_storage: dir.path().to_path_buf(),
            ..RunplanConfig::default()
        };
        let output = dir.path().join("single.json");
        let result = make_run_file_from_globals_files(&store, Path::new("ramsey.py"), &[PathBuf::from("mem")], &output, &config);
        match result {
            Err(CompileError::MultipleShots(names)) => assert_eq!(names, vec!["a".to_string()]),
            other => panic!("expected multiple shots error, got {other:?}"),
        }

        store.set_expansion(Path::new("mem"), "g", "a", "").unwrap();
        let attrs = make_run_file_from_globals_files(&store, Path::new("ramsey.py"), &[PathBuf::from("mem")], &output, &config).unwrap();
        let record = read_shot_record(&output).unwrap();
        assert_eq!(record.attrs, attrs);
        assert_eq!(record.run_number, 1);
        assert_eq!(record.n_runs, 1);
    }
}
