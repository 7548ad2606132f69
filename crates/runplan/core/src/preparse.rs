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

//! Interactive evaluation loop
//!
//! [`preparse_globals`] alternates evaluation and expansion-mode inference
//! until the tags stop changing, then counts shots. [`PreparseWorker`] runs
//! that loop on a background task whenever the globals are marked dirty.

use crate::config::RunplanConfig;
use crate::error::GlobalsResult;
use crate::evaluator::{EvalMode, EvalOptions, Evaluation, evaluate_globals_with};
use crate::expansion::{AxisKey, expand_globals_with};
use crate::globals::{ActiveGroups, SequenceGlobals};
use crate::inference::InferenceState;
use crate::store::{GroupStore, get_globals};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of one interactive evaluation
#[derive(Debug, Clone)]
pub struct Preparsed {
    pub sequence_globals: SequenceGlobals,
    pub evaluation: Evaluation,
    pub n_shots: usize,
    pub dimensions: BTreeMap<AxisKey, usize>,
    /// Inference state to pass to the next call
    pub state: InferenceState,
    pub rounds: usize,
    /// False when the round limit was hit while tags were still changing
    pub converged: bool,
}

/// Evaluate leniently and infer expansion tags until nothing changes, at
/// most `max_inference_rounds` times, then expand to count shots.
pub fn preparse_globals(store: &dyn GroupStore, active: &ActiveGroups, mut state: InferenceState, config: &RunplanConfig) -> GlobalsResult<Preparsed> {
    let options = EvalOptions {
        mode: EvalMode::Lenient,
        max_iterator_length: config.max_iterator_length,
    };
    let max_rounds = config.max_inference_rounds.max(1);
    let mut rounds = 0;
    let mut converged = false;
    let (sequence_globals, evaluation) = loop {
        rounds += 1;
        let sequence_globals = get_globals(store, active)?;
        let evaluation = evaluate_globals_with(&sequence_globals, options)?;
        let inference = state.infer(store, active, &evaluation)?;
        state = inference.state;
        if !inference.changed {
            converged = true;
            break (sequence_globals, evaluation);
        }
        debug!(round = rounds, "expansion tags changed, evaluating again");
        if rounds >= max_rounds {
            warn!(rounds, "expansion tags still changing, giving up");
            break (sequence_globals, evaluation);
        }
    };

    let expanded = expand_globals_with(&sequence_globals, &evaluation.results, &config.expansion, &mut rand::thread_rng());
    Ok(Preparsed {
        n_shots: expanded.shots.len(),
        dimensions: expanded.dimensions,
        sequence_globals,
        evaluation,
        state,
        rounds,
        converged,
    })
}

/// Published by the worker after every loop
#[derive(Debug, Clone)]
pub struct PreparseReport {
    /// Increases by one per loop
    pub generation: u64,
    pub result: Result<Arc<Preparsed>, String>,
}

struct Shared {
    store: Arc<dyn GroupStore>,
    active: RwLock<ActiveGroups>,
    config: RunplanConfig,
    dirty: AtomicBool,
    stopping: AtomicBool,
    wake: Notify,
    // Held for the duration of a loop and of every edit
    edits: Mutex<()>,
}

/// Background task re-running [`preparse_globals`] whenever the globals change.
///
/// Edits made through [`edit`](Self::edit) never interleave with a running
/// loop. Several dirty marks made while a loop runs collapse into one
/// further loop.
pub struct PreparseWorker {
    shared: Arc<Shared>,
    reports: watch::Receiver<Option<PreparseReport>>,
    handle: JoinHandle<()>,
}

impl PreparseWorker {
    /// Start the worker on the current tokio runtime. The first loop runs
    /// immediately.
    pub fn spawn(store: Arc<dyn GroupStore>, active: ActiveGroups, config: RunplanConfig) -> Self {
        let shared = Arc::new(Shared {
            store,
            active: RwLock::new(active),
            config,
            dirty: AtomicBool::new(true),
            stopping: AtomicBool::new(false),
            wake: Notify::new(),
            edits: Mutex::new(()),
        });
        let (sender, reports) = watch::channel(None);
        let handle = tokio::spawn(run(shared.clone(), sender));
        Self { shared, reports, handle }
    }

    pub fn mark_dirty(&self) {
        self.shared.dirty.store(true, Ordering::Release);
        self.shared.wake.notify_one();
    }

    pub fn set_active_groups(&self, active: ActiveGroups) {
        *self.shared.active.write() = active;
        self.mark_dirty();
    }

    /// Change the store between loops, then schedule a new loop
    pub async fn edit<R>(&self, edit: impl FnOnce(&dyn GroupStore) -> R) -> R {
        let result = {
            let _guard = self.shared.edits.lock().await;
            edit(self.shared.store.as_ref())
        };
        self.mark_dirty();
        result
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PreparseReport>> {
        self.reports.clone()
    }

    /// Stop after the current loop, if any
    pub async fn shutdown(self) {
        self.shared.stopping.store(true, Ordering::Release);
        self.shared.wake.notify_one();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "preparse worker ended abnormally");
        }
    }
}

async fn run(shared: Arc<Shared>, sender: watch::Sender<Option<PreparseReport>>) {
    let mut state = InferenceState::new();
    let mut generation = 0;
    loop {
        if shared.stopping.load(Ordering::Acquire) {
            break;
        }
        if !shared.dirty.swap(false, Ordering::AcqRel) {
            shared.wake.notified().await;
            continue;
        }

        generation += 1;
        let _guard = shared.edits.lock().await;
        let active = shared.active.read().clone();
        let job = shared.clone();
        let previous = state.clone();
        let outcome = tokio::task::spawn_blocking(move || preparse_globals(job.store.as_ref(), &active, previous, &job.config)).await;

        let result = match outcome {
            Ok(Ok(preparsed)) => {
                state = preparsed.state.clone();
                debug!(generation, shots = preparsed.n_shots, rounds = preparsed.rounds, "preparse finished");
                Ok(Arc::new(preparsed))
            }
            Ok(Err(e)) => {
                warn!(generation, error = %e, "preparse failed");
                Err(e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };
        sender.send_replace(Some(PreparseReport { generation, result }));
    }
    info!("preparse worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::{GlobalSpec, GroupGlobals};
    use crate::store::MemoryGroupStore;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn scenario() -> (Arc<MemoryGroupStore>, ActiveGroups) {
        let g1 = GroupGlobals::from([("a".to_string(), GlobalSpec::new("[1, 2]", "", "outer"))]);
        let g2 = GroupGlobals::from([("b".to_string(), GlobalSpec::new("a * 10", "", ""))]);
        let store = MemoryGroupStore::with_groups("mem", BTreeMap::from([("G1".to_string(), g1), ("G2".to_string(), g2)]));
        let active = ActiveGroups::from([("G1".to_string(), PathBuf::from("mem")), ("G2".to_string(), PathBuf::from("mem"))]);
        (Arc::new(store), active)
    }

    #[test]
    fn test_preparse_converges() {
        let (store, active) = scenario();
        let preparsed = preparse_globals(store.as_ref(), &active, InferenceState::new(), &RunplanConfig::default()).unwrap();
        assert!(preparsed.converged);
        assert_eq!(preparsed.rounds, 2);
        assert_eq!(preparsed.n_shots, 2);
        assert_eq!(preparsed.dimensions, BTreeMap::from([(AxisKey::Zip("a".to_string()), 2)]));

        // Carrying the state forward needs no further rounds
        let again = preparse_globals(store.as_ref(), &active, preparsed.state, &RunplanConfig::default()).unwrap();
        assert_eq!(again.rounds, 1);
    }

    #[test]
    fn test_round_limit() {
        let (store, active) = scenario();
        let config = RunplanConfig {
            max_inference_rounds: 1,
            ..RunplanConfig::default()
        };
        let preparsed = preparse_globals(store.as_ref(), &active, InferenceState::new(), &config).unwrap();
        assert!(!preparsed.converged);
        assert_eq!(preparsed.rounds, 1);
    }

    async fn wait_for_shots(reports: &mut watch::Receiver<Option<PreparseReport>>, n_shots: usize) -> PreparseReport {
        let report = tokio::time::timeout(
            Duration::from_secs(10),
            reports.wait_for(|report| matches!(report, Some(PreparseReport { result: Ok(p), .. }) if p.n_shots == n_shots)),
        )
        .await
        .expect("timed out waiting for preparse")
        .expect("worker dropped its sender");
        report.clone().unwrap()
    }

    #[tokio::test]
    async fn test_worker_follows_edits() {
        let (store, active) = scenario();
        let worker = PreparseWorker::spawn(store, active, RunplanConfig::default());
        let mut reports = worker.subscribe();

        let first = wait_for_shots(&mut reports, 2).await;

        worker
            .edit(|store| store.set_value(Path::new("mem"), "G1", "a", "[1, 2, 3]"))
            .await
            .unwrap();
        let second = wait_for_shots(&mut reports, 3).await;
        assert!(second.generation > first.generation);

        worker.set_active_groups(ActiveGroups::from([("G1".to_string(), PathBuf::from("mem"))]));
        let third = tokio::time::timeout(
            Duration::from_secs(10),
            reports.wait_for(|report| report.as_ref().is_some_and(|r| r.generation > second.generation)),
        )
        .await
        .unwrap()
        .unwrap()
        .clone()
        .unwrap();
        let preparsed = third.result.unwrap();
        assert!(!preparsed.sequence_globals.contains_key("G2"));
        assert_eq!(preparsed.n_shots, 3);

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_reports_store_failures() {
        let (store, _) = scenario();
        let active = ActiveGroups::from([("missing".to_string(), PathBuf::from("mem"))]);
        let worker = PreparseWorker::spawn(store, active, RunplanConfig::default());
        let mut reports = worker.subscribe();
        let report = tokio::time::timeout(Duration::from_secs(10), reports.wait_for(Option::is_some))
            .await
            .unwrap()
            .unwrap()
            .clone()
            .unwrap();
        assert!(report.result.is_err());
        worker.shutdown().await;
    }
}
