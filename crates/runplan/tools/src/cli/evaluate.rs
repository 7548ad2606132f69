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

//! Commands that evaluate and expand globals without writing shots

use super::Context;
use anyhow::{Result, anyhow};
use clap::Args;
use runplan_core::evaluator::{EvalMode, EvalOptions};
use runplan_core::shots::StoredValue;
use runplan_core::{InferenceState, PreparseWorker, evaluate_globals_with, expand_globals, get_globals, preparse_globals};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Fail on the first global that does not evaluate
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct PreparseArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Run once in the foreground instead of through the background worker
    #[arg(long)]
    pub once: bool,

    /// Seconds to wait for the worker
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct ExpandArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

pub fn evaluate(args: EvaluateArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let active = ctx.active_groups(&args.files)?;
    let sequence_globals = get_globals(ctx.store.as_ref(), &active)?;
    let options = EvalOptions {
        mode: if args.strict { EvalMode::Strict } else { EvalMode::Lenient },
        max_iterator_length: ctx.config.max_iterator_length,
    };
    let evaluation = evaluate_globals_with(&sequence_globals, options)?;
    for (group, results) in &evaluation.results {
        for (name, result) in results {
            match result {
                Ok(value) => writeln!(out, "{group}/{name} = {value}")?,
                Err(error) => writeln!(out, "{group}/{name} ! {error}")?,
            }
        }
    }
    Ok(())
}

fn print_preparsed(preparsed: &runplan_core::Preparsed, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "shots: {}", preparsed.n_shots)?;
    for (axis, length) in &preparsed.dimensions {
        writeln!(out, "  {axis}: {length}")?;
    }
    for (group, name, error) in preparsed.evaluation.errors() {
        writeln!(out, "error in {group}/{name}: {error}")?;
    }
    if !preparsed.converged {
        writeln!(out, "expansion tags did not settle after {} rounds", preparsed.rounds)?;
    }
    Ok(())
}

/// Evaluate, infer expansion tags and report the shot count
pub async fn preparse(args: PreparseArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let active = ctx.active_groups(&args.files)?;
    if args.once {
        let preparsed = preparse_globals(ctx.store.as_ref(), &active, InferenceState::new(), &ctx.config)?;
        return print_preparsed(&preparsed, out);
    }

    let worker = PreparseWorker::spawn(ctx.store.clone(), active, ctx.config.clone());
    let mut reports = worker.subscribe();
    let report = tokio::time::timeout(Duration::from_secs(args.timeout), reports.wait_for(Option::is_some))
        .await
        .map_err(|_| anyhow!("timed out waiting for globals to evaluate"))??
        .clone();
    worker.shutdown().await;

    match report.map(|report| report.result) {
        Some(Ok(preparsed)) => print_preparsed(&preparsed, out),
        Some(Err(message)) => Err(anyhow!(message)),
        None => Err(anyhow!("no report from the preparse worker")),
    }
}

/// Print every shot as one JSON object per line
pub fn expand(args: ExpandArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let active = ctx.active_groups(&args.files)?;
    let sequence_globals = get_globals(ctx.store.as_ref(), &active)?;
    let options = EvalOptions {
        mode: EvalMode::Strict,
        max_iterator_length: ctx.config.max_iterator_length,
    };
    let evaluation = evaluate_globals_with(&sequence_globals, options)?;
    for shot in expand_globals(&sequence_globals, &evaluation.results, &ctx.config.expansion) {
        let mut line = serde_json::Map::new();
        for (name, value) in &shot {
            let stored = StoredValue::try_from(value).map_err(|message| anyhow!("{name}: {message}"))?;
            line.insert(name.clone(), serde_json::to_value(&stored)?);
        }
        writeln!(out, "{}", serde_json::Value::Object(line))?;
    }
    Ok(())
}
