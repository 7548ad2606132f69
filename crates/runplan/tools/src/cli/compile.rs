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

//! Commands that claim sequences and write shot files

use super::Context;
use anyhow::{Context as _, Result, bail};
use chrono::Local;
use clap::Args;
use runplan_core::diff::globals_diff_sequences;
use runplan_core::evaluator::EvalOptions;
use runplan_core::shots::{make_single_run_file, new_rep_name, read_shot_globals, read_shot_record};
use runplan_core::{ShotConsumer, engage, globals_diff_groups, make_run_file_from_globals_files, new_sequence_details, render_diff};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Experiment script the shots are compiled for
    pub script: PathBuf,

    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Randomize which shot gets which run number
    #[arg(long)]
    pub shuffle: bool,
}

#[derive(Args, Debug)]
pub struct SingleArgs {
    pub script: PathBuf,

    /// Shot file to write
    pub output: PathBuf,

    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct NextIndexArgs {
    pub script: PathBuf,

    /// Claim the index instead of previewing it
    #[arg(long)]
    pub claim: bool,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Current globals files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Globals files to compare against
    #[arg(long, num_args = 1.., conflicts_with = "shot")]
    pub against: Vec<PathBuf>,

    /// Shot file to compare against
    #[arg(long)]
    pub shot: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RepeatArgs {
    /// Shot file to repeat
    pub shot: PathBuf,
}

/// Prints each shot path as it is handed over
struct PrintingConsumer<'a> {
    out: &'a mut dyn Write,
}

impl ShotConsumer for PrintingConsumer<'_> {
    fn consume(&mut self, _script_path: &Path, shot_path: &Path) -> Result<(), String> {
        writeln!(self.out, "{}", shot_path.display()).map_err(|e| e.to_string())
    }
}

pub fn compile(args: CompileArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let active = ctx.active_groups(&args.files)?;
    let mut config = ctx.config.clone();
    config.shuffle_runs |= args.shuffle;

    let mut consumer = PrintingConsumer { out: &mut *out };
    let report = engage(ctx.store.as_ref(), &args.script, &active, &config, &mut consumer)?;
    writeln!(
        out,
        "sequence {} ({} shots) in {}",
        report.details.attrs.sequence_id,
        report.shot_paths.len(),
        report.details.output_dir.display()
    )?;
    Ok(())
}

pub fn single(args: SingleArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let attrs = make_run_file_from_globals_files(ctx.store.as_ref(), &args.script, &args.files, &args.output, &ctx.config)?;
    writeln!(out, "{} (sequence {})", args.output.display(), attrs.sequence_id)?;
    Ok(())
}

pub fn next_index(args: NextIndexArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let details = new_sequence_details(&args.script, &ctx.config, args.claim, Local::now().naive_local())?;
    let verb = if args.claim { "claimed" } else { "next" };
    writeln!(out, "{verb} sequence index {}", details.attrs.sequence_index)?;
    writeln!(out, "output folder {}", details.output_dir.display())?;
    writeln!(out, "filename prefix {}", details.filename_prefix)?;
    Ok(())
}

pub fn diff(args: DiffArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let active = ctx.active_groups(&args.files)?;
    let rows = if let Some(shot) = &args.shot {
        let record = read_shot_record(shot)?;
        let current = runplan_core::get_globals(ctx.store.as_ref(), &active)?;
        globals_diff_sequences(&current, &record.globals.groups, EvalOptions::lenient())?
    } else if !args.against.is_empty() {
        let other = ctx.active_groups(&args.against)?;
        globals_diff_groups(ctx.store.as_ref(), &active, &other)?
    } else {
        bail!("pass --against or --shot");
    };
    write!(out, "{}", render_diff(&rows))?;
    Ok(())
}

/// Copy a shot under the next free repeat name
pub fn repeat(args: RepeatArgs, _ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let record = read_shot_record(&args.shot)?;
    let values = read_shot_globals(&args.shot)?;
    let (path, run_repeat) = new_rep_name(&args.shot)?;
    make_single_run_file(
        &path,
        Some(&record.globals.groups),
        &values,
        &record.attrs,
        record.run_number,
        record.n_runs,
        run_repeat,
    )
    .with_context(|| format!("failed to write repeat of {}", args.shot.display()))?;
    writeln!(out, "{}", path.display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use runplan_core::{GroupStore, RunplanConfig};
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (Context, PathBuf) {
        let config = RunplanConfig {
            experiment_shot_storage: dir.path().join("shots"),
            ..RunplanConfig::default()
        };
        let ctx = Context::new(config);
        let file = dir.path().join("globals.json");
        let store = ctx.store.as_ref();
        store.new_container(&file).unwrap();
        store.new_group(&file, "scan").unwrap();
        store.new_global(&file, "scan", "delay").unwrap();
        store.set_value(&file, "scan", "delay", "[1, 2, 3]").unwrap();
        store.set_expansion(&file, "scan", "delay", "outer").unwrap();
        (ctx, file)
    }

    fn text(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_compile_prints_each_shot() {
        let dir = TempDir::new().unwrap();
        let (ctx, file) = setup(&dir);
        let mut buffer = Vec::new();
        let args = CompileArgs {
            script: PathBuf::from("ramsey.py"),
            files: vec![file],
            shuffle: false,
        };
        compile(args, &ctx, &mut buffer).unwrap();
        let report = text(buffer);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("_ramsey_0.json"));
        assert!(lines[3].starts_with("sequence "));
        assert!(lines[3].contains("(3 shots)"));
    }

    #[test]
    fn test_next_index_preview_and_claim() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = setup(&dir);
        let run = |claim: bool| {
            let mut buffer = Vec::new();
            next_index(NextIndexArgs { script: PathBuf::from("ramsey.py"), claim }, &ctx, &mut buffer).unwrap();
            text(buffer)
        };
        assert!(run(false).starts_with("next sequence index 0\n"));
        assert!(run(true).starts_with("claimed sequence index 0\n"));
        assert!(run(false).starts_with("next sequence index 1\n"));
    }

    #[test]
    fn test_diff_against_shot_and_repeat() {
        let dir = TempDir::new().unwrap();
        let (ctx, file) = setup(&dir);
        ctx.store.set_expansion(&file, "scan", "delay", "").unwrap();
        let shot = dir.path().join("single.json");
        single(
            SingleArgs {
                script: PathBuf::from("ramsey.py"),
                output: shot.clone(),
                files: vec![file.clone()],
            },
            &ctx,
            &mut Vec::new(),
        )
        .unwrap();

        let diff_args = || DiffArgs {
            files: vec![file.clone()],
            against: Vec::new(),
            shot: Some(shot.clone()),
        };
        let mut buffer = Vec::new();
        diff(diff_args(), &ctx, &mut buffer).unwrap();
        assert_eq!(text(buffer), runplan_core::diff::IDENTICAL_MESSAGE);

        ctx.store.set_value(&file, "scan", "delay", "[4, 5]").unwrap();
        let mut buffer = Vec::new();
        diff(diff_args(), &ctx, &mut buffer).unwrap();
        assert!(text(buffer).contains("array([4, 5])"));

        let mut buffer = Vec::new();
        repeat(RepeatArgs { shot: shot.clone() }, &ctx, &mut buffer).unwrap();
        let repeated = PathBuf::from(text(buffer).trim());
        assert_eq!(repeated, dir.path().join("single_rep00001.json"));
        let record = read_shot_record(&repeated).unwrap();
        assert_eq!(record.run_repeat, 1);
        assert_eq!(read_shot_globals(&repeated).unwrap(), read_shot_globals(&shot).unwrap());
    }
}
