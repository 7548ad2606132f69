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

//! Runplan CLI
//!
//! Edits globals files, evaluates and expands them, and compiles shot files.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use runplan_core::RunplanConfig;
use runplan_tools::Context;
use runplan_tools::cli::compile::{self, CompileArgs, DiffArgs, NextIndexArgs, RepeatArgs, SingleArgs};
use runplan_tools::cli::evaluate::{self, EvaluateArgs, ExpandArgs, PreparseArgs};
use runplan_tools::cli::groups::{self, GroupsArgs, ListArgs, NewFileArgs, NewGroupArgs, SetArgs};
use std::io::Write;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "runplan")]
#[command(about = "Parameter sweeps for experiment sequences")]
#[command(version)]
struct Cli {
    /// Path to configuration file (TOML, overrides $RUNPLAN_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty globals file
    NewFile(NewFileArgs),
    /// Add a group to a globals file
    NewGroup(NewGroupArgs),
    /// List the groups of globals files
    Groups(GroupsArgs),
    /// Set the expression, units or expansion of a global
    Set(SetArgs),
    /// Show the globals of a group
    List(ListArgs),
    /// Evaluate every global
    Evaluate(EvaluateArgs),
    /// Infer expansion tags and count shots
    Preparse(PreparseArgs),
    /// Print every shot as a JSON line
    Expand(ExpandArgs),
    /// Claim a sequence and write its shot files
    Compile(CompileArgs),
    /// Write a single shot file
    Single(SingleArgs),
    /// Preview or claim the next sequence index of a script
    NextIndex(NextIndexArgs),
    /// Compare globals against other files or a shot
    Diff(DiffArgs),
    /// Copy a shot under a new repeat number
    Repeat(RepeatArgs),
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    let config = RunplanConfig::resolve_config(cli.config)?;
    let ctx = Context::new(config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::NewFile(args) => groups::new_file(args, &ctx, &mut out)?,
        Commands::NewGroup(args) => groups::new_group(args, &ctx, &mut out)?,
        Commands::Groups(args) => groups::groups(args, &ctx, &mut out)?,
        Commands::Set(args) => groups::set(args, &ctx, &mut out)?,
        Commands::List(args) => groups::list(args, &ctx, &mut out)?,
        Commands::Evaluate(args) => evaluate::evaluate(args, &ctx, &mut out)?,
        Commands::Preparse(args) => evaluate::preparse(args, &ctx, &mut out).await?,
        Commands::Expand(args) => evaluate::expand(args, &ctx, &mut out)?,
        Commands::Compile(args) => compile::compile(args, &ctx, &mut out)?,
        Commands::Single(args) => compile::single(args, &ctx, &mut out)?,
        Commands::NextIndex(args) => compile::next_index(args, &ctx, &mut out)?,
        Commands::Diff(args) => compile::diff(args, &ctx, &mut out)?,
        Commands::Repeat(args) => compile::repeat(args, &ctx, &mut out)?,
    }
    out.flush()?;
    Ok(())
}
