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

//! Commands that create and edit globals files

use super::Context;
use anyhow::{Result, bail};
use clap::Args;
use runplan_core::GroupStore;
use std::io::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct NewFileArgs {
    /// Globals file to create
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct NewGroupArgs {
    pub file: PathBuf,
    pub group: String,
}

#[derive(Args, Debug)]
pub struct GroupsArgs {
    /// Globals files to list
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    pub file: PathBuf,
    pub group: String,
    pub name: String,

    /// Expression of the global
    #[arg(long)]
    pub value: Option<String>,

    #[arg(long)]
    pub units: Option<String>,

    /// Expansion tag: empty, `outer` or a zip key
    #[arg(long)]
    pub expansion: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    pub file: PathBuf,
    pub group: String,
}

pub fn new_file(args: NewFileArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    if args.file.exists() {
        bail!("{} already exists", args.file.display());
    }
    ctx.store.new_container(&args.file)?;
    writeln!(out, "created {}", args.file.display())?;
    Ok(())
}

pub fn new_group(args: NewGroupArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    ctx.store.new_group(&args.file, &args.group)?;
    writeln!(out, "created group {} in {}", args.group, args.file.display())?;
    Ok(())
}

pub fn groups(args: GroupsArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let active = ctx.active_groups(&args.files)?;
    for (group, file) in &active {
        let count = ctx.store.list_globals(file, group)?.len();
        writeln!(out, "{group}\t{count} globals\t{}", file.display())?;
    }
    Ok(())
}

/// Create the global if needed, then apply whichever fields were given
pub fn set(args: SetArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    if args.value.is_none() && args.units.is_none() && args.expansion.is_none() {
        bail!("nothing to set: pass --value, --units or --expansion");
    }
    let store = ctx.store.as_ref();
    if !store.list_globals(&args.file, &args.group)?.contains(&args.name) {
        store.new_global(&args.file, &args.group, &args.name)?;
    }
    if let Some(value) = &args.value {
        store.write_value(&args.file, &args.group, &args.name, value)?;
    }
    if let Some(units) = &args.units {
        store.write_units(&args.file, &args.group, &args.name, units)?;
    }
    if let Some(expansion) = &args.expansion {
        store.write_expansion(&args.file, &args.group, &args.name, expansion)?;
    }
    writeln!(out, "updated {}/{}", args.group, args.name)?;
    Ok(())
}

pub fn list(args: ListArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let globals = ctx.store.read_globals(&args.file, &args.group)?;
    let width = globals.keys().map(String::len).max().unwrap_or(0);
    for (name, spec) in &globals {
        write!(out, "{name:<width$}  {}", spec.expression)?;
        if !spec.units.is_empty() {
            write!(out, "  [{}]", spec.units)?;
        }
        if !spec.expansion.is_empty() {
            write!(out, "  ({})", spec.expansion)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use runplan_core::RunplanConfig;
    use tempfile::TempDir;

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_create_and_list() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::new(RunplanConfig::default());
        let file = dir.path().join("globals.json");

        output(|out| new_file(NewFileArgs { file: file.clone() }, &ctx, out));
        assert!(new_file(NewFileArgs { file: file.clone() }, &ctx, &mut Vec::new()).is_err());
        output(|out| new_group(NewGroupArgs { file: file.clone(), group: "scan".into() }, &ctx, out));

        let set_args = |name: &str, value: &str, units: Option<&str>, expansion: Option<&str>| SetArgs {
            file: file.clone(),
            group: "scan".into(),
            name: name.into(),
            value: Some(value.into()),
            units: units.map(Into::into),
            expansion: expansion.map(Into::into),
        };
        output(|out| set(set_args("delay", "[1, 2]", Some("us"), Some("outer")), &ctx, out));
        output(|out| set(set_args("power", "0.5", None, None), &ctx, out));

        let listing = output(|out| list(ListArgs { file: file.clone(), group: "scan".into() }, &ctx, out));
        assert_eq!(listing, "delay  [1, 2]  [us]  (outer)\npower  0.5\n");

        let summary = output(|out| groups(GroupsArgs { files: vec![file.clone()] }, &ctx, out));
        assert!(summary.starts_with("scan\t2 globals\t"));
    }

    #[test]
    fn test_set_requires_a_field() {
        let ctx = Context::new(RunplanConfig::default());
        let args = SetArgs {
            file: PathBuf::from("unused.json"),
            group: "g".into(),
            name: "x".into(),
            value: None,
            units: None,
            expansion: None,
        };
        assert!(set(args, &ctx, &mut Vec::new()).is_err());
    }
}
