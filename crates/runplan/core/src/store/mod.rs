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

//! Group store
//!
//! Persists, per group, the globals' expressions, units and expansion tags.
//! Containers are addressed by path; each holds any number of groups.

mod json;
mod memory;

pub use json::JsonGroupStore;
pub use memory::MemoryGroupStore;

use crate::error::{StoreError, StoreResult};
use crate::globals::{ActiveGroups, GroupGlobals, SequenceGlobals};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Synchronous, strongly consistent store of globals groups
#[cfg_attr(test, mockall::automock)]
pub trait GroupStore: Send + Sync {
    /// Create an empty container, replacing any existing one
    fn new_container(&self, container: &Path) -> StoreResult<()>;

    /// Names of the groups in a container
    fn list_groups(&self, container: &Path) -> StoreResult<Vec<String>>;

    /// Every global of a group
    fn read_globals(&self, container: &Path, group: &str) -> StoreResult<GroupGlobals>;

    fn new_group(&self, container: &Path, group: &str) -> StoreResult<()>;

    /// Copy a group into `dest` under a non-colliding name, returning that name.
    /// When `delete_source` is set this is a move.
    fn copy_group(&self, source: &Path, group: &str, dest: &Path, delete_source: bool) -> StoreResult<String>;

    fn rename_group(&self, container: &Path, old: &str, new: &str) -> StoreResult<()>;

    fn delete_group(&self, container: &Path, group: &str) -> StoreResult<()>;

    fn list_globals(&self, container: &Path, group: &str) -> StoreResult<Vec<String>> {
        Ok(self.read_globals(container, group)?.into_keys().collect())
    }

    fn new_global(&self, container: &Path, group: &str, name: &str) -> StoreResult<()>;

    fn rename_global(&self, container: &Path, group: &str, old: &str, new: &str) -> StoreResult<()>;

    fn delete_global(&self, container: &Path, group: &str, name: &str) -> StoreResult<()>;

    fn get_value(&self, container: &Path, group: &str, name: &str) -> StoreResult<String>;

    fn set_value(&self, container: &Path, group: &str, name: &str, value: &str) -> StoreResult<()>;

    fn get_units(&self, container: &Path, group: &str, name: &str) -> StoreResult<String>;

    fn set_units(&self, container: &Path, group: &str, name: &str, units: &str) -> StoreResult<()>;

    fn get_expansion(&self, container: &Path, group: &str, name: &str) -> StoreResult<String>;

    fn set_expansion(&self, container: &Path, group: &str, name: &str, expansion: &str) -> StoreResult<()>;

    fn write_value(&self, container: &Path, group: &str, name: &str, value: &str) -> StoreResult<()> {
        self.set_value(container, group, name, value)
    }

    fn write_units(&self, container: &Path, group: &str, name: &str, units: &str) -> StoreResult<()> {
        self.set_units(container, group, name, units)
    }

    fn write_expansion(&self, container: &Path, group: &str, name: &str, expansion: &str) -> StoreResult<()> {
        self.set_expansion(container, group, name, expansion)
    }
}

/// Name for a copied group that does not collide with `taken`
pub(crate) fn copy_name(group: &str, is_move: bool, taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = group.to_string();
    let mut attempt = usize::from(is_move);
    while taken(&candidate) {
        candidate = if attempt > 0 { format!("{candidate}({attempt})") } else { format!("{candidate}_copy") };
        attempt += 1;
    }
    candidate
}

/// Map every group in `containers` to the container holding it.
///
/// A group name may appear only once across all containers.
pub fn get_all_groups(store: &dyn GroupStore, containers: &[PathBuf]) -> StoreResult<ActiveGroups> {
    let mut groups = ActiveGroups::new();
    for container in containers {
        for group in store.list_groups(container)? {
            if let Some(first) = groups.get(&group) {
                return Err(StoreError::DuplicateGroup {
                    group,
                    first: first.clone(),
                    second: container.clone(),
                });
            }
            groups.insert(group, container.clone());
        }
    }
    Ok(groups)
}

/// Read the globals of every active group
pub fn get_globals(store: &dyn GroupStore, active: &ActiveGroups) -> StoreResult<SequenceGlobals> {
    let mut sequence_globals = SequenceGlobals::new();
    for (group, container) in active {
        let globals = store.read_globals(container, group)?;
        debug!(group = %group, count = globals.len(), "read globals");
        sequence_globals.insert(group.clone(), globals);
    }
    Ok(sequence_globals)
}
