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

//! In-process group store

use super::{GroupStore, copy_name};
use crate::error::{StoreError, StoreResult};
use crate::globals::{GlobalSpec, GroupGlobals, is_valid_global_name, is_valid_group_name};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

type Containers = BTreeMap<PathBuf, BTreeMap<String, GroupGlobals>>;

/// Group store holding every container in memory
#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    containers: RwLock<Containers>,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding a single container with the given groups
    pub fn with_groups(container: impl Into<PathBuf>, groups: BTreeMap<String, GroupGlobals>) -> Self {
        let mut containers = Containers::new();
        containers.insert(container.into(), groups);
        Self {
            containers: RwLock::new(containers),
        }
    }

    fn with_container<T>(&self, container: &Path, f: impl FnOnce(&BTreeMap<String, GroupGlobals>) -> StoreResult<T>) -> StoreResult<T> {
        let containers = self.containers.read();
        let groups = containers.get(container).ok_or_else(|| StoreError::ContainerNotFound(container.to_path_buf()))?;
        f(groups)
    }

    fn with_container_mut<T>(&self, container: &Path, f: impl FnOnce(&mut BTreeMap<String, GroupGlobals>) -> StoreResult<T>) -> StoreResult<T> {
        let mut containers = self.containers.write();
        let groups = containers.get_mut(container).ok_or_else(|| StoreError::ContainerNotFound(container.to_path_buf()))?;
        f(groups)
    }

    fn with_global<T>(&self, container: &Path, group: &str, name: &str, f: impl FnOnce(&GlobalSpec) -> T) -> StoreResult<T> {
        self.with_container(container, |groups| {
            let spec = group_of(groups, container, group)?.get(name).ok_or_else(|| missing_global(group, name))?;
            Ok(f(spec))
        })
    }

    fn with_global_mut(&self, container: &Path, group: &str, name: &str, f: impl FnOnce(&mut GlobalSpec)) -> StoreResult<()> {
        self.with_container_mut(container, |groups| {
            let spec = group_of_mut(groups, container, group)?.get_mut(name).ok_or_else(|| missing_global(group, name))?;
            f(spec);
            Ok(())
        })
    }
}

fn missing_group(container: &Path, group: &str) -> StoreError {
    StoreError::GroupNotFound {
        container: container.to_path_buf(),
        group: group.to_string(),
    }
}

fn missing_global(group: &str, name: &str) -> StoreError {
    StoreError::GlobalNotFound {
        group: group.to_string(),
        name: name.to_string(),
    }
}

fn group_of<'a>(groups: &'a BTreeMap<String, GroupGlobals>, container: &Path, group: &str) -> StoreResult<&'a GroupGlobals> {
    groups.get(group).ok_or_else(|| missing_group(container, group))
}

fn group_of_mut<'a>(groups: &'a mut BTreeMap<String, GroupGlobals>, container: &Path, group: &str) -> StoreResult<&'a mut GroupGlobals> {
    groups.get_mut(group).ok_or_else(|| missing_group(container, group))
}

impl GroupStore for MemoryGroupStore {
    fn new_container(&self, container: &Path) -> StoreResult<()> {
        self.containers.write().insert(container.to_path_buf(), BTreeMap::new());
        Ok(())
    }

    fn list_groups(&self, container: &Path) -> StoreResult<Vec<String>> {
        self.with_container(container, |groups| Ok(groups.keys().cloned().collect()))
    }

    fn read_globals(&self, container: &Path, group: &str) -> StoreResult<GroupGlobals> {
        self.with_container(container, |groups| group_of(groups, container, group).cloned())
    }

    fn new_group(&self, container: &Path, group: &str) -> StoreResult<()> {
        if !is_valid_group_name(group) {
            return Err(StoreError::InvalidGroupName(group.to_string()));
        }
        self.with_container_mut(container, |groups| {
            if groups.contains_key(group) {
                return Err(StoreError::GroupExists {
                    container: container.to_path_buf(),
                    group: group.to_string(),
                });
            }
            groups.insert(group.to_string(), GroupGlobals::new());
            Ok(())
        })
    }

    fn copy_group(&self, source: &Path, group: &str, dest: &Path, delete_source: bool) -> StoreResult<String> {
        let mut containers = self.containers.write();
        let globals = containers
            .get(source)
            .ok_or_else(|| StoreError::ContainerNotFound(source.to_path_buf()))
            .and_then(|groups| group_of(groups, source, group).cloned())?;
        let target = containers.get_mut(dest).ok_or_else(|| StoreError::ContainerNotFound(dest.to_path_buf()))?;
        let name = copy_name(group, delete_source, |n| target.contains_key(n));
        target.insert(name.clone(), globals);
        if delete_source {
            if let Some(groups) = containers.get_mut(source) {
                groups.remove(group);
            }
        }
        Ok(name)
    }

    fn rename_group(&self, container: &Path, old: &str, new: &str) -> StoreResult<()> {
        if old == new {
            return Ok(());
        }
        if !is_valid_group_name(new) {
            return Err(StoreError::InvalidGroupName(new.to_string()));
        }
        self.with_container_mut(container, |groups| {
            if groups.contains_key(new) {
                return Err(StoreError::GroupExists {
                    container: container.to_path_buf(),
                    group: new.to_string(),
                });
            }
            let globals = groups.remove(old).ok_or_else(|| missing_group(container, old))?;
            groups.insert(new.to_string(), globals);
            Ok(())
        })
    }

    fn delete_group(&self, container: &Path, group: &str) -> StoreResult<()> {
        self.with_container_mut(container, |groups| groups.remove(group).map(|_| ()).ok_or_else(|| missing_group(container, group)))
    }

    fn new_global(&self, container: &Path, group: &str, name: &str) -> StoreResult<()> {
        if !is_valid_global_name(name) {
            return Err(StoreError::InvalidGlobalName(name.to_string()));
        }
        self.with_container_mut(container, |groups| {
            let globals = group_of_mut(groups, container, group)?;
            if globals.contains_key(name) {
                return Err(StoreError::GlobalExists {
                    group: group.to_string(),
                    name: name.to_string(),
                });
            }
            globals.insert(name.to_string(), GlobalSpec::default());
            Ok(())
        })
    }

    fn rename_global(&self, container: &Path, group: &str, old: &str, new: &str) -> StoreResult<()> {
        if old == new {
            return Ok(());
        }
        if !is_valid_global_name(new) {
            return Err(StoreError::InvalidGlobalName(new.to_string()));
        }
        self.with_container_mut(container, |groups| {
            let globals = group_of_mut(groups, container, group)?;
            if globals.contains_key(new) {
                return Err(StoreError::GlobalExists {
                    group: group.to_string(),
                    name: new.to_string(),
                });
            }
            let spec = globals.remove(old).ok_or_else(|| missing_global(group, old))?;
            globals.insert(new.to_string(), spec);
            Ok(())
        })
    }

    fn delete_global(&self, container: &Path, group: &str, name: &str) -> StoreResult<()> {
        self.with_container_mut(container, |groups| {
            group_of_mut(groups, container, group)?.remove(name).map(|_| ()).ok_or_else(|| missing_global(group, name))
        })
    }

    fn get_value(&self, container: &Path, group: &str, name: &str) -> StoreResult<String> {
        self.with_global(container, group, name, |spec| spec.expression.clone())
    }

    fn set_value(&self, container: &Path, group: &str, name: &str, value: &str) -> StoreResult<()> {
        self.with_global_mut(container, group, name, |spec| spec.expression = value.to_string())
    }

    fn get_units(&self, container: &Path, group: &str, name: &str) -> StoreResult<String> {
        self.with_global(container, group, name, |spec| spec.units.clone())
    }

    fn set_units(&self, container: &Path, group: &str, name: &str, units: &str) -> StoreResult<()> {
        self.with_global_mut(container, group, name, |spec| spec.units = units.to_string())
    }

    fn get_expansion(&self, container: &Path, group: &str, name: &str) -> StoreResult<String> {
        self.with_global(container, group, name, |spec| spec.expansion.clone())
    }

    fn set_expansion(&self, container: &Path, group: &str, name: &str, expansion: &str) -> StoreResult<()> {
        self.with_global_mut(container, group, name, |spec| spec.expansion = expansion.to_string())
    }
}
