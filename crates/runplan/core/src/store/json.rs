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

//! Globals containers stored as JSON files

use super::{GroupStore, copy_name};
use crate::error::{StoreError, StoreResult};
use crate::globals::{GlobalSpec, GroupGlobals, is_valid_global_name, is_valid_group_name};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// On-disk layout of a globals file
#[derive(Debug, Default, Serialize, Deserialize)]
struct GlobalsDocument {
    #[serde(default)]
    globals: BTreeMap<String, GroupGlobals>,
}

impl GlobalsDocument {
    fn group(&self, container: &Path, group: &str) -> StoreResult<&GroupGlobals> {
        self.globals.get(group).ok_or_else(|| StoreError::GroupNotFound {
            container: container.to_path_buf(),
            group: group.to_string(),
        })
    }

    fn group_mut(&mut self, container: &Path, group: &str) -> StoreResult<&mut GroupGlobals> {
        self.globals.get_mut(group).ok_or_else(|| StoreError::GroupNotFound {
            container: container.to_path_buf(),
            group: group.to_string(),
        })
    }

    fn global_mut(&mut self, container: &Path, group: &str, name: &str) -> StoreResult<&mut GlobalSpec> {
        self.group_mut(container, group)?.get_mut(name).ok_or_else(|| StoreError::GlobalNotFound {
            group: group.to_string(),
            name: name.to_string(),
        })
    }

    fn global(&self, container: &Path, group: &str, name: &str) -> StoreResult<&GlobalSpec> {
        self.group(container, group)?.get(name).ok_or_else(|| StoreError::GlobalNotFound {
            group: group.to_string(),
            name: name.to_string(),
        })
    }
}

/// Group store backed by one JSON file per container.
///
/// Writes replace the file atomically. A process-wide mutex serializes
/// read-modify-write cycles.
#[derive(Debug, Default)]
pub struct JsonGroupStore {
    lock: Mutex<()>,
}

impl JsonGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(container: &Path) -> StoreResult<GlobalsDocument> {
        let data = match fs::read(container) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::ContainerNotFound(container.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    fn save(container: &Path, document: &GlobalsDocument) -> StoreResult<()> {
        if let Some(parent) = container.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_vec_pretty(document)?;
        let staging = container.with_extension("json.tmp");
        fs::write(&staging, serialized)?;
        fs::rename(&staging, container)?;
        trace!(path = %container.display(), "saved globals file");
        Ok(())
    }

    fn read<T>(&self, container: &Path, f: impl FnOnce(&GlobalsDocument) -> StoreResult<T>) -> StoreResult<T> {
        let _guard = self.lock.lock();
        f(&Self::load(container)?)
    }

    fn modify<T>(&self, container: &Path, f: impl FnOnce(&mut GlobalsDocument) -> StoreResult<T>) -> StoreResult<T> {
        let _guard = self.lock.lock();
        let mut document = Self::load(container)?;
        let result = f(&mut document)?;
        Self::save(container, &document)?;
        Ok(result)
    }
}

impl GroupStore for JsonGroupStore {
    fn new_container(&self, container: &Path) -> StoreResult<()> {
        let _guard = self.lock.lock();
        debug!(path = %container.display(), "creating globals file");
        Self::save(container, &GlobalsDocument::default())
    }

    fn list_groups(&self, container: &Path) -> StoreResult<Vec<String>> {
        self.read(container, |doc| Ok(doc.globals.keys().cloned().collect()))
    }

    fn read_globals(&self, container: &Path, group: &str) -> StoreResult<GroupGlobals> {
        self.read(container, |doc| doc.group(container, group).cloned())
    }

    fn new_group(&self, container: &Path, group: &str) -> StoreResult<()> {
        if !is_valid_group_name(group) {
            return Err(StoreError::InvalidGroupName(group.to_string()));
        }
        self.modify(container, |doc| {
            if doc.globals.contains_key(group) {
                return Err(StoreError::GroupExists {
                    container: container.to_path_buf(),
                    group: group.to_string(),
                });
            }
            doc.globals.insert(group.to_string(), GroupGlobals::new());
            Ok(())
        })
    }

    fn copy_group(&self, source: &Path, group: &str, dest: &Path, delete_source: bool) -> StoreResult<String> {
        if source == dest {
            return self.modify(source, |doc| {
                let globals = doc.group(source, group)?.clone();
                let name = copy_name(group, delete_source, |n| doc.globals.contains_key(n));
                if delete_source {
                    doc.globals.remove(group);
                }
                doc.globals.insert(name.clone(), globals);
                Ok(name)
            });
        }
        let globals = self.read(source, |doc| doc.group(source, group).cloned())?;
        let name = self.modify(dest, |doc| {
            let name = copy_name(group, delete_source, |n| doc.globals.contains_key(n));
            doc.globals.insert(name.clone(), globals);
            Ok(name)
        })?;
        if delete_source {
            self.delete_group(source, group)?;
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
        self.modify(container, |doc| {
            if doc.globals.contains_key(new) {
                return Err(StoreError::GroupExists {
                    container: container.to_path_buf(),
                    group: new.to_string(),
                });
            }
            let globals = doc.globals.remove(old).ok_or_else(|| StoreError::GroupNotFound {
                container: container.to_path_buf(),
                group: old.to_string(),
            })?;
            doc.globals.insert(new.to_string(), globals);
            Ok(())
        })
    }

    fn delete_group(&self, container: &Path, group: &str) -> StoreResult<()> {
        self.modify(container, |doc| {
            doc.globals.remove(group).map(|_| ()).ok_or_else(|| StoreError::GroupNotFound {
                container: container.to_path_buf(),
                group: group.to_string(),
            })
        })
    }

    fn new_global(&self, container: &Path, group: &str, name: &str) -> StoreResult<()> {
        if !is_valid_global_name(name) {
            return Err(StoreError::InvalidGlobalName(name.to_string()));
        }
        self.modify(container, |doc| {
            let globals = doc.group_mut(container, group)?;
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
        self.modify(container, |doc| {
            let globals = doc.group_mut(container, group)?;
            if globals.contains_key(new) {
                return Err(StoreError::GlobalExists {
                    group: group.to_string(),
                    name: new.to_string(),
                });
            }
            let spec = globals.remove(old).ok_or_else(|| StoreError::GlobalNotFound {
                group: group.to_string(),
                name: old.to_string(),
            })?;
            globals.insert(new.to_string(), spec);
            Ok(())
        })
    }

    fn delete_global(&self, container: &Path, group: &str, name: &str) -> StoreResult<()> {
        self.modify(container, |doc| {
            doc.group_mut(container, group)?.remove(name).map(|_| ()).ok_or_else(|| StoreError::GlobalNotFound {
                group: group.to_string(),
                name: name.to_string(),
            })
        })
    }

    fn get_value(&self, container: &Path, group: &str, name: &str) -> StoreResult<String> {
        self.read(container, |doc| Ok(doc.global(container, group, name)?.expression.clone()))
    }

    fn set_value(&self, container: &Path, group: &str, name: &str, value: &str) -> StoreResult<()> {
        self.modify(container, |doc| {
            doc.global_mut(container, group, name)?.expression = value.to_string();
            Ok(())
        })
    }

    fn get_units(&self, container: &Path, group: &str, name: &str) -> StoreResult<String> {
        self.read(container, |doc| Ok(doc.global(container, group, name)?.units.clone()))
    }

    fn set_units(&self, container: &Path, group: &str, name: &str, units: &str) -> StoreResult<()> {
        self.modify(container, |doc| {
            doc.global_mut(container, group, name)?.units = units.to_string();
            Ok(())
        })
    }

    fn get_expansion(&self, container: &Path, group: &str, name: &str) -> StoreResult<String> {
        self.read(container, |doc| Ok(doc.global(container, group, name)?.expansion.clone()))
    }

    fn set_expansion(&self, container: &Path, group: &str, name: &str, expansion: &str) -> StoreResult<()> {
        debug!(group, name, expansion, "setting expansion");
        self.modify(container, |doc| {
            doc.global_mut(container, group, name)?.expansion = expansion.to_string();
            Ok(())
        })
    }
}
