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

pub mod compile;
pub mod evaluate;
pub mod groups;

use anyhow::{Context as _, Result};
use runplan_core::store::get_all_groups;
use runplan_core::{ActiveGroups, JsonGroupStore, RunplanConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Store and configuration shared by every command
pub struct Context {
    pub store: Arc<JsonGroupStore>,
    pub config: RunplanConfig,
}

impl Context {
    pub fn new(config: RunplanConfig) -> Self {
        Self {
            store: Arc::new(JsonGroupStore::new()),
            config,
        }
    }

    /// Every group in `files`, each mapped to the file holding it
    pub fn active_groups(&self, files: &[PathBuf]) -> Result<ActiveGroups> {
        get_all_groups(self.store.as_ref(), files).context("failed to collect globals groups")
    }
}
