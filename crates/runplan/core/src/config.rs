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

use crate::error::{ConfigError, ConfigResult};
use crate::expansion::ExpansionConfig;
use runplan_expr::DEFAULT_MAX_ITERATOR_LENGTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "RUNPLAN_CONFIG";
/// Environment variable overriding the shot storage root
pub const SHOT_STORAGE_ENV: &str = "RUNPLAN_SHOT_STORAGE";

pub const DEFAULT_OUTPUT_FOLDER_FORMAT: &str = "%Y/%m/%d/{sequence_index:05d}";
pub const DEFAULT_FILENAME_PREFIX_FORMAT: &str = "{sequence_timestamp}_{script_basename}";
pub const DEFAULT_MAX_INFERENCE_ROUNDS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunplanConfig {
    /// Root under which sequence output folders are created
    pub experiment_shot_storage: PathBuf,
    /// strftime template with sequence placeholders, relative to the storage root
    pub output_folder_format: String,
    pub filename_prefix_format: String,
    pub max_iterator_length: usize,
    /// Evaluate/infer rounds before the interactive loop gives up converging
    pub max_inference_rounds: usize,
    /// Randomize which shot gets which run number
    pub shuffle_runs: bool,
    pub expansion: ExpansionConfig,
}

impl Default for RunplanConfig {
    fn default() -> Self {
        Self {
            experiment_shot_storage: dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("runplan").join("shots"),
            output_folder_format: DEFAULT_OUTPUT_FOLDER_FORMAT.to_string(),
            filename_prefix_format: DEFAULT_FILENAME_PREFIX_FORMAT.to_string(),
            max_iterator_length: DEFAULT_MAX_ITERATOR_LENGTH,
            max_inference_rounds: DEFAULT_MAX_INFERENCE_ROUNDS,
            shuffle_runs: false,
            expansion: ExpansionConfig::default(),
        }
    }
}

impl RunplanConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// CLI path first, then `RUNPLAN_CONFIG`, then defaults.
    /// `RUNPLAN_SHOT_STORAGE` overrides the storage root in every case.
    pub fn resolve_config(cli_config: Option<PathBuf>) -> ConfigResult<Self> {
        Self::resolve_with(cli_config, |key| std::env::var(key).ok())
    }

    fn resolve_with(cli_config: Option<PathBuf>, env: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Some(env_config) = env(CONFIG_ENV) {
            Self::load_from_file(env_config)?
        } else {
            Self::default()
        };

        if let Some(storage) = env(SHOT_STORAGE_ENV) {
            config.experiment_shot_storage = PathBuf::from(storage);
        }
        Ok(config)
    }
}
