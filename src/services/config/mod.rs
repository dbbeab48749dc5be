//! Store configuration, read from and written to a JSON file.

pub mod models;

pub use models::*;

use crate::types::{AssetError, AssetResult};
use std::fs;
use std::path::Path;

impl StoreConfig {
    pub fn from_json_str(json: &str) -> AssetResult<Self> {
        serde_json::from_str(json).map_err(|e| AssetError::Config(format!("Invalid config: {e}")))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> AssetResult<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| AssetError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Write as pretty JSON through a temp file so readers never see a half-written config.
    pub fn save(&self, path: &Path) -> AssetResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AssetError::Config(format!("Failed to serialize config: {e}")))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| AssetError::Config(format!("Failed to create config dir: {e}")))?;
            }
        }

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .map_err(|e| AssetError::Config(format!("Failed to write config: {e}")))?;
        fs::rename(&tmp_path, path)
            .map_err(|e| AssetError::Config(format!("Failed to replace config: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
