//! Optional TOML config supplying run defaults.
//!
//! Everything here can also come from CLI flags; flags win.

use crate::source::SyncError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    /// Path to the newline-delimited symbol registry.
    pub registry: Option<PathBuf>,
    /// Directory holding one CSV artifact per symbol.
    pub data_dir: Option<PathBuf>,
    /// Worker pool size; 0 or absent means available parallelism.
    pub workers: Option<usize>,
    /// Run the reconciliation pass after the primary pass.
    pub reconcile: Option<bool>,
}

impl SyncConfig {
    pub fn from_file(path: &Path) -> Result<Self, SyncError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, SyncError> {
        toml::from_str(contents).map_err(|e| SyncError::Config(format!("parse: {e}")))
    }
}
