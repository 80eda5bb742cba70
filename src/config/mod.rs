//! Bridge configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the legacy layout: `processed/` and `results/` under the root, scripts
//! run with `python`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::consts::{
    DEFAULT_GENERIC_SCRIPT, DEFAULT_INTERPRETER, DEFAULT_OBJECTS_SCRIPT,
    DEFAULT_SKIN_DISEASE_SCRIPT, PROCESSED_DIR, RESULTS_DIR, timeout_from_secs,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config path is not a .toml file: {0:?}")]
    NotToml(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Where the generic detector's JSON goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenericResults {
    /// One well-known `results.json` for every call. Concurrent calls race on it.
    #[default]
    Shared,
    /// A fresh `results-<id>.json` per call, passed to the program as a second argument.
    PerRequest,
}

/// Script locations, relative to the bridge root unless absolute.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scripts {
    pub generic: PathBuf,
    pub objects: PathBuf,
    pub skin_disease: PathBuf,
}

impl Default for Scripts {
    fn default() -> Self {
        Self {
            generic: PathBuf::from(DEFAULT_GENERIC_SCRIPT),
            objects: PathBuf::from(DEFAULT_OBJECTS_SCRIPT),
            skin_disease: PathBuf::from(DEFAULT_SKIN_DISEASE_SCRIPT),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub root: PathBuf,
    pub processed_dir: PathBuf,
    pub results_dir: PathBuf,
    /// Program the scripts are handed to. Empty runs the scripts directly.
    pub interpreter: String,
    pub generic_results: GenericResults,
    pub timeout_secs: u64,
    pub scripts: Scripts,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            processed_dir: PathBuf::from(PROCESSED_DIR),
            results_dir: PathBuf::from(RESULTS_DIR),
            interpreter: DEFAULT_INTERPRETER.to_string(),
            generic_results: GenericResults::default(),
            timeout_secs: 0,
            scripts: Scripts::default(),
        }
    }
}

impl BridgeConfig {
    /// Defaults rooted at `root`, with every path resolved.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            root: root.into(),
            ..Self::default()
        };
        config.resolve_paths(Path::new("."));
        config
    }

    /// Parse a TOML config file. A relative `root` is taken relative to the
    /// file's own directory; every other relative path is taken relative to `root`.
    pub fn from_toml(toml_path: &Path) -> Result<Self, ConfigError> {
        if !toml_path.is_file() || toml_path.extension().is_none_or(|ext| ext != "toml") {
            return Err(ConfigError::NotToml(toml_path.to_path_buf()));
        }

        let content = std::fs::read_to_string(toml_path)?;
        let mut config: Self = toml::from_str(&content)?;
        let base = toml_path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if !self.root.is_absolute() {
            self.root = base.join(&self.root);
        }

        let root = self.root.clone();
        for path in [
            &mut self.processed_dir,
            &mut self.results_dir,
            &mut self.scripts.generic,
            &mut self.scripts.objects,
            &mut self.scripts.skin_disease,
        ] {
            if !path.is_absolute() {
                *path = root.join(&*path);
            }
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.timeout_secs)
    }

    pub fn interpreter(&self) -> Option<&str> {
        let trimmed = self.interpreter.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}
