//! Configuration for the hook engine and the `hookline` binary.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{HookError, Result};

/// Settings read from `hookline.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Process-wide dispatch switch; when off every hook is a no-op.
    pub enabled: bool,
    /// Directory scanned for scripts.
    pub script_path: PathBuf,
    /// File name pattern a script must match.
    pub script_pattern: String,
    /// Strip unsafe globals before any script runs.
    pub sandbox: bool,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            script_path: PathBuf::from("lua_scripts"),
            script_pattern: "*.lua".to_string(),
            sandbox: true,
            log_filter: "info".to_string(),
        }
    }
}

impl HookConfig {
    /// Platform config location, e.g. `~/.config/hookline/hookline.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "hookline").map(|dirs| dirs.config_dir().join("hookline.yaml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| HookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| HookError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = serde_yaml::to_string(self)?;
        std::fs::write(path, text).map_err(|source| HookError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
