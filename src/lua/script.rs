//! Script discovery and loading.
//!
//! Scripts are plain Lua chunks. Running one registers its callbacks through
//! the `Register*Event` globals; nothing is returned to the host.

use std::path::{Path, PathBuf};

use glob::Pattern;
use mlua::Lua;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{HookError, Result};

/// A script read from disk or supplied inline.
#[derive(Debug, Clone)]
pub struct Script {
    name: String,
    source: String,
}

impl Script {
    /// Load a script from a file, naming it relative to `root`.
    pub fn from_file(root: &Path, path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| HookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        Ok(Self { name, source })
    }

    pub fn from_source(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Execute the script's top-level chunk.
    pub fn run(&self, lua: &Lua) -> Result<()> {
        lua.load(self.source.as_str())
            .set_name(format!("@{}", self.name))
            .exec()
            .map_err(|source| HookError::ScriptLoad {
                name: self.name.clone(),
                source,
            })
    }
}

/// Every script under a directory, in a stable load order.
#[derive(Debug, Clone, Default)]
pub struct ScriptSet {
    root: PathBuf,
    scripts: Vec<Script>,
}

impl ScriptSet {
    /// Collect files under `root` whose file name matches `pattern`, sorted by
    /// path. A missing directory yields an empty set.
    pub fn discover(root: &Path, pattern: &str) -> Result<Self> {
        let matcher = Pattern::new(pattern).map_err(|source| HookError::ScriptPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let mut paths = Vec::new();
        if root.is_dir() {
            for entry in WalkDir::new(root).follow_links(true) {
                let entry = entry?;
                if entry.file_type().is_file()
                    && matcher.matches(&entry.file_name().to_string_lossy())
                {
                    paths.push(entry.into_path());
                }
            }
        }
        paths.sort();

        let scripts = paths
            .iter()
            .map(|path| Script::from_file(root, path))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root: root.to_path_buf(),
            scripts,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// SHA-256 over names and sources; changes whenever any script does.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for script in &self.scripts {
            hasher.update(script.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(script.source.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}
