//! Error types for hook registration, script loading and configuration.
//!
//! Callback faults raised while a hook runs are not errors here; they are
//! reported through [`crate::hooks::FaultReporter`] and never propagate.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("invalid {family} event key: {detail}")]
    InvalidKey {
        family: &'static str,
        detail: String,
    },

    #[error("opcode {0} is not a valid message type")]
    InvalidOpcode(u32),

    #[error("packet 0x{opcode:03X}: read of {needed} bytes at offset {offset} exceeds size {size}")]
    PacketUnderflow {
        opcode: u16,
        needed: usize,
        offset: usize,
        size: usize,
    },

    #[error("failed to write packet data: {0}")]
    PacketWrite(#[source] std::io::Error),

    #[error("lua error: {0}")]
    Script(#[from] mlua::Error),

    #[error("failed to load script '{name}': {source}")]
    ScriptLoad {
        name: String,
        #[source]
        source: mlua::Error,
    },

    #[error("invalid script pattern '{pattern}': {source}")]
    ScriptPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to scan script directory: {0}")]
    ScriptScan(#[from] walkdir::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot reload scripts while a hook dispatch is in progress")]
    ReloadInDispatch,
}

pub type Result<T> = std::result::Result<T, HookError>;

impl HookError {
    pub(crate) fn invalid_key(family: &'static str, detail: impl Into<String>) -> Self {
        HookError::InvalidKey {
            family,
            detail: detail.into(),
        }
    }
}
