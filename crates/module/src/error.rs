//! Error types for module binding and module calls

use std::path::PathBuf;
use thiserror::Error;

/// Failure to bind a watcher module at startup
///
/// Once recorded by the binder, a bind failure is permanent for the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Watcher module not found: {}", path.display())]
    ModuleMissing { path: PathBuf },

    #[error("Failed to extract watcher module to {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("Dynamic loader rejected {}: {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },

    #[error("Watcher module does not export required entry point '{name}'")]
    EntryPointMissing { name: String },

    #[error("A watcher module is already loaded")]
    AlreadyLoaded,
}

impl BindError {
    /// Short tag used in logs and user-facing messages
    pub fn kind(&self) -> &'static str {
        match self {
            BindError::ModuleMissing { .. } | BindError::Extraction { .. } => "ModuleMissing",
            BindError::LoadFailed { .. } => "LoadFailed",
            BindError::EntryPointMissing { .. } => "EntryPointMissing",
            BindError::AlreadyLoaded => "AlreadyLoaded",
        }
    }
}

/// Errors reported by a bound module
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Module rejected the request: {reason}")]
    Rejected { reason: String },

    #[error("Path cannot be passed to the module: {}", path.display())]
    InvalidPath { path: PathBuf },

    #[error("Module does not export a change-callback setter")]
    CallbackUnavailable,

    #[error("Module is not loaded")]
    NotLoaded,
}

impl From<notify::Error> for ModuleError {
    fn from(e: notify::Error) -> Self {
        ModuleError::Rejected {
            reason: e.to_string(),
        }
    }
}
