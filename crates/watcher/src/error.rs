//! Error types for watch session operations

use module::ModuleError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from configuring or stopping a watch session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No watcher module is bound")]
    NotBound,

    #[error("No directory selected")]
    EmptyPath,

    #[error("Not an accessible directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Already watching {}; stop before starting another watch", path.display())]
    AlreadyActive { path: PathBuf },

    #[error("Watcher module rejected {}: {reason}", path.display())]
    StartRejected {
        path: PathBuf,
        reason: ModuleError,
        /// Previous watch that was restarted after the failure, if any
        restored: Option<PathBuf>,
    },

    #[error("Failed to stop watching {}: {reason}", path.display())]
    StopFailed { path: PathBuf, reason: ModuleError },
}

impl SessionError {
    /// True when a failed reconfigure left no watch running
    pub fn left_idle(&self) -> bool {
        matches!(self, SessionError::StartRejected { restored: None, .. })
    }
}
