//! Change events reported by the watcher module

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared watch counter, advanced each time a watch stops
///
/// Events carry the value current when they arrived, so the shell can tell
/// changes from a previous watch apart from current ones.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Start a new generation and return it
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// A single detected change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Path that changed
    pub path: PathBuf,
    /// When the host received the event
    pub arrived_at: DateTime<Utc>,
    /// Watch generation at arrival
    pub generation: u64,
}

impl ChangeEvent {
    pub const TITLE: &'static str = "File Change Detected";

    /// Stamp a path with the current time
    pub fn new(path: PathBuf) -> Self {
        Self::stamped(path, 0)
    }

    pub fn stamped(path: PathBuf, generation: u64) -> Self {
        Self {
            path,
            arrived_at: Utc::now(),
            generation,
        }
    }

    /// Notification body for this event
    pub fn body(&self) -> String {
        format!("Change in: {}", self.path.display())
    }

    /// Body for an event that arrived before the current watch began
    pub fn stale_body(&self) -> String {
        format!("Change in: {} (previous watch)", self.path.display())
    }
}
