//! Built-in watcher module backed by `notify`
//!
//! Runs in-process, but honours the same contract as a native library:
//! events are reported from the notify worker thread through the
//! registered callback, one call per affected path.

use crate::error::ModuleError;
use crate::{ChangeCallback, WatcherModule};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for the built-in backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinOptions {
    /// Watch subdirectories too
    pub recursive: bool,
    /// Directory names whose events are never reported
    pub exclude: Vec<String>,
}

impl Default for BuiltinOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            exclude: vec![".git".into(), "target".into(), "node_modules".into()],
        }
    }
}

type CallbackSlot = Arc<RwLock<Option<ChangeCallback>>>;

/// In-process watcher module
pub struct NativeModule {
    options: BuiltinOptions,
    callback: CallbackSlot,
    watcher: Option<RecommendedWatcher>,
    watched: Option<PathBuf>,
    unloaded: bool,
}

impl NativeModule {
    pub fn new(options: BuiltinOptions) -> Self {
        Self {
            options,
            callback: Arc::new(RwLock::new(None)),
            watcher: None,
            watched: None,
            unloaded: false,
        }
    }

    /// Path currently being watched, if any
    pub fn watched(&self) -> Option<&Path> {
        self.watched.as_deref()
    }
}

impl WatcherModule for NativeModule {
    fn name(&self) -> &str {
        "builtin"
    }

    fn start(&mut self, path: &Path) -> Result<(), ModuleError> {
        if self.unloaded {
            return Err(ModuleError::NotLoaded);
        }

        // A new start replaces the previous watch
        if self.watcher.take().is_some() {
            debug!("Replacing active builtin watch");
        }
        self.watched = None;

        let slot = self.callback.clone();
        let exclude = self.options.exclude.clone();
        // Backends may report canonical paths, so keep both spellings of the root
        let roots = watch_roots(path);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => forward(&slot, &roots, &exclude, event),
            Err(e) => warn!("Builtin watcher error: {}", e),
        })?;

        let mode = if self.options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(path, mode)?;

        info!("Builtin watcher started on {} ({:?})", path.display(), mode);
        self.watcher = Some(watcher);
        self.watched = Some(path.to_path_buf());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ModuleError> {
        // Dropping the watcher shuts down its worker
        if self.watcher.take().is_some() {
            info!("Builtin watcher stopped");
        }
        self.watched = None;
        Ok(())
    }

    fn set_callback(&mut self, cb: ChangeCallback) -> Result<(), ModuleError> {
        *self.callback.write() = Some(cb);
        Ok(())
    }

    fn unload(&mut self) -> Result<(), ModuleError> {
        self.watcher = None;
        self.watched = None;
        *self.callback.write() = None;
        self.unloaded = true;
        Ok(())
    }
}

fn watch_roots(path: &Path) -> Vec<PathBuf> {
    let mut roots = vec![path.to_path_buf()];
    if let Ok(canonical) = path.canonicalize() {
        if canonical != path {
            roots.push(canonical);
        }
    }
    roots
}

/// Report every non-excluded path touched by `event`
fn forward(slot: &CallbackSlot, roots: &[PathBuf], exclude: &[String], event: Event) {
    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }

    let callback = slot.read().clone();
    let Some(callback) = callback else {
        return;
    };

    for path in event.paths {
        if !is_excluded(&path, roots, exclude) {
            callback(path);
        }
    }
}

/// Only components below the watched root are matched against `exclude`
fn is_excluded(path: &Path, roots: &[PathBuf], exclude: &[String]) -> bool {
    let relative = roots
        .iter()
        .find_map(|root| path.strip_prefix(root).ok())
        .unwrap_or(path);

    relative.components().any(|component| match component {
        Component::Normal(name) => exclude.iter().any(|e| name == e.as_str()),
        _ => false,
    })
}
