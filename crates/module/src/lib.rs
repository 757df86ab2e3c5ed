//! Watcher module binding for Dirsentry
//!
//! This crate provides:
//! - The `WatcherModule` capability interface (start, stop, set callback, unload)
//! - Module sources (built-in, shared library on disk, embedded payload)
//! - The `ModuleBinder` that resolves a source once into a tagged handle
//! - A `notify`-backed built-in module for hosts without a native library

pub mod binder;
pub mod callback;
pub mod dylib;
pub mod error;
pub mod native;
pub mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;

// Re-exports
pub use binder::{LoadState, ModuleBinder, ModuleHandle};
pub use dylib::DylibModule;
pub use error::{BindError, ModuleError};
pub use native::{BuiltinOptions, NativeModule};
pub use source::ModuleSource;

/// Callback invoked once per detected change, from the module's own thread
pub type ChangeCallback = Arc<dyn Fn(PathBuf) + Send + Sync>;

/// Capabilities every watcher module exposes once bound
///
/// Modules support a single concurrent watch. Callers are expected to
/// `stop` before starting on another path and before `unload`.
pub trait WatcherModule: Send {
    /// Human readable module name (used in logs)
    fn name(&self) -> &str;

    /// Begin watching `path`
    fn start(&mut self, path: &Path) -> Result<(), ModuleError>;

    /// Stop any active watch. Safe to call when idle.
    fn stop(&mut self) -> Result<(), ModuleError>;

    /// Install the process-wide change callback, replacing any previous one
    ///
    /// Returns `ModuleError::CallbackUnavailable` when the module cannot
    /// report changes back to the host.
    fn set_callback(&mut self, callback: ChangeCallback) -> Result<(), ModuleError>;

    /// Release module resources. Further calls are no-ops.
    fn unload(&mut self) -> Result<(), ModuleError>;
}
