//! Shared-library watcher modules
//!
//! Entry points are resolved by name once, at open time:
//!
//! | Symbol                   | C signature                          |
//! |--------------------------|--------------------------------------|
//! | `StartListening`         | `void (const char *path)`            |
//! | `StopListening`          | `void (void)`                        |
//! | `SetFileChangedCallback` | `void (void (*cb)(const char *))`    |
//!
//! The callback setter is optional. Strings are UTF-8 and NUL-terminated.

use crate::callback::{self, NativeCallback};
use crate::error::{BindError, ModuleError};
use crate::{ChangeCallback, WatcherModule};
use libloading::Library;
use std::ffi::CString;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const START_SYMBOL: &str = "StartListening";
pub const STOP_SYMBOL: &str = "StopListening";
pub const SET_CALLBACK_SYMBOL: &str = "SetFileChangedCallback";

type StartFn = unsafe extern "C" fn(path: *const c_char);
type StopFn = unsafe extern "C" fn();
type SetCallbackFn = unsafe extern "C" fn(callback: NativeCallback);

/// Function pointers resolved from the library
///
/// Only valid while the owning `Library` is loaded.
#[derive(Clone, Copy)]
struct EntryPoints {
    start: StartFn,
    stop: StopFn,
    set_callback: Option<SetCallbackFn>,
}

/// Watcher module living in a shared library
pub struct DylibModule {
    name: String,
    path: PathBuf,
    entries: Option<EntryPoints>,
    library: Option<Library>,
}

impl DylibModule {
    /// Load the library at `path` and resolve its entry points
    pub fn open(path: &Path) -> Result<Self, BindError> {
        // SAFETY: loading runs the library's initializers; the module file is
        // trusted by configuration.
        let library = unsafe { Library::new(path) }.map_err(|e| BindError::LoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // SAFETY: symbol types follow the module ABI documented above.
        let entries = unsafe {
            EntryPoints {
                start: resolve::<StartFn>(&library, START_SYMBOL)?,
                stop: resolve::<StopFn>(&library, STOP_SYMBOL)?,
                set_callback: resolve::<SetCallbackFn>(&library, SET_CALLBACK_SYMBOL).ok(),
            }
        };

        if entries.set_callback.is_none() {
            debug!("{} does not export {}", path.display(), SET_CALLBACK_SYMBOL);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!("Loaded watcher module {}", path.display());

        Ok(Self {
            name,
            path: path.to_path_buf(),
            entries: Some(entries),
            library: Some(library),
        })
    }

    /// Location the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> Result<EntryPoints, ModuleError> {
        self.entries.ok_or(ModuleError::NotLoaded)
    }
}

/// Look up a function symbol by name
unsafe fn resolve<T: Copy>(library: &Library, name: &str) -> Result<T, BindError> {
    let mut symbol = Vec::with_capacity(name.len() + 1);
    symbol.extend_from_slice(name.as_bytes());
    symbol.push(0);

    library
        .get::<T>(&symbol)
        .map(|s| *s)
        .map_err(|_| BindError::EntryPointMissing {
            name: name.to_string(),
        })
}

impl WatcherModule for DylibModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, path: &Path) -> Result<(), ModuleError> {
        let entries = self.entries()?;
        let invalid = || ModuleError::InvalidPath {
            path: path.to_path_buf(),
        };
        let c_path = CString::new(path.to_str().ok_or_else(invalid)?).map_err(|_| invalid())?;

        // SAFETY: library is loaded while entries are present; the string
        // outlives the call.
        unsafe { (entries.start)(c_path.as_ptr()) };
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ModuleError> {
        let entries = self.entries()?;
        // SAFETY: see `start`.
        unsafe { (entries.stop)() };
        Ok(())
    }

    fn set_callback(&mut self, cb: ChangeCallback) -> Result<(), ModuleError> {
        let setter = self
            .entries()?
            .set_callback
            .ok_or(ModuleError::CallbackUnavailable)?;

        callback::install(cb);
        // SAFETY: the trampoline is a plain `extern "C"` function with static
        // lifetime.
        unsafe { setter(callback::trampoline) };
        Ok(())
    }

    fn unload(&mut self) -> Result<(), ModuleError> {
        self.entries = None;
        let Some(library) = self.library.take() else {
            return Ok(());
        };

        callback::clear();
        library.close().map_err(|e| ModuleError::Rejected {
            reason: e.to_string(),
        })?;

        info!("Unloaded watcher module {}", self.path.display());
        Ok(())
    }
}
