//! Module binder: resolves a module source once into a tagged handle
//!
//! The handle moves through `Unloaded -> Loaded -> Unloaded`. A failed bind
//! parks it in `BindFailed` for the rest of the process; later loads report
//! the recorded failure instead of retrying.

use crate::dylib::DylibModule;
use crate::error::{BindError, ModuleError};
use crate::native::NativeModule;
use crate::source::ModuleSource;
use crate::{ChangeCallback, WatcherModule};
use tracing::{error, info, warn};

/// Bound module, or the reason there is none
pub enum ModuleHandle {
    Unloaded,
    Loaded(Box<dyn WatcherModule>),
    BindFailed(BindError),
}

/// Tag of a `ModuleHandle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loaded,
    BindFailed,
}

/// Owns the process's watcher module
pub struct ModuleBinder {
    handle: ModuleHandle,
}

impl ModuleBinder {
    pub fn new() -> Self {
        Self {
            handle: ModuleHandle::Unloaded,
        }
    }

    pub fn state(&self) -> LoadState {
        match self.handle {
            ModuleHandle::Unloaded => LoadState::Unloaded,
            ModuleHandle::Loaded(_) => LoadState::Loaded,
            ModuleHandle::BindFailed(_) => LoadState::BindFailed,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == LoadState::Loaded
    }

    /// The recorded bind failure, if binding failed
    pub fn failure(&self) -> Option<&BindError> {
        match &self.handle {
            ModuleHandle::BindFailed(e) => Some(e),
            _ => None,
        }
    }

    /// Materialize and load the module described by `source`
    pub fn load(&mut self, source: &ModuleSource) -> Result<(), BindError> {
        self.check_bindable()?;

        let loaded: Result<Box<dyn WatcherModule>, BindError> = match source.materialize() {
            Ok(Some(path)) => DylibModule::open(&path).map(|m| Box::new(m) as Box<dyn WatcherModule>),
            Ok(None) => {
                let options = source.builtin_options().cloned().unwrap_or_default();
                Ok(Box::new(NativeModule::new(options)))
            }
            Err(e) => Err(e),
        };

        match loaded {
            Ok(module) => {
                info!("Bound watcher module '{}' from {}", module.name(), source);
                self.handle = ModuleHandle::Loaded(module);
                Ok(())
            }
            Err(e) => {
                error!("Failed to bind watcher module from {} ({}): {}", source, e.kind(), e);
                self.handle = ModuleHandle::BindFailed(e.clone());
                Err(e)
            }
        }
    }

    /// Install an already constructed module
    pub fn bind(&mut self, module: Box<dyn WatcherModule>) -> Result<(), BindError> {
        self.check_bindable()?;
        info!("Bound watcher module '{}'", module.name());
        self.handle = ModuleHandle::Loaded(module);
        Ok(())
    }

    fn check_bindable(&self) -> Result<(), BindError> {
        match &self.handle {
            ModuleHandle::Unloaded => Ok(()),
            ModuleHandle::Loaded(_) => Err(BindError::AlreadyLoaded),
            ModuleHandle::BindFailed(e) => Err(e.clone()),
        }
    }

    /// Register the process-wide change callback
    ///
    /// Replaces any earlier callback. Returns `Ok(false)` when the module has
    /// no callback setter; that is logged, not fatal.
    pub fn register_callback(&mut self, callback: ChangeCallback) -> Result<bool, ModuleError> {
        let module = self.module_mut().ok_or(ModuleError::NotLoaded)?;

        match module.set_callback(callback) {
            Ok(()) => Ok(true),
            Err(ModuleError::CallbackUnavailable) => {
                warn!(
                    "Watcher module '{}' cannot report changes; notifications disabled",
                    module.name()
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Borrow the bound module
    pub fn module_mut(&mut self) -> Option<&mut (dyn WatcherModule + 'static)> {
        match &mut self.handle {
            ModuleHandle::Loaded(module) => Some(module.as_mut()),
            _ => None,
        }
    }

    /// Release the module. Returns whether anything was unloaded.
    ///
    /// Callers must stop any active watch first.
    pub fn unload(&mut self) -> Result<bool, ModuleError> {
        if !self.is_loaded() {
            return Ok(false);
        }

        let ModuleHandle::Loaded(mut module) =
            std::mem::replace(&mut self.handle, ModuleHandle::Unloaded)
        else {
            return Ok(false);
        };

        let name = module.name().to_string();
        module.unload()?;
        info!("Released watcher module '{}'", name);
        Ok(true)
    }
}

impl Default for ModuleBinder {
    fn default() -> Self {
        Self::new()
    }
}
