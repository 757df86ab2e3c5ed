//! Shared fixtures for session and relay tests

#![allow(dead_code)]

use module::{ChangeCallback, ModuleBinder, ModuleError, WatcherModule};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A call observed at the module boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start(PathBuf),
    /// `start` was called and refused
    Rejected(PathBuf),
    Stop,
    SetCallback,
    Unload,
}

/// How a boundary call misbehaves
#[derive(Debug, Clone)]
pub enum Fault {
    Fail(ModuleError),
    Panic,
}

/// Test double standing in for a native watcher module
///
/// Records every boundary call and lets the test fire change events from
/// any thread, the way a native worker would.
#[derive(Clone, Default)]
pub struct RecordingModule {
    calls: Arc<Mutex<Vec<Call>>>,
    callback: Arc<Mutex<Option<ChangeCallback>>>,
    rejected: Arc<Mutex<HashSet<PathBuf>>>,
    stop_fault: Arc<Mutex<Option<Fault>>>,
    unload_fault: Arc<Mutex<Option<Fault>>>,
    no_callback_setter: bool,
}

impl RecordingModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Module without a `set_callback` export
    pub fn without_callback_setter() -> Self {
        Self {
            no_callback_setter: true,
            ..Self::default()
        }
    }

    /// Make `start` fail for `path`
    pub fn reject(&self, path: &Path) {
        self.rejected.lock().insert(path.to_path_buf());
    }

    /// Make every later `stop` misbehave, or behave again with `None`
    pub fn fail_stop(&self, fault: Option<Fault>) {
        *self.stop_fault.lock() = fault;
    }

    pub fn fail_unload(&self, fault: Option<Fault>) {
        *self.unload_fault.lock() = fault;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == wanted).count()
    }

    /// Simulate the native side detecting a change
    pub fn fire(&self, path: impl Into<PathBuf>) {
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(path.into());
        }
    }

    /// Binder holding a clone of this module
    pub fn binder(&self) -> ModuleBinder {
        let mut binder = ModuleBinder::new();
        binder
            .bind(Box::new(self.clone()))
            .expect("fresh binder accepts a module");
        binder
    }
}

impl WatcherModule for RecordingModule {
    fn name(&self) -> &str {
        "recording"
    }

    fn start(&mut self, path: &Path) -> Result<(), ModuleError> {
        if self.rejected.lock().contains(path) {
            self.calls.lock().push(Call::Rejected(path.to_path_buf()));
            return Err(ModuleError::Rejected {
                reason: format!("cannot watch {}", path.display()),
            });
        }
        self.calls.lock().push(Call::Start(path.to_path_buf()));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ModuleError> {
        self.calls.lock().push(Call::Stop);
        let fault = self.stop_fault.lock().clone();
        inject(fault)
    }

    fn set_callback(&mut self, callback: ChangeCallback) -> Result<(), ModuleError> {
        if self.no_callback_setter {
            return Err(ModuleError::CallbackUnavailable);
        }
        self.calls.lock().push(Call::SetCallback);
        *self.callback.lock() = Some(callback);
        Ok(())
    }

    fn unload(&mut self) -> Result<(), ModuleError> {
        self.calls.lock().push(Call::Unload);
        *self.callback.lock() = None;
        let fault = self.unload_fault.lock().clone();
        inject(fault)
    }
}

fn inject(fault: Option<Fault>) -> Result<(), ModuleError> {
    match fault {
        None => Ok(()),
        Some(Fault::Fail(e)) => Err(e),
        Some(Fault::Panic) => panic!("watcher module crashed"),
    }
}

/// Checks that no two starts are outstanding without a stop in between
pub fn assert_single_outstanding_start(calls: &[Call]) {
    let mut outstanding = 0usize;
    for call in calls {
        match call {
            Call::Start(_) => {
                outstanding += 1;
                assert!(outstanding <= 1, "overlapping starts in {:?}", calls);
            }
            Call::Stop => outstanding = outstanding.saturating_sub(1),
            _ => {}
        }
    }
}
