//! Watch session manager
//!
//! Owns the module binder and the single process-wide watch session.
//! All methods run on the presentation thread; the module's own callback
//! thread never touches this state.
//!
//! Lifecycle: `Idle -> Starting -> Active -> Stopping -> Idle`. A failed
//! start falls straight back to `Idle`.

use crate::error::SessionError;
use crate::event::Generation;
use crate::Result;
use chrono::{DateTime, Utc};
use module::{BindError, ModuleBinder, ModuleError};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Currently configured watch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSession {
    /// Watched directory; empty when nothing is being watched
    path: PathBuf,
    active: bool,
    started_at: Option<DateTime<Utc>>,
}

impl WatchSession {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    fn activate(&mut self, path: &Path) {
        self.path = path.to_path_buf();
        self.active = true;
        self.started_at = Some(Utc::now());
    }

    fn deactivate(&mut self) {
        self.path = PathBuf::new();
        self.active = false;
        self.started_at = None;
    }
}

/// Observable lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Starting,
    Active,
    Stopping,
}

/// Start/stop/reconfigure protocol over the bound watcher module
pub struct SessionManager {
    binder: ModuleBinder,
    session: WatchSession,
    phase: SessionPhase,
    generation: Generation,
    torn_down: bool,
}

impl SessionManager {
    pub fn new(binder: ModuleBinder) -> Self {
        Self {
            binder,
            session: WatchSession::default(),
            phase: SessionPhase::Idle,
            generation: Generation::default(),
            torn_down: false,
        }
    }

    /// Share the relay's generation so events queued before a stop are
    /// recognisable as belonging to the old watch
    pub fn with_generation(mut self, generation: Generation) -> Self {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation.current()
    }

    pub fn session(&self) -> &WatchSession {
        &self.session
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.session.active
    }

    pub fn is_bound(&self) -> bool {
        self.binder.is_loaded()
    }

    /// Why the module could not be bound, if it could not
    pub fn bind_failure(&self) -> Option<&BindError> {
        self.binder.failure()
    }

    pub fn binder(&self) -> &ModuleBinder {
        &self.binder
    }

    /// Stop any active watch, then watch `path`
    ///
    /// If the module rejects `path` after an old watch was stopped, the old
    /// watch is restarted once. `SessionError::StartRejected::restored` says
    /// whether that worked; if not, the session is left idle.
    pub fn configure(&mut self, path: impl AsRef<Path>) -> Result<&WatchSession> {
        let path = path.as_ref();
        if !self.binder.is_loaded() {
            return Err(SessionError::NotBound);
        }
        validate_dir(path)?;

        let previous = self.session.active.then(|| self.session.path.clone());
        self.stop()?;

        if let Err(reason) = self.start_module(path) {
            let restored = previous.and_then(|old| self.roll_back(&old));
            if restored.is_none() {
                error!(
                    "Watcher module rejected {}; no directory is being watched",
                    path.display()
                );
            }
            return Err(SessionError::StartRejected {
                path: path.to_path_buf(),
                reason,
                restored,
            });
        }

        Ok(&self.session)
    }

    /// Start watching `path` from idle
    ///
    /// Refuses to start while another watch is active; use `configure` to
    /// switch directories.
    pub fn start(&mut self, path: impl AsRef<Path>) -> Result<&WatchSession> {
        let path = path.as_ref();
        if !self.binder.is_loaded() {
            return Err(SessionError::NotBound);
        }
        if self.session.active {
            return Err(SessionError::AlreadyActive {
                path: self.session.path.clone(),
            });
        }
        validate_dir(path)?;

        self.start_module(path)
            .map_err(|reason| SessionError::StartRejected {
                path: path.to_path_buf(),
                reason,
                restored: None,
            })?;
        Ok(&self.session)
    }

    /// Stop the active watch. Returns whether one was stopped.
    pub fn stop(&mut self) -> Result<bool> {
        if !self.session.active {
            return Ok(false);
        }

        self.set_phase(SessionPhase::Stopping);
        let result = match self.binder.module_mut() {
            Some(module) => module.stop(),
            None => Err(ModuleError::NotLoaded),
        };

        match result {
            Ok(()) => {
                info!("Stopped watching {}", self.session.path.display());
                self.finish_stop();
                Ok(true)
            }
            Err(ModuleError::NotLoaded) => {
                // Module is gone, so nothing can still be watching
                warn!("Watcher module vanished while {} was active", self.session.path.display());
                self.finish_stop();
                Ok(false)
            }
            Err(reason) => {
                self.set_phase(SessionPhase::Active);
                Err(SessionError::StopFailed {
                    path: self.session.path.clone(),
                    reason,
                })
            }
        }
    }

    /// Stop the session and unload the module
    ///
    /// Never fails and never panics; problems are logged. Later calls do
    /// nothing.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        match panic::catch_unwind(AssertUnwindSafe(|| self.stop())) {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Ignoring error while stopping for shutdown: {}", e),
            Err(_) => warn!("Watcher module panicked while stopping for shutdown"),
        }
        if self.session.active {
            self.finish_stop();
        }
        self.phase = SessionPhase::Idle;

        match panic::catch_unwind(AssertUnwindSafe(|| self.binder.unload())) {
            Ok(Ok(true)) => debug!("Watcher module unloaded"),
            Ok(Ok(false)) => debug!("No watcher module to unload"),
            Ok(Err(e)) => warn!("Ignoring error while unloading watcher module: {}", e),
            Err(_) => warn!("Watcher module panicked while unloading"),
        }
    }

    /// Call the module's start entry point; the session must be idle
    fn start_module(&mut self, path: &Path) -> std::result::Result<(), ModuleError> {
        debug_assert!(!self.session.active, "start without matching stop");

        self.set_phase(SessionPhase::Starting);
        let result = match self.binder.module_mut() {
            Some(module) => module.start(path),
            None => Err(ModuleError::NotLoaded),
        };

        match result {
            Ok(()) => {
                self.session.activate(path);
                self.set_phase(SessionPhase::Active);
                info!("Watching {}", path.display());
                Ok(())
            }
            Err(e) => {
                self.set_phase(SessionPhase::Idle);
                warn!("Watcher module rejected {}: {}", path.display(), e);
                Err(e)
            }
        }
    }

    fn finish_stop(&mut self) {
        self.session.deactivate();
        self.set_phase(SessionPhase::Idle);
        let generation = self.generation.advance();
        debug!("Watch generation {}", generation);
    }

    fn roll_back(&mut self, old: &Path) -> Option<PathBuf> {
        match self.start_module(old) {
            Ok(()) => {
                info!("Restored previous watch on {}", old.display());
                Some(old.to_path_buf())
            }
            Err(e) => {
                error!("Could not restore previous watch on {}: {}", old.display(), e);
                None
            }
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            debug!("Session {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Courtesy check before handing a path to the module
fn validate_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(SessionError::EmptyPath);
    }
    if !path.is_dir() {
        return Err(SessionError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(validate_dir(temp_dir.path()).is_ok());
        assert_eq!(validate_dir(Path::new("")), Err(SessionError::EmptyPath));

        let file = temp_dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(
            validate_dir(&file),
            Err(SessionError::NotADirectory { path: file.clone() })
        );
    }

    #[test]
    fn test_unbound_manager() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = SessionManager::new(ModuleBinder::new());

        assert_eq!(manager.configure(temp_dir.path()).unwrap_err(), SessionError::NotBound);
        assert_eq!(manager.start(temp_dir.path()).unwrap_err(), SessionError::NotBound);
        assert_eq!(manager.stop(), Ok(false));
        assert_eq!(manager.phase(), SessionPhase::Idle);

        manager.teardown();
        manager.teardown();
    }

    #[test]
    fn test_builtin_configure_and_stop() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();

        let mut binder = ModuleBinder::new();
        binder.load(&"builtin".parse().unwrap()).unwrap();
        let mut manager = SessionManager::new(binder);

        manager.configure(first.path()).unwrap();
        assert!(manager.is_active());
        assert_eq!(manager.phase(), SessionPhase::Active);
        assert!(manager.session().started_at().is_some());

        let session = manager.configure(second.path()).unwrap();
        assert_eq!(session.path(), second.path());

        assert_eq!(manager.stop(), Ok(true));
        assert!(!manager.is_active());
        assert_eq!(manager.session().path(), Path::new(""));

        manager.teardown();
        assert!(!manager.is_bound());
        assert_eq!(manager.configure(first.path()).unwrap_err(), SessionError::NotBound);
    }
}
