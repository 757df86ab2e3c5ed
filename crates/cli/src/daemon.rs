//! Agent lifecycle
//!
//! Startup: lock, bind module, register relay callback, restore the last
//! watch. Then a single presentation thread services change events, menu
//! actions and the shutdown signal. Shutdown stops the session, unloads the
//! module, and only then releases the presentation side.

use crate::autostart::{self, AutoStart};
use crate::locks::InstanceLock;
use crate::shell::{self, MenuAction, TerminalShell};
use crate::system_config::{self, SystemConfig};
use anyhow::{Context, Result};
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use module::{ModuleBinder, ModuleSource};
use owo_colors::OwoColorize;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use watcher::{NotificationRelay, PresentationQueue, Presenter, SessionError, SessionManager};

/// Options for `dirsentry run`
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Directory to watch instead of the remembered one
    pub path: Option<PathBuf>,
    /// Module source overriding the config file
    pub module: Option<String>,
    /// Directory for the single-instance lock
    pub lock_dir: Option<PathBuf>,
}

/// The running agent: everything owned by the presentation thread
pub struct Agent<P: Presenter> {
    manager: SessionManager,
    queue: PresentationQueue,
    /// Keeps the queue connected even when no module holds a callback
    #[allow(dead_code)]
    relay: NotificationRelay,
    shell: P,
    config: SystemConfig,
    config_path: Option<PathBuf>,
}

impl<P: Presenter> Agent<P> {
    /// Bind the module from `source` and wire its callback to a new relay
    ///
    /// A bind failure is reported once through the shell; the agent still
    /// starts, and every configure attempt then fails with `NotBound`.
    pub fn start(
        source: &ModuleSource,
        mut shell: P,
        config: SystemConfig,
        config_path: Option<PathBuf>,
    ) -> Self {
        let (relay, queue) = NotificationRelay::channel();
        let mut binder = ModuleBinder::new();

        match binder.load(source) {
            Ok(()) => match binder.register_callback(relay.callback()) {
                Ok(true) => {}
                Ok(false) => shell.show_notification(
                    "Notifications unavailable",
                    "The watcher module cannot report changes",
                ),
                Err(e) => warn!("Failed to register change callback: {}", e),
            },
            Err(e) => shell.show_notification("Watcher module unavailable", &e.to_string()),
        }

        Self {
            manager: SessionManager::new(binder).with_generation(relay.generation().clone()),
            queue,
            relay,
            shell,
            config,
            config_path,
        }
    }

    #[cfg(test)]
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    #[cfg(test)]
    pub fn shell(&self) -> &P {
        &self.shell
    }

    /// Relay producers can clone to inject events
    #[cfg(test)]
    pub fn relay(&self) -> &NotificationRelay {
        &self.relay
    }

    /// Resume the remembered watch, or watch `path` if given
    pub fn restore(&mut self, path: Option<PathBuf>) {
        let explicit = path.is_some();
        let target = path.or_else(|| {
            self.config
                .watch
                .restore_on_start
                .then(|| self.config.watch.path.clone())
                .flatten()
        });

        if let Some(target) = target {
            let _ = self.configure(&target);
            if self.manager.is_active() && !explicit {
                info!("Resumed watching {}", target.display());
            }
        }
    }

    /// Handle one menu action
    pub fn handle(&mut self, action: MenuAction) -> ControlFlow<()> {
        match action {
            MenuAction::Configure(path) => self.configure(&path),
            MenuAction::Stop => {
                match self.manager.stop() {
                    Ok(true) => {
                        self.shell.show_notification("Stopped", "No directory is being watched");
                        self.remember(None);
                    }
                    Ok(false) => self.shell.show_notification("Idle", "Nothing to stop"),
                    Err(e) => self.shell.show_notification("Stop failed", &e.to_string()),
                }
                ControlFlow::Continue(())
            }
            MenuAction::Status => {
                let body = self.status_line();
                self.shell.show_notification("Status", &body);
                ControlFlow::Continue(())
            }
            MenuAction::AutoStart(enable) => {
                let result = AutoStart::for_current_exe().and_then(|registrar| {
                    if enable {
                        registrar.enable()?;
                    } else {
                        registrar.disable()?;
                    }
                    autostart::describe(&registrar)
                });
                match result {
                    Ok(line) => self.shell.show_notification("Auto-start", &line),
                    Err(e) => self.shell.show_notification("Auto-start failed", &format!("{:#}", e)),
                }
                ControlFlow::Continue(())
            }
            MenuAction::Help => {
                println!("{}", shell::MENU_HELP);
                ControlFlow::Continue(())
            }
            MenuAction::Exit => ControlFlow::Break(()),
        }
    }

    fn configure(&mut self, path: &Path) -> ControlFlow<()> {
        match self.manager.configure(path) {
            Ok(session) => {
                let body = format!("Now monitoring: {}", session.path().display());
                let watched = session.path().to_path_buf();
                self.shell.show_notification("Watching", &body);
                self.remember(Some(watched));
            }
            Err(SessionError::StartRejected {
                path,
                reason,
                restored,
            }) => {
                let body = match restored {
                    Some(old) => format!(
                        "Could not watch {} ({}). Still watching {}",
                        path.display(),
                        reason,
                        old.display()
                    ),
                    None => format!(
                        "Could not watch {} ({}). No directory is being watched",
                        path.display(),
                        reason
                    ),
                };
                self.shell.show_notification("Watch failed", &body);
            }
            Err(e) => self.shell.show_notification("Watch failed", &e.to_string()),
        }
        ControlFlow::Continue(())
    }

    fn status_line(&self) -> String {
        if let Some(failure) = self.manager.bind_failure() {
            return format!("Watcher module unavailable: {}", failure);
        }
        let session = self.manager.session();
        match session.started_at() {
            Some(since) if session.is_active() => format!(
                "Watching {} since {}",
                session.path().display(),
                since.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
            ),
            _ => "Idle".to_string(),
        }
    }

    /// Persist the watched directory for the next launch
    fn remember(&mut self, path: Option<PathBuf>) {
        if self.config.watch.path == path {
            return;
        }
        self.config.watch.path = path;
        if let Some(config_path) = &self.config_path {
            if let Err(e) = system_config::save_to(config_path, &self.config) {
                warn!("Failed to remember watched directory: {:#}", e);
            }
        }
    }

    /// Present every event already queued
    #[cfg(test)]
    pub fn pump(&mut self) -> usize {
        self.queue.drain_into(&mut self.shell)
    }

    /// Service events and actions until exit or shutdown
    pub fn run_loop(&mut self, actions: &Receiver<MenuAction>, shutdown: &Receiver<()>) {
        let events = self.queue.receiver().clone();
        loop {
            select! {
                recv(events) -> event => {
                    if let Ok(event) = event {
                        self.queue.present(&event, &mut self.shell);
                    }
                }
                recv(actions) -> action => {
                    if let Ok(action) = action {
                        if self.handle(action).is_break() {
                            info!("Exit requested");
                            break;
                        }
                    }
                }
                recv(shutdown) -> _ => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }
    }

    /// Stop, unload, then release the presentation side
    pub fn shutdown(mut self) -> P {
        self.manager.teardown();
        let Agent { queue, shell, .. } = self;
        drop(queue);
        shell
    }
}

/// `dirsentry run`
pub fn run(options: RunOptions, config: SystemConfig, config_path: Option<PathBuf>) -> Result<()> {
    let lock_dir = match options.lock_dir.clone() {
        Some(dir) => dir,
        None => InstanceLock::default_dir().context("Could not determine lock directory")?,
    };
    let lock = InstanceLock::acquire(&lock_dir)?;

    let source = match &options.module {
        Some(text) => {
            let mut overridden = config.clone();
            overridden.module.source = text.clone();
            overridden.module_source()
        }
        None => config.module_source(),
    };
    info!("Starting agent (module: {})", source);

    let mut agent = Agent::start(&source, TerminalShell::new(), config, config_path);
    agent.restore(options.path);

    let (action_tx, action_rx): (Sender<MenuAction>, Receiver<MenuAction>) = unbounded();
    let (shutdown_tx, shutdown_rx) = unbounded();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .context("Failed to install shutdown handler")?;

    shell::spawn_menu_reader(action_tx.clone()).context("Failed to start menu reader")?;
    println!("{}", "Dirsentry is running. Type 'help' for actions.".green());

    agent.run_loop(&action_rx, &shutdown_rx);

    let shell = agent.shutdown();
    info!("Agent stopped after {} notifications", shell.shown());
    drop(action_tx);
    lock.release()?;
    Ok(())
}
