//! Terminal presentation shell
//!
//! Stands in for a tray icon: notifications are printed, and menu actions
//! are read one per line from stdin on a helper thread.

use crossbeam_channel::Sender;
use owo_colors::OwoColorize;
use std::io::BufRead;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, warn};
use watcher::Presenter;

/// Menu entries the user can pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// Watch a new directory
    Configure(PathBuf),
    /// Stop watching
    Stop,
    /// Show what is being watched
    Status,
    /// Enable or disable launch at login
    AutoStart(bool),
    Help,
    Exit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseActionError {
    #[error("Unknown action '{0}' (type 'help')")]
    Unknown(String),

    #[error("'configure' needs a directory")]
    MissingPath,

    #[error("'autostart' takes 'on' or 'off'")]
    BadToggle,
}

impl FromStr for MenuAction {
    type Err = ParseActionError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_ascii_lowercase().as_str() {
            "configure" | "watch" => {
                if rest.is_empty() {
                    Err(ParseActionError::MissingPath)
                } else {
                    Ok(MenuAction::Configure(PathBuf::from(rest)))
                }
            }
            "stop" => Ok(MenuAction::Stop),
            "status" => Ok(MenuAction::Status),
            "autostart" => match rest.to_ascii_lowercase().as_str() {
                "on" | "enable" => Ok(MenuAction::AutoStart(true)),
                "off" | "disable" => Ok(MenuAction::AutoStart(false)),
                _ => Err(ParseActionError::BadToggle),
            },
            "help" | "?" => Ok(MenuAction::Help),
            "exit" | "quit" => Ok(MenuAction::Exit),
            other => Err(ParseActionError::Unknown(other.to_string())),
        }
    }
}

pub const MENU_HELP: &str = "\
Actions:
  configure <dir>   watch <dir> (replaces the current watch)
  stop              stop watching
  status            show the current watch
  autostart on|off  launch at login
  exit              stop and quit";

/// Prints notifications to stdout
#[derive(Default)]
pub struct TerminalShell {
    shown: usize,
}

impl TerminalShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notifications shown so far
    pub fn shown(&self) -> usize {
        self.shown
    }
}

impl Presenter for TerminalShell {
    fn show_notification(&mut self, title: &str, body: &str) {
        self.shown += 1;
        let time = chrono::Local::now().format("%H:%M:%S");
        println!("{} {} {}", time.to_string().dimmed(), title.bold().cyan(), body);
    }
}

/// Read menu actions from stdin until EOF
///
/// EOF (for example when launched at login without a terminal) only ends
/// the reader; the agent keeps running.
pub fn spawn_menu_reader(tx: Sender<MenuAction>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("menu-reader".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to read menu input: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<MenuAction>() {
                    Ok(action) => {
                        if tx.send(action).is_err() {
                            break;
                        }
                    }
                    Err(e) => eprintln!("{}", e.to_string().yellow()),
                }
            }
            debug!("Menu input closed");
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actions() {
        assert_eq!(
            "configure /tmp/watch".parse(),
            Ok(MenuAction::Configure(PathBuf::from("/tmp/watch")))
        );
        assert_eq!(
            "watch   /tmp/with space ".parse(),
            Ok(MenuAction::Configure(PathBuf::from("/tmp/with space")))
        );
        assert_eq!("STOP".parse(), Ok(MenuAction::Stop));
        assert_eq!("autostart on".parse(), Ok(MenuAction::AutoStart(true)));
        assert_eq!("autostart disable".parse(), Ok(MenuAction::AutoStart(false)));
        assert_eq!("quit".parse(), Ok(MenuAction::Exit));
        assert_eq!("status".parse(), Ok(MenuAction::Status));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("configure".parse::<MenuAction>(), Err(ParseActionError::MissingPath));
        assert_eq!("autostart maybe".parse::<MenuAction>(), Err(ParseActionError::BadToggle));
        assert_eq!(
            "dance".parse::<MenuAction>(),
            Err(ParseActionError::Unknown("dance".into()))
        );
    }

    #[test]
    fn test_terminal_shell_counts() {
        let mut shell = TerminalShell::new();
        shell.show_notification("Watching", "Now monitoring: /tmp");
        assert_eq!(shell.shown(), 1);
    }
}
