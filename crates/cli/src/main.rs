//! Dirsentry - background agent that notifies about changes in a directory

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod autostart;
mod cmd;
mod daemon;
mod embedded;
mod locks;
mod logging;
mod shell;
mod system_config;

/// Dirsentry - watch a directory and get notified about changes
#[derive(Parser)]
#[command(name = "dirsentry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: platform config dir, or $DIRSENTRY_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent (default)
    Run {
        /// Directory to watch (overrides the remembered one)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Watcher module: "builtin" or a shared library path
        #[arg(long)]
        module: Option<String>,
        /// Directory for the single-instance lock
        #[arg(long)]
        lock_dir: Option<PathBuf>,
    },
    /// Launch the agent at login
    #[command(subcommand)]
    Autostart(AutostartCommands),
    /// View or edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum AutostartCommands {
    /// Register the agent to start at login
    Enable,
    /// Remove the login registration
    Disable,
    /// Show whether the agent starts at login
    Status,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all values
    List,
    /// Print one value
    Get {
        /// Key, e.g. watch.path
        key: String,
    },
    /// Set one value
    Set {
        key: String,
        value: String,
    },
    /// Show the config file location
    Path {
        /// Create the file with defaults if missing
        #[arg(long)]
        create: bool,
    },
    /// Print an example config file
    Example,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => system_config::config_file_path().context("Could not determine config file path")?,
    };

    match cli.command.unwrap_or(Commands::Run {
        path: None,
        module: None,
        lock_dir: None,
    }) {
        Commands::Run {
            path,
            module,
            lock_dir,
        } => {
            let config = system_config::load_from(&config_path)?;
            let options = daemon::RunOptions {
                path,
                module,
                lock_dir,
            };
            cmd::run::run(options, config, Some(config_path))
        }
        Commands::Autostart(command) => {
            tracing_subscriber::fmt().with_writer(std::io::stderr).init();
            match command {
                AutostartCommands::Enable => cmd::autostart::run_enable(),
                AutostartCommands::Disable => cmd::autostart::run_disable(),
                AutostartCommands::Status => cmd::autostart::run_status(),
            }
        }
        Commands::Config(command) => match command {
            ConfigCommands::List => cmd::config::run_list(&config_path),
            ConfigCommands::Get { key } => cmd::config::run_get(&config_path, &key),
            ConfigCommands::Set { key, value } => cmd::config::run_set(&config_path, &key, &value),
            ConfigCommands::Path { create } => cmd::config::run_path(&config_path, create),
            ConfigCommands::Example => cmd::config::run_example(),
        },
    }
}
