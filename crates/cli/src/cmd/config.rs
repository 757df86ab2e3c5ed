//! Configuration management command
//!
//! Provides CLI interface to view and edit the agent configuration.

use crate::embedded;
use crate::system_config::{self, SystemConfig};
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;

/// List all configuration values
pub fn run_list(config_path: &Path) -> Result<()> {
    let config = system_config::load_from(config_path)?;

    println!("{}", "Dirsentry Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    let mut section = "";
    for key in SystemConfig::keys() {
        let (head, field) = key.split_once('.').unwrap_or(("", key));
        if head != section {
            if !section.is_empty() {
                println!();
            }
            println!("{}", format!("[{}]", head).yellow());
            section = head;
        }

        let value = config.get_key(key)?;
        if value.is_empty() {
            println!("  {} = {}", field.cyan(), "(unset)".dimmed());
        } else {
            println!("  {} = {}", field.cyan(), value);
        }
    }

    println!("\n{}", "Valid Values:".bold());
    println!("  module.source: builtin | <path to shared library>");
    println!("  module.exclude: comma separated directory names");
    println!("  log.level: trace | debug | info | warn | error");

    Ok(())
}

/// Get a single configuration value
pub fn run_get(config_path: &Path, key: &str) -> Result<()> {
    let config = system_config::load_from(config_path)?;
    println!("{}", config.get_key(key)?);
    Ok(())
}

/// Set a configuration value
pub fn run_set(config_path: &Path, key: &str, value: &str) -> Result<()> {
    let mut config = system_config::load_from(config_path)?;
    config.set_key(key, value)?;
    system_config::save_to(config_path, &config)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    if key == "module.source"
        && value.trim().eq_ignore_ascii_case(embedded::KEYWORD)
        && !embedded::is_available()
    {
        println!(
            "{}",
            "Warning: this build carries no embedded module; rebuild with --features embedded-module"
                .yellow()
        );
    }
    if key.starts_with("module.") || key.starts_with("log.") {
        println!("{}", "Note: Restart the agent for changes to take effect".yellow());
    }

    Ok(())
}

/// Show the config file path and optionally create it
pub fn run_path(config_path: &Path, create: bool) -> Result<()> {
    if create && system_config::init_if_missing(config_path)? {
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else {
        println!("{}", config_path.display());
        if !config_path.exists() {
            println!("{}", "File does not exist. Use --create to create it.".yellow());
        }
    }

    Ok(())
}

/// Show example configuration
pub fn run_example() -> Result<()> {
    println!("{}", system_config::example_config());
    Ok(())
}
