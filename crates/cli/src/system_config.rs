//! Agent configuration file
//!
//! Stored as TOML at `<config dir>/dirsentry/config.toml`. Missing files and
//! missing keys fall back to defaults.

use crate::embedded;
use anyhow::{Context, Result};
use module::{BuiltinOptions, ModuleSource};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "DIRSENTRY_CONFIG";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SystemConfig {
    pub module: ModuleConfig,
    pub watch: WatchConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// `builtin`, `embedded`, or a path to a shared library
    pub source: String,
    /// Builtin backend: watch subdirectories
    pub recursive: bool,
    /// Builtin backend: directory names to ignore
    pub exclude: Vec<String>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        let builtin = BuiltinOptions::default();
        Self {
            source: "builtin".to_string(),
            recursive: builtin.recursive,
            exclude: builtin.exclude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Last directory the user chose to watch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Resume watching `path` when the agent starts
    pub restore_on_start: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: None,
            restore_on_start: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Directory for rolling log files; platform data dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl SystemConfig {
    pub fn validate(&self) -> Result<()> {
        if self.module.source.trim().is_empty() {
            anyhow::bail!("module.source must be 'builtin', 'embedded' or a library path");
        }
        for name in &self.module.exclude {
            if name.is_empty() || name.contains('/') || name.contains('\\') {
                anyhow::bail!("module.exclude entries must be plain directory names, got '{}'", name);
            }
        }
        if !LOG_LEVELS.contains(&self.log.level.as_str()) {
            anyhow::bail!(
                "log.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log.level
            );
        }
        Ok(())
    }

    /// Module source with builtin options applied
    pub fn module_source(&self) -> ModuleSource {
        if self.module.source.trim().eq_ignore_ascii_case(embedded::KEYWORD) {
            return embedded::source();
        }
        match self.module.source.parse::<ModuleSource>() {
            Ok(ModuleSource::Builtin(_)) => ModuleSource::Builtin(BuiltinOptions {
                recursive: self.module.recursive,
                exclude: self.module.exclude.clone(),
            }),
            Ok(other) => other,
            Err(never) => match never {},
        }
    }

    /// Read a single key as text
    pub fn get_key(&self, key: &str) -> Result<String> {
        let value = match key {
            "module.source" => self.module.source.clone(),
            "module.recursive" => self.module.recursive.to_string(),
            "module.exclude" => self.module.exclude.join(","),
            "watch.path" => self
                .watch
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "watch.restore_on_start" => self.watch.restore_on_start.to_string(),
            "log.level" => self.log.level.clone(),
            "log.directory" => self
                .log
                .directory
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'dirsentry config list' to see available keys.",
                key
            ),
        };
        Ok(value)
    }

    /// Set a single key from text, then validate
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "module.source" => self.module.source = value.trim().to_string(),
            "module.recursive" => {
                self.module.recursive = value
                    .parse()
                    .context("Invalid value: must be 'true' or 'false'")?;
            }
            "module.exclude" => {
                self.module.exclude = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
            }
            "watch.path" => self.watch.path = optional_path(value),
            "watch.restore_on_start" => {
                self.watch.restore_on_start = value
                    .parse()
                    .context("Invalid value: must be 'true' or 'false'")?;
            }
            "log.level" => self.log.level = value.trim().to_ascii_lowercase(),
            "log.directory" => self.log.directory = optional_path(value),
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'dirsentry config list' to see available keys.",
                key
            ),
        }
        self.validate().context("Invalid configuration value")
    }

    /// All keys in display order
    pub fn keys() -> &'static [&'static str] {
        &[
            "module.source",
            "module.recursive",
            "module.exclude",
            "watch.path",
            "watch.restore_on_start",
            "log.level",
            "log.directory",
        ]
    }
}

fn optional_path(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

/// Location of the config file
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("dirsentry").join("config.toml"))
}

/// Load config from `path`, using defaults when the file does not exist
pub fn load_from(path: &Path) -> Result<SystemConfig> {
    if !path.exists() {
        return Ok(SystemConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SystemConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Validate and write config to `path`
pub fn save_to(path: &Path, config: &SystemConfig) -> Result<()> {
    config.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}

/// Write the default config if none exists. Returns whether it was created.
pub fn init_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_to(path, &SystemConfig::default())?;
    Ok(true)
}

pub fn example_config() -> &'static str {
    r#"# Dirsentry configuration

[module]
# "builtin" uses the in-process watcher, "embedded" the library packaged
# into this binary; otherwise a path to a shared library exporting
# StartListening / StopListening / SetFileChangedCallback
source = "builtin"
recursive = true
exclude = [".git", "target", "node_modules"]

[watch]
# path = "/home/me/Downloads"
restore_on_start = true

[log]
level = "info"
# directory = "/var/tmp/dirsentry-logs"
"#
}
