//! Run the agent in the foreground

use crate::daemon::{self, RunOptions};
use crate::logging;
use crate::system_config::SystemConfig;
use anyhow::Result;
use std::path::PathBuf;

pub fn run(options: RunOptions, config: SystemConfig, config_path: Option<PathBuf>) -> Result<()> {
    let log_dir = config.log.directory.clone().or_else(logging::default_log_dir);
    // Flushes the rolling log file on drop
    let _guard = logging::init(&config.log.level, log_dir.as_deref())?;

    daemon::run(options, config, config_path)
}
