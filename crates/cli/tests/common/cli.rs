//! CLI command execution helpers with automatic timing
//!
//! Wraps the `dirsentry` binary with an isolated config file and lock
//! directory per test.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// CLI command builder with timing
pub struct DsCommand {
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    stdin_data: Option<String>,
}

impl DsCommand {
    /// Command whose config lives in `sandbox/config.toml`
    pub fn new(sandbox: impl AsRef<Path>) -> Self {
        let sandbox = sandbox.as_ref().to_path_buf();
        let mut env = HashMap::new();
        env.insert(
            "DIRSENTRY_CONFIG".to_string(),
            sandbox.join("config.toml").display().to_string(),
        );
        env.insert("RUST_LOG".to_string(), "warn".to_string());

        Self {
            working_dir: sandbox,
            args: Vec::new(),
            env,
            stdin_data: None,
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Provide stdin data
    pub fn stdin(&mut self, data: &str) -> &mut Self {
        self.stdin_data = Some(data.to_string());
        self
    }

    /// Execute command and return result with timing
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();

        let mut command = Command::new(env!("CARGO_BIN_EXE_dirsentry"));
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().context("Failed to spawn command")?;
        if let Some(mut stdin) = child.stdin.take() {
            use std::io::Write;
            if let Some(data) = &self.stdin_data {
                stdin.write_all(data.as_bytes())?;
            }
            // Dropping stdin closes it
        }
        let output = child
            .wait_with_output()
            .context("Failed to wait for command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed with exit code {}:\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }
}

/// Command execution result with timing
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}

/// Macro for convenient command construction
///
/// Usage:
/// ```ignore
/// ds!(dir, "config", "get", "watch.path").assert_success()?;
/// ```
#[macro_export]
macro_rules! ds {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::DsCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
