//! External command execution with captured output.
//!
//! Git write operations shell out to the installed git binary; everything
//! goes through the [`CommandRunner`] trait so higher layers never touch
//! `std::process` directly and tests can substitute a scripted runner.
//! Captured output and rendered command lines are masked with
//! [`hide_secrets`] before they reach errors or logs.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use log::error;
use thiserror::Error;

/// Failure of an external command, with enough context to diagnose it from
/// logs alone.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process could not be started at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The process ran and exited non-zero.
    #[error("command `{command}` exited with code {code}:\n{output}")]
    Failed {
        command: String,
        code: i32,
        output: String,
    },
}

impl CommandError {
    /// Combined stdout/stderr of the failed command, empty for spawn
    /// failures.
    pub fn output(&self) -> &str {
        match self {
            CommandError::Spawn { .. } => "",
            CommandError::Failed { output, .. } => output,
        }
    }
}

/// Runs external commands in a working directory.
pub trait CommandRunner {
    /// Run `argv` in `cwd` and return the exit code, discarding output.
    fn run(&self, argv: &[&str], cwd: &Path) -> Result<i32, CommandError>;

    /// Run `argv` in `cwd` and return the combined stdout/stderr, failing
    /// with [`CommandError::Failed`] on a non-zero exit. `log_errors`
    /// controls whether the failure is also logged here; callers that
    /// classify failures themselves pass `false`.
    fn run_checked(
        &self,
        argv: &[&str],
        cwd: &Path,
        log_errors: bool,
    ) -> Result<String, CommandError>;
}

/// [`CommandRunner`] that spawns real processes, with interactive prompts
/// disabled.
#[derive(Debug, Default)]
pub struct SystemRunner {
    secrets: Vec<String>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a string to mask in rendered commands and captured output.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    fn spawn(&self, argv: &[&str], cwd: &Path) -> Result<std::process::Output, CommandError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(CommandError::Spawn {
                command: String::new(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            });
        };
        Command::new(program)
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                command: self.render(argv),
                source,
            })
    }

    fn render(&self, argv: &[&str]) -> String {
        hide_secrets(&cmd_to_str(argv), &self.secrets)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[&str], cwd: &Path) -> Result<i32, CommandError> {
        let output = self.spawn(argv, cwd)?;
        Ok(output.status.code().unwrap_or(-1))
    }

    fn run_checked(
        &self,
        argv: &[&str],
        cwd: &Path,
        log_errors: bool,
    ) -> Result<String, CommandError> {
        let output = self.spawn(argv, cwd)?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = hide_secrets(&combined, &self.secrets);
        if output.status.success() {
            return Ok(combined);
        }
        let failure = CommandError::Failed {
            command: self.render(argv),
            code: output.status.code().unwrap_or(-1),
            output: combined,
        };
        if log_errors {
            error!("{failure}");
        }
        Err(failure)
    }
}

/// Replace every occurrence of each secret with a fixed mask.
///
/// Idempotent: masking an already-masked string is a no-op.
pub fn hide_secrets(text: &str, secrets: &[String]) -> String {
    let mut masked = text.to_string();
    for secret in secrets {
        if !secret.is_empty() {
            masked = masked.replace(secret, "***");
        }
    }
    masked
}

/// Render an argv for logs, quoting arguments that contain whitespace.
pub fn cmd_to_str(argv: &[&str]) -> String {
    argv.iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("\"{arg}\"")
            } else {
                (*arg).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
