//! Host-side command execution.
//!
//! The step never spawns processes itself; it hands a [`CommandSpec`] to a
//! [`CommandRunner`] and classifies whatever comes back.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::RunnerError;
use crate::verdict::CommandStatus;

/// A command to execute on behalf of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Step name, for errors and logs.
    pub step: String,

    /// Command line (first element is the executable).
    pub argv: Vec<String>,

    /// Working directory.
    pub workdir: Option<PathBuf>,

    /// Timeout in seconds; 0 waits forever.
    pub timeout_secs: u64,
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub stdout: String,
    pub stderr: String,
    pub status: CommandStatus,
    pub duration_ms: u64,
}

impl CommandOutcome {
    /// Outcome for output captured elsewhere (e.g. a saved report).
    pub fn captured(stderr: impl Into<String>, status: CommandStatus) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            status,
            duration_ms: 0,
        }
    }
}

/// Executes commands for steps.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome, RunnerError>;
}

/// Runs commands as local subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome, RunnerError> {
        let start = Instant::now();

        let (exe, args) = spec
            .argv
            .split_first()
            .ok_or_else(|| RunnerError::EmptyCommand {
                step: spec.step.clone(),
            })?;

        let mut command = Command::new(exe);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.workdir {
            command.current_dir(dir);
        }

        debug!(step = %spec.step, command = ?spec.argv, "Spawning command");
        let child = command.spawn().map_err(|source| RunnerError::Spawn {
            program: exe.clone(),
            source,
        })?;

        let wait = child.wait_with_output();
        let output = if spec.timeout_secs > 0 {
            tokio::time::timeout(Duration::from_secs(spec.timeout_secs), wait)
                .await
                .map_err(|_| RunnerError::Timeout {
                    step: spec.step.clone(),
                    timeout_secs: spec.timeout_secs,
                })?
        } else {
            wait.await
        }
        .map_err(|source| RunnerError::Wait {
            program: exe.clone(),
            source,
        })?;

        Ok(CommandOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: CommandStatus::from_exit_status(output.status),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
