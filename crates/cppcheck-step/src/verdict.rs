//! Build outcome classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How the analysis command terminated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// Exited normally with this code.
    Exited(i32),

    /// Killed by a signal, timed out or never started.
    Abnormal,
}

impl CommandStatus {
    /// Map a process exit status; no exit code means a signal ended it.
    pub fn from_exit_status(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => CommandStatus::Exited(code),
            None => CommandStatus::Abnormal,
        }
    }

    /// Whether the command failed (non-zero or abnormal).
    pub fn did_fail(&self) -> bool {
        !matches!(self, CommandStatus::Exited(0))
    }

    /// Exit code, if the command exited normally.
    pub fn code(&self) -> Option<i32> {
        match self {
            CommandStatus::Exited(code) => Some(*code),
            CommandStatus::Abnormal => None,
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Exited(code) => write!(f, "exit code {}", code),
            CommandStatus::Abnormal => f.write_str("abnormal termination"),
        }
    }
}

/// Tri-state build outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Warnings,
    Failure,
}

impl Verdict {
    /// Classify a finished run. First matching rule wins:
    ///
    /// 1. command failed -> `Failure`, whatever the count
    /// 2. at least one issue -> `Warnings`
    /// 3. otherwise `Success`
    pub fn classify(status: CommandStatus, issue_count: u64) -> Self {
        if status.did_fail() {
            Verdict::Failure
        } else if issue_count > 0 {
            Verdict::Warnings
        } else {
            Verdict::Success
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Success => "success",
            Verdict::Warnings => "warnings",
            Verdict::Failure => "failure",
        }
    }

    pub fn is_failure(&self) -> bool {
        *self == Verdict::Failure
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
