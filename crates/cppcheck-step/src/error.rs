//! Error taxonomy for the cppcheck step.

use step_state::StorageError;

/// The report on stderr is not a well-formed XML document.
///
/// Fatal for the step: nothing is counted and no property is published.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed report: {reason}")]
pub struct MalformedReport {
    pub reason: String,
}

impl MalformedReport {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors from running the analysis command on the host.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("step {step} has empty command")]
    EmptyCommand { step: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("step {step} timed out after {timeout_secs} seconds")]
    Timeout { step: String, timeout_secs: u64 },
}

/// Step-level errors.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    MalformedReport(#[from] MalformedReport),

    #[error("step state error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Result type for step operations.
pub type Result<T> = std::result::Result<T, StepError>;
