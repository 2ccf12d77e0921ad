//! cppcheck build step
//!
//! Runs cppcheck through a host-provided runner and classifies the result:
//! - Parses the version 2 XML report cppcheck writes to stderr
//! - Formats each issue as a display line
//! - Publishes the warning count as the `warnings-count` run property
//! - Maps exit status and count onto success / warnings / failure

pub mod config;
pub mod error;
pub mod format;
pub mod obs;
pub mod report;
pub mod runner;
pub mod step;
pub mod telemetry;
pub mod verdict;

// Re-export key types
pub use config::CppCheckConfig;
pub use error::{MalformedReport, Result, RunnerError, StepError};
pub use format::{format_issue, render_issue_log};
pub use report::{Issue, Location, ReportParser};
pub use runner::{CommandOutcome, CommandRunner, CommandSpec, ProcessRunner};
pub use step::{CppCheckStep, StepHost, StepOutcome, StepStatus};
pub use telemetry::init_tracing;
pub use verdict::{CommandStatus, Verdict};
