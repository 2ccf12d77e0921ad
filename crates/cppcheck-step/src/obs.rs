//! Structured observability hooks for the cppcheck step lifecycle.
//!
//! Every step execution runs inside a span tagged with its `step_id`; the
//! emission functions below log the key lifecycle events at `info!` level
//! (configurable via `RUST_LOG`).

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{MalformedReport, RunnerError};
use crate::verdict::{CommandStatus, Verdict};

/// Span covering one step execution.
pub fn step_span(step_id: &Uuid) -> tracing::Span {
    tracing::info_span!("cppcheck.step", step_id = %step_id)
}

/// Emit event: command about to run.
pub fn emit_step_started(argv: &[String]) {
    info!(event = "step.started", command = %argv.join(" "));
}

/// Emit event: report parsed.
pub fn emit_report_parsed(issues: usize, report_bytes: usize) {
    info!(event = "report.parsed", issues = issues, report_bytes = report_bytes);
}

/// Emit event: report could not be parsed, step aborted.
pub fn emit_report_malformed(err: &MalformedReport) {
    error!(event = "report.malformed", error = %err, "Corrupted xml, aborting step");
}

/// Emit event: the command could not be run to completion.
pub fn emit_command_error(err: &RunnerError) {
    warn!(event = "step.command_error", error = %err);
}

/// Emit event: step finished with a verdict.
pub fn emit_step_finished(
    verdict: Verdict,
    warnings: u64,
    status: CommandStatus,
    duration_ms: u64,
) {
    info!(
        event = "step.finished",
        verdict = %verdict,
        warnings = warnings,
        status = %status,
        duration_ms = duration_ms,
    );
}
