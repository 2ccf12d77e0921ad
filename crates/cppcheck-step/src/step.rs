//! The cppcheck build step.
//!
//! Lifecycle of one execution:
//!
//! 1. the host runs [`CppCheckStep::command`] and captures stderr
//! 2. [`CppCheckStep::create_summary`] stores the raw report, parses it,
//!    stores the formatted issues and publishes the warning count
//! 3. the exit status and count are classified into a [`Verdict`]
//!
//! A malformed report aborts after the raw report is stored: no counting, no
//! statistic, no property.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use step_state::{ArtifactStore, PropertyStore};
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::config::CppCheckConfig;
use crate::error::{Result, StepError};
use crate::format::{format_issue, render_issue_log};
use crate::obs;
use crate::report::ReportParser;
use crate::runner::{CommandOutcome, CommandRunner, CommandSpec};
use crate::verdict::{CommandStatus, Verdict};

/// Step name shown by the host.
pub const STEP_NAME: &str = "CppCheck";

/// Status label while running, and after a malformed report.
pub const DESCRIPTION: &str = "CppChecking";

/// Status label once finished.
pub const DESCRIPTION_DONE: &str = "CppCheck";

/// Artifact holding the verbatim report.
pub const REPORT_ARTIFACT: &str = "cppcheck.xml";

/// Run property accumulating the warning count across steps.
pub const WARNINGS_PROPERTY: &str = "warnings-count";

/// Step statistic accumulating the warning count.
pub const WARNINGS_STATISTIC: &str = "warnings";

/// Name of the artifact listing formatted issues.
pub fn warnings_artifact_name(count: u64) -> String {
    format!("warnings ({})", count)
}

/// Status label for a classified verdict.
pub fn status_text(verdict: Verdict) -> Vec<String> {
    match verdict {
        Verdict::Success => vec![DESCRIPTION_DONE.to_string()],
        Verdict::Warnings => vec![DESCRIPTION_DONE.to_string(), "warnings".to_string()],
        Verdict::Failure => vec![DESCRIPTION_DONE.to_string(), "failed".to_string()],
    }
}

/// Host collaborators handed to a step.
#[derive(Clone)]
pub struct StepHost {
    pub artifacts: Arc<dyn ArtifactStore>,
    pub properties: Arc<dyn PropertyStore>,
}

impl StepHost {
    pub fn new(artifacts: Arc<dyn ArtifactStore>, properties: Arc<dyn PropertyStore>) -> Self {
        Self {
            artifacts,
            properties,
        }
    }
}

/// The step's own status object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    statistics: BTreeMap<String, u64>,
}

impl StepStatus {
    pub fn get_statistic(&self, name: &str, default: u64) -> u64 {
        self.statistics.get(name).copied().unwrap_or(default)
    }

    pub fn set_statistic(&mut self, name: &str, value: u64) {
        self.statistics.insert(name.to_string(), value);
    }

    pub fn statistics(&self) -> &BTreeMap<String, u64> {
        &self.statistics
    }
}

/// Result of one step execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Identifier of this execution (also on the tracing span).
    pub step_id: Uuid,

    pub verdict: Verdict,

    /// Short label for display, e.g. `["CppCheck", "warnings"]`.
    pub status_text: Vec<String>,

    /// How the command terminated.
    pub exit_status: CommandStatus,

    /// Issues counted by this execution.
    pub warnings_count: u64,

    /// Formatted issue lines in report order.
    pub lines: Vec<String>,

    /// Command wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Why the step aborted (malformed report, command not run).
    pub fatal_error: Option<String>,

    pub finished_at: DateTime<Utc>,
}

/// cppcheck build step.
#[derive(Debug, Clone)]
pub struct CppCheckStep {
    id: Uuid,
    config: CppCheckConfig,
    parser: ReportParser,
    status: StepStatus,
}

impl CppCheckStep {
    pub fn new(config: CppCheckConfig) -> Self {
        let parser = ReportParser::new(config.verbose);
        Self {
            id: Uuid::new_v4(),
            config,
            parser,
            status: StepStatus::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &CppCheckConfig {
        &self.config
    }

    pub fn status(&self) -> &StepStatus {
        &self.status
    }

    /// Command line the host must run; the report arrives on stderr.
    pub fn command(&self) -> Vec<String> {
        self.config.command()
    }

    /// Command plus execution settings, for a [`CommandRunner`].
    pub fn command_spec(&self) -> CommandSpec {
        CommandSpec {
            step: STEP_NAME.to_string(),
            argv: self.command(),
            workdir: self.config.workdir.clone(),
            timeout_secs: self.config.timeout_secs,
        }
    }

    /// Store, parse and count the report. Returns the formatted issue lines.
    ///
    /// Fails with [`StepError::MalformedReport`] after storing the raw report
    /// if it does not parse; nothing else is written in that case.
    pub async fn create_summary(&mut self, host: &StepHost, report: &str) -> Result<Vec<String>> {
        host.artifacts.add_artifact(REPORT_ARTIFACT, report).await?;

        let issues = self.parser.parse(report)?;
        obs::emit_report_parsed(issues.len(), report.len());

        let lines: Vec<String> = issues.iter().map(format_issue).collect();
        let count = lines.len() as u64;

        if count > 0 {
            host.artifacts
                .add_artifact(&warnings_artifact_name(count), &render_issue_log(&issues))
                .await?;
        }

        let stat = self.status.get_statistic(WARNINGS_STATISTIC, 0);
        self.status.set_statistic(WARNINGS_STATISTIC, stat + count);

        let delta = i64::try_from(count).unwrap_or(i64::MAX);
        let total = host
            .properties
            .increment(WARNINGS_PROPERTY, delta, STEP_NAME)
            .await?;
        debug!(property = WARNINGS_PROPERTY, total = total, "Published warning count");

        Ok(lines)
    }

    /// Classify a finished command.
    pub fn evaluate(&self, status: CommandStatus, issue_count: u64) -> Verdict {
        Verdict::classify(status, issue_count)
    }

    /// Summarize and classify a command outcome captured by the host.
    ///
    /// A malformed report becomes a `Failure` outcome labelled
    /// `["CppChecking"]`; only storage errors are returned as `Err`.
    pub async fn finish(
        &mut self,
        host: &StepHost,
        outcome: &CommandOutcome,
    ) -> Result<StepOutcome> {
        let span = obs::step_span(&self.id);
        self.finish_inner(host, outcome).instrument(span).await
    }

    /// Run the command through `runner`, then [`finish`](Self::finish).
    ///
    /// If the command cannot be run to completion (spawn failure, timeout)
    /// there is no report to classify: the outcome is `Failure` with no
    /// artifacts.
    pub async fn run(
        &mut self,
        host: &StepHost,
        runner: &dyn CommandRunner,
    ) -> Result<StepOutcome> {
        let span = obs::step_span(&self.id);
        async {
            let spec = self.command_spec();
            obs::emit_step_started(&spec.argv);

            match runner.run(&spec).await {
                Ok(outcome) => self.finish_inner(host, &outcome).await,
                Err(err) => {
                    obs::emit_command_error(&err);
                    let outcome = self.outcome(
                        Verdict::Failure,
                        status_text(Verdict::Failure),
                        CommandStatus::Abnormal,
                        Vec::new(),
                        0,
                    );
                    Ok(StepOutcome {
                        fatal_error: Some(err.to_string()),
                        ..outcome
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn finish_inner(
        &mut self,
        host: &StepHost,
        outcome: &CommandOutcome,
    ) -> Result<StepOutcome> {
        match self.create_summary(host, &outcome.stderr).await {
            Ok(lines) => {
                let count = lines.len() as u64;
                let verdict = self.evaluate(outcome.status, count);
                obs::emit_step_finished(verdict, count, outcome.status, outcome.duration_ms);
                Ok(self.outcome(
                    verdict,
                    status_text(verdict),
                    outcome.status,
                    lines,
                    outcome.duration_ms,
                ))
            }
            Err(StepError::MalformedReport(err)) => {
                obs::emit_report_malformed(&err);
                let aborted = self.outcome(
                    Verdict::Failure,
                    vec![DESCRIPTION.to_string()],
                    outcome.status,
                    Vec::new(),
                    outcome.duration_ms,
                );
                Ok(StepOutcome {
                    fatal_error: Some(err.to_string()),
                    ..aborted
                })
            }
            Err(err) => Err(err),
        }
    }

    fn outcome(
        &self,
        verdict: Verdict,
        status_text: Vec<String>,
        exit_status: CommandStatus,
        lines: Vec<String>,
        duration_ms: u64,
    ) -> StepOutcome {
        StepOutcome {
            step_id: self.id,
            verdict,
            status_text,
            exit_status,
            warnings_count: lines.len() as u64,
            lines,
            duration_ms,
            fatal_error: None,
            finished_at: Utc::now(),
        }
    }
}
