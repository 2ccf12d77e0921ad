//! cppcheck-step - cppcheck as a CI build step
//!
//! ## Commands
//!
//! - `run`: run cppcheck, store its report and classify the outcome
//! - `classify`: classify a report captured earlier
//!
//! Run properties live under the state directory, so several invocations
//! sharing one directory accumulate `warnings-count`. Artifacts are kept per
//! step execution under `<state-dir>/steps/<step id>/`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cppcheck_step::config::{DEFAULT_BINARY, DEFAULT_TIMEOUT_SECS};
use cppcheck_step::{
    CommandOutcome, CommandStatus, CppCheckConfig, CppCheckStep, ProcessRunner, StepHost,
    StepOutcome,
};
use step_state::{FsArtifactStore, FsPropertyStore};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "cppcheck-step")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run cppcheck as a CI build step and classify the result", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding artifacts and run properties
    #[arg(
        long,
        global = true,
        env = "CPPCHECK_STEP_STATE_DIR",
        default_value = ".cppcheck-step"
    )]
    state_dir: PathBuf,

    /// Result output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cppcheck and classify its report
    Run {
        /// cppcheck executable
        #[arg(long, env = "CPPCHECK_BIN", default_value = DEFAULT_BINARY)]
        binary: String,

        /// Report verbose issue messages
        #[arg(long)]
        verbose_messages: bool,

        /// Timeout in seconds (0 = none)
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,

        /// Working directory for cppcheck
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Extra cppcheck arguments (after `--`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Classify a report captured earlier
    Classify {
        /// File holding cppcheck's stderr
        #[arg(long)]
        report: PathBuf,

        /// Exit code cppcheck returned
        #[arg(
            long,
            default_value_t = 0,
            allow_negative_numbers = true,
            conflicts_with = "abnormal"
        )]
        exit_code: i32,

        /// cppcheck terminated abnormally (signal, timeout)
        #[arg(long)]
        abnormal: bool,

        /// Report verbose issue messages
        #[arg(long)]
        verbose_messages: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    cppcheck_step::init_tracing(cli.json, level);

    let outcome = match cli.command {
        Commands::Run {
            binary,
            verbose_messages,
            timeout,
            workdir,
            args,
        } => {
            let mut config = CppCheckConfig::new(args)
                .with_binary(binary)
                .verbose(verbose_messages)
                .with_timeout(timeout);
            if let Some(dir) = workdir {
                config = config.with_workdir(dir);
            }
            cmd_run(&cli.state_dir, config).await?
        }
        Commands::Classify {
            report,
            exit_code,
            abnormal,
            verbose_messages,
        } => {
            let status = if abnormal {
                CommandStatus::Abnormal
            } else {
                CommandStatus::Exited(exit_code)
            };
            cmd_classify(&cli.state_dir, &report, status, verbose_messages).await?
        }
    };

    print_outcome(&outcome, cli.format)?;

    Ok(if outcome.verdict.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Host for one step execution: its own artifact directory, shared properties.
fn open_host(state_dir: &Path, step: &CppCheckStep) -> Result<StepHost> {
    let artifacts = FsArtifactStore::for_step(state_dir, &step.id().to_string())
        .with_context(|| format!("Failed to open artifact store in {:?}", state_dir))?;
    let properties = FsPropertyStore::new(state_dir)
        .with_context(|| format!("Failed to open property store in {:?}", state_dir))?;
    Ok(StepHost::new(Arc::new(artifacts), Arc::new(properties)))
}

/// Run cppcheck as a subprocess and classify the result
async fn cmd_run(state_dir: &Path, config: CppCheckConfig) -> Result<StepOutcome> {
    info!(command = ?config.command(), "Running cppcheck step");
    let mut step = CppCheckStep::new(config);
    let host = open_host(state_dir, &step)?;
    step.run(&host, &ProcessRunner)
        .await
        .context("cppcheck step failed to run")
}

/// Classify a saved report
async fn cmd_classify(
    state_dir: &Path,
    report: &Path,
    status: CommandStatus,
    verbose_messages: bool,
) -> Result<StepOutcome> {
    let text = std::fs::read_to_string(report)
        .with_context(|| format!("Failed to read report {:?}", report))?;

    let mut step = CppCheckStep::new(CppCheckConfig::default().verbose(verbose_messages));
    let host = open_host(state_dir, &step)?;
    step.finish(&host, &CommandOutcome::captured(text, status))
        .await
        .context("Failed to classify report")
}

fn print_outcome(outcome: &StepOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome)?);
        }
        OutputFormat::Text => {
            println!("{}", outcome.status_text.join(" "));
            for line in &outcome.lines {
                println!("  {}", line);
            }
            if let Some(err) = &outcome.fatal_error {
                println!("Error: {}", err);
            }
            println!();
            println!(
                "Verdict: {} ({} warning(s), {})",
                outcome.verdict, outcome.warnings_count, outcome.exit_status
            );
        }
    }
    Ok(())
}
