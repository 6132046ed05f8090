//! batchrun CLI: run a shell command once per input line, in batches.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use batchrun::config::{Config, RunConfig};
use batchrun::engine::batch_process;
use batchrun::error::OperationError;
use batchrun::model::BatchResult;
use batchrun::report::{
    FailureReport, NumberedLines, format_duration, numbered_lines, progress_line,
};
use batchrun::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Args, Parser, Subcommand};
use tokio::process::Command as Process;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "batchrun", about = "Resilient batch execution of a command over input lines")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a command for every line of an input file
    Run {
        /// Input file, one item per line
        input: PathBuf,
        /// Shell command run per item; sees BATCHRUN_ITEM and BATCHRUN_INDEX
        #[arg(long, short = 'c')]
        command: String,
        /// Write a JSON failure report here
        #[arg(long)]
        report: Option<PathBuf>,
        /// Ignore blank lines instead of treating them as items; reported
        /// line numbers still refer to the input file
        #[arg(long)]
        skip_empty: bool,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Print the effective run configuration as TOML
    Config {
        #[command(flatten)]
        tuning: Tuning,
    },
}

#[derive(Args)]
struct Tuning {
    /// TOML config file with a [run] table
    #[arg(long)]
    config: Option<PathBuf>,
    /// Items processed concurrently per batch
    #[arg(long)]
    batch_size: Option<usize>,
    /// Attempts per item, including the first
    #[arg(long)]
    max_retries: Option<u32>,
    /// Base backoff in ms; attempt n waits n times this
    #[arg(long)]
    retry_delay_ms: Option<u64>,
    /// Pause between batches in ms
    #[arg(long)]
    batch_delay_ms: Option<u64>,
}

impl Tuning {
    fn resolve(&self) -> anyhow::Result<RunConfig> {
        let mut run = RunConfig::load(self.config.as_deref())?;
        if let Some(v) = self.batch_size {
            run.batch_size = v;
        }
        if let Some(v) = self.max_retries {
            run.max_retries = v;
        }
        if let Some(v) = self.retry_delay_ms {
            run.retry_delay_ms = v;
        }
        if let Some(v) = self.batch_delay_ms {
            run.batch_delay_ms = v;
        }
        Ok(run)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "batchrun".to_string(),
        log_level: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Run {
            input,
            command,
            report,
            skip_empty,
            tuning,
        } => {
            let run = tuning.resolve()?;
            cmd_run(&input, command, report.as_deref(), skip_empty, &run).await
        }
        Command::Config { tuning } => {
            let run = tuning.resolve()?;
            println!("[run]\n{}", toml::to_string(&run)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn cmd_run(
    input: &Path,
    command: String,
    report: Option<&Path>,
    skip_empty: bool,
    run: &RunConfig,
) -> anyhow::Result<ExitCode> {
    let content = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("cannot read input {}", input.display()))?;
    let NumberedLines { items, lines } = numbered_lines(&content, skip_empty);
    let lines = Arc::new(lines);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight items");
            trigger.cancel();
        }
    });

    let error_lines = Arc::clone(&lines);
    let options = run
        .to_options::<String>()
        .cancel_token(cancel)
        .on_progress(|p| eprintln!("{}", progress_line(p)))
        .on_error(move |f| {
            eprintln!(
                "line {} failed after {} attempt(s): {}",
                error_lines.get(f.index).copied().unwrap_or(f.index + 1),
                f.attempts,
                f.error
            )
        });

    info!(items = items.len(), batch_size = run.batch_size, "starting run");
    let result = batch_process(
        &items,
        |item, index| run_item(&command, item, index),
        &options,
    )
    .await?;

    print_summary(&result)?;
    if let Some(path) = report {
        FailureReport::with_lines(&result, &lines).write_to(path)?;
        info!(path = %path.display(), "failure report written");
    }

    Ok(if result.aborted {
        ExitCode::from(130)
    } else if result.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Run the user command once for one item; stdout is the item's result.
async fn run_item(command: &str, item: String, index: usize) -> Result<String, OperationError> {
    let output = Process::new("sh")
        .arg("-c")
        .arg(command)
        .env("BATCHRUN_ITEM", &item)
        .env("BATCHRUN_INDEX", index.to_string())
        .kill_on_drop(true)
        .output()
        .await?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(OperationError::msg(format!(
            "command exited with status {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )))
    }
}

fn print_summary(result: &BatchResult<String, String>) -> anyhow::Result<()> {
    let summary = serde_json::json!({
        "stats": result.stats,
        "aborted": result.aborted,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    eprintln!(
        "{} ok, {} failed of {} in {}{}",
        result.stats.succeeded,
        result.stats.failed,
        result.stats.total,
        format_duration(result.stats.duration_ms),
        if result.aborted { " (aborted)" } else { "" },
    );
    Ok(())
}
