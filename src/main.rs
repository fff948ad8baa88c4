use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

use keypilot::config as cfg;
use keypilot::driver::{CancellationToken, RunResult, StepStatus};
use keypilot::executor::{Runtime, watcher};
use keypilot::sources;

/// Exit status when the run was cancelled by the kill switch or deadline.
const EXIT_CANCELLED: u8 = 130;

/// Keypilot CLI
#[derive(Debug, Parser)]
#[command(
    name = keypilot::PKG_NAME,
    version = keypilot::PKG_VERSION,
    about = "Drive a keyboard-only application from records with a cancellable keystroke sequence"
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short = 'c', long = "config", default_value = "config/default.json")]
    config: PathBuf,

    /// Records file (JSON array or NDJSON); "-" reads stdin. Overrides inline records.
    #[arg(short = 'r', long = "records")]
    records: Option<String>,

    /// Enable dry-run mode (log actions instead of simulating input)
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Print the planned sequence and exit without sending input
    #[arg(long = "plan")]
    plan: bool,

    /// Cancel the run after this many milliseconds. Overrides settings.deadline_ms.
    #[arg(long = "deadline-ms")]
    deadline_ms: Option<u64>,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for the configuration and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    keypilot::init_tracing(args.log_level.as_deref());

    if args.print_schema {
        cfg::write_schema_to_writer(std::io::stdout())?;
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    info!(
        version = keypilot::PKG_VERSION,
        config = %args.config.display(),
        dry_run = args.dry_run,
        "Starting Keypilot"
    );

    let config = cfg::load_from_path_async(&args.config).await?;
    debug!(target: "keypilot", "Configuration loaded successfully");

    let source = sources::select_source(args.records.as_deref(), &config);
    let records = tokio::task::spawn_blocking(move || sources::load_records(source.as_ref()))
        .await
        .context("Record loading task failed")??;

    if args.plan {
        let runtime = Runtime::new(config, true);
        let sequence = runtime.build_sequence(&records)?;
        for (idx, step) in sequence.iter().enumerate() {
            println!("{idx:>5}  {step}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    // Kill switch: Ctrl+C, the global kill key, plus an optional run deadline.
    let token = CancellationToken::new();
    let _interrupt = watcher::spawn_interrupt_watcher(token.clone());
    match config
        .settings
        .kill_combo()
        .context("Invalid settings.kill_key")?
    {
        Some(combo) => {
            let _hotkey = watcher::spawn_hotkey_watcher(token.clone(), combo);
        }
        None => warn!("No kill key configured; focus this console and press Ctrl+C to stop the run"),
    }
    if let Some(ms) = args.deadline_ms.or(config.settings.deadline_ms) {
        let _deadline = watcher::spawn_deadline(token.clone(), Duration::from_millis(ms));
    }

    let dry_run = args.dry_run;
    let run_token = token.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut runtime = Runtime::new(config, dry_run);
        runtime.run(&records, &run_token)
    })
    .await
    .context("Runner task failed")??;

    Ok(report(&result))
}

/// Log the outcome and map it to a process exit code.
fn report(result: &RunResult) -> ExitCode {
    for outcome in &result.outcomes {
        if let Some(err) = &outcome.error {
            warn!(step_index = outcome.step_index, error = %err, "Step failed");
        }
    }
    info!(
        completed = result.count(StepStatus::Completed),
        failed = result.count(StepStatus::Failed),
        skipped = result.count(StepStatus::Skipped),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "Run summary"
    );

    if result.is_cancelled() {
        warn!("Run cancelled");
        ExitCode::from(EXIT_CANCELLED)
    } else if result.failed || result.first_failure().is_some() {
        warn!("Run finished with failures");
        ExitCode::FAILURE
    } else {
        info!("Run finished successfully");
        ExitCode::SUCCESS
    }
}
