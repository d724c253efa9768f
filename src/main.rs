mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use dotenv::dotenv;
use inplace_recompress::{AppConfig, CliArgs, RecompressEngine};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    dotenv().ok();

    let args = CliArgs::parse();
    let _guard = logging::init_logger(args.debug);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<bool> {
    let config = AppConfig::from_args(args).context("Invalid configuration")?;
    let engine = RecompressEngine::new(config);

    // Cooperative cancellation: the first interrupt stops new files
    // from being enqueued; anything already queued still finishes.
    let state = engine.run_state();
    ctrlc::set_handler(move || {
        info!("Terminating, please wait for workers to finish their files ...");
        state.request_abort();
    })
    .context("Failed to set signal handler")?;

    let report = engine.run()?;

    let skipped = report.stats.skipped_ignored
        + report.stats.skipped_compact
        + report.stats.skipped_handled;
    info!(
        "{} rewritten, {} skipped, {} failed in {}",
        format!("{}", report.stats.rewritten).green(),
        format!("{}", skipped).cyan(),
        format!("{}", report.stats.failed).red(),
        format!("{:.2}s", report.duration.as_secs_f64()).green(),
    );
    if report.ledger_retained {
        info!("Resume ledger kept; the next run picks up where this one stopped");
    }

    Ok(report.succeeded())
}
