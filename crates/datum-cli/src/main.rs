//! datum CLI
//!
//! Pins external data sources to fingerprints recorded in a lock file and
//! reports drift.

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use colored::Colorize;
use datum_core::RunReport;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::RunContext;
use error::Result;
use output::ConsoleReporter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let code = match run(cli) {
        Ok(report) => {
            println!("{}", output::summary(&report).dimmed());
            report.status.exit_code()
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}

fn run(cli: Cli) -> Result<RunReport> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(execute(cli));
    // Blocking copies left behind by timed-out fetches stop at their next
    // cancellation check; the process does not wait for them.
    runtime.shutdown_background();
    report
}

async fn execute(cli: Cli) -> Result<RunReport> {
    let ctx = RunContext::new(cli.config, cli.lock, cli.timeout);
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let mut reporter = ConsoleReporter::stdout();

    let result = match &cli.command {
        Commands::Check => commands::run_check(&ctx, &cancel, &mut reporter).await,
        Commands::Fetch { ids } => commands::run_fetch(&ctx, ids, &cancel, &mut reporter).await,
    };

    interrupt.abort();
    result
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("Interrupted, cancelling run");
            cancel.cancel();
        }
        Err(e) => tracing::debug!(error = %e, "Cannot listen for Ctrl-C"),
    }
}
