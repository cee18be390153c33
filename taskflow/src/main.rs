//! `taskflow`: command-line client for the `TaskFlow` task store.
//!
//! ```bash
//! # List tasks from a local store
//! cargo run --bin taskflow
//!
//! # Add, complete and reorder
//! cargo run --bin taskflow -- add "Write report" --priority high --due 2024-05-01
//! cargo run --bin taskflow -- toggle 3
//! cargo run --bin taskflow -- move 3 1
//!
//! # Point at another store
//! TASKFLOW_API_URL=http://tasks.internal:8000 cargo run --bin taskflow -- list
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use taskflow::api::HttpTaskApi;
use taskflow::cli::{self, CliError, Command};
use taskflow::config::{CliArgs, ClientConfig};
use taskflow::tasks::{Outcome, TaskCollection};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: CliArgs) -> Result<(), CliError> {
    let config = ClientConfig::load(&cli)?;
    let api = match config.timeout {
        Some(timeout) => HttpTaskApi::with_timeout(&config.base_url, timeout)?,
        None => HttpTaskApi::new(&config.base_url)?,
    };
    tracing::info!(base_url = %api.base_url(), "taskflow starting");

    let command = cli.command.unwrap_or_default();
    if command == Command::Health {
        api.health().await?;
        println!("ok: {}", api.base_url());
        return Ok(());
    }

    let tasks = TaskCollection::new(api);
    let report = cli::run(command, &tasks).await;
    println!("{}", cli::format_list(&report.snapshot.tasks));
    if report.outcome == Outcome::Skipped {
        eprintln!("Nothing to do.");
    }
    report.into_result()?;
    Ok(())
}

/// Initialize logging.
///
/// Logs go to stderr unless a file is given, in which case they go through a
/// non-blocking writer. Returns the [`WorkerGuard`] that must be held until
/// exit so buffered entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some(log_path) = file_path else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        return None;
    };

    let log_dir = log_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
