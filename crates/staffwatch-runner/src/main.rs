//! Employee change monitor entry point.
//!
//! Watches the employee objects of a Jira Insight schema and posts a Slack
//! message for every employee created, updated or deleted since the last
//! run. State between runs is a JSON snapshot on disk.
//!
//! # Architecture
//!
//! ```text
//! Insight catalog --> reconcile (history per changed record) --> Slack
//!        ^                         |
//!        +------ snapshot file <---+
//! ```
//!
//! With `schedule.interval_secs: 0` (the default) or `--once` the binary
//! runs a single pass and exits non-zero if it failed. Otherwise it runs
//! a pass per interval until Ctrl-C.

mod error;
mod insight;
mod notify;
mod render;
mod runner;
mod store;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use staffwatch_core::config::{LogFormat, LoggingConfig, StaffwatchConfig};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::runner::Monitor;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "staffwatch", version, about = "Report employee changes from Jira Insight to Slack")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, short, default_value = "staffwatch.yaml")]
    config: PathBuf,

    /// Run a single pass and exit, ignoring the configured interval.
    #[arg(long)]
    once: bool,
}

/// Application entry point.
///
/// Loads `.env` and the configuration, initializes logging, then runs one
/// pass or the scheduling loop.
///
/// # Errors
///
/// Returns an error if configuration is unusable or, in single-pass mode,
/// if the pass fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenv::dotenv().ok();

    let (config, config_found) = load_config(&cli.config)?;
    let _log_guard = init_logging(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "staffwatch starting");
    if !config_found {
        warn!(
            path = %cli.config.display(),
            "config file not found, using defaults and environment"
        );
    }

    let monitor = Monitor::from_config(&config).context("failed to build Insight client")?;
    info!(
        base_url = config.insight.base_url(),
        schema_id = config.insight.schema_id,
        object_type_id = config.insight.object_type_id,
        snapshot_path = config.store.snapshot_path,
        notifier = monitor.notifier_name(),
        max_concurrent_fetches = config.reconcile.max_concurrent_fetches,
        "configuration loaded"
    );

    match config.schedule.interval() {
        Some(period) if !cli.once => {
            info!(interval_secs = period.as_secs(), "entering scheduling loop");
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            let passes = monitor.run_every(period, shutdown).await;
            info!(passes, "staffwatch stopped");
        }
        _ => {
            let report = monitor.run_pass().await.inspect_err(|e| {
                error!(error = %e, "pass failed");
            })?;
            info!(
                run_id = %report.run_id,
                started_at = %report.started_at,
                finished_at = %report.finished_at,
                baseline_created = report.baseline_created,
                notified = report.notified,
                failed = report.summary.failed,
                "single pass finished"
            );
        }
    }

    Ok(())
}

/// Load the configuration file, or fall back to defaults plus environment
/// when the file does not exist.
fn load_config(path: &Path) -> anyhow::Result<(StaffwatchConfig, bool)> {
    if path.exists() {
        let config = StaffwatchConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        Ok((config, true))
    } else {
        let config = StaffwatchConfig::parse("")
            .context("no config file and the environment does not supply a usable config")?;
        Ok((config, false))
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
///
/// With `logging.file` set, a second plain-text layer appends to that file
/// through a background writer. Keep the returned guard alive until exit;
/// dropping it flushes pending lines.
fn init_logging(logging: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let (file_layer, guard) = match logging.file.as_deref() {
        Some(path) => {
            let (writer, guard) = log_file_writer(Path::new(path))?;
            let layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    match logging.format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
    }

    Ok(guard)
}

/// Open `path` for appending behind a non-blocking writer, creating its
/// directory if needed. The file is never rotated.
fn log_file_writer(path: &Path) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("log file path {} has no file name", path.display()))?;
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .build(dir)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    Ok(tracing_appender::non_blocking(appender))
}
