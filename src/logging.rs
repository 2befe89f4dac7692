// src/logging.rs
// =============================================================================
// Logging setup for the CLI.
//
// Each run gets its own pair of log files under <output>/logs/:
//   execution_<YYYYmmdd_HHMMSS>.log  everything at the console level
//   error_<YYYYmmdd_HHMMSS>.log      errors only
// plus the console (stderr). --debug lowers the level from INFO to DEBUG;
// RUST_LOG overrides the filter entirely.
// =============================================================================

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer as _};

/// Keeps the background log writers alive; drop it last.
pub struct LogGuards {
    pub execution_log: PathBuf,
    pub error_log: PathBuf,
    _execution: WorkerGuard,
    _errors: WorkerGuard,
}

pub fn init(logs_dir: &Path, debug: bool) -> Result<LogGuards> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create log directory {}", logs_dir.display()))?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let execution_name = format!("execution_{}.log", timestamp);
    let error_name = format!("error_{}.log", timestamp);

    let (execution_writer, execution_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(logs_dir, &execution_name));
    let (error_writer, error_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(logs_dir, &error_name));

    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(level);

    let execution_layer = tracing_subscriber::fmt::layer()
        .with_writer(execution_writer)
        .with_ansi(false)
        .with_filter(level);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_writer)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    // Keep dependencies (reqwest, hyper, rustls) quiet unless asked for
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,gh_folder_sync=trace"));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(execution_layer)
        .with(error_layer)
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(LogGuards {
        execution_log: logs_dir.join(execution_name),
        error_log: logs_dir.join(error_name),
        _execution: execution_guard,
        _errors: error_guard,
    })
}
