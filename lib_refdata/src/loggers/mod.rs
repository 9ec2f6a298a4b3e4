//! # Logging Setup
//!
//! Installs the global `tracing` subscriber for binaries built on this crate:
//! human-readable output on stdout plus a JSON file per run. Previous runs'
//! files are pruned on startup so the log directory holds at most the last
//! run and the current one.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use glob::{glob, Pattern};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sets up logging for `app_name`.
///
/// `RUST_LOG` wins over `log_level` when set. The returned guard flushes the
/// file writer on drop and must be kept alive for the life of the program.
pub fn setup_logging(app_name: &str, log_dir: &Path, log_level: &str) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)?;
    rotate_logs(app_name, log_dir)?;

    let file_name = format!("{}-{}.log", app_name, Local::now().format("%Y%m%d_%H%M%S"));
    let (file_writer, guard) = non_blocking(rolling::never(log_dir, &file_name));

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;
    let console_layer = fmt::layer().with_target(true).with_ansi(true);
    let file_layer = fmt::layer().with_ansi(false).with_writer(file_writer).json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(app = app_name, file = %log_dir.join(&file_name).display(), "logging initialized");
    Ok(guard)
}

/// Deletes all but the newest `<app_name>-*.log` file in `log_dir`.
///
/// File names embed a sortable timestamp, so name order is age order.
pub fn rotate_logs(app_name: &str, log_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}-*.log",
        Pattern::escape(&log_dir.to_string_lossy()),
        Pattern::escape(app_name)
    );
    let mut log_files: Vec<PathBuf> = glob(&pattern)?.filter_map(|entry| entry.ok()).collect();
    log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let mut removed = Vec::new();
    for old_file in log_files.into_iter().skip(1) {
        match fs::remove_file(&old_file) {
            Ok(()) => removed.push(old_file),
            Err(e) => eprintln!("Error deleting old log file {}: {}", old_file.display(), e),
        }
    }
    Ok(removed)
}
