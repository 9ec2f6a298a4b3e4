//! # refdata-status
//!
//! Attaches every reference definition in a directory, waits for the load
//! barrier and prints the registry status as JSON. With `--watch-ms` it keeps
//! the tickers running and reprints on that cadence until Ctrl-C.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use lib_refdata::loggers::setup_logging;
use lib_refdata::{Registry, RegistryOptions};
use tokio::signal;
use tracing::{info, warn};

mod config;

const APP_NAME: &str = "refdata-status";

fn print_status(registry: &Registry, minify: bool) -> Result<()> {
    let status = registry.status();
    let json = if minify {
        serde_json::to_string(&status)?
    } else {
        serde_json::to_string_pretty(&status)?
    };
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config();
    let log_dir = config.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"));
    let log_level = config.log_level.clone().unwrap_or_else(|| "info".to_string());
    let _guard = setup_logging(APP_NAME, &log_dir, &log_level)?;

    let options = match &config.options_path {
        Some(path) => RegistryOptions::from_file(path)
            .with_context(|| format!("failed to read registry options from {}", path.display()))?,
        None => RegistryOptions::default(),
    };
    info!("{}", options);

    let definitions = config.definitions.clone().unwrap_or_else(|| PathBuf::from("./refdata"));
    let registry = Registry::new(options);
    let attached = registry
        .attach_path(&definitions)
        .with_context(|| format!("failed to load definitions from {}", definitions.display()))?;
    if attached == 0 {
        warn!(path = %definitions.display(), "no reference definitions found");
    }

    registry.load_all().await;
    let minify = config.minify.unwrap_or(false);
    print_status(&registry, minify)?;

    if let Some(watch_ms) = config.watch_ms {
        let mut ticker = tokio::time::interval(Duration::from_millis(watch_ms.max(1)));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Ctrl-C received, stopping tickers.");
                    break;
                }
                _ = ticker.tick() => print_status(&registry, minify)?,
            }
        }
    }

    registry.reset();
    Ok(())
}
