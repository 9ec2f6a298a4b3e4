use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_FILE: &str = "refdata.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(
    name = "refdata-status",
    author = "ckir",
    version,
    about = "Loads reference definitions and prints their status as JSON."
)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "REFDATA_CONFIG_PATH", help = "Path to the JSON/JSON5 configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "REFDATA_DEFINITIONS", help = "Directory (or single file) of reference definitions.")]
    pub definitions: Option<PathBuf>,

    #[clap(long, env = "REFDATA_OPTIONS_PATH", help = "Path to a registry options file.")]
    pub options_path: Option<PathBuf>,

    #[clap(long, env = "REFDATA_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "REFDATA_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "REFDATA_WATCH_MS", help = "Reprint status on this cadence until Ctrl-C.")]
    pub watch_ms: Option<u64>,

    #[clap(long, env = "REFDATA_MINIFY", help = "Print minified JSON.")]
    pub minify: Option<bool>,
}

impl Config {
    /// `other` wins wherever it has a value.
    pub fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            definitions: other.definitions.or(self.definitions),
            options_path: other.options_path.or(self.options_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            watch_ms: other.watch_ms.or(self.watch_ms),
            minify: other.minify.or(self.minify),
        }
    }

    pub fn defaults() -> Config {
        Config {
            definitions: Some(PathBuf::from("./refdata")),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            minify: Some(false),
            ..Default::default()
        }
    }
}

/// Resolves defaults, then the config file, then env and CLI.
pub fn load_config() -> Config {
    let cli = Config::parse();
    let file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut config = Config::defaults();
    if let Some(file_config) = read_config_file(&file_path) {
        config = config.merge(file_config);
    }
    config.merge(cli)
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        return None;
    }
    // Logging is not up yet, so problems go to stderr.
    match fs::read_to_string(path).map(|text| serde_json5::from_str::<Config>(&text)) {
        Ok(Ok(config)) => Some(config),
        Ok(Err(e)) => {
            eprintln!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
        Err(e) => {
            eprintln!("Failed to read config file {}: {}", path.display(), e);
            None
        }
    }
}
