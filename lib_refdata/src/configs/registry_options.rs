use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

const DEFAULT_INTERVAL_MS: u64 = 60_000;
const DEFAULT_ID_FIELD: &str = "id";
const LOAD_CHECK_MS: u64 = 1;
const JITTER_MIN_MS: u64 = 25;
const JITTER_SPAN_MS: u64 = 50;

/// # Registry Options
///
/// Defaults applied to definitions and timing knobs for the scheduler and the
/// load barrier. Deserializes from camelCase JSON or JSON5.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryOptions {
    /// Refresh period for definitions that do not set one.
    pub default_interval_ms: u64,
    /// Auto-keying field for definitions that do not set one.
    pub default_id_field: String,
    /// Polling cadence of the load barrier.
    pub load_check_ms: u64,
    /// Lower bound of the random delay before the first recurring tick.
    pub jitter_min_ms: u64,
    /// Width of the random delay window.
    pub jitter_span_ms: u64,
    /// Emit a one-time warning when data is read before any barrier resolved.
    pub warn_unchecked_reads: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            default_interval_ms: DEFAULT_INTERVAL_MS,
            default_id_field: DEFAULT_ID_FIELD.to_string(),
            load_check_ms: LOAD_CHECK_MS,
            jitter_min_ms: JITTER_MIN_MS,
            jitter_span_ms: JITTER_SPAN_MS,
            warn_unchecked_reads: true,
        }
    }
}

impl RegistryOptions {
    /// Reads options from a JSON or JSON5 file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json5::from_str(&text)?)
    }

    pub(crate) fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }

    pub(crate) fn load_check(&self) -> Duration {
        Duration::from_millis(self.load_check_ms.max(1))
    }
}

impl fmt::Display for RegistryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RegistryOptions
    Default interval: {} ms,
    Default id field: {},
    Load check: {} ms,
    Jitter: {}..{} ms,
    Warn unchecked reads: {}
",
            self.default_interval_ms,
            self.default_id_field,
            self.load_check_ms,
            self.jitter_min_ms,
            self.jitter_min_ms + self.jitter_span_ms,
            self.warn_unchecked_reads
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ defaultIntervalMs: 500, // json5 comment\n warnUncheckedReads: false }}").unwrap();

        let options = RegistryOptions::from_file(file.path()).unwrap();
        assert_eq!(options.default_interval_ms, 500);
        assert!(!options.warn_unchecked_reads);
        assert_eq!(options.default_id_field, "id");
        assert_eq!(options.load_check_ms, 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RegistryOptions::from_file(Path::new("/nonexistent/refdata.json5")).unwrap_err();
        assert!(matches!(err, crate::error::RefDataError::Io(_)));
    }
}
