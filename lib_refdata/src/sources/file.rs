//! File-backed capabilities.
//!
//! Files are parsed as JSON5, which accepts plain JSON as well, so one
//! retriever covers both `.json` and hand-edited `.json5` datasets.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::core::capabilities::{Poller, Retriever};

/// Reads and parses a JSON or JSON5 file on every fetch.
#[derive(Debug, Clone)]
pub struct FileRetriever {
    path: PathBuf,
}

impl FileRetriever {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Retriever for FileRetriever {
    async fn fetch(&self) -> anyhow::Result<Value> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let value: Value = serde_json5::from_str(&text)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(value)
    }
}

/// Reports a change when a file's modification time moves.
///
/// The first observation only records a baseline; the first tick of a
/// reference fetches regardless of what the poller says.
#[derive(Debug)]
pub struct MtimePoller {
    path: PathBuf,
    last_seen: Mutex<Option<SystemTime>>,
}

impl MtimePoller {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_seen: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Poller for MtimePoller {
    async fn should_refresh(&self) -> anyhow::Result<Option<bool>> {
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|meta| meta.modified())
            .with_context(|| format!("failed to stat {}", self.path.display()))?;

        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        let changed = match last_seen.replace(modified) {
            None => false,
            Some(previous) => previous != modified,
        };
        if changed {
            debug!(path = %self.path.display(), "file modified");
        }
        Ok(Some(changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::time::Duration;

    #[tokio::test]
    async fn reads_json5_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("muppets.json5");
        fs::write(&path, "[{id: 'k', name: 'Kermit',},] // trailing comment").unwrap();

        let value = FileRetriever::new(&path).fetch().await.unwrap();
        assert_eq!(value, json!([{"id": "k", "name": "Kermit"}]));
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let err = FileRetriever::new("/nonexistent/muppets.json").fetch().await.unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/muppets.json"));
    }

    #[tokio::test]
    async fn mtime_poller_detects_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "[]").unwrap();

        let poller = MtimePoller::new(&path);
        assert_eq!(poller.should_refresh().await.unwrap(), Some(false));
        assert_eq!(poller.should_refresh().await.unwrap(), Some(false));

        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
        assert_eq!(poller.should_refresh().await.unwrap(), Some(true));
        assert_eq!(poller.should_refresh().await.unwrap(), Some(false));
    }
}
