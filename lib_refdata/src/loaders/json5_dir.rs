//! Reads one reference definition per `*.json5` / `*.json` file:
//!
//! ```json5
//! {
//!   name: "muppets",
//!   interval: 60000,          // ms, optional
//!   id: "id",                 // optional
//!   retriever: { kind: "file", path: "muppets.json" },
//!   poller: { kind: "mtime", path: "muppets.json" },
//!   fn: { byName: "find" },   // optional, helper name -> builtin
//! }
//! ```
//!
//! Relative paths resolve against the directory holding the definition file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::helpers;
use crate::core::reference::ReferenceDefinition;
use crate::error::{RefDataError, Result};
use crate::loaders::DefinitionLoader;
use crate::sources::{AlwaysPoller, FileRetriever, InlineRetriever, MtimePoller, OncePoller};

const EXTENSIONS: [&str; 2] = ["json5", "json"];

/// Retriever section of a definition file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RetrieverConfig {
    Inline { data: Value },
    File { path: PathBuf },
    Http { url: String },
}

/// Poller section of a definition file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PollerConfig {
    Always,
    Once,
    Mtime { path: PathBuf },
    Http { url: String },
}

/// On-disk shape of one definition.
#[derive(Debug, Clone, Deserialize)]
pub struct DefinitionFile {
    pub name: String,
    /// Milliseconds.
    pub interval: Option<u64>,
    pub id: Option<String>,
    pub retriever: Option<RetrieverConfig>,
    pub poller: Option<PollerConfig>,
    #[serde(default, rename = "fn")]
    pub helpers: BTreeMap<String, String>,
}

impl DefinitionFile {
    /// Builds a definition, resolving relative paths against `base`.
    pub fn into_definition(self, base: &Path) -> Result<ReferenceDefinition> {
        let mut definition = ReferenceDefinition::new(self.name);
        definition.interval = self.interval.map(std::time::Duration::from_millis);
        definition.id = self.id;

        definition = match self.retriever {
            Some(RetrieverConfig::Inline { data }) => definition.retriever(InlineRetriever::new(data)),
            Some(RetrieverConfig::File { path }) => definition.retriever(FileRetriever::new(base.join(path))),
            Some(RetrieverConfig::Http { url }) => http_retriever(definition, &url)?,
            None => definition,
        };

        definition = match self.poller {
            Some(PollerConfig::Always) => definition.poller(AlwaysPoller),
            Some(PollerConfig::Once) => definition.poller(OncePoller),
            Some(PollerConfig::Mtime { path }) => definition.poller(MtimePoller::new(base.join(path))),
            Some(PollerConfig::Http { url }) => http_poller(definition, &url)?,
            None => definition,
        };

        for (name, kind) in self.helpers {
            definition.helpers.insert(name, helpers::builtin(&kind)?);
        }
        Ok(definition)
    }
}

#[cfg(feature = "retrieve")]
fn http_retriever(definition: ReferenceDefinition, url: &str) -> Result<ReferenceDefinition> {
    Ok(definition.retriever(crate::retrieve::HttpRetriever::new(url)?))
}

#[cfg(not(feature = "retrieve"))]
fn http_retriever(_: ReferenceDefinition, _: &str) -> Result<ReferenceDefinition> {
    Err(RefDataError::UnknownKind {
        what: "retriever",
        kind: "http".to_string(),
    })
}

#[cfg(feature = "retrieve")]
fn http_poller(definition: ReferenceDefinition, url: &str) -> Result<ReferenceDefinition> {
    Ok(definition.poller(crate::retrieve::HttpHeaderPoller::new(url)?))
}

#[cfg(not(feature = "retrieve"))]
fn http_poller(_: ReferenceDefinition, _: &str) -> Result<ReferenceDefinition> {
    Err(RefDataError::UnknownKind {
        what: "poller",
        kind: "http".to_string(),
    })
}

/// Loads every `*.json5` and `*.json` file in a directory, in path order.
///
/// A `path` naming a single file loads just that file. Files that fail to
/// parse or name an unknown kind are logged and skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json5DirectoryLoader;

impl Json5DirectoryLoader {
    /// Parses one definition file.
    pub fn load_file(&self, file: &Path) -> Result<ReferenceDefinition> {
        let text = fs::read_to_string(file)?;
        let parsed: DefinitionFile = serde_json5::from_str(&text)?;
        let base = file.parent().unwrap_or_else(|| Path::new("."));
        parsed.into_definition(base)
    }

    fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let escaped = Pattern::escape(&dir.to_string_lossy());
        let mut files = Vec::new();
        for extension in EXTENSIONS {
            for entry in glob(&format!("{escaped}/*.{extension}"))? {
                match entry {
                    Ok(path) if path.is_file() => files.push(path),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "skipping unreadable entry"),
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

impl DefinitionLoader for Json5DirectoryLoader {
    fn load(&self, path: &Path) -> Result<Vec<ReferenceDefinition>> {
        let meta = fs::metadata(path)?;
        if meta.is_file() {
            return Ok(vec![self.load_file(path)?]);
        }
        if !meta.is_dir() {
            return Err(RefDataError::Loader(format!(
                "{} is neither a file nor a directory",
                path.display()
            )));
        }
        // Fails on directories we cannot list, which glob would otherwise hide.
        fs::read_dir(path)?;

        let mut definitions = Vec::new();
        for file in self.discover(path)? {
            match self.load_file(&file) {
                Ok(definition) => {
                    debug!(file = %file.display(), reference = %definition.name, "loaded definition");
                    definitions.push(definition);
                }
                Err(e) => warn!(file = %file.display(), error = %e, "skipping definition file"),
            }
        }
        if definitions.is_empty() {
            debug!(path = %path.display(), "no definitions found");
        }
        Ok(definitions)
    }
}
