//! # Definition Loaders
//!
//! Turn files on disk into [`ReferenceDefinition`]s so a deployment can add
//! a reference by dropping a JSON5 file into a directory.

use std::path::Path;

use tracing::info;

use crate::core::reference::ReferenceDefinition;
use crate::core::registry::Registry;
use crate::error::Result;

/// JSON5 directory loader and the file schema it reads.
pub mod json5_dir;

pub use json5_dir::{DefinitionFile, Json5DirectoryLoader, PollerConfig, RetrieverConfig};

/// Produces definitions from a filesystem location.
pub trait DefinitionLoader {
    /// Reads every definition found at `path`.
    fn load(&self, path: &Path) -> Result<Vec<ReferenceDefinition>>;
}

impl Registry {
    /// Attaches every definition found under `path` using the JSON5
    /// directory loader. Returns how many were handed to `attach`.
    pub fn attach_path(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.attach_with(&Json5DirectoryLoader::default(), path)
    }

    /// Attaches every definition `loader` finds under `path`.
    pub fn attach_with<L>(&self, loader: &L, path: impl AsRef<Path>) -> Result<usize>
    where
        L: DefinitionLoader + ?Sized,
    {
        let path = path.as_ref();
        let definitions = loader.load(path)?;
        let attached = self.attach_all(definitions);
        info!(path = %path.display(), attached, "attached definitions");
        Ok(attached)
    }
}
