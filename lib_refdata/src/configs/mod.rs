//! # Configuration Modules
//!
//! Tunables for the registry. Every field has a default, so an empty JSON
//! object (or no file at all) yields a working configuration.

/// Registry tunables and their file loader.
pub mod registry_options;

pub use registry_options::RegistryOptions;
