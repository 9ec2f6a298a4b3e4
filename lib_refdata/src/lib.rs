//! # lib_refdata
//!
//! Reference-data synchronization: small, slowly changing datasets kept fresh
//! in memory by a per-dataset poll-then-fetch schedule, exposed as both an
//! ordered array and a keyed map.
//!
//! The engine under [`core`] is always compiled. Folders with heavier
//! dependencies are gated behind features, `full` enables all of them:
//!
//! - `retrieve`: HTTP retriever and poller over a retrying `reqwest` client.
//! - `loaders`: JSON5 definition files and [`Registry::attach_path`].
//! - `loggers`: `tracing` subscriber setup for binaries.

pub mod configs;
pub mod core;
pub mod error;
pub mod sources;

#[cfg(feature = "loaders")]
pub mod loaders;
#[cfg(feature = "loggers")]
pub mod loggers;
#[cfg(feature = "retrieve")]
pub mod retrieve;

pub use crate::configs::RegistryOptions;
pub use crate::core::{
    BoundHelper, ErrorSource, HelperFn, Poller, Reference, ReferenceDefinition, ReferenceError, ReferenceKind,
    ReferenceSnapshot, ReferenceStatus, Registry, Retriever, TickerHandle,
};
pub use crate::error::{RefDataError, Result};
