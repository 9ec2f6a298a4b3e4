//! # Core Engine Module
//!
//! Everything needed to keep a set of named reference datasets fresh in
//! memory. A caller describes each dataset with a [`ReferenceDefinition`],
//! hands it to the [`Registry`], and reads the resulting [`Reference`] record
//! once the load barrier resolves.
//!
//! ## Core Components:
//!
//! - **`registry`**: Owns the records, starts their tickers and exposes the
//!   load barrier, status and reset.
//!
//! - **`scheduler`**: One independent ticker task per enabled reference, all
//!   descending from a single cancellation token.
//!
//! - **`tick`**: The poll-then-fetch cycle run on every fire.
//!
//! - **`materialize`**: Turns a fetched payload into the array and keyed views.
//!
//! - **`helpers`**: Binds named functions to a record.
//!
//! - **`barrier`** / **`status`**: Readiness wait and observability snapshots.

#![forbid(unsafe_code)]

/// Change-detection and full-fetch capability traits.
pub mod capabilities;
/// Reference definitions and the long-lived records built from them.
pub mod reference;
/// The registry: attach, load, status and reset.
pub mod registry;
/// Ticker tasks and their handles.
pub mod scheduler;
/// Poll-then-fetch cycle.
pub mod tick;
/// Payload to array/map conversion.
pub mod materialize;
/// Helper binding and the built-in helpers.
pub mod helpers;
pub(crate) mod barrier;
/// Per-reference status snapshots.
pub mod status;

// --- Public API Re-exports ---
pub use capabilities::{Poller, Retriever};
pub use helpers::{BoundHelper, HelperFn};
pub use materialize::{materialize, Materialized};
pub use reference::{ErrorSource, Reference, ReferenceDefinition, ReferenceError, ReferenceKind, ReferenceSnapshot};
pub use registry::Registry;
pub use scheduler::TickerHandle;
pub use status::ReferenceStatus;
pub use tick::TickOutcome;
