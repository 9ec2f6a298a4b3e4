//! # Built-in Sources
//!
//! Ready-made [`Retriever`](crate::core::Retriever) and
//! [`Poller`](crate::core::Poller) implementations for the common cases that
//! do not need a network client. The HTTP pair lives under `retrieve`.
//!
//! ## Contained Modules:
//!
//! - **`fixed`**: An inline payload and the two trivial pollers.
//! - **`file`**: A JSON/JSON5 file retriever and a modification-time poller.

/// Inline payload, `always` and `once` pollers.
pub mod fixed;
/// File-backed retriever and mtime poller.
pub mod file;

pub use file::{FileRetriever, MtimePoller};
pub use fixed::{AlwaysPoller, InlineRetriever, OncePoller};
