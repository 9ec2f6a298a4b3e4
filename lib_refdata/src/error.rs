//! # Error Taxonomy
//!
//! Library-level failures. Poll and fetch failures never surface through these
//! types at the call site; they are absorbed into the owning record as a
//! [`ReferenceError`](crate::core::reference::ReferenceError) instead.

use thiserror::Error;

/// Errors raised by the loaders, built-in sources and HTTP plumbing.
#[derive(Debug, Error)]
pub enum RefDataError {
    /// An I/O error occurred while reading a definition or data file.
    #[error("I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    /// A payload or definition could not be parsed as JSON5.
    #[error("JSON5 error occurred: {0}")]
    Json5(String),

    /// The retriever produced something that is neither an array nor an object.
    #[error("Unsupported payload for reference '{reference}': expected array or object, got {found}")]
    InvalidPayload { reference: String, found: &'static str },

    /// A declarative definition referred to a capability or helper kind that does not exist.
    #[error("Unknown {what} kind '{kind}'")]
    UnknownKind { what: &'static str, kind: String },

    /// A definition loader failed for a reason not covered above.
    #[error("Loader error: {0}")]
    Loader(String),

    /// The HTTP client failed to build or execute a request.
    #[cfg(feature = "retrieve")]
    #[error("HTTP error occurred: {0}")]
    Http(String),

    /// A glob pattern used for discovery was malformed.
    #[cfg(feature = "loaders")]
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl From<serde_json5::Error> for RefDataError {
    fn from(e: serde_json5::Error) -> Self {
        RefDataError::Json5(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RefDataError>;
