//! # Data Retrieval Module
//!
//! HTTP plumbing for references whose data lives behind a web endpoint.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: A generic `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, with automatic retries and exponential backoff.
//!
//! - **`http`**: The [`HttpRetriever`] and [`HttpHeaderPoller`] capabilities,
//!   both thin wrappers around one `ApiClient`.

#![forbid(unsafe_code)]

/// Generic HTTP API client with retry middleware.
pub mod ky_http;
/// HTTP-backed capabilities.
pub mod http;

pub use http::{HttpHeaderPoller, HttpRetriever};
pub use ky_http::{ApiClient, ApiResponse};
