//! # HTTP Retrieval Utilities
//!
//! An asynchronous API client wrapper around `reqwest` with exponential
//! backoff retries and standardized JSON response handling.

use std::fmt;

use reqwest::header::HeaderMap;
use reqwest::Method;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{RefDataError, Result};

const MAX_RETRIES: u32 = 3;

/// A response body together with the transaction metadata.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The deserialized body. `None` for failed requests and `HEAD`.
    pub data: Option<T>,
    /// The raw body returned by the server when the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Whether the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// An asynchronous HTTP client bound to a base URL.
///
/// Relative paths are joined onto the base; an empty path targets the base
/// URL itself.
#[derive(Clone)]
pub struct ApiClient {
    inner: ClientWithMiddleware,
    base_url: Url,
}

impl ApiClient {
    /// Creates a client with a retry policy.
    ///
    /// # Errors
    /// Returns [`RefDataError::Http`] when `base_url` is not an absolute URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url).map_err(|e| RefDataError::Http(format!("invalid base URL '{base_url}': {e}")))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Performs a request and deserializes a successful body into `T`.
    ///
    /// Non-2xx responses are not errors: they come back with `success ==
    /// false` and the body captured in `error_body`.
    ///
    /// # Errors
    /// Returns an `anyhow::Error` if URL joining, the network call or body
    /// deserialization fails.
    pub async fn request<T>(&self, method: Method, path: &str) -> anyhow::Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path).await?;
        let status = response.status();
        let resp_headers = response.headers().clone();

        if status.is_success() {
            let data = response.json::<T>().await?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers: resp_headers,
            })
        } else {
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            })
        }
    }

    /// Issues a `HEAD` request and returns only status and headers.
    pub async fn head(&self, path: &str) -> anyhow::Result<ApiResponse<()>> {
        let response = self.send(Method::HEAD, path).await?;
        let status = response.status();
        Ok(ApiResponse {
            data: None,
            error_body: None,
            status: status.as_u16(),
            success: status.is_success(),
            headers: response.headers().clone(),
        })
    }

    async fn send(&self, method: Method, path: &str) -> anyhow::Result<reqwest::Response> {
        let full_url = self.base_url.join(path)?;
        Ok(self.inner.request(method, full_url).send().await?)
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}
