use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ETAG, LAST_MODIFIED};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::core::capabilities::{Poller, Retriever};
use crate::error::Result;
use crate::retrieve::ky_http::ApiClient;

/// Fetches a JSON document with `GET`.
#[derive(Debug, Clone)]
pub struct HttpRetriever {
    client: ApiClient,
}

impl HttpRetriever {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self::with_client(ApiClient::new(url)?))
    }

    pub fn with_client(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn fetch(&self) -> anyhow::Result<Value> {
        let response = self.client.request::<Value>(Method::GET, "").await?;
        if !response.success {
            bail!(
                "GET {} returned {}: {}",
                self.client.base_url(),
                response.status,
                response.error_body.unwrap_or_default()
            );
        }
        response.data.ok_or_else(|| anyhow!("GET {} returned no body", self.client.base_url()))
    }
}

/// Reports a change when the `ETag` (or, failing that, `Last-Modified`) of a
/// `HEAD` response moves.
///
/// Answers "unknown" when the server sends neither header. The first
/// observation records a baseline.
#[derive(Debug)]
pub struct HttpHeaderPoller {
    client: ApiClient,
    last_seen: Mutex<Option<String>>,
}

impl HttpHeaderPoller {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self::with_client(ApiClient::new(url)?))
    }

    pub fn with_client(client: ApiClient) -> Self {
        Self {
            client,
            last_seen: Mutex::new(None),
        }
    }
}

fn validator(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ETAG)
        .or_else(|| headers.get(LAST_MODIFIED))
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl Poller for HttpHeaderPoller {
    async fn should_refresh(&self) -> anyhow::Result<Option<bool>> {
        let response = self.client.head("").await?;
        if !response.success {
            bail!("HEAD {} returned {}", self.client.base_url(), response.status);
        }
        let Some(current) = validator(&response.headers) else {
            return Ok(None);
        };

        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        let changed = match last_seen.replace(current.clone()) {
            None => false,
            Some(previous) => previous != current,
        };
        if changed {
            debug!(url = %self.client.base_url(), validator = %current, "upstream changed");
        }
        Ok(Some(changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn etag_wins_over_last_modified() {
        let mut headers = HeaderMap::new();
        headers.insert(LAST_MODIFIED, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(validator(&headers).as_deref(), Some("Wed, 21 Oct 2015 07:28:00 GMT"));

        headers.insert(ETAG, HeaderValue::from_static("\"v2\""));
        assert_eq!(validator(&headers).as_deref(), Some("\"v2\""));
    }

    #[test]
    fn no_validators() {
        assert_eq!(validator(&HeaderMap::new()), None);
    }
}
