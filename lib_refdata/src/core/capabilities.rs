//! # Capabilities
//!
//! The narrow contracts through which the engine reaches the outside world.
//! A reference is driven by exactly one [`Retriever`] (full fetch) and one
//! [`Poller`] (cheap change detection). Both are plain async traits so that
//! network clients, database readers and test doubles plug in the same way.
//!
//! Closures are capabilities too: any `Fn() -> impl Future` with the right
//! output type implements the trait, which keeps test fixtures short.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

/// Fetches the full current dataset for a reference.
///
/// The returned value must be either a JSON array (ordered collection of
/// items) or a JSON object (a natively keyed structure). Anything else is
/// recorded as a fetch error by the tick cycle.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Perform the fetch.
    async fn fetch(&self) -> anyhow::Result<Value>;
}

/// Decides whether a refresh is warranted this cycle.
///
/// `Ok(Some(true))` means "changed", `Ok(Some(false))` and `Ok(None)` both
/// mean "no change". The very first tick of a reference fetches regardless.
#[async_trait]
pub trait Poller: Send + Sync {
    /// Check the upstream for changes.
    async fn should_refresh(&self) -> anyhow::Result<Option<bool>>;
}

#[async_trait]
impl<F, Fut> Retriever for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn fetch(&self) -> anyhow::Result<Value> {
        (self)().await
    }
}

#[async_trait]
impl<F, Fut> Poller for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<bool>>> + Send + 'static,
{
    async fn should_refresh(&self) -> anyhow::Result<Option<bool>> {
        (self)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn closures_act_as_capabilities() {
        let retriever = || async { Ok(json!([{"id": "1"}])) };
        let poller = || async { Ok(Some(true)) };

        assert_eq!(retriever.fetch().await.unwrap(), json!([{"id": "1"}]));
        assert_eq!(poller.should_refresh().await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn closure_errors_pass_through() {
        let retriever = || async { Err::<Value, _>(anyhow::anyhow!("backend down")) };
        let err = retriever.fetch().await.unwrap_err();
        assert_eq!(err.to_string(), "backend down");
    }
}
