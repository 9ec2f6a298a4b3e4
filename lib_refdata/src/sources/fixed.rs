use async_trait::async_trait;
use serde_json::Value;

use crate::core::capabilities::{Poller, Retriever};

/// Serves a payload held in memory.
#[derive(Debug, Clone)]
pub struct InlineRetriever {
    data: Value,
}

impl InlineRetriever {
    pub fn new(data: Value) -> Self {
        Self { data }
    }
}

#[async_trait]
impl Retriever for InlineRetriever {
    async fn fetch(&self) -> anyhow::Result<Value> {
        Ok(self.data.clone())
    }
}

/// Reports a change on every tick, so every tick fetches.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPoller;

#[async_trait]
impl Poller for AlwaysPoller {
    async fn should_refresh(&self) -> anyhow::Result<Option<bool>> {
        Ok(Some(true))
    }
}

/// Never reports a change. Only the mandatory first tick fetches.
#[derive(Debug, Clone, Copy, Default)]
pub struct OncePoller;

#[async_trait]
impl Poller for OncePoller {
    async fn should_refresh(&self) -> anyhow::Result<Option<bool>> {
        Ok(None)
    }
}
