use eyre::Result;
use ghlink_store::{StateRecord, StateStore};
use moka::future::Cache;
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone)]
pub struct MokaStore {
    cache: Cache<String, StateRecord>,
}

#[derive(Clone, Deserialize)]
pub struct MokaConfig {
    pub max_capacity: u64,
    pub ttl: Duration,
}

impl MokaStore {
    pub async fn new(config: MokaConfig) -> Result<Self> {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .build();

        Ok(Self { cache })
    }
}

impl StateStore for MokaStore {
    // The cache-wide TTL is only a backstop against abandoned flows; callers
    // enforce expiry against the record's own `expires_at`.
    async fn put(&self, nonce: &str, record: &StateRecord, _ttl: Duration) -> Result<()> {
        self.cache.insert(nonce.to_string(), record.clone()).await;

        Ok(())
    }

    async fn take(&self, nonce: &str) -> Result<Option<StateRecord>> {
        Ok(self.cache.remove(nonce).await)
    }
}
