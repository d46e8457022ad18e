use eyre::Result;
use ghlink_store::{StateRecord, StateStore};
use std::time::Duration;

#[derive(Clone)]
pub enum Store {
    Redis(ghlink_redis::RedisStore),
    Moka(ghlink_moka::MokaStore),
}

impl StateStore for Store {
    async fn put(&self, nonce: &str, record: &StateRecord, ttl: Duration) -> Result<()> {
        match self {
            Store::Redis(store) => store.put(nonce, record, ttl).await,
            Store::Moka(store) => store.put(nonce, record, ttl).await,
        }
    }

    async fn take(&self, nonce: &str) -> Result<Option<StateRecord>> {
        match self {
            Store::Redis(store) => store.take(nonce).await,
            Store::Moka(store) => store.take(nonce).await,
        }
    }
}
