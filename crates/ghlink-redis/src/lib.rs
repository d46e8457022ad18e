use eyre::Result;
use ghlink_store::{StateRecord, StateStore};
use redis::{AsyncCommands, Client};
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    prefix: String,
}

#[derive(Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
}

impl RedisStore {
    pub async fn new(config: RedisConfig) -> Result<Self> {
        Ok(Self {
            client: Client::open(config.url)?,
            prefix: config.key_prefix,
        })
    }

    fn format_key(&self, nonce: &str) -> String {
        format!("{}:{}", self.prefix, nonce)
    }
}

impl StateStore for RedisStore {
    async fn put(&self, nonce: &str, record: &StateRecord, ttl: Duration) -> Result<()> {
        let key = self.format_key(nonce);
        let payload = serde_json::to_string(record)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.pset_ex::<_, _, ()>(key, payload, ttl.as_millis() as u64)
            .await?;
        Ok(())
    }

    // GETDEL keeps retrieval and removal a single server-side operation, so
    // two racing callers can never both see the same record.
    async fn take(&self, nonce: &str) -> Result<Option<StateRecord>> {
        let key = self.format_key(nonce);
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get_del(&key).await?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}
