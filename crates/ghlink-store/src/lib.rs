use eyre::Result;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// One in-flight authorization attempt, keyed by its state nonce.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Identifier of the product instance that started the flow. Bound at
    /// creation, checked again when the callback comes in.
    pub host: String,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl StateRecord {
    pub fn new(host: impl Into<String>, ttl: Duration) -> Self {
        let created_at = SystemTime::now();

        Self {
            host: host.into(),
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }
}

#[allow(async_fn_in_trait)]
pub trait StateStore: Send + Sync {
    /// Writes the record under `nonce` with the given time to live.
    async fn put(&self, nonce: &str, record: &StateRecord, ttl: Duration) -> Result<()>;

    /// Removes and returns the record for `nonce` as a single atomic
    /// operation, so that at most one caller ever observes it. A nonce that
    /// was never stored, has expired, or was already taken all look the same:
    /// `None`.
    async fn take(&self, nonce: &str) -> Result<Option<StateRecord>>;
}
