//! Key-value store trait: the contract with the session store.
//!
//! Transcripts and cached credentials are persisted through this trait.
//! Implementations: in-memory (tests, single process) and Redis.

use async_trait::async_trait;
use std::time::Duration;
use crate::error::StoreError;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// The backend name (e.g., "memory", "redis").
    fn name(&self) -> &str;

    /// Fetch a value; `None` when absent or expired.
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError>;

    /// Store a value, replacing any previous one. `ttl` of `None` never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> std::result::Result<(), StoreError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> std::result::Result<(), StoreError>;
}
