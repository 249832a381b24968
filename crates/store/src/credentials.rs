//! Per-session credential cache.

use recruitr_core::error::StoreError;
use recruitr_core::graphql::Credential;
use recruitr_core::store::KvStore;
use std::sync::Arc;
use std::time::Duration;

fn credential_key(session_id: &str) -> String {
    format!("credential:{session_id}")
}

/// Caches the bearer credential an interactive caller presented, so tool
/// calls later in the session can act on the caller's behalf.
pub struct CredentialCache {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl CredentialCache {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    pub async fn put(&self, session_id: &str, credential: &Credential) -> Result<(), StoreError> {
        let raw = serde_json::to_string(credential)
            .map_err(|e| StoreError::Storage(format!("failed to serialize credential: {e}")))?;
        let ttl = (!self.ttl.is_zero()).then_some(self.ttl);
        self.kv.set(&credential_key(session_id), &raw, ttl).await
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<Credential>, StoreError> {
        let key = credential_key(session_id);
        match self.kv.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key,
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    pub async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        self.kv.delete(&credential_key(session_id)).await
    }
}
