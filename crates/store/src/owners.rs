//! Which caller a session belongs to.

use recruitr_core::error::StoreError;
use recruitr_core::store::KvStore;
use std::sync::Arc;
use std::time::Duration;

fn owner_key(session_id: &str) -> String {
    format!("owner:{session_id}")
}

/// The identity of the first verified caller to use a session, stored
/// under `owner:{session_id}`. Unowned sessions stay open to anyone.
pub struct SessionOwners {
    kv: Arc<dyn KvStore>,
    ttl: Option<Duration>,
}

impl SessionOwners {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv, ttl: None }
    }

    /// Expire the record with the transcript. A zero duration disables expiry.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        self.kv.get(&owner_key(session_id)).await
    }

    pub async fn claim(&self, session_id: &str, owner: &str) -> Result<(), StoreError> {
        self.kv.set(&owner_key(session_id), owner, self.ttl).await
    }

    pub async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        self.kv.delete(&owner_key(session_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryKv;

    #[tokio::test]
    async fn claim_get_clear() {
        let kv = Arc::new(InMemoryKv::new());
        let owners = SessionOwners::new(kv.clone());
        assert!(owners.get("s1").await.unwrap().is_none());

        owners.claim("s1", "u-1").await.unwrap();
        assert_eq!(owners.get("s1").await.unwrap().as_deref(), Some("u-1"));
        assert_eq!(kv.get("owner:s1").await.unwrap().as_deref(), Some("u-1"));
        assert!(owners.get("s2").await.unwrap().is_none());

        owners.clear("s1").await.unwrap();
        assert!(owners.get("s1").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn owner_expires_with_ttl() {
        let owners = SessionOwners::new(Arc::new(InMemoryKv::new())).with_ttl(Duration::from_secs(60));
        owners.claim("s1", "u-1").await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(owners.get("s1").await.unwrap().is_none());
    }
}
