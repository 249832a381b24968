//! Session storage for Recruitr.
//!
//! Key-value backends implement `recruitr_core::KvStore`; transcripts,
//! credentials and session owners are layered on top, keyed by session id.

pub mod conversation;
pub mod credentials;
pub mod in_memory;
pub mod locks;
pub mod owners;
#[cfg(feature = "redis")]
pub mod redis_kv;

pub use conversation::ConversationStore;
pub use credentials::CredentialCache;
pub use in_memory::InMemoryKv;
pub use locks::SessionLocks;
pub use owners::SessionOwners;
#[cfg(feature = "redis")]
pub use redis_kv::RedisKv;

use recruitr_config::{StoreBackend, StoreConfig};
use recruitr_core::error::StoreError;
use recruitr_core::store::KvStore;
use std::sync::Arc;

/// Open the configured backend.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn KvStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryKv::new())),
        #[cfg(feature = "redis")]
        StoreBackend::Redis => Ok(Arc::new(RedisKv::connect(&config.redis_url).await?)),
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis => Err(StoreError::Connection(
            "built without the `redis` feature".into(),
        )),
    }
}
