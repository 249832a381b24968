//! Redis backend over a multiplexed tokio connection.

use async_trait::async_trait;
use recruitr_core::error::StoreError;
use recruitr_core::store::KvStore;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tracing::{error, info};

const MAX_CONNECT_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Session state kept in Redis. `set` with a TTL becomes `SET .. EX`.
pub struct RedisKv {
    conn: MultiplexedConnection,
}

impl RedisKv {
    /// Connect to `url`, retrying a few times before giving up.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Connection(format!("invalid redis url: {e}")))?;

        let mut attempt = 1;
        loop {
            match client.get_multiplexed_tokio_connection().await {
                Ok(conn) => {
                    info!(attempt, "Connected to Redis");
                    return Ok(Self { conn });
                }
                Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                    error!(error = %e, attempt, max = MAX_CONNECT_ATTEMPTS, "Failed to connect to Redis, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect to Redis after retries");
                    return Err(StoreError::Connection(e.to_string()));
                }
            }
        }
    }
}

/// Whole seconds for `SET EX`, rounded up so a sub-second TTL still
/// expires. A zero TTL means no expiry.
fn expiry_secs(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    let secs = ttl.as_secs();
    Some(if ttl.subsec_nanos() > 0 { secs + 1 } else { secs })
}

fn storage(e: redis::RedisError) -> StoreError {
    StoreError::Storage(e.to_string())
}

#[async_trait]
impl KvStore for RedisKv {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(storage)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        match ttl.and_then(expiry_secs) {
            Some(secs) => conn
                .set_ex::<_, _, ()>(key, value, secs)
                .await
                .map_err(storage),
            None => conn.set::<_, _, ()>(key, value).await.map_err(storage),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(storage)
    }
}
