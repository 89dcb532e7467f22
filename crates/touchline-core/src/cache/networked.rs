//! Networked backend speaking the Redis protocol.

use super::VolatileCache;
use crate::config::CacheDefaults;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::debug;

/// Longest expiry passed to `SET PX`. The server rejects expiries whose
/// absolute deadline overflows a signed 64-bit millisecond clock.
const MAX_EXPIRY_MILLIS: u128 = (i64::MAX / 2) as u128;

/// Volatile cache backed by a Redis server.
///
/// TTL and eviction are delegated to the server. A missing key is a miss,
/// not an error.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect and verify the server answers `PING`.
    ///
    /// Fails if the server is unreachable within the connect timeout.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_timeout(url, CacheDefaults::CONNECT_TIMEOUT).await
    }

    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| SyncError::CacheBackend {
            message: format!("Invalid cache URL '{}': {}", url, e),
            source: Some(e),
        })?;

        let connect = async {
            // PING on a plain connection first so a refused connection fails
            // fast instead of going through the manager's reconnect backoff.
            let mut check = client.get_multiplexed_async_connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut check).await?;
            ConnectionManager::new(client.clone()).await
        };

        let conn = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| SyncError::CacheBackend {
                message: format!("Timed out connecting to cache at {}", url),
                source: None,
            })??;

        debug!("Connected to networked cache at {}", url);
        Ok(Self { conn })
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

#[async_trait]
impl VolatileCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let millis = ttl.as_millis().clamp(1, MAX_EXPIRY_MILLIS) as u64;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(count > 0)
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
