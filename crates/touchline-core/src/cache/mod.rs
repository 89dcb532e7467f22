//! Volatile cache tier.
//!
//! A capability set over byte payloads with per-entry TTL and two
//! interchangeable backends:
//! - [`LruStore`]: in-process, bounded, least-recently-used eviction
//! - [`RedisCache`]: networked, TTL and eviction delegated to the server
//!
//! The tier is an accelerator only. A miss is `Ok(None)`, never an error.

mod lru_store;
mod networked;

pub use self::lru_store::{CacheStats, LruStore};
pub use self::networked::RedisCache;

use crate::config::CacheBackendConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Byte-payload cache with per-entry TTL.
#[async_trait]
pub trait VolatileCache: Send + Sync {
    /// Get a value. Absent and expired keys return `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value, replacing any existing entry for `key`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Whether a live entry exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remove every entry.
    async fn clear(&self) -> Result<()>;

    /// Short backend name for logging.
    fn backend_name(&self) -> &'static str;
}

pub type DynVolatileCache = Arc<dyn VolatileCache>;

/// Build the backend selected by `config`.
///
/// Fails only when the networked backend cannot be reached.
pub async fn build_volatile_cache(config: &CacheBackendConfig) -> Result<DynVolatileCache> {
    match config {
        CacheBackendConfig::Memory { capacity } => {
            info!("Using in-process LRU cache (capacity {})", capacity);
            Ok(Arc::new(LruStore::new(*capacity)))
        }
        CacheBackendConfig::Networked { url } => {
            let cache = RedisCache::connect(url).await?;
            info!("Using networked cache at {}", url);
            Ok(Arc::new(cache))
        }
    }
}

/// Build the configured backend, falling back to the in-process store when
/// the networked backend is unreachable.
///
/// Returns the built cache and the LRU store when one is in use, so the
/// caller can spawn its sweeper.
pub async fn build_volatile_cache_or_fallback(
    config: &CacheBackendConfig,
) -> (DynVolatileCache, Option<Arc<LruStore>>) {
    let capacity = match config {
        CacheBackendConfig::Memory { capacity } => *capacity,
        CacheBackendConfig::Networked { url } => match RedisCache::connect(url).await {
            Ok(cache) => {
                info!("Using networked cache at {}", url);
                return (Arc::new(cache), None);
            }
            Err(e) => {
                warn!("Networked cache unavailable, falling back to LRU: {}", e);
                CacheBackendConfig::default_capacity()
            }
        },
    };

    info!("Using in-process LRU cache (capacity {})", capacity);
    let store = Arc::new(LruStore::new(capacity));
    (store.clone(), Some(store))
}
