//! Touchline - freshness and synchronization engine for a quota-limited
//! football data API.
//!
//! This crate keeps a durable store current against an upstream that allows
//! only a handful of requests per minute. It provides:
//! - A flat-gap [`RateLimiter`] and an authenticated [`UpstreamClient`]
//! - A two-tier cache: a [`VolatileCache`] (in-process LRU or networked) in
//!   front of durable [`FreshnessRecord`]s
//! - A [`SyncScheduler`] that refetches only what has gone stale
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use touchline::{
//!     CacheCoordinator, CancellationToken, ClientOptions, LruStore, SchedulerConfig,
//!     SqliteFreshnessStore, SqliteRepository, SyncScheduler, TtlPolicy, UpstreamClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> touchline::Result<()> {
//!     let client = Arc::new(UpstreamClient::new(ClientOptions::new("api-key"))?);
//!     let repository = Arc::new(SqliteRepository::new("/tmp/touchline.sqlite")?);
//!     let coordinator = Arc::new(
//!         CacheCoordinator::new(
//!             Arc::new(SqliteFreshnessStore::new("/tmp/touchline.sqlite")?),
//!             TtlPolicy::default(),
//!         )
//!         .with_volatile(Arc::new(LruStore::new(1000)))
//!         .with_repository(repository.clone()),
//!     );
//!
//!     let config = SchedulerConfig {
//!         competition_codes: vec!["PL".into()],
//!         ..Default::default()
//!     };
//!     let scheduler = Arc::new(SyncScheduler::new(config, client, coordinator, repository));
//!     let report = scheduler.run_tick(&CancellationToken::new()).await;
//!     println!("Refreshed {} entities", report.refreshed);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod freshness;
pub mod models;
pub mod network;
pub mod repository;
pub mod sync;

// Re-export commonly used types
pub use cache::{
    build_volatile_cache, build_volatile_cache_or_fallback, CacheStats, DynVolatileCache,
    LruStore, RedisCache, VolatileCache,
};
pub use cancel::{CancellationToken, CancelledError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CacheBackendConfig, CacheDefaults, PathsConfig, RateLimit, SchedulerConfig,
    SchedulerDefaults, TtlPolicy, UpstreamConfig,
};
pub use error::{Result, SyncError};
pub use freshness::{
    compute_data_hash, compute_payload_hash, CacheCoordinator, FreshnessRecord, FreshnessStore,
    MemoryFreshnessStore, SqliteFreshnessStore,
};
pub use models::{EntityType, SyncTarget};
pub use network::{
    ClientOptions, DynUpstreamSource, QuotaState, RateLimiter, UpstreamClient, UpstreamSource,
};
pub use repository::{DynRepository, EntityRecord, MemoryRepository, Repository, SqliteRepository};
pub use sync::{SchedulerHandle, SyncScheduler, TickReport};
