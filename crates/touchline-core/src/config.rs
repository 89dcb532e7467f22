//! Centralized configuration for Touchline.
//!
//! Constant tables follow the `XxxConfig` pattern; runtime configuration
//! (TTL policy, rate limit, cache backend selection, scheduler targets) is
//! built from those defaults and is immutable once handed to the engine.

use std::collections::HashMap;
use std::time::Duration;

use crate::models::EntityType;

/// Upstream API constants.
pub struct UpstreamConfig;

impl UpstreamConfig {
    pub const BASE_URL: &'static str = "https://api.football-data.org/v4";
    pub const AUTH_HEADER: &'static str = "X-Auth-Token";
    pub const USER_AGENT: &'static str = "Touchline/0.1";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const REQUESTS_PER_WINDOW: u32 = 10;
    pub const RATE_WINDOW: Duration = Duration::from_secs(60);
    /// Remaining-request count below which the client logs a warning.
    pub const LOW_QUOTA_THRESHOLD: u64 = 2;
}

/// Volatile cache defaults.
pub struct CacheDefaults;

impl CacheDefaults {
    pub const LRU_CAPACITY: usize = 1000;
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const KEY_PREFIX: &'static str = "football";
}

/// Scheduler defaults.
pub struct SchedulerDefaults;

impl SchedulerDefaults {
    pub const SYNC_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
    pub const INTER_ENTITY_DELAY: Duration = Duration::from_secs(2);
}

/// Durable storage file names.
pub struct PathsConfig;

impl PathsConfig {
    pub const DATA_DIR_NAME: &'static str = "touchline";
    pub const DATABASE_FILENAME: &'static str = "touchline.sqlite";
}

/// Flat outbound rate ceiling: at most `requests` calls per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(requests: u32, window: Duration) -> Self {
        Self {
            requests: requests.max(1),
            window,
        }
    }

    /// Minimum spacing between two permitted calls.
    pub fn required_gap(&self) -> Duration {
        self.window / self.requests.max(1)
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(UpstreamConfig::REQUESTS_PER_WINDOW, UpstreamConfig::RATE_WINDOW)
    }
}

/// Freshness TTL per entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct TtlPolicy {
    ttls: HashMap<EntityType, Duration>,
}

impl TtlPolicy {
    pub const COMPETITION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
    pub const TEAM_TTL: Duration = Duration::from_secs(12 * 60 * 60);
    pub const MATCHES_TTL: Duration = Duration::from_secs(5 * 60);
    pub const STANDINGS_TTL: Duration = Duration::from_secs(15 * 60);
    pub const HEAD_TO_HEAD_TTL: Duration = Duration::from_secs(60 * 60);

    /// Replace the TTL for one entity type, returning the new policy.
    pub fn with_ttl(mut self, entity_type: EntityType, ttl: Duration) -> Self {
        self.ttls.insert(entity_type, ttl);
        self
    }

    /// TTL for an entity type.
    pub fn ttl_for(&self, entity_type: EntityType) -> Duration {
        self.ttls
            .get(&entity_type)
            .copied()
            .unwrap_or_else(|| Self::default_ttl(entity_type))
    }

    fn default_ttl(entity_type: EntityType) -> Duration {
        match entity_type {
            EntityType::Competition => Self::COMPETITION_TTL,
            EntityType::Team => Self::TEAM_TTL,
            EntityType::Matches => Self::MATCHES_TTL,
            EntityType::Standings => Self::STANDINGS_TTL,
            EntityType::HeadToHead => Self::HEAD_TO_HEAD_TTL,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        let ttls = EntityType::ALL
            .iter()
            .map(|t| (*t, Self::default_ttl(*t)))
            .collect();
        Self { ttls }
    }
}

/// Which volatile cache backend to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackendConfig {
    /// In-process bounded LRU store.
    Memory { capacity: usize },
    /// Networked cache service (Redis protocol).
    Networked { url: String },
}

impl CacheBackendConfig {
    pub fn default_capacity() -> usize {
        CacheDefaults::LRU_CAPACITY
    }

    /// Build a backend selection from loosely typed settings.
    ///
    /// Unrecognized kinds, or a networked kind without a URL, select the
    /// in-process store with the default capacity.
    pub fn from_settings(kind: &str, url: Option<&str>, capacity: Option<usize>) -> Self {
        match kind.trim().to_lowercase().as_str() {
            "memory" | "lru" => CacheBackendConfig::Memory {
                capacity: capacity
                    .filter(|c| *c > 0)
                    .unwrap_or(CacheDefaults::LRU_CAPACITY),
            },
            "redis" | "networked" => match url.map(str::trim).filter(|u| !u.is_empty()) {
                Some(url) => CacheBackendConfig::Networked {
                    url: url.to_string(),
                },
                None => CacheBackendConfig::default(),
            },
            _ => CacheBackendConfig::default(),
        }
    }
}

impl Default for CacheBackendConfig {
    fn default() -> Self {
        CacheBackendConfig::Memory {
            capacity: CacheDefaults::LRU_CAPACITY,
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub sync_interval: Duration,
    pub inter_entity_delay: Duration,
    /// Competition codes to track; empty means discover via the API.
    pub competition_codes: Vec<String>,
    pub team_ids: Vec<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval: SchedulerDefaults::SYNC_INTERVAL,
            inter_entity_delay: SchedulerDefaults::INTER_ENTITY_DELAY,
            competition_codes: Vec::new(),
            team_ids: Vec::new(),
        }
    }
}
