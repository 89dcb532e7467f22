//! Uniform read/write/invalidate API over the volatile tier and the
//! freshness store.

use super::{FreshnessRecord, FreshnessStore};
use crate::cache::DynVolatileCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheDefaults, TtlPolicy};
use crate::error::Result;
use crate::models::EntityType;
use crate::repository::DynRepository;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Composes the volatile cache, the durable freshness store and the TTL
/// policy.
///
/// The volatile tier is optional. Without it every write is a no-op and
/// every `get` misses; freshness decisions are unaffected.
pub struct CacheCoordinator {
    volatile: Option<DynVolatileCache>,
    store: Arc<dyn FreshnessStore>,
    repository: Option<DynRepository>,
    policy: TtlPolicy,
    clock: Arc<dyn Clock>,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn FreshnessStore>, policy: TtlPolicy) -> Self {
        Self {
            volatile: None,
            store,
            repository: None,
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_volatile(mut self, cache: DynVolatileCache) -> Self {
        self.volatile = Some(cache);
        self
    }

    /// Durable fallback used by [`load_entity`](Self::load_entity).
    pub fn with_repository(mut self, repository: DynRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    pub fn has_volatile(&self) -> bool {
        self.volatile.is_some()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Volatile-tier key for an entity.
    pub fn entity_cache_key(entity_type: EntityType, entity_key: &str) -> String {
        format!("{}:{}:{}", CacheDefaults::KEY_PREFIX, entity_type, entity_key)
    }

    // ---------------------------------------------------------------------
    // Freshness metadata
    // ---------------------------------------------------------------------

    pub fn get_metadata(
        &self,
        entity_type: EntityType,
        entity_key: &str,
    ) -> Result<Option<FreshnessRecord>> {
        self.store.get(entity_type, entity_key)
    }

    /// Record a successful sync at the current time.
    ///
    /// `expires_at` is `now` plus the policy TTL for `entity_type`, capped at
    /// [`FreshnessRecord::latest_expiry`]. The write is an upsert, so
    /// repeated calls leave one record.
    pub fn set_metadata(
        &self,
        entity_type: EntityType,
        entity_key: &str,
        data_hash: Option<String>,
    ) -> Result<FreshnessRecord> {
        let cached_at = self.clock.now();
        let ttl = self.policy.ttl_for(entity_type);
        let latest = FreshnessRecord::latest_expiry();
        let expires_at = ChronoDuration::from_std(ttl)
            .ok()
            .and_then(|ttl| cached_at.checked_add_signed(ttl))
            .map_or(latest, |at| at.min(latest))
            .max(cached_at);

        let record = FreshnessRecord {
            entity_type,
            entity_key: entity_key.to_string(),
            cached_at,
            expires_at,
            data_hash,
        };
        self.store.upsert(&record)?;
        Ok(record)
    }

    /// Whether the entity must be re-fetched.
    ///
    /// True when no record exists or `now` is strictly after `expires_at`.
    /// A store failure also reports true so the entity is retried.
    pub fn needs_refresh(&self, entity_type: EntityType, entity_key: &str) -> bool {
        match self.store.get(entity_type, entity_key) {
            Ok(Some(record)) => record.is_stale_at(self.clock.now()),
            Ok(None) => true,
            Err(e) => {
                warn!(
                    "Freshness lookup failed for {}:{}, treating as stale: {}",
                    entity_type, entity_key, e
                );
                true
            }
        }
    }

    /// Whether `data_hash` matches the hash recorded at the last sync.
    pub fn is_unchanged(&self, entity_type: EntityType, entity_key: &str, data_hash: &str) -> bool {
        matches!(
            self.store.get(entity_type, entity_key),
            Ok(Some(FreshnessRecord { data_hash: Some(ref previous), .. })) if previous == data_hash
        )
    }

    /// Drop the freshness record and the volatile entry for an entity.
    ///
    /// The next `needs_refresh` for it reports true.
    pub async fn invalidate_entity(&self, entity_type: EntityType, entity_key: &str) -> Result<()> {
        self.store.delete(entity_type, entity_key)?;
        self.delete(&Self::entity_cache_key(entity_type, entity_key))
            .await;
        debug!("Invalidated {}:{}", entity_type, entity_key);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Volatile tier
    // ---------------------------------------------------------------------

    /// Fast-path read from the volatile tier only.
    ///
    /// A miss, a missing backend or a backend failure all return `None`.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let cache = self.volatile.as_ref()?;
        match cache.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Volatile cache read failed for '{}': {}", key, e);
                None
            }
        }
    }

    /// Write to the volatile tier if one is configured. Failures are logged.
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) {
        let Some(cache) = self.volatile.as_ref() else {
            return;
        };
        if let Err(e) = cache.set(key, value, ttl).await {
            warn!("Volatile cache write failed for '{}': {}", key, e);
        }
    }

    pub async fn delete(&self, key: &str) {
        let Some(cache) = self.volatile.as_ref() else {
            return;
        };
        if let Err(e) = cache.delete(key).await {
            warn!("Volatile cache delete failed for '{}': {}", key, e);
        }
    }

    /// Flush the whole volatile tier. Freshness records are untouched.
    pub async fn clear_volatile(&self) {
        let Some(cache) = self.volatile.as_ref() else {
            return;
        };
        match cache.clear().await {
            Ok(()) => debug!("Cleared {} volatile cache", cache.backend_name()),
            Err(e) => warn!("Volatile cache clear failed: {}", e),
        }
    }

    /// Cache an entity payload under its entity key with the policy TTL.
    pub async fn set_entity(&self, entity_type: EntityType, entity_key: &str, payload: &[u8]) {
        let key = Self::entity_cache_key(entity_type, entity_key);
        self.set(&key, payload, self.policy.ttl_for(entity_type))
            .await;
    }

    pub async fn get_entity(&self, entity_type: EntityType, entity_key: &str) -> Option<Vec<u8>> {
        self.get(&Self::entity_cache_key(entity_type, entity_key))
            .await
    }

    /// Read an entity, falling back to the repository on a volatile miss.
    ///
    /// A repository hit is written back to the volatile tier. Without a
    /// repository this behaves like [`get_entity`](Self::get_entity).
    pub async fn load_entity(
        &self,
        entity_type: EntityType,
        entity_key: &str,
    ) -> Result<Option<Vec<u8>>> {
        if let Some(payload) = self.get_entity(entity_type, entity_key).await {
            return Ok(Some(payload));
        }

        let Some(repository) = self.repository.as_ref() else {
            return Ok(None);
        };

        match repository.get_by_id(entity_type, entity_key).await? {
            Some(record) => {
                self.set_entity(entity_type, entity_key, &record.payload)
                    .await;
                Ok(Some(record.payload))
            }
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field(
                "volatile",
                &self.volatile.as_ref().map(|c| c.backend_name()),
            )
            .field("has_repository", &self.repository.is_some())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LruStore;
    use crate::clock::ManualClock;
    use crate::freshness::{MemoryFreshnessStore, SqliteFreshnessStore};
    use crate::repository::{EntityRecord, MemoryRepository, Repository};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 16, 19, 0, 0).unwrap()
    }

    fn coordinator(clock: Arc<ManualClock>) -> CacheCoordinator {
        CacheCoordinator::new(Arc::new(MemoryFreshnessStore::new()), TtlPolicy::default())
            .with_clock(clock)
    }

    #[test]
    fn test_missing_record_needs_refresh() {
        let coord = coordinator(Arc::new(ManualClock::new(t0())));
        assert!(coord.needs_refresh(EntityType::Competition, "PL"));
        assert!(coord.get_metadata(EntityType::Competition, "PL").unwrap().is_none());
    }

    #[test]
    fn test_team_ttl_scenario() {
        let clock = Arc::new(ManualClock::new(t0()));
        let policy = TtlPolicy::default().with_ttl(EntityType::Team, Duration::from_secs(12 * 3600));
        let coord = CacheCoordinator::new(Arc::new(MemoryFreshnessStore::new()), policy)
            .with_clock(clock.clone());

        coord.set_metadata(EntityType::Team, "57", None).unwrap();

        clock.advance(Duration::from_secs(11 * 3600));
        assert!(!coord.needs_refresh(EntityType::Team, "57"));

        clock.set(t0() + ChronoDuration::hours(12));
        assert!(!coord.needs_refresh(EntityType::Team, "57"));

        clock.advance(Duration::from_secs(1));
        assert!(coord.needs_refresh(EntityType::Team, "57"));
    }

    #[test]
    fn test_set_metadata_computes_expiry_from_policy() {
        let coord = coordinator(Arc::new(ManualClock::new(t0())));
        let record = coord
            .set_metadata(EntityType::Matches, "PL", Some("h".into()))
            .unwrap();
        assert_eq!(record.cached_at, t0());
        assert_eq!(record.expires_at, t0() + ChronoDuration::minutes(5));
        assert!(record.expires_at >= record.cached_at);
    }

    #[test]
    fn test_set_metadata_twice_keeps_one_record() {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(MemoryFreshnessStore::new());
        let coord = CacheCoordinator::new(store.clone(), TtlPolicy::default())
            .with_clock(clock.clone());

        coord
            .set_metadata(EntityType::Standings, "PL", Some("first".into()))
            .unwrap();
        clock.advance(Duration::from_secs(60));
        coord
            .set_metadata(EntityType::Standings, "PL", Some("second".into()))
            .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let record = coord
            .get_metadata(EntityType::Standings, "PL")
            .unwrap()
            .unwrap();
        assert_eq!(record.data_hash.as_deref(), Some("second"));
        assert_eq!(record.cached_at, t0() + ChronoDuration::seconds(60));
    }

    #[test]
    fn test_huge_ttl_round_trips_through_sqlite() {
        let policy = TtlPolicy::default().with_ttl(EntityType::Team, Duration::from_secs(u64::MAX));
        let coord = CacheCoordinator::new(Arc::new(SqliteFreshnessStore::in_memory().unwrap()), policy)
            .with_clock(Arc::new(ManualClock::new(t0())));

        let written = coord.set_metadata(EntityType::Team, "57", None).unwrap();
        assert_eq!(written.expires_at, FreshnessRecord::latest_expiry());

        let read = coord.get_metadata(EntityType::Team, "57").unwrap().unwrap();
        assert_eq!(read.expires_at, written.expires_at);
        assert!(!coord.needs_refresh(EntityType::Team, "57"));
    }

    #[test]
    fn test_is_unchanged() {
        let coord = coordinator(Arc::new(ManualClock::new(t0())));
        assert!(!coord.is_unchanged(EntityType::Team, "57", "abc"));

        coord
            .set_metadata(EntityType::Team, "57", Some("abc".into()))
            .unwrap();
        assert!(coord.is_unchanged(EntityType::Team, "57", "abc"));
        assert!(!coord.is_unchanged(EntityType::Team, "57", "def"));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh_and_drops_cache_entry() {
        let cache = Arc::new(LruStore::new(8));
        let coord = coordinator(Arc::new(ManualClock::new(t0()))).with_volatile(cache.clone());

        coord.set_metadata(EntityType::Competition, "PL", None).unwrap();
        coord
            .set_entity(EntityType::Competition, "PL", b"{}")
            .await;
        assert!(!coord.needs_refresh(EntityType::Competition, "PL"));
        assert!(cache.contains("football:competition:PL"));

        coord
            .invalidate_entity(EntityType::Competition, "PL")
            .await
            .unwrap();

        assert!(coord.needs_refresh(EntityType::Competition, "PL"));
        assert!(!cache.contains("football:competition:PL"));
    }

    #[tokio::test]
    async fn test_without_volatile_writes_are_noops() {
        let coord = coordinator(Arc::new(ManualClock::new(t0())));
        assert!(!coord.has_volatile());

        coord.set("k", b"v", Duration::from_secs(60)).await;
        assert_eq!(coord.get("k").await, None);
        coord.delete("k").await;
        coord
            .invalidate_entity(EntityType::Team, "57")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_clear_volatile_keeps_freshness_records() {
        let cache = Arc::new(LruStore::new(8));
        let coord = coordinator(Arc::new(ManualClock::new(t0()))).with_volatile(cache.clone());

        coord.set_metadata(EntityType::Team, "57", None).unwrap();
        coord.set_entity(EntityType::Team, "57", b"{}").await;
        coord.set_entity(EntityType::Team, "61", b"{}").await;
        assert_eq!(cache.len(), 2);

        coord.clear_volatile().await;

        assert_eq!(cache.len(), 0);
        assert_eq!(coord.get_entity(EntityType::Team, "57").await, None);
        assert!(!coord.needs_refresh(EntityType::Team, "57"));

        // No backend configured.
        coordinator(Arc::new(ManualClock::new(t0()))).clear_volatile().await;
    }

    #[tokio::test]
    async fn test_get_reads_volatile_tier_only() {
        let cache = Arc::new(LruStore::new(8));
        let repo = Arc::new(MemoryRepository::new());
        let coord = coordinator(Arc::new(ManualClock::new(t0())))
            .with_volatile(cache.clone())
            .with_repository(repo.clone());

        repo.save(&EntityRecord {
            entity_type: EntityType::Standings,
            key: "PL".into(),
            payload: br#"{"standings":[]}"#.to_vec(),
            fetched_at: t0(),
            data_hash: None,
        })
        .await
        .unwrap();

        assert_eq!(coord.get_entity(EntityType::Standings, "PL").await, None);
    }

    #[tokio::test]
    async fn test_load_entity_falls_back_to_repository() {
        let cache = Arc::new(LruStore::new(8));
        let repo = Arc::new(MemoryRepository::new());
        let coord = coordinator(Arc::new(ManualClock::new(t0())))
            .with_volatile(cache.clone())
            .with_repository(repo.clone());

        assert_eq!(
            coord.load_entity(EntityType::Standings, "PL").await.unwrap(),
            None
        );

        let payload = br#"{"standings":[]}"#.to_vec();
        repo.save(&EntityRecord {
            entity_type: EntityType::Standings,
            key: "PL".into(),
            payload: payload.clone(),
            fetched_at: t0(),
            data_hash: None,
        })
        .await
        .unwrap();

        assert_eq!(
            coord.load_entity(EntityType::Standings, "PL").await.unwrap(),
            Some(payload.clone())
        );
        assert_eq!(
            coord.get_entity(EntityType::Standings, "PL").await,
            Some(payload)
        );
    }

    #[test]
    fn test_entity_cache_key() {
        assert_eq!(
            CacheCoordinator::entity_cache_key(EntityType::HeadToHead, "327117"),
            "football:head2head:327117"
        );
    }
}
