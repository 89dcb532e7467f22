//! Freshness tracking.
//!
//! Durable per-entity metadata (cached-at, expires-at, content hash) decides
//! staleness independently of whatever the volatile tier still holds.

mod coordinator;
mod memory;
mod sqlite;

pub use coordinator::CacheCoordinator;
pub use memory::MemoryFreshnessStore;
pub use sqlite::SqliteFreshnessStore;

use crate::error::Result;
use crate::models::EntityType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sync metadata for one (entity type, entity key) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessRecord {
    pub entity_type: EntityType,
    pub entity_key: String,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Content fingerprint from [`compute_data_hash`].
    pub data_hash: Option<String>,
}

impl FreshnessRecord {
    /// Latest expiry a record can carry: 9999-12-31T23:59:59Z.
    ///
    /// Later instants format as RFC 3339 with an extended year, which the
    /// durable store cannot read back.
    pub fn latest_expiry() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(9999, 12, 31)
            .and_then(|date| date.and_hms_opt(23, 59, 59))
            .map(|naive| naive.and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Stale strictly after `expires_at`; the expiry instant itself is fresh.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Durable store of freshness records.
///
/// Implementations must make `upsert` atomic per composite key so concurrent
/// syncs of the same entity never leave two records.
pub trait FreshnessStore: Send + Sync {
    fn get(&self, entity_type: EntityType, entity_key: &str) -> Result<Option<FreshnessRecord>>;

    /// Insert the record, or replace the existing one for the same key.
    fn upsert(&self, record: &FreshnessRecord) -> Result<()>;

    /// Delete the record. Returns whether one existed.
    fn delete(&self, entity_type: EntityType, entity_key: &str) -> Result<bool>;

    fn count(&self) -> Result<usize>;
}

/// Stable content hash of a serializable value.
///
/// The value is canonicalized through `serde_json::Value` first, so object
/// keys are hashed in sorted order regardless of how they were produced.
pub fn compute_data_hash<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let canonical = serde_json::to_value(value)?;
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Content hash of a raw JSON payload, independent of key order and
/// whitespace.
pub fn compute_payload_hash(payload: &[u8]) -> Result<String> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    compute_data_hash(&value)
}
