//! Durable storage for fetched payloads.
//!
//! The scheduler saves every fetched entity here before it records
//! freshness metadata, so the read path can fall back to this store when the
//! volatile tier misses.

mod sqlite;

pub use sqlite::SqliteRepository;

use crate::error::Result;
use crate::models::EntityType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// One fetched upstream entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub entity_type: EntityType,
    pub key: String,
    /// Raw JSON payload as returned by the upstream.
    pub payload: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
    pub data_hash: Option<String>,
}

impl EntityRecord {
    /// Decode the payload into a typed model.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| crate::error::SyncError::decode(self.entity_type.as_str(), e))
    }
}

/// Durable entity storage.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert or replace the record for `(entity_type, key)`.
    async fn save(&self, record: &EntityRecord) -> Result<()>;

    async fn get_by_id(&self, entity_type: EntityType, key: &str) -> Result<Option<EntityRecord>>;
}

pub type DynRepository = Arc<dyn Repository>;

/// Repository kept in a map. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: RwLock<HashMap<(EntityType, String), EntityRecord>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn save(&self, record: &EntityRecord) -> Result<()> {
        self.records
            .write()
            .insert((record.entity_type, record.key.clone()), record.clone());
        Ok(())
    }

    async fn get_by_id(&self, entity_type: EntityType, key: &str) -> Result<Option<EntityRecord>> {
        Ok(self
            .records
            .read()
            .get(&(entity_type, key.to_string()))
            .cloned())
    }
}
