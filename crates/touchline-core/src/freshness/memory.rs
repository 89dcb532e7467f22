//! In-memory freshness store.

use super::{FreshnessRecord, FreshnessStore};
use crate::error::Result;
use crate::models::EntityType;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Freshness store kept in a map. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryFreshnessStore {
    records: RwLock<HashMap<(EntityType, String), FreshnessRecord>>,
}

impl MemoryFreshnessStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FreshnessStore for MemoryFreshnessStore {
    fn get(&self, entity_type: EntityType, entity_key: &str) -> Result<Option<FreshnessRecord>> {
        Ok(self
            .records
            .read()
            .get(&(entity_type, entity_key.to_string()))
            .cloned())
    }

    fn upsert(&self, record: &FreshnessRecord) -> Result<()> {
        self.records.write().insert(
            (record.entity_type, record.entity_key.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn delete(&self, entity_type: EntityType, entity_key: &str) -> Result<bool> {
        Ok(self
            .records
            .write()
            .remove(&(entity_type, entity_key.to_string()))
            .is_some())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}
