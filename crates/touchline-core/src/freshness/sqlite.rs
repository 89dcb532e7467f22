//! SQLite-backed freshness store.

use super::{FreshnessRecord, FreshnessStore};
use crate::error::{Result, SyncError};
use crate::models::EntityType;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Freshness records in a `cache_metadata` table.
///
/// The composite primary key plus `ON CONFLICT DO UPDATE` makes every write
/// a single atomic upsert. Thread-safe via an internal mutex on the
/// connection.
pub struct SqliteFreshnessStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFreshnessStore {
    /// Open (or create) the store at `db_path`.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::Io {
                message: format!("Failed to create database directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| SyncError::Database {
            message: format!("Failed to open freshness database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| SyncError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        Self::from_connection(conn)
    }

    /// Store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_metadata (
                entity_type TEXT NOT NULL,
                entity_key TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                data_hash TEXT,
                PRIMARY KEY (entity_type, entity_key)
            );

            CREATE INDEX IF NOT EXISTS idx_cache_metadata_expires
                ON cache_metadata(expires_at);
            "#,
        )
        .map_err(|e| SyncError::Database {
            message: format!("Failed to initialize freshness schema: {}", e),
            source: Some(e),
        })?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| SyncError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SyncError::Database {
            message: format!("Invalid timestamp '{}': {}", value, e),
            source: None,
        })
}

impl FreshnessStore for SqliteFreshnessStore {
    fn get(&self, entity_type: EntityType, entity_key: &str) -> Result<Option<FreshnessRecord>> {
        let conn = self.lock()?;

        let row: Option<(String, String, Option<String>)> = conn
            .query_row(
                r#"
                SELECT cached_at, expires_at, data_hash
                FROM cache_metadata
                WHERE entity_type = ?1 AND entity_key = ?2
                "#,
                params![entity_type.as_str(), entity_key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| SyncError::Database {
                message: format!("Failed to query freshness record: {}", e),
                source: Some(e),
            })?;

        let Some((cached_at, expires_at, data_hash)) = row else {
            return Ok(None);
        };

        Ok(Some(FreshnessRecord {
            entity_type,
            entity_key: entity_key.to_string(),
            cached_at: parse_timestamp(&cached_at)?,
            expires_at: parse_timestamp(&expires_at)?,
            data_hash,
        }))
    }

    fn upsert(&self, record: &FreshnessRecord) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO cache_metadata (entity_type, entity_key, cached_at, expires_at, data_hash)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(entity_type, entity_key) DO UPDATE SET
                cached_at = excluded.cached_at,
                expires_at = excluded.expires_at,
                data_hash = excluded.data_hash
            "#,
            params![
                record.entity_type.as_str(),
                record.entity_key,
                record.cached_at.to_rfc3339(),
                record.expires_at.to_rfc3339(),
                record.data_hash,
            ],
        )
        .map_err(|e| SyncError::Database {
            message: format!("Failed to upsert freshness record: {}", e),
            source: Some(e),
        })?;

        debug!(
            "Upserted freshness record {}:{} (expires {})",
            record.entity_type, record.entity_key, record.expires_at
        );
        Ok(())
    }

    fn delete(&self, entity_type: EntityType, entity_key: &str) -> Result<bool> {
        let conn = self.lock()?;

        let deleted = conn
            .execute(
                "DELETE FROM cache_metadata WHERE entity_type = ?1 AND entity_key = ?2",
                params![entity_type.as_str(), entity_key],
            )
            .map_err(|e| SyncError::Database {
                message: format!("Failed to delete freshness record: {}", e),
                source: Some(e),
            })?;

        Ok(deleted > 0)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_metadata", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteFreshnessStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteFreshnessStore::new(temp_dir.path().join("freshness.sqlite")).unwrap();
        (temp_dir, store)
    }

    fn record(key: &str, cached_at: DateTime<Utc>, hash: Option<&str>) -> FreshnessRecord {
        FreshnessRecord {
            entity_type: EntityType::Competition,
            entity_key: key.into(),
            cached_at,
            expires_at: cached_at + Duration::hours(24),
            data_hash: hash.map(String::from),
        }
    }

    #[test]
    fn test_get_missing_is_none() {
        let (_dir, store) = create_test_store();
        assert_eq!(store.get(EntityType::Competition, "PL").unwrap(), None);
    }

    #[test]
    fn test_upsert_and_get() {
        let (_dir, store) = create_test_store();
        let t0 = Utc.with_ymd_and_hms(2024, 8, 16, 19, 0, 0).unwrap();
        let rec = record("PL", t0, Some("abc"));
        store.upsert(&rec).unwrap();

        assert_eq!(store.get(EntityType::Competition, "PL").unwrap(), Some(rec));
        assert_eq!(store.get(EntityType::Standings, "PL").unwrap(), None);
    }

    #[test]
    fn test_upsert_replaces_existing_record() {
        let (_dir, store) = create_test_store();
        let t0 = Utc.with_ymd_and_hms(2024, 8, 16, 19, 0, 0).unwrap();
        store.upsert(&record("PL", t0, Some("first"))).unwrap();

        let second = record("PL", t0 + Duration::hours(1), Some("second"));
        store.upsert(&second).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get(EntityType::Competition, "PL").unwrap(), Some(second));
    }

    #[test]
    fn test_upsert_can_clear_hash() {
        let (_dir, store) = create_test_store();
        let t0 = Utc.with_ymd_and_hms(2024, 8, 16, 19, 0, 0).unwrap();
        store.upsert(&record("PL", t0, Some("abc"))).unwrap();
        store.upsert(&record("PL", t0, None)).unwrap();

        let stored = store.get(EntityType::Competition, "PL").unwrap().unwrap();
        assert_eq!(stored.data_hash, None);
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = create_test_store();
        store.upsert(&record("PL", Utc::now(), None)).unwrap();

        assert!(store.delete(EntityType::Competition, "PL").unwrap());
        assert!(!store.delete(EntityType::Competition, "PL").unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("freshness.sqlite");
        let t0 = Utc.with_ymd_and_hms(2024, 8, 16, 19, 0, 0).unwrap();

        {
            let store = SqliteFreshnessStore::new(&path).unwrap();
            store.upsert(&record("BL1", t0, Some("h"))).unwrap();
        }

        let store = SqliteFreshnessStore::new(&path).unwrap();
        let stored = store.get(EntityType::Competition, "BL1").unwrap().unwrap();
        assert_eq!(stored.cached_at, t0);
        assert_eq!(stored.data_hash.as_deref(), Some("h"));
    }
}
