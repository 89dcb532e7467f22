//! SQLite-backed repository.

use super::{EntityRecord, Repository};
use crate::error::{Result, SyncError};
use crate::models::EntityType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Fetched payloads in an `entities` table keyed by (entity type, key).
///
/// Statements run inline under the connection mutex, the same way
/// [`SqliteFreshnessStore`](crate::freshness::SqliteFreshnessStore) runs
/// them. Each call is one short indexed statement.
#[derive(Clone)]
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
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
            message: format!("Failed to open repository database: {}", e),
            source: Some(e),
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                entity_type TEXT NOT NULL,
                entity_key TEXT NOT NULL,
                payload BLOB NOT NULL,
                fetched_at TEXT NOT NULL,
                data_hash TEXT,
                PRIMARY KEY (entity_type, entity_key)
            );
            "#,
        )
        .map_err(|e| SyncError::Database {
            message: format!("Failed to initialize repository schema: {}", e),
            source: Some(e),
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| SyncError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn save(&self, record: &EntityRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO entities (entity_type, entity_key, payload, fetched_at, data_hash)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(entity_type, entity_key) DO UPDATE SET
                payload = excluded.payload,
                fetched_at = excluded.fetched_at,
                data_hash = excluded.data_hash
            "#,
            params![
                record.entity_type.as_str(),
                record.key,
                record.payload,
                record.fetched_at.to_rfc3339(),
                record.data_hash,
            ],
        )
        .map_err(|e| SyncError::persistence(format!("{}:{}", record.entity_type, record.key), e))?;
        Ok(())
    }

    async fn get_by_id(&self, entity_type: EntityType, key: &str) -> Result<Option<EntityRecord>> {
        let conn = self.lock()?;
        let row: Option<(Vec<u8>, String, Option<String>)> = conn
            .query_row(
                r#"
                SELECT payload, fetched_at, data_hash
                FROM entities
                WHERE entity_type = ?1 AND entity_key = ?2
                "#,
                params![entity_type.as_str(), key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((payload, fetched_at, data_hash)) = row else {
            return Ok(None);
        };

        let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| SyncError::Database {
                message: format!("Invalid fetched_at '{}': {}", fetched_at, e),
                source: None,
            })?;

        Ok(Some(EntityRecord {
            entity_type,
            key: key.to_string(),
            payload,
            fetched_at,
            data_hash,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn standings_record(payload: &[u8], hash: &str) -> EntityRecord {
        EntityRecord {
            entity_type: EntityType::Standings,
            key: "PL".into(),
            payload: payload.to_vec(),
            fetched_at: Utc.with_ymd_and_hms(2024, 11, 20, 12, 0, 0).unwrap(),
            data_hash: Some(hash.into()),
        }
    }

    #[tokio::test]
    async fn test_save_and_get_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let repo = SqliteRepository::new(temp_dir.path().join("repo.sqlite")).unwrap();

        let record = standings_record(br#"{"standings":[]}"#, "h1");
        repo.save(&record).await.unwrap();

        let stored = repo
            .get_by_id(EntityType::Standings, "PL")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, record);
        assert!(repo
            .get_by_id(EntityType::Standings, "BL1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shares_database_file_with_freshness_store() {
        use crate::freshness::{FreshnessRecord, FreshnessStore, SqliteFreshnessStore};

        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("touchline.sqlite");
        let repo = SqliteRepository::new(&db_path).unwrap();
        let store = Arc::new(SqliteFreshnessStore::new(&db_path).unwrap());

        let mut tasks = Vec::new();
        for id in 0..16 {
            let repo = repo.clone();
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let key = id.to_string();
                let fetched_at = Utc.with_ymd_and_hms(2024, 11, 20, 12, 0, 0).unwrap();
                repo.save(&EntityRecord {
                    entity_type: EntityType::Team,
                    key: key.clone(),
                    payload: b"{}".to_vec(),
                    fetched_at,
                    data_hash: None,
                })
                .await
                .unwrap();
                store
                    .upsert(&FreshnessRecord {
                        entity_type: EntityType::Team,
                        entity_key: key,
                        cached_at: fetched_at,
                        expires_at: fetched_at,
                        data_hash: None,
                    })
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.count().unwrap(), 16);
        for id in 0..16 {
            assert!(repo
                .get_by_id(EntityType::Team, &id.to_string())
                .await
                .unwrap()
                .is_some());
        }
    }

    #[tokio::test]
    async fn test_save_overwrites_payload() {
        let repo = SqliteRepository::in_memory().unwrap();
        repo.save(&standings_record(b"{}", "h1")).await.unwrap();
        repo.save(&standings_record(br#"{"standings":[]}"#, "h2"))
            .await
            .unwrap();

        let stored = repo
            .get_by_id(EntityType::Standings, "PL")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.payload, br#"{"standings":[]}"#.to_vec());
        assert_eq!(stored.data_hash.as_deref(), Some("h2"));
    }
}
