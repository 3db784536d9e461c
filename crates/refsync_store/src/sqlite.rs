//! SQLite-backed sinks.
//!
//! One table per entity type, keyed on the record id. A single
//! `Mutex<Connection>` is shared by every sink of a store; statements run on
//! the blocking thread pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use refsync_engine::{EntityType, Record, RunSummary, Sink, SyncResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Idempotent DDL for the run history table.
const CREATE_RUNS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sync_runs (
    run_id TEXT PRIMARY KEY NOT NULL,
    entity TEXT NOT NULL,
    started_at TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    pages_attempted INTEGER NOT NULL,
    failed_pages INTEGER NOT NULL,
    inserted INTEGER NOT NULL,
    completed INTEGER NOT NULL,
    outcome TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_entity ON sync_runs (entity, started_at);
";

fn create_entity_table(entity: EntityType) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY NOT NULL,
            payload TEXT NOT NULL,
            synced_at TEXT NOT NULL
        );",
        table = entity.table_name()
    )
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(CREATE_RUNS_TABLE)?;
    for entity in EntityType::ALL {
        conn.execute_batch(&create_entity_table(entity))?;
    }
    Ok(())
}

/// A recorded run, as read back from the history table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    /// Run id.
    pub run_id: String,
    /// Entity type name.
    pub entity: String,
    /// RFC 3339 start time.
    pub started_at: String,
    /// Elapsed milliseconds.
    pub duration_ms: i64,
    /// Page indexes visited.
    pub pages_attempted: i64,
    /// Pages that failed.
    pub failed_pages: i64,
    /// Records inserted.
    pub inserted: i64,
    /// Whether the run completed.
    pub completed: bool,
    /// JSON-encoded outcome.
    pub outcome: String,
}

/// SQLite store holding every entity table and the run history.
///
/// Create with [`SqliteStore::open`] for file-backed persistence or
/// [`SqliteStore::in_memory`] for tests.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens or creates a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory can't be created, or
    /// [`StoreError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory store.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Returns the sink for one entity type.
    pub fn sink(&self, entity: EntityType) -> SqliteSink {
        SqliteSink {
            entity,
            conn: Arc::clone(&self.conn),
        }
    }

    /// Number of stored records of an entity type.
    pub fn count(&self, entity: EntityType) -> StoreResult<u64> {
        let conn = self.conn.lock();
        count_rows(&conn, entity)
    }

    /// Stored ids of an entity type, in insertion order.
    pub fn ids(&self, entity: EntityType) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} ORDER BY rowid",
            entity.table_name()
        ))?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Stored payload for an id.
    pub fn get(&self, entity: EntityType, id: &str) -> StoreResult<Option<Value>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                &format!("SELECT payload FROM {} WHERE id = ?1", entity.table_name()),
                [id],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .transpose()
    }

    /// Appends a run summary to the history table.
    pub fn record_run(&self, summary: &RunSummary) -> StoreResult<()> {
        let outcome = serde_json::to_string(&summary.outcome)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sync_runs \
             (run_id, entity, started_at, duration_ms, pages_attempted, failed_pages, inserted, completed, outcome) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                summary.run_id.to_string(),
                summary.entity.name(),
                summary.started_at.to_rfc3339(),
                i64::try_from(summary.duration.as_millis()).unwrap_or(i64::MAX),
                summary.pages_attempted,
                summary.failed_pages,
                i64::try_from(summary.inserted).unwrap_or(i64::MAX),
                summary.is_completed(),
                outcome,
            ],
        )?;
        Ok(())
    }

    /// Most recent runs, newest first, optionally for one entity type.
    pub fn recent_runs(
        &self,
        entity: Option<EntityType>,
        limit: usize,
    ) -> StoreResult<Vec<RunRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT run_id, entity, started_at, duration_ms, pages_attempted, failed_pages, \
                    inserted, completed, outcome \
             FROM sync_runs \
             WHERE ?1 IS NULL OR entity = ?1 \
             ORDER BY started_at DESC, rowid DESC \
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![entity.map(|e| e.name()), limit], |row| {
                Ok(RunRecord {
                    run_id: row.get(0)?,
                    entity: row.get(1)?,
                    started_at: row.get(2)?,
                    duration_ms: row.get(3)?,
                    pages_attempted: row.get(4)?,
                    failed_pages: row.get(5)?,
                    inserted: row.get(6)?,
                    completed: row.get(7)?,
                    outcome: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn count_rows(conn: &Connection, entity: EntityType) -> StoreResult<u64> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", entity.table_name()),
        [],
        |row| row.get(0),
    )?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// The [`Sink`] for one entity table.
#[derive(Clone)]
pub struct SqliteSink {
    entity: EntityType,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    /// Entity type this sink writes.
    pub fn entity(&self) -> EntityType {
        self.entity
    }

    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn clear(&self) -> SyncResult<()> {
        let entity = self.entity;
        let deleted = self
            .blocking(move |conn| {
                Ok(conn.execute(&format!("DELETE FROM {}", entity.table_name()), [])?)
            })
            .await?;
        debug!(entity = %entity, deleted, "cleared table");
        Ok(())
    }

    async fn insert_batch(&self, records: &[Record]) -> SyncResult<()> {
        let entity = self.entity;
        let rows = records
            .iter()
            .map(|r| -> StoreResult<(String, String)> {
                Ok((r.id.clone(), serde_json::to_string(&r.payload)?))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        let synced_at = Utc::now().to_rfc3339();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO {} (id, payload, synced_at) VALUES (?1, ?2, ?3)",
                    entity.table_name()
                ))?;
                for (id, payload) in &rows {
                    stmt.execute(params![id, payload, synced_at])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn count(&self) -> SyncResult<u64> {
        let entity = self.entity;
        Ok(self.blocking(move |conn| count_rows(conn, entity)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str) -> Record {
        Record::new(id, json!({ "id": id, "name": format!("name-{id}") }))
    }

    #[tokio::test]
    async fn insert_count_and_read_back() {
        let store = SqliteStore::in_memory().unwrap();
        let sink = store.sink(EntityType::Venue);

        sink.insert_batch(&[rec("b"), rec("a")]).await.unwrap();
        assert_eq!(sink.count().await.unwrap(), 2);
        assert_eq!(store.ids(EntityType::Venue).unwrap(), vec!["b", "a"]);
        assert_eq!(
            store.get(EntityType::Venue, "a").unwrap(),
            Some(json!({ "id": "a", "name": "name-a" }))
        );
        assert_eq!(store.get(EntityType::Venue, "zzz").unwrap(), None);
    }

    #[tokio::test]
    async fn clear_only_touches_own_table() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .sink(EntityType::Player)
            .insert_batch(&[rec("p")])
            .await
            .unwrap();
        store
            .sink(EntityType::Stage)
            .insert_batch(&[rec("s")])
            .await
            .unwrap();

        store.sink(EntityType::Player).clear().await.unwrap();
        assert_eq!(store.count(EntityType::Player).unwrap(), 0);
        assert_eq!(store.count(EntityType::Stage).unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_id_fails_whole_batch() {
        let store = SqliteStore::in_memory().unwrap();
        let sink = store.sink(EntityType::Competition);
        sink.insert_batch(&[rec("1")]).await.unwrap();

        let err = sink.insert_batch(&[rec("2"), rec("1")]).await.unwrap_err();
        assert!(err.to_string().contains("sink error"));
        assert_eq!(store.ids(EntityType::Competition).unwrap(), vec!["1"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sinks_share_one_connection_concurrently() {
        let store = SqliteStore::in_memory().unwrap();
        let handles: Vec<_> = EntityType::ALL
            .into_iter()
            .map(|entity| {
                let sink = store.sink(entity);
                tokio::spawn(async move {
                    for batch in 0..10 {
                        let records: Vec<_> =
                            (0..5).map(|i| rec(&format!("{batch}-{i}"))).collect();
                        sink.insert_batch(&records).await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        for entity in EntityType::ALL {
            assert_eq!(store.count(entity).unwrap(), 50);
        }
    }

    #[test]
    fn run_history_round_trip() {
        use refsync_engine::{MemorySink, MockCatalogClient, SyncConfig, SyncEngine};
        use std::time::Duration;

        let client = MockCatalogClient::new();
        client.set_page_ids(EntityType::Stage, 1, &["s1"]);
        let engine = SyncEngine::new(
            EntityType::Stage,
            SyncConfig::new().with_page_delay(Duration::ZERO),
            Arc::new(client),
            MemorySink::new(),
        );
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let summary = runtime.block_on(engine.run());

        let store = SqliteStore::in_memory().unwrap();
        store.record_run(&summary).unwrap();

        let runs = store.recent_runs(Some(EntityType::Stage), 10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, summary.run_id.to_string());
        assert_eq!(runs[0].inserted, 1);
        assert!(runs[0].completed);
        assert!(runs[0].outcome.contains("empty_page"));

        assert!(store
            .recent_runs(Some(EntityType::Venue), 10)
            .unwrap()
            .is_empty());
        assert_eq!(store.recent_runs(None, 10).unwrap().len(), 1);
    }
}
