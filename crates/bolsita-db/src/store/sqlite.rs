//! # SQLite Document Store
//!
//! Persistent [`DocumentStore`] backed by a single `documents` table.
//!
//! ## Conditional Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  commit(batch)                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │   ├── Set  + Version(v) → UPDATE ... WHERE version = v   RETURNING     │
//! │   ├── Set  + Missing    → INSERT ... ON CONFLICT DO NOTHING RETURNING  │
//! │   ├── Set  + Exists     → UPDATE ... WHERE id = ?        RETURNING     │
//! │   ├── Set  + None       → INSERT ... ON CONFLICT DO UPDATE RETURNING   │
//! │   ├── Delete            → DELETE ... [AND version = v]                 │
//! │   └── Verify            → SELECT version                               │
//! │       │                                                                 │
//! │       ├── any statement matched nothing? → ROLLBACK, Conflict          │
//! │       ▼                                                                 │
//! │  COMMIT → broadcast ChangeEvents                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queries are built at runtime (`sqlx::query`) so the crate compiles
//! without a live database.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{
    check_precondition, ChangeEvent, ChangeKind, DocPath, DocumentStore, Precondition, StoredDoc,
    WriteBatch, WriteOp, CHANGE_CHANNEL_CAPACITY,
};
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::pool::{DbConfig, StorageBackend};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteStore {
    /// Opens the pool described by `config` and runs migrations if enabled.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn connect(config: &DbConfig) -> DbResult<Self> {
        let (options, in_memory) = match &config.backend {
            StorageBackend::Sqlite { path } => {
                info!(path = %path.display(), "Opening SQLite document store");
                (
                    SqliteConnectOptions::new()
                        .filename(path)
                        .create_if_missing(true)
                        // WAL mode: readers don't block writers
                        .journal_mode(SqliteJournalMode::Wal)
                        .synchronous(SqliteSynchronous::Normal),
                    false,
                )
            }
            StorageBackend::SqliteInMemory => {
                info!("Opening in-memory SQLite document store");
                (SqliteConnectOptions::new().in_memory(true), true)
            }
            StorageBackend::Memory => {
                return Err(DbError::Config(
                    "SqliteStore needs a sqlite backend".to_string(),
                ))
            }
        };

        let options = options.busy_timeout(Duration::from_secs(5));

        // An in-memory database lives and dies with its only connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(Some(config.idle_timeout))
        };

        let pool = pool_options
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Database pool created");

        let store = SqliteStore::from_pool(pool);
        if config.run_migrations {
            migrations::run_migrations(&store.pool).await?;
        }
        Ok(store)
    }

    /// Wraps an existing pool. Migrations are the caller's job.
    pub fn from_pool(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        SqliteStore { pool, changes }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }
}

fn row_to_doc(path: DocPath, row: &SqliteRow) -> DbResult<StoredDoc> {
    let version: i64 = row.try_get("version")?;
    let body: String = row.try_get("body")?;
    Ok(StoredDoc {
        path,
        version: version as u64,
        body: serde_json::from_str(&body)?,
    })
}

async fn current_version(
    tx: &mut Transaction<'_, Sqlite>,
    path: &DocPath,
) -> DbResult<Option<u64>> {
    let version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(&path.collection)
            .bind(&path.id)
            .fetch_optional(&mut **tx)
            .await?;
    Ok(version.map(|v| v as u64))
}

/// Runs one write and returns the resulting change, if any.
async fn apply_op(
    tx: &mut Transaction<'_, Sqlite>,
    op: &WriteOp,
) -> DbResult<Option<ChangeEvent>> {
    let now = Utc::now();

    match op {
        WriteOp::Set {
            path,
            body,
            precondition,
        } => {
            let body = body_text(body);
            let version: Option<i64> = match precondition {
                Precondition::Version(expected) => {
                    sqlx::query_scalar(
                        r#"
                        UPDATE documents SET version = version + 1, body = ?3, updated_at = ?4
                        WHERE collection = ?1 AND id = ?2 AND version = ?5
                        RETURNING version
                        "#,
                    )
                    .bind(&path.collection)
                    .bind(&path.id)
                    .bind(&body)
                    .bind(now)
                    .bind(*expected as i64)
                    .fetch_optional(&mut **tx)
                    .await?
                }
                Precondition::Exists => {
                    sqlx::query_scalar(
                        r#"
                        UPDATE documents SET version = version + 1, body = ?3, updated_at = ?4
                        WHERE collection = ?1 AND id = ?2
                        RETURNING version
                        "#,
                    )
                    .bind(&path.collection)
                    .bind(&path.id)
                    .bind(&body)
                    .bind(now)
                    .fetch_optional(&mut **tx)
                    .await?
                }
                Precondition::Missing => {
                    sqlx::query_scalar(
                        r#"
                        INSERT INTO documents (collection, id, version, body, updated_at)
                        VALUES (?1, ?2, 1, ?3, ?4)
                        ON CONFLICT (collection, id) DO NOTHING
                        RETURNING version
                        "#,
                    )
                    .bind(&path.collection)
                    .bind(&path.id)
                    .bind(&body)
                    .bind(now)
                    .fetch_optional(&mut **tx)
                    .await?
                }
                Precondition::None => {
                    sqlx::query_scalar(
                        r#"
                        INSERT INTO documents (collection, id, version, body, updated_at)
                        VALUES (?1, ?2, 1, ?3, ?4)
                        ON CONFLICT (collection, id) DO UPDATE SET
                            version = documents.version + 1,
                            body = excluded.body,
                            updated_at = excluded.updated_at
                        RETURNING version
                        "#,
                    )
                    .bind(&path.collection)
                    .bind(&path.id)
                    .bind(&body)
                    .bind(now)
                    .fetch_optional(&mut **tx)
                    .await?
                }
            };

            match version {
                Some(version) => Ok(Some(ChangeEvent {
                    path: path.clone(),
                    kind: ChangeKind::Upserted {
                        version: version as u64,
                    },
                })),
                None => {
                    // Re-read only to pick NotFound vs Conflict.
                    let current = current_version(tx, path).await?;
                    check_precondition(path, *precondition, current)?;
                    Err(DbError::conflict(path))
                }
            }
        }

        WriteOp::Delete { path, precondition } => {
            let current = current_version(tx, path).await?;
            check_precondition(path, *precondition, current)?;

            let deleted = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
                .bind(&path.collection)
                .bind(&path.id)
                .execute(&mut **tx)
                .await?
                .rows_affected();

            Ok((deleted > 0).then(|| ChangeEvent {
                path: path.clone(),
                kind: ChangeKind::Deleted,
            }))
        }

        WriteOp::Verify { path, precondition } => {
            let current = current_version(tx, path).await?;
            check_precondition(path, *precondition, current)?;
            Ok(None)
        }
    }
}

fn body_text(body: &Value) -> String {
    body.to_string()
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_many(&self, paths: &[DocPath]) -> DbResult<Vec<Option<StoredDoc>>> {
        // One read transaction so every path comes from the same snapshot.
        let mut tx = self.pool.begin().await?;
        let mut docs = Vec::with_capacity(paths.len());

        for path in paths {
            let row = sqlx::query(
                "SELECT version, body FROM documents WHERE collection = ?1 AND id = ?2",
            )
            .bind(&path.collection)
            .bind(&path.id)
            .fetch_optional(&mut *tx)
            .await?;

            docs.push(match row {
                Some(row) => Some(row_to_doc(path.clone(), &row)?),
                None => None,
            });
        }

        tx.commit().await?;
        Ok(docs)
    }

    async fn list(&self, collection: &str) -> DbResult<Vec<StoredDoc>> {
        let rows = sqlx::query(
            "SELECT id, version, body FROM documents WHERE collection = ?1 ORDER BY id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id")?;
                row_to_doc(DocPath::new(collection, id), row)
            })
            .collect()
    }

    async fn commit(&self, batch: WriteBatch) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let mut events = Vec::with_capacity(batch.len());

        for op in batch.ops() {
            match apply_op(&mut tx, op).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => {
                    debug!(path = %op.path(), error = %err, "Rolling back batch");
                    tx.rollback().await?;
                    return Err(err);
                }
            }
        }

        tx.commit().await?;
        debug!(writes = events.len(), "SQLite batch committed");

        for event in events {
            let _ = self.changes.send(event);
        }
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> SqliteStore {
        SqliteStore::connect(&DbConfig::sqlite_in_memory()).await.unwrap()
    }

    fn path(id: &str) -> DocPath {
        DocPath::new("users/o/products", id)
    }

    #[tokio::test]
    async fn test_in_memory_store_is_healthy() {
        assert!(store().await.health_check().await);
    }

    #[tokio::test]
    async fn test_conditional_update() {
        let store = store().await;

        let mut batch = WriteBatch::new();
        batch.set(path("a"), &json!({"stock": 5}), Precondition::Missing).unwrap();
        store.commit(batch).await.unwrap();

        let mut stale = WriteBatch::new();
        stale.set(path("a"), &json!({"stock": 1}), Precondition::Version(9)).unwrap();
        assert!(matches!(
            store.commit(stale).await,
            Err(DbError::Conflict { .. })
        ));

        let mut fresh = WriteBatch::new();
        fresh.set(path("a"), &json!({"stock": 3}), Precondition::Version(1)).unwrap();
        store.commit(fresh).await.unwrap();

        let doc = store.get(&path("a")).await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.body, json!({"stock": 3}));
    }

    #[tokio::test]
    async fn test_rollback_leaves_earlier_writes_out() {
        let store = store().await;

        let mut batch = WriteBatch::new();
        batch.set(path("new"), &json!({}), Precondition::Missing).unwrap();
        batch.verify(path("absent"), Precondition::Exists);
        assert!(matches!(
            store.commit(batch).await,
            Err(DbError::NotFound { .. })
        ));

        assert!(store.get(&path("new")).await.unwrap().is_none());
        assert!(store.list("users/o/products").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blind_set_upserts() {
        let store = store().await;
        for stock in [1, 2] {
            let mut batch = WriteBatch::new();
            batch.set(path("a"), &json!({"stock": stock}), Precondition::None).unwrap();
            store.commit(batch).await.unwrap();
        }
        let docs = store.list("users/o/products").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].version, 2);
    }
}
