//! In-process document store.
//!
//! One `RwLock` guards every collection, so a commit checks all
//! preconditions and applies all writes under a single write lock.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{
    check_precondition, ChangeEvent, ChangeKind, DocPath, DocumentStore, StoredDoc, WriteBatch,
    WriteOp, CHANGE_CHANNEL_CAPACITY,
};
use crate::error::DbResult;

type Collection = BTreeMap<String, (u64, Value)>;

#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        MemoryStore {
            collections: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn current_version(collections: &HashMap<String, Collection>, path: &DocPath) -> Option<u64> {
    collections
        .get(&path.collection)
        .and_then(|c| c.get(&path.id))
        .map(|(version, _)| *version)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_many(&self, paths: &[DocPath]) -> DbResult<Vec<Option<StoredDoc>>> {
        let collections = self.collections.read().await;
        Ok(paths
            .iter()
            .map(|path| {
                collections
                    .get(&path.collection)
                    .and_then(|c| c.get(&path.id))
                    .map(|(version, body)| StoredDoc {
                        path: path.clone(),
                        version: *version,
                        body: body.clone(),
                    })
            })
            .collect())
    }

    async fn list(&self, collection: &str) -> DbResult<Vec<StoredDoc>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, (version, body))| StoredDoc {
                        path: DocPath::new(collection, id.clone()),
                        version: *version,
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(&self, batch: WriteBatch) -> DbResult<()> {
        let mut collections = self.collections.write().await;

        for op in batch.ops() {
            check_precondition(op.path(), op.precondition(), current_version(&collections, op.path()))?;
        }

        let mut events = Vec::with_capacity(batch.len());
        for op in batch.into_ops() {
            match op {
                WriteOp::Set { path, body, .. } => {
                    let docs = collections.entry(path.collection.clone()).or_default();
                    let version = docs.get(&path.id).map(|(v, _)| v + 1).unwrap_or(1);
                    docs.insert(path.id.clone(), (version, body));
                    events.push(ChangeEvent {
                        path,
                        kind: ChangeKind::Upserted { version },
                    });
                }
                WriteOp::Delete { path, .. } => {
                    let removed = collections
                        .get_mut(&path.collection)
                        .and_then(|docs| docs.remove(&path.id));
                    if removed.is_some() {
                        events.push(ChangeEvent {
                            path,
                            kind: ChangeKind::Deleted,
                        });
                    }
                }
                WriteOp::Verify { .. } => {}
            }
        }
        drop(collections);

        debug!(writes = events.len(), "Memory batch committed");
        for event in events {
            // No receivers is fine.
            let _ = self.changes.send(event);
        }
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::store::Precondition;
    use serde_json::json;

    fn path(id: &str) -> DocPath {
        DocPath::new("users/o/products", id)
    }

    #[tokio::test]
    async fn test_versions_start_at_one_and_increment() {
        let store = MemoryStore::new();

        let mut batch = WriteBatch::new();
        batch.set(path("a"), &json!({"stock": 5}), Precondition::Missing).unwrap();
        store.commit(batch).await.unwrap();
        assert_eq!(store.get(&path("a")).await.unwrap().unwrap().version, 1);

        let mut batch = WriteBatch::new();
        batch.set(path("a"), &json!({"stock": 4}), Precondition::Version(1)).unwrap();
        store.commit(batch).await.unwrap();

        let doc = store.get(&path("a")).await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.body["stock"], 4);
    }

    #[tokio::test]
    async fn test_failed_precondition_writes_nothing() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.set(path("a"), &json!({"stock": 5}), Precondition::None).unwrap();
        store.commit(batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.set(path("b"), &json!({"stock": 1}), Precondition::Missing).unwrap();
        batch.set(path("a"), &json!({"stock": 0}), Precondition::Version(7)).unwrap();
        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        assert!(store.get(&path("b")).await.unwrap().is_none());
        assert_eq!(store.get(&path("a")).await.unwrap().unwrap().body["stock"], 5);
    }

    #[tokio::test]
    async fn test_changes_broadcast_after_commit() {
        let store = MemoryStore::new();
        let mut changes = store.changes();

        let mut batch = WriteBatch::new();
        batch.set(path("a"), &json!({}), Precondition::None).unwrap();
        batch.delete(path("missing"), Precondition::None);
        store.commit(batch).await.unwrap();

        let event = changes.recv().await.unwrap();
        assert_eq!(event.path, path("a"));
        assert_eq!(event.kind, ChangeKind::Upserted { version: 1 });
        assert!(changes.try_recv().is_err());
    }
}
