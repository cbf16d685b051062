//! # Optimistic Transactions
//!
//! Read a snapshot, decide synchronously, commit conditionally, retry on
//! conflict.
//!
//! ## Attempt Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  run_optimistic(store, paths, policy, body)                            │
//! │                                                                         │
//! │   ┌──────────────────────────────┐                                      │
//! │   │ get_many(paths) → Snapshot   │◄──────────────────────┐             │
//! │   └──────────────┬───────────────┘                       │             │
//! │                  ▼                                       │             │
//! │   ┌──────────────────────────────┐   Err(rule) ──► return (no retry)   │
//! │   │ body(&snapshot)              │                       │             │
//! │   └──────────────┬───────────────┘                       │             │
//! │                  ▼ (WriteSet, R)                         │             │
//! │   ┌──────────────────────────────┐                       │             │
//! │   │ commit(writes + Verify for   │   Conflict ──► sleep(backoff) ──┘   │
//! │   │ every read path)             │                                     │
//! │   └──────────────┬───────────────┘   attempts exhausted ──► Contention │
//! │                  ▼                                                      │
//! │               Ok(R)                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every read path is pinned to the version it had in the snapshot (or to
//! its absence), whether or not the body writes it. A racing commit to any
//! of them turns this commit into a `Conflict`.

use std::collections::HashMap;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::store::{DocPath, DocumentStore, Precondition, StoredDoc, WriteBatch, WriteOp};

// =============================================================================
// Retry Policy
// =============================================================================

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// The documents read at the start of one attempt.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    docs: HashMap<DocPath, Option<StoredDoc>>,
}

impl Snapshot {
    fn new(paths: &[DocPath], docs: Vec<Option<StoredDoc>>) -> Self {
        Snapshot {
            docs: paths.iter().cloned().zip(docs).collect(),
        }
    }

    /// The document at `path`, `None` if it is absent or was not read.
    pub fn get(&self, path: &DocPath) -> Option<&StoredDoc> {
        self.docs.get(path).and_then(Option::as_ref)
    }

    pub fn decode<T: DeserializeOwned>(&self, path: &DocPath) -> DbResult<Option<T>> {
        self.get(path).map(StoredDoc::decode).transpose()
    }

    pub fn was_read(&self, path: &DocPath) -> bool {
        self.docs.contains_key(path)
    }

    fn pin(&self, path: &DocPath) -> Option<Precondition> {
        self.docs.get(path).map(|doc| match doc {
            Some(doc) => Precondition::Version(doc.version),
            None => Precondition::Missing,
        })
    }

    fn paths(&self) -> impl Iterator<Item = &DocPath> {
        self.docs.keys()
    }
}

// =============================================================================
// Write Set
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum PendingWrite {
    Set(Value, Precondition),
    Delete(Precondition),
}

/// Writes buffered by a transaction body.
///
/// Paths that were read get their snapshot precondition at commit time;
/// the precondition given here only applies to paths outside the snapshot.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    writes: Vec<(DocPath, PendingWrite)>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces (or creates) a document.
    pub fn set<T: Serialize>(&mut self, path: DocPath, value: &T) -> DbResult<()> {
        self.push_set(path, value, Precondition::None)
    }

    /// Creates a document that must not exist yet.
    pub fn create<T: Serialize>(&mut self, path: DocPath, value: &T) -> DbResult<()> {
        self.push_set(path, value, Precondition::Missing)
    }

    pub fn delete(&mut self, path: DocPath) {
        self.writes.push((path, PendingWrite::Delete(Precondition::None)));
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    fn push_set<T: Serialize>(
        &mut self,
        path: DocPath,
        value: &T,
        precondition: Precondition,
    ) -> DbResult<()> {
        let body = serde_json::to_value(value)?;
        self.writes.push((path, PendingWrite::Set(body, precondition)));
        Ok(())
    }

    /// Turns the buffered writes into a batch pinned to `snapshot`.
    fn into_batch(self, snapshot: &Snapshot) -> WriteBatch {
        let mut batch = WriteBatch::new();
        let mut written = Vec::with_capacity(self.writes.len());

        for (path, write) in self.writes {
            let pinned = snapshot.pin(&path);
            written.push(path.clone());
            let op = match write {
                PendingWrite::Set(body, own) => WriteOp::Set {
                    precondition: pinned.unwrap_or(own),
                    path,
                    body,
                },
                PendingWrite::Delete(own) => WriteOp::Delete {
                    precondition: pinned.unwrap_or(own),
                    path,
                },
            };
            batch.push(op);
        }

        for path in snapshot.paths() {
            if !written.contains(path) {
                if let Some(precondition) = snapshot.pin(path) {
                    batch.verify(path.clone(), precondition);
                }
            }
        }
        batch
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Runs `body` against a fresh snapshot of `paths` until its writes commit.
///
/// Business errors returned by `body` abort immediately. Only commit
/// conflicts are retried; once `policy.max_attempts` attempts have
/// conflicted the result is [`DbError::Contention`].
pub async fn run_optimistic<R, F>(
    store: &dyn DocumentStore,
    paths: &[DocPath],
    policy: RetryPolicy,
    mut body: F,
) -> DbResult<R>
where
    F: FnMut(&Snapshot) -> DbResult<(WriteSet, R)> + Send,
    R: Send,
{
    let mut backoff = policy.backoff();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let docs = store.get_many(paths).await?;
        let snapshot = Snapshot::new(paths, docs);

        let (writes, result) = body(&snapshot)?;
        let batch = writes.into_batch(&snapshot);

        match store.commit(batch).await {
            Ok(()) => {
                debug!(attempt, reads = paths.len(), "Optimistic transaction committed");
                return Ok(result);
            }
            Err(err) if err.is_retryable() => {
                if attempt >= policy.max_attempts {
                    warn!(attempts = attempt, error = %err, "Giving up after repeated conflicts");
                    return Err(DbError::Contention { attempts: attempt });
                }

                let delay = backoff.next_backoff().unwrap_or(policy.max_backoff);
                warn!(attempt, ?delay, error = %err, "Commit conflict, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChangeEvent, MemoryStore};
    use async_trait::async_trait;
    use bolsita_core::CoreError;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::broadcast;

    fn counter() -> DocPath {
        DocPath::new("users/o/counters", "c")
    }

    fn increment(snapshot: &Snapshot) -> DbResult<(WriteSet, i64)> {
        let current = snapshot
            .get(&counter())
            .and_then(|doc| doc.body["n"].as_i64())
            .unwrap_or(0);
        let mut writes = WriteSet::new();
        writes.set(counter(), &json!({ "n": current + 1 }))?;
        Ok((writes, current + 1))
    }

    #[tokio::test]
    async fn test_commits_and_returns_result() {
        let store = MemoryStore::new();
        let paths = [counter()];

        let first = run_optimistic(&store, &paths, RetryPolicy::default(), increment).await.unwrap();
        let second = run_optimistic(&store, &paths, RetryPolicy::default(), increment).await.unwrap();

        assert_eq!((first, second), (1, 2));
        assert_eq!(store.get(&counter()).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_business_error_is_not_retried() {
        let store = MemoryStore::new();
        let calls = AtomicU32::new(0);

        let result: DbResult<()> =
            run_optimistic(&store, &[counter()], RetryPolicy::default(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::EmptyCart.into())
            })
            .await;

        assert!(matches!(result, Err(DbError::Rule(CoreError::EmptyCart))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.get(&counter()).await.unwrap().is_none());
    }

    #[test]
    fn test_read_paths_are_pinned() {
        let read = DocPath::new("c", "read");
        let absent = DocPath::new("c", "absent");
        let fresh = DocPath::new("c", "fresh");

        let snapshot = Snapshot::new(
            &[read.clone(), absent.clone()],
            vec![
                Some(StoredDoc {
                    path: read.clone(),
                    version: 4,
                    body: json!({}),
                }),
                None,
            ],
        );

        let mut writes = WriteSet::new();
        writes.set(read.clone(), &json!({"x": 1})).unwrap();
        writes.create(fresh.clone(), &json!({})).unwrap();

        let batch = writes.into_batch(&snapshot);
        let ops = batch.ops();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].precondition(), Precondition::Version(4));
        assert_eq!(ops[1].precondition(), Precondition::Missing);
        assert_eq!(
            ops[2],
            WriteOp::Verify {
                path: absent,
                precondition: Precondition::Missing
            }
        );
    }

    /// Store whose commits always conflict.
    #[derive(Debug)]
    struct AlwaysConflicts {
        inner: MemoryStore,
        commits: AtomicU32,
    }

    #[async_trait]
    impl DocumentStore for AlwaysConflicts {
        async fn get_many(&self, paths: &[DocPath]) -> DbResult<Vec<Option<StoredDoc>>> {
            self.inner.get_many(paths).await
        }

        async fn list(&self, collection: &str) -> DbResult<Vec<StoredDoc>> {
            self.inner.list(collection).await
        }

        async fn commit(&self, _batch: WriteBatch) -> DbResult<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Err(DbError::conflict("users/o/counters/c"))
        }

        fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
            self.inner.changes()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_contention_after_max_attempts() {
        let store = AlwaysConflicts {
            inner: MemoryStore::new(),
            commits: AtomicU32::new(0),
        };
        let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50));

        let result = run_optimistic(&store, &[counter()], policy, increment).await;

        assert!(matches!(result, Err(DbError::Contention { attempts: 3 })));
        assert_eq!(store.commits.load(Ordering::SeqCst), 3);
    }
}
