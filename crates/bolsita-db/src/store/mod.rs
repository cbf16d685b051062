//! # Document Store
//!
//! The storage seam of Mi Bolsita: a versioned JSON document store with
//! multi-document conditional commits and a change feed.
//!
//! ## Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DocumentStore                                    │
//! │                                                                         │
//! │   collection                         id        version  body (JSON)     │
//! │   ─────────────────────────────────  ────────  ───────  ─────────────   │
//! │   users/u1/products                  p-1       3        {"name":..}     │
//! │   users/u1/transactions              t-9       1        {"kind":..}     │
//! │   users/u1/debts/d-4/payments        pay-2     1        {"amount":..}   │
//! │   users                              u1        7        {"business..}   │
//! │                                                                         │
//! │   get_many(paths) ──► [Some(doc@v3), None, ...]                        │
//! │   commit(batch)   ──► all writes or none; Conflict if a precondition   │
//! │                       no longer holds                                   │
//! │   changes()       ──► broadcast of every committed write               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Versions
//! A document is created at version 1 and every write adds 1. Deleting
//! removes the document (and its version) entirely.
//!
//! ## Backends
//! - [`memory::MemoryStore`] - in-process, used by tests
//! - [`sqlite::SqliteStore`] - sqlx + SQLite, one row per document

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{DbError, DbResult};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Buffered change events per receiver before it starts lagging.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Paths & Documents
// =============================================================================

/// Address of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        DocPath {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDoc {
    pub path: DocPath,
    pub version: u64,
    pub body: Value,
}

impl StoredDoc {
    pub fn decode<T: DeserializeOwned>(&self) -> DbResult<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            DbError::Serialization(format!("{}: {}", self.path, e))
        })
    }
}

/// Decodes every document of a listing.
pub fn decode_all<T: DeserializeOwned>(docs: &[StoredDoc]) -> DbResult<Vec<T>> {
    docs.iter().map(StoredDoc::decode).collect()
}

// =============================================================================
// Writes
// =============================================================================

/// Condition a document must meet for a batch to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// No condition (blind write).
    None,
    /// The document exists at exactly this version.
    Version(u64),
    /// The document exists, any version.
    Exists,
    /// The document does not exist.
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or replace the body.
    Set {
        path: DocPath,
        body: Value,
        precondition: Precondition,
    },
    Delete {
        path: DocPath,
        precondition: Precondition,
    },
    /// Write nothing; only check the precondition.
    Verify {
        path: DocPath,
        precondition: Precondition,
    },
}

impl WriteOp {
    pub fn path(&self) -> &DocPath {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Delete { path, .. } | WriteOp::Verify { path, .. } => path,
        }
    }

    pub fn precondition(&self) -> Precondition {
        match self {
            WriteOp::Set { precondition, .. }
            | WriteOp::Delete { precondition, .. }
            | WriteOp::Verify { precondition, .. } => *precondition,
        }
    }
}

/// An all-or-nothing group of writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch { ops: Vec::new() }
    }

    pub fn set<T: Serialize>(
        &mut self,
        path: DocPath,
        value: &T,
        precondition: Precondition,
    ) -> DbResult<&mut Self> {
        let body = serde_json::to_value(value)?;
        self.ops.push(WriteOp::Set {
            path,
            body,
            precondition,
        });
        Ok(self)
    }

    pub fn delete(&mut self, path: DocPath, precondition: Precondition) -> &mut Self {
        self.ops.push(WriteOp::Delete { path, precondition });
        self
    }

    pub fn verify(&mut self, path: DocPath, precondition: Precondition) -> &mut Self {
        self.ops.push(WriteOp::Verify { path, precondition });
        self
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Outcome of checking one precondition against the current version.
///
/// `Exists` failing on a missing document is a `NotFound`, every other
/// failure is a `Conflict`.
pub(crate) fn check_precondition(
    path: &DocPath,
    precondition: Precondition,
    current: Option<u64>,
) -> DbResult<()> {
    match (precondition, current) {
        (Precondition::None, _) => Ok(()),
        (Precondition::Version(expected), Some(actual)) if expected == actual => Ok(()),
        (Precondition::Exists, Some(_)) => Ok(()),
        (Precondition::Exists, None) => Err(DbError::not_found("Document", path.to_string())),
        (Precondition::Missing, None) => Ok(()),
        _ => Err(DbError::conflict(path)),
    }
}

// =============================================================================
// Change Feed
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Upserted { version: u64 },
    Deleted,
}

/// One committed write, broadcast after the commit succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: DocPath,
    pub kind: ChangeKind,
}

// =============================================================================
// Store Trait
// =============================================================================

/// A versioned document store.
///
/// Injected everywhere as `Arc<dyn DocumentStore>`.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Reads several documents in one consistent pass, in `paths` order.
    async fn get_many(&self, paths: &[DocPath]) -> DbResult<Vec<Option<StoredDoc>>>;

    /// Every document of a collection (order unspecified).
    async fn list(&self, collection: &str) -> DbResult<Vec<StoredDoc>>;

    /// Applies the batch atomically, or nothing when any precondition fails.
    async fn commit(&self, batch: WriteBatch) -> DbResult<()>;

    /// Subscribes to committed writes.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;

    async fn get(&self, path: &DocPath) -> DbResult<Option<StoredDoc>> {
        let mut docs = self.get_many(std::slice::from_ref(path)).await?;
        Ok(docs.pop().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_checks() {
        let path = DocPath::new("users/o/products", "p1");

        assert!(check_precondition(&path, Precondition::None, None).is_ok());
        assert!(check_precondition(&path, Precondition::Version(2), Some(2)).is_ok());
        assert!(check_precondition(&path, Precondition::Missing, None).is_ok());

        assert!(matches!(
            check_precondition(&path, Precondition::Version(2), Some(3)),
            Err(DbError::Conflict { .. })
        ));
        assert!(matches!(
            check_precondition(&path, Precondition::Missing, Some(1)),
            Err(DbError::Conflict { .. })
        ));
        assert!(matches!(
            check_precondition(&path, Precondition::Exists, None),
            Err(DbError::NotFound { .. })
        ));
    }

    #[test]
    fn test_doc_path_display() {
        assert_eq!(
            DocPath::new("users/o/debts/d1/payments", "x").to_string(),
            "users/o/debts/d1/payments/x"
        );
    }
}
