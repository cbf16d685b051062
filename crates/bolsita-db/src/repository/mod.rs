//! # Repository Module
//!
//! Per-owner repositories over the document store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  Caller                                                                 │
//! │       │                                                                 │
//! │       │  db.owner(id).products().update("p-1", patch)                  │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── validate input            (bolsita-core, no store access)         │
//! │  ├── build paths               (OwnerScope)                            │
//! │  └── read / commit             (DocumentStore, txn::run_optimistic)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Arc<dyn DocumentStore>                                                │
//! │                                                                         │
//! │  Every repository is scoped to one owner; there is no way to name     │
//! │  another owner's documents through it.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Inventory CRUD, barcode lookup, bulk import
//! - [`LedgerRepository`](ledger::LedgerRepository) - Income/expense entries
//! - [`CategoryRepository`](category::CategoryRepository) - Entry categories
//! - [`DebtRepository`](debt::DebtRepository) - Debts and payments
//! - [`ProfileRepository`](profile::ProfileRepository) - Business profile, receipt counter
//! - [`SaleService`](sale::SaleService) - Stock-decrementing sale transactions

use std::sync::Arc;

use bolsita_core::validation::validate_id;
use serde::de::DeserializeOwned;

use crate::error::DbResult;
use crate::paths::OwnerScope;
use crate::store::{decode_all, DocumentStore, StoredDoc};
use crate::subscription::{Source, Subscription};
use crate::txn::RetryPolicy;

pub mod category;
pub mod debt;
pub mod ledger;
pub mod product;
pub mod profile;
pub mod sale;

/// What every repository carries: the store, the owner, the retry policy.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) scope: OwnerScope,
    pub(crate) policy: RetryPolicy,
}

impl RepoContext {
    pub fn new(store: Arc<dyn DocumentStore>, scope: OwnerScope, policy: RetryPolicy) -> Self {
        RepoContext {
            store,
            scope,
            policy,
        }
    }

    pub(crate) fn owner_id(&self) -> String {
        self.scope.owner().as_str().to_string()
    }

    /// Lists and decodes a whole collection.
    pub(crate) async fn list<T: DeserializeOwned>(&self, collection: &str) -> DbResult<Vec<T>> {
        let docs = self.store.list(collection).await?;
        decode_all(&docs)
    }

    /// Subscribes to a collection, ordering each snapshot with `order`.
    pub(crate) async fn subscribe_collection<T>(
        &self,
        collection: String,
        order: fn(&mut Vec<T>),
    ) -> DbResult<Subscription<Vec<T>>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        Subscription::start(
            self.store.clone(),
            Source::Collection(collection),
            move |docs: Vec<StoredDoc>| {
                let mut items: Vec<T> = decode_all(&docs)?;
                order(&mut items);
                Ok(items)
            },
        )
        .await
    }
}

/// Rejects ids that could escape their collection.
pub(crate) fn check_id(field: &str, id: &str) -> DbResult<()> {
    validate_id(field, id)?;
    Ok(())
}

/// Case-insensitive name order, used by several listings.
pub(crate) fn name_key(name: &str) -> String {
    name.to_lowercase()
}
