//! # Ledger Repository
//!
//! Income and expense entries under `users/{owner}/transactions`.
//!
//! Sales are recorded through [`SaleService`](super::sale::SaleService);
//! this repository writes plain entries and edits existing ones.

use chrono::{DateTime, Utc};
use tracing::debug;

use bolsita_core::summary::entries_between;
use bolsita_core::validation::{validate_entry_draft, validate_name, validate_positive_amount};
use bolsita_core::{EntryDraft, EntryPatch, LedgerEntry};

use super::{check_id, RepoContext};
use crate::error::{DbError, DbResult};
use crate::paths::new_id;
use crate::store::{Precondition, WriteBatch};
use crate::subscription::Subscription;
use crate::txn::{run_optimistic, WriteSet};

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    ctx: RepoContext,
}

/// Newest first.
fn sort_newest_first(entries: &mut Vec<LedgerEntry>) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Empty category ids mean "uncategorized".
pub(crate) fn clean_category(category_id: Option<String>) -> Option<String> {
    category_id.filter(|c| !c.trim().is_empty())
}

impl LedgerRepository {
    pub fn new(ctx: RepoContext) -> Self {
        LedgerRepository { ctx }
    }

    /// Builds a plain entry (no stock effect) from a draft.
    pub(crate) fn entry_from_draft(ctx: &RepoContext, draft: EntryDraft) -> LedgerEntry {
        LedgerEntry {
            id: new_id(),
            owner_id: ctx.owner_id(),
            kind: draft.kind,
            amount: draft.amount,
            concept: draft.concept.trim().to_string(),
            created_at: Utc::now(),
            category_id: clean_category(draft.category_id),
            product_id: None,
            quantity: None,
            items: None,
            payment_method: None,
            discount_amount: None,
        }
    }

    /// Records a plain income or expense.
    pub async fn create(&self, draft: EntryDraft) -> DbResult<LedgerEntry> {
        validate_entry_draft(&draft)?;
        let entry = Self::entry_from_draft(&self.ctx, draft);

        debug!(id = %entry.id, kind = ?entry.kind, amount = %entry.amount, "Creating ledger entry");

        let mut batch = WriteBatch::new();
        batch.set(
            self.ctx.scope.transaction(&entry.id),
            &entry,
            Precondition::Missing,
        )?;
        self.ctx.store.commit(batch).await?;
        Ok(entry)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<LedgerEntry>> {
        check_id("id", id)?;
        match self.ctx.store.get(&self.ctx.scope.transaction(id)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Every entry, newest first.
    pub async fn list(&self) -> DbResult<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self.ctx.list(&self.ctx.scope.transactions()).await?;
        sort_newest_first(&mut entries);
        debug!(count = entries.len(), "Listed ledger entries");
        Ok(entries)
    }

    /// Entries created in `[start, end]`, newest first.
    pub async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<LedgerEntry>> {
        let entries = self.list().await?;
        Ok(entries_between(&entries, &start, &end)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Edits kind, amount, concept or category.
    ///
    /// Entries written by a sale only accept concept and category edits;
    /// a new kind or amount is rejected with `Locked`. Sale line items and
    /// stock are never touched.
    pub async fn update(&self, id: &str, patch: EntryPatch) -> DbResult<LedgerEntry> {
        check_id("id", id)?;
        if let Some(concept) = &patch.concept {
            validate_name("concept", concept)?;
        }
        if let Some(amount) = patch.amount {
            validate_positive_amount("amount", amount)?;
        }
        let patch = EntryPatch {
            category_id: patch.category_id.map(clean_category),
            ..patch
        };

        debug!(id = %id, "Updating ledger entry");

        let path = self.ctx.scope.transaction(id);
        run_optimistic(
            self.ctx.store.as_ref(),
            std::slice::from_ref(&path),
            self.ctx.policy,
            |snapshot| {
                let mut entry: LedgerEntry = snapshot
                    .decode(&path)?
                    .ok_or_else(|| DbError::not_found("Transaction", id))?;
                patch.apply(&mut entry)?;

                let mut writes = WriteSet::new();
                writes.set(path.clone(), &entry)?;
                Ok((writes, entry))
            },
        )
        .await
    }

    /// Hard delete. Stock sold by the entry is not restored.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        check_id("id", id)?;
        debug!(id = %id, "Deleting ledger entry");

        let mut batch = WriteBatch::new();
        batch.delete(self.ctx.scope.transaction(id), Precondition::Exists);
        self.ctx.store.commit(batch).await.map_err(|err| match err {
            DbError::NotFound { .. } => DbError::not_found("Transaction", id),
            other => other,
        })
    }

    /// Live ledger, newest first.
    pub async fn subscribe(&self) -> DbResult<Subscription<Vec<LedgerEntry>>> {
        self.ctx
            .subscribe_collection(self.ctx.scope.transactions(), sort_newest_first)
            .await
    }
}
