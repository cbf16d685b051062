//! Entry categories under `users/{owner}/categories`.
//!
//! Deleting a category leaves entries pointing at it; summaries skip ids
//! they cannot resolve.

use chrono::Utc;
use tracing::debug;

use bolsita_core::validation::validate_name;
use bolsita_core::{Category, EntryKind};

use super::{check_id, name_key, RepoContext};
use crate::error::{DbError, DbResult};
use crate::paths::new_id;
use crate::store::{Precondition, WriteBatch};
use crate::subscription::Subscription;
use crate::txn::{run_optimistic, WriteSet};

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    ctx: RepoContext,
}

fn sort_by_name(categories: &mut Vec<Category>) {
    categories.sort_by_cached_key(|c| name_key(&c.name));
}

impl CategoryRepository {
    pub fn new(ctx: RepoContext) -> Self {
        CategoryRepository { ctx }
    }

    pub async fn create(&self, name: &str, kind: EntryKind) -> DbResult<Category> {
        validate_name("name", name)?;
        let category = Category {
            id: new_id(),
            owner_id: self.ctx.owner_id(),
            name: name.trim().to_string(),
            kind,
            created_at: Utc::now(),
        };

        debug!(id = %category.id, name = %category.name, "Creating category");

        let mut batch = WriteBatch::new();
        batch.set(
            self.ctx.scope.category(&category.id),
            &category,
            Precondition::Missing,
        )?;
        self.ctx.store.commit(batch).await?;
        Ok(category)
    }

    /// All categories, by name.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let mut categories: Vec<Category> = self.ctx.list(&self.ctx.scope.categories()).await?;
        sort_by_name(&mut categories);
        Ok(categories)
    }

    /// Categories of one kind, by name.
    pub async fn list_kind(&self, kind: EntryKind) -> DbResult<Vec<Category>> {
        let mut categories = self.list().await?;
        categories.retain(|c| c.kind == kind);
        Ok(categories)
    }

    pub async fn rename(&self, id: &str, name: &str) -> DbResult<Category> {
        check_id("id", id)?;
        validate_name("name", name)?;
        let name = name.trim();

        debug!(id = %id, name = %name, "Renaming category");

        let path = self.ctx.scope.category(id);
        run_optimistic(
            self.ctx.store.as_ref(),
            std::slice::from_ref(&path),
            self.ctx.policy,
            |snapshot| {
                let mut category: Category = snapshot
                    .decode(&path)?
                    .ok_or_else(|| DbError::not_found("Category", id))?;
                category.name = name.to_string();

                let mut writes = WriteSet::new();
                writes.set(path.clone(), &category)?;
                Ok((writes, category))
            },
        )
        .await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        check_id("id", id)?;
        debug!(id = %id, "Deleting category");

        let mut batch = WriteBatch::new();
        batch.delete(self.ctx.scope.category(id), Precondition::Exists);
        self.ctx.store.commit(batch).await.map_err(|err| match err {
            DbError::NotFound { .. } => DbError::not_found("Category", id),
            other => other,
        })
    }

    pub async fn subscribe(&self) -> DbResult<Subscription<Vec<Category>>> {
        self.ctx
            .subscribe_collection(self.ctx.scope.categories(), sort_by_name)
            .await
    }
}
