//! # Product Repository
//!
//! Inventory documents under `users/{owner}/products`.
//!
//! ## Key Operations
//! - CRUD (updates are patches re-applied on a fresh snapshot)
//! - Barcode lookup for the scanner
//! - Bulk import from a parsed spreadsheet
//!
//! Stock is only decremented by [`SaleService`](super::sale::SaleService).
//! An `update` that sets stock writes the new absolute value.

use chrono::Utc;
use tracing::{debug, info, warn};

use bolsita_core::validation::{validate_new_product, validate_product_patch};
use bolsita_core::{NewProduct, Product, ProductPatch};

use super::{check_id, name_key, RepoContext};
use crate::error::{DbError, DbResult};
use crate::paths::new_id;
use crate::store::{Precondition, WriteBatch};
use crate::subscription::Subscription;
use crate::txn::{run_optimistic, WriteSet};

/// Products written per commit during an import.
pub const IMPORT_CHUNK_SIZE: usize = 400;

/// Repository for product documents.
///
/// ## Usage
/// ```rust,ignore
/// let products = db.owner(owner).products();
///
/// let coffee = products.create(new_coffee).await?;
/// let scanned = products.find_by_barcode("7501234567890").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    ctx: RepoContext,
}

fn sort_by_name(products: &mut Vec<Product>) {
    products.sort_by_cached_key(|p| name_key(&p.name));
}

fn clean_barcode(barcode: Option<String>) -> Option<String> {
    barcode
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
}

impl ProductRepository {
    pub fn new(ctx: RepoContext) -> Self {
        ProductRepository { ctx }
    }

    fn build(&self, new: NewProduct) -> Product {
        Product {
            id: new_id(),
            owner_id: self.ctx.owner_id(),
            name: new.name.trim().to_string(),
            cost_price: new.cost_price,
            sale_price: new.sale_price,
            stock: new.stock,
            barcode: clean_barcode(new.barcode),
            created_at: Utc::now(),
        }
    }

    /// Creates a product with a fresh id.
    pub async fn create(&self, new: NewProduct) -> DbResult<Product> {
        validate_new_product(&new)?;
        let product = self.build(new);

        debug!(id = %product.id, name = %product.name, "Creating product");

        let mut batch = WriteBatch::new();
        batch.set(
            self.ctx.scope.product(&product.id),
            &product,
            Precondition::Missing,
        )?;
        self.ctx.store.commit(batch).await?;

        Ok(product)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        check_id("id", id)?;
        match self.ctx.store.get(&self.ctx.scope.product(id)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// All products, by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let mut products: Vec<Product> = self.ctx.list(&self.ctx.scope.products()).await?;
        sort_by_name(&mut products);
        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Applies a partial update and returns the stored product.
    ///
    /// The patch is re-applied to the latest version on conflict, so a
    /// concurrent sale's stock decrement is never overwritten unless the
    /// patch itself sets stock.
    pub async fn update(&self, id: &str, patch: ProductPatch) -> DbResult<Product> {
        check_id("id", id)?;
        validate_product_patch(&patch)?;
        let patch = ProductPatch {
            barcode: patch.barcode.map(clean_barcode),
            ..patch
        };

        debug!(id = %id, "Updating product");

        let path = self.ctx.scope.product(id);
        run_optimistic(
            self.ctx.store.as_ref(),
            std::slice::from_ref(&path),
            self.ctx.policy,
            |snapshot| {
                let mut product: Product = snapshot
                    .decode(&path)?
                    .ok_or_else(|| DbError::not_found("Product", id))?;
                patch.apply(&mut product);

                let mut writes = WriteSet::new();
                writes.set(path.clone(), &product)?;
                Ok((writes, product))
            },
        )
        .await
    }

    /// Hard-deletes a product. Past sales keep their line snapshots.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        check_id("id", id)?;
        debug!(id = %id, "Deleting product");

        let mut batch = WriteBatch::new();
        batch.delete(self.ctx.scope.product(id), Precondition::Exists);
        self.ctx.store.commit(batch).await.map_err(|err| match err {
            DbError::NotFound { .. } => DbError::not_found("Product", id),
            other => other,
        })
    }

    /// First product whose barcode matches exactly (after trimming).
    pub async fn find_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let barcode = barcode.trim();
        if barcode.is_empty() {
            return Ok(None);
        }

        let products: Vec<Product> = self.ctx.list(&self.ctx.scope.products()).await?;
        Ok(products
            .into_iter()
            .find(|p| p.barcode.as_deref() == Some(barcode)))
    }

    /// Inserts parsed rows in chunks; returns how many were written.
    ///
    /// Rows that fail validation are skipped with a warning.
    pub async fn import(&self, rows: Vec<NewProduct>) -> DbResult<usize> {
        let total = rows.len();
        let valid: Vec<Product> = rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match validate_new_product(&row) {
                Ok(()) => Some(self.build(row)),
                Err(err) => {
                    warn!(row = index + 1, error = %err, "Skipping invalid import row");
                    None
                }
            })
            .collect();

        for chunk in valid.chunks(IMPORT_CHUNK_SIZE) {
            let mut batch = WriteBatch::new();
            for product in chunk {
                batch.set(
                    self.ctx.scope.product(&product.id),
                    product,
                    Precondition::Missing,
                )?;
            }
            self.ctx.store.commit(batch).await?;
            debug!(written = chunk.len(), "Import chunk committed");
        }

        info!(imported = valid.len(), skipped = total - valid.len(), "Products imported");
        Ok(valid.len())
    }

    /// Live product list, by name.
    pub async fn subscribe(&self) -> DbResult<Subscription<Vec<Product>>> {
        self.ctx
            .subscribe_collection(self.ctx.scope.products(), sort_by_name)
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::OwnerScope;
    use crate::store::MemoryStore;
    use crate::txn::RetryPolicy;
    use bolsita_core::{CoreError, Money, OwnerId, ValidationError};
    use std::sync::Arc;

    fn repo() -> ProductRepository {
        ProductRepository::new(RepoContext::new(
            Arc::new(MemoryStore::new()),
            OwnerScope::new(OwnerId::new("owner-1")),
            RetryPolicy::default(),
        ))
    }

    fn new_product(name: &str, stock: i64, barcode: Option<&str>) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            cost_price: Money::from_cents(300),
            sale_price: Money::from_cents(500),
            stock,
            barcode: barcode.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let repo = repo();
        let b = repo.create(new_product("  banana ", 3, None)).await.unwrap();
        repo.create(new_product("Arroz", 10, Some(" 123 "))).await.unwrap();

        assert_eq!(b.name, "banana");
        assert_eq!(b.owner_id, "owner-1");
        assert_eq!(repo.get(&b.id).await.unwrap(), Some(b.clone()));

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Arroz", "banana"]);

        let found = repo.find_by_barcode("123").await.unwrap().unwrap();
        assert_eq!(found.name, "Arroz");
        assert!(repo.find_by_barcode("  ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_negative_stock() {
        let err = repo().create(new_product("Arroz", -1, None)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Rule(CoreError::Validation(ValidationError::Negative { .. }))
        ));
    }

    #[tokio::test]
    async fn test_update_patches_fields() {
        let repo = repo();
        let p = repo.create(new_product("Arroz", 10, Some("1"))).await.unwrap();

        let updated = repo
            .update(
                &p.id,
                ProductPatch {
                    sale_price: Some(Money::from_cents(650)),
                    barcode: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.sale_price, Money::from_cents(650));
        assert_eq!(updated.stock, 10);
        assert_eq!(updated.barcode, None);
        assert_eq!(repo.get(&p.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let repo = repo();
        assert!(matches!(
            repo.update("nope", ProductPatch::default()).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(repo.delete("nope").await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_import_skips_invalid_rows() {
        let repo = repo();
        let rows = vec![
            new_product("A", 1, None),
            new_product(&"x".repeat(300), 1, None),
            new_product("B", 0, Some("9")),
        ];

        assert_eq!(repo.import(rows).await.unwrap(), 2);
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }
}
