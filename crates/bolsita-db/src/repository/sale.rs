//! # Sale Service
//!
//! Stock-decrementing sales, committed atomically with their ledger entry.
//!
//! ## Multi-item Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Transaction                                  │
//! │                                                                         │
//! │  1. VALIDATE (no store access)                                         │
//! │     └── cart non-empty, quantities 1..=999, ≤ 100 lines                │
//! │     └── discount resolved: 0 ≤ discount ≤ subtotal                     │
//! │                                                                         │
//! │  2. SNAPSHOT                                                           │
//! │     └── products/{A} @ v3, products/{B} @ v7                           │
//! │                                                                         │
//! │  3. APPLY (pure, bolsita-core::sale)                                   │
//! │     └── remaining_stock(line, product) for every line                  │
//! │         any error → abort, nothing written                             │
//! │                                                                         │
//! │  4. COMMIT (all or nothing)                                            │
//! │     ├── products/{A}.stock = 3   if still @ v3                         │
//! │     ├── products/{B}.stock = 0   if still @ v7                         │
//! │     └── transactions/{new}       income entry with line items          │
//! │                                                                         │
//! │  5. CONFLICT? → back off, go to 2 (bounded)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The single-item variant ([`SaleService::record_entry`]) runs the same
//! steps with one line, or writes a plain entry when no product is sold.

use chrono::Utc;
use tracing::{debug, info};

use bolsita_core::sale::{multi_item_entry, remaining_stock, Cart, CartLine, Discount, SaleMeta};
use bolsita_core::validation::{validate_entry_draft, validate_quantity};
use bolsita_core::{
    CoreError, EntryDraft, EntryKind, LedgerEntry, PaymentMethod, Product, ValidationError,
};

use super::ledger::{clean_category, LedgerRepository};
use super::{check_id, RepoContext};
use crate::error::DbResult;
use crate::paths::new_id;
use crate::store::DocPath;
use crate::txn::{run_optimistic, WriteSet};

/// A product sold together with a plain ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleSale {
    pub product_id: String,
    pub quantity: i64,
}

/// Records sales for one owner.
///
/// ## Usage
/// ```rust,ignore
/// let cart = Cart::from_items([(&coffee, 2), (&bread, 1)])?;
/// let entry = db
///     .owner(owner)
///     .sales()
///     .record_multi_item_sale(&cart, None, PaymentMethod::Cash, Discount::None)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct SaleService {
    ctx: RepoContext,
}

impl SaleService {
    pub fn new(ctx: RepoContext) -> Self {
        SaleService { ctx }
    }

    /// Decrements stock for every cart line and records one income entry.
    ///
    /// ## Errors
    /// - `EmptyCart`, validation errors, `DiscountExceedsSubtotal`: before any read
    /// - `ProductGone`, `InsufficientStock`: from the snapshot, nothing written
    /// - `Contention`: every attempt lost a race
    pub async fn record_multi_item_sale(
        &self,
        cart: &Cart,
        category_id: Option<String>,
        payment_method: PaymentMethod,
        discount: Discount,
    ) -> DbResult<LedgerEntry> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        let cart = cart.normalized()?;
        for line in cart.lines() {
            check_id("productId", &line.product_id)?;
        }
        let totals = cart.totals(&discount)?;

        let paths: Vec<DocPath> = cart
            .lines()
            .iter()
            .map(|line| self.ctx.scope.product(&line.product_id))
            .collect();

        let meta = SaleMeta {
            id: new_id(),
            owner_id: self.ctx.owner_id(),
            created_at: Utc::now(),
            category_id: clean_category(category_id),
            payment_method,
        };
        let entry_path = self.ctx.scope.transaction(&meta.id);

        debug!(
            lines = cart.lines().len(),
            subtotal = %totals.subtotal,
            discount = %totals.discount,
            "Recording multi-item sale"
        );

        let entry = run_optimistic(self.ctx.store.as_ref(), &paths, self.ctx.policy, |snapshot| {
            let mut writes = WriteSet::new();

            for (line, path) in cart.lines().iter().zip(&paths) {
                let stored: Option<Product> = snapshot.decode(path)?;
                let remaining = remaining_stock(line, stored.as_ref())?;

                if let Some(mut product) = stored {
                    product.stock = remaining;
                    writes.set(path.clone(), &product)?;
                }
            }

            let entry = multi_item_entry(&cart, &totals, meta.clone());
            writes.create(entry_path.clone(), &entry)?;
            Ok((writes, entry))
        })
        .await?;

        info!(
            id = %entry.id,
            amount = %entry.amount,
            lines = cart.lines().len(),
            payment_method = %payment_method,
            "Sale recorded"
        );
        Ok(entry)
    }

    /// Records a ledger entry, decrementing stock when `sale` is given.
    ///
    /// Only income entries can sell stock. The entry keeps the amount the
    /// user entered; `product_id` and `quantity` are stored alongside it.
    pub async fn record_entry(
        &self,
        draft: EntryDraft,
        sale: Option<SingleSale>,
    ) -> DbResult<LedgerEntry> {
        validate_entry_draft(&draft)?;

        let Some(sale) = sale else {
            return LedgerRepository::new(self.ctx.clone()).create(draft).await;
        };

        if draft.kind != EntryKind::Income {
            return Err(ValidationError::InvalidFormat {
                field: "productId".to_string(),
                reason: "only income entries can sell stock".to_string(),
            }
            .into());
        }
        check_id("productId", &sale.product_id)?;
        validate_quantity(sale.quantity)?;

        let path = self.ctx.scope.product(&sale.product_id);
        let mut entry = LedgerRepository::entry_from_draft(&self.ctx, draft);
        entry.product_id = Some(sale.product_id.clone());
        entry.quantity = Some(sale.quantity);
        let entry_path = self.ctx.scope.transaction(&entry.id);

        debug!(product_id = %sale.product_id, quantity = sale.quantity, "Recording single-item sale");

        let entry = run_optimistic(
            self.ctx.store.as_ref(),
            std::slice::from_ref(&path),
            self.ctx.policy,
            |snapshot| {
                let stored: Option<Product> = snapshot.decode(&path)?;
                let line = CartLine {
                    product_id: sale.product_id.clone(),
                    // Best name available if the product is already gone.
                    product_name: stored
                        .as_ref()
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| sale.product_id.clone()),
                    unit_price: stored.as_ref().map(|p| p.sale_price).unwrap_or_default(),
                    quantity: sale.quantity,
                };
                let remaining = remaining_stock(&line, stored.as_ref())?;

                let mut writes = WriteSet::new();
                if let Some(mut product) = stored {
                    product.stock = remaining;
                    writes.set(path.clone(), &product)?;
                }
                writes.create(entry_path.clone(), &entry)?;
                Ok((writes, entry.clone()))
            },
        )
        .await?;

        info!(id = %entry.id, amount = %entry.amount, "Single-item sale recorded");
        Ok(entry)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
