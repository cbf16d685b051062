//! # Sale Pricing
//!
//! The pure half of a sale: the cart, its discount and totals, and the stock
//! rule applied to each line. The store half (snapshot, conditional commit,
//! retry) lives in `bolsita-db::repository::sale`.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Multi-item Sale                                 │
//! │                                                                         │
//! │  Cart::add(product, qty)   ── merges lines by product id               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Cart::totals(discount)    ── subtotal − discount = total               │
//! │        │                     (discount > subtotal is rejected)          │
//! │        ▼                                                                │
//! │  remaining_stock(line, stored product)   for every line                │
//! │        │   ├── product gone        → ProductGone                        │
//! │        │   └── stock − qty < 0     → InsufficientStock                  │
//! │        ▼                                                                │
//! │  multi_item_entry(...)     ── the LedgerEntry to commit                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bolsita_core::sale::{Cart, Discount};
//! use bolsita_core::{Money, Product};
//! # use chrono::Utc;
//! # let product = |id: &str, price: i64| Product {
//! #     id: id.to_string(), owner_id: "o".to_string(), name: id.to_string(),
//! #     cost_price: Money::zero(), sale_price: Money::from_cents(price),
//! #     stock: 10, barcode: None, created_at: Utc::now(),
//! # };
//!
//! let mut cart = Cart::new();
//! cart.add(&product("A", 1000), 2).unwrap();
//! cart.add(&product("B", 500), 1).unwrap();
//!
//! let totals = cart.totals(&Discount::Fixed(Money::from_cents(100))).unwrap();
//! assert_eq!(totals.total.cents(), 2400);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{EntryKind, LedgerEntry, LineItem, PaymentMethod, Product};
use crate::validation::{
    validate_cart_size, validate_discount_bps, validate_price, validate_quantity,
};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// A line in the cart.
///
/// Name and price are frozen when the product is added; a later price
/// change in inventory does not alter a sale already being rung up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl CartLine {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            unit_price: product.sale_price,
            quantity,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// Line total, rejected instead of wrapping when it overflows.
    pub fn checked_line_total(&self) -> CoreResult<Money> {
        self.unit_price
            .checked_multiply_quantity(self.quantity)
            .ok_or_else(|| ValidationError::too_large("line total").into())
    }

    pub fn to_line_item(&self) -> LineItem {
        LineItem {
            product_id: self.product_id.clone(),
            product_name: self.product_name.clone(),
            quantity: self.quantity,
            sale_price: self.unit_price,
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The lines of a sale being assembled.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding the same product merges)
/// - Every quantity is in `1..=999`
/// - At most 100 lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    /// Builds a cart from `(product, quantity)` pairs, merging duplicates.
    pub fn from_items<'a, I>(items: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (&'a Product, i64)>,
    {
        let mut cart = Cart::new();
        for (product, quantity) in items {
            cart.add(product, quantity)?;
        }
        Ok(cart)
    }

    /// Adds a product, or increases its quantity if already present.
    pub fn add(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;
        validate_price("salePrice", product.sale_price)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let merged = line.quantity + quantity;
            if merged > MAX_ITEM_QUANTITY {
                return Err(ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: 1,
                    max: MAX_ITEM_QUANTITY,
                }
                .into());
            }
            line.quantity = merged;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(ValidationError::OutOfRange {
                field: "cart items".to_string(),
                min: 1,
                max: MAX_CART_ITEMS as i64,
            }
            .into());
        }

        self.lines.push(CartLine::from_product(product, quantity));
        Ok(())
    }

    /// Sets a line's quantity; zero removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            self.remove(product_id);
            return Ok(());
        }
        validate_quantity(quantity)?;

        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = quantity;
                Ok(())
            }
            None => Err(ValidationError::InvalidFormat {
                field: "productId".to_string(),
                reason: format!("{} is not in the cart", product_id),
            }
            .into()),
        }
    }

    /// Removes a line. Returns whether anything was removed.
    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of the line totals.
    ///
    /// Fails with `TooLarge` rather than wrapping when the sum does not fit.
    pub fn subtotal(&self) -> CoreResult<Money> {
        self.lines.iter().try_fold(Money::zero(), |acc, line| {
            acc.checked_add(line.checked_line_total()?)
                .ok_or_else(|| ValidationError::too_large("subtotal").into())
        })
    }

    /// Re-checks every line and merges duplicates.
    ///
    /// Carts built with [`Cart::add`] are already in this shape; a cart that
    /// arrived deserialized may not be.
    pub fn normalized(&self) -> CoreResult<Cart> {
        let mut merged: Vec<CartLine> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            validate_quantity(line.quantity)?;
            validate_price("unitPrice", line.unit_price)?;
            match merged.iter_mut().find(|l| l.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity += line.quantity;
                    validate_quantity(existing.quantity)?;
                }
                None => merged.push(line.clone()),
            }
        }
        validate_cart_size(merged.len())?;
        Ok(Cart { lines: merged })
    }

    /// Prices the cart with a discount.
    pub fn totals(&self, discount: &Discount) -> CoreResult<SaleTotals> {
        if self.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        let subtotal = self.subtotal()?;
        let discount = discount.resolve(subtotal)?;
        Ok(SaleTotals {
            subtotal,
            discount,
            total: subtotal - discount,
        })
    }
}

// =============================================================================
// Discount
// =============================================================================

/// A sale-level discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
#[ts(export)]
pub enum Discount {
    None,
    /// A fixed amount off the subtotal.
    Fixed(Money),
    /// Basis points of the subtotal (1000 = 10%).
    Percentage(u32),
}

impl Default for Discount {
    fn default() -> Self {
        Discount::None
    }
}

impl Discount {
    /// Resolves to a fixed amount against `subtotal`.
    ///
    /// Negative amounts and amounts above the subtotal are rejected.
    pub fn resolve(&self, subtotal: Money) -> CoreResult<Money> {
        let amount = match *self {
            Discount::None => Money::zero(),
            Discount::Fixed(amount) => {
                if amount.is_negative() {
                    return Err(ValidationError::negative("discount").into());
                }
                amount
            }
            Discount::Percentage(bps) => {
                validate_discount_bps(bps)?;
                subtotal.percentage(bps)
            }
        };

        if amount > subtotal {
            return Err(CoreError::DiscountExceedsSubtotal {
                discount: amount,
                subtotal,
            });
        }
        Ok(amount)
    }
}

// =============================================================================
// Totals
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

/// Change to hand back for a cash payment.
pub fn change_due(total: Money, tendered: Money) -> CoreResult<Money> {
    if tendered < total {
        return Err(CoreError::InsufficientCash { tendered, total });
    }
    Ok(tendered - total)
}

// =============================================================================
// Stock Rule
// =============================================================================

/// Applies one line to the stored product and returns the stock left.
///
/// `stored` is the product as read in the transaction snapshot; `None`
/// means it was deleted after the line was added.
pub fn remaining_stock(line: &CartLine, stored: Option<&Product>) -> CoreResult<i64> {
    let product = stored.ok_or_else(|| CoreError::ProductGone {
        name: line.product_name.clone(),
    })?;

    let remaining = product.stock - line.quantity;
    if remaining < 0 {
        return Err(CoreError::InsufficientStock {
            product: line.product_name.clone(),
            available: product.stock,
            requested: line.quantity,
        });
    }
    Ok(remaining)
}

// =============================================================================
// Entry Builders
// =============================================================================

pub fn sale_concept(distinct_products: usize) -> String {
    format!("Venta de {} productos diferentes", distinct_products)
}

/// Everything a multi-item ledger entry needs besides the cart itself.
#[derive(Debug, Clone)]
pub struct SaleMeta {
    pub id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub category_id: Option<String>,
    pub payment_method: PaymentMethod,
}

/// Builds the income entry recorded by a multi-item sale.
///
/// The amount equals the sum of the line items net of the discount.
pub fn multi_item_entry(cart: &Cart, totals: &SaleTotals, meta: SaleMeta) -> LedgerEntry {
    LedgerEntry {
        id: meta.id,
        owner_id: meta.owner_id,
        kind: EntryKind::Income,
        amount: totals.total,
        concept: sale_concept(cart.lines().len()),
        created_at: meta.created_at,
        category_id: meta.category_id.filter(|c| !c.trim().is_empty()),
        product_id: None,
        quantity: None,
        items: Some(cart.lines().iter().map(CartLine::to_line_item).collect()),
        payment_method: Some(meta.payment_method),
        discount_amount: Some(totals.discount),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, price_cents: i64, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            owner_id: "owner".to_string(),
            name: format!("Product {}", id),
            cost_price: Money::from_cents(price_cents / 2),
            sale_price: Money::from_cents(price_cents),
            stock,
            barcode: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_add_same_product_merges() {
        let mut cart = Cart::new();
        let a = product("A", 1000, 5);

        cart.add(&a, 2).unwrap();
        cart.add(&a, 3).unwrap();

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total_quantity(), 5);
        assert_eq!(cart.subtotal().unwrap().cents(), 5000);
    }

    #[test]
    fn test_cart_rejects_bad_quantities() {
        let mut cart = Cart::new();
        let a = product("A", 1000, 5);

        assert!(cart.add(&a, 0).is_err());
        assert!(cart.add(&a, -2).is_err());
        cart.add(&a, 999).unwrap();
        assert!(cart.add(&a, 1).is_err());
    }

    #[test]
    fn test_cart_rejects_price_above_limit() {
        let mut cart = Cart::new();
        let pricey = product("P", i64::MAX / 2, 10);

        let err = cart.add(&pricey, 3).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { .. })
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_overflowing_cart_is_rejected_not_wrapped() {
        // Deserialized carts skip `add`, so the price check lands in
        // `normalized` and the arithmetic must still not wrap.
        let cart: Cart = serde_json::from_value(serde_json::json!({
            "lines": [
                {"productId": "A", "productName": "A", "unitPrice": i64::MAX / 2, "quantity": 3},
            ]
        }))
        .unwrap();

        assert_eq!(
            cart.subtotal(),
            Err(ValidationError::too_large("line total").into())
        );
        assert!(cart.totals(&Discount::None).is_err());
        assert!(cart.normalized().is_err());

        let three: Cart = serde_json::from_value(serde_json::json!({
            "lines": [
                {"productId": "A", "productName": "A", "unitPrice": i64::MAX / 2, "quantity": 1},
                {"productId": "B", "productName": "B", "unitPrice": i64::MAX / 2, "quantity": 1},
                {"productId": "C", "productName": "C", "unitPrice": i64::MAX / 2, "quantity": 1},
            ]
        }))
        .unwrap();
        assert_eq!(
            three.subtotal(),
            Err(ValidationError::too_large("subtotal").into())
        );
    }

    #[test]
    fn test_totals_with_fixed_discount() {
        let a = product("A", 1000, 5);
        let b = product("B", 500, 1);
        let cart = Cart::from_items([(&a, 2), (&b, 1)]).unwrap();

        let totals = cart.totals(&Discount::Fixed(Money::from_cents(100))).unwrap();
        assert_eq!(totals.subtotal.cents(), 2500);
        assert_eq!(totals.discount.cents(), 100);
        assert_eq!(totals.total.cents(), 2400);
    }

    #[test]
    fn test_totals_with_percentage_discount() {
        let a = product("A", 1000, 5);
        let cart = Cart::from_items([(&a, 3)]).unwrap();

        let totals = cart.totals(&Discount::Percentage(1000)).unwrap();
        assert_eq!(totals.discount.cents(), 300);
        assert_eq!(totals.total.cents(), 2700);
    }

    #[test]
    fn test_discount_above_subtotal_rejected() {
        let a = product("A", 1000, 5);
        let cart = Cart::from_items([(&a, 1)]).unwrap();

        let err = cart
            .totals(&Discount::Fixed(Money::from_cents(1001)))
            .unwrap_err();
        assert!(matches!(err, CoreError::DiscountExceedsSubtotal { .. }));

        let full = cart.totals(&Discount::Fixed(Money::from_cents(1000))).unwrap();
        assert!(full.total.is_zero());
    }

    #[test]
    fn test_negative_discount_rejected() {
        let a = product("A", 1000, 5);
        let cart = Cart::from_items([(&a, 1)]).unwrap();
        assert!(cart.totals(&Discount::Fixed(Money::from_cents(-1))).is_err());
        assert!(cart.totals(&Discount::Percentage(10_001)).is_err());
    }

    #[test]
    fn test_empty_cart_has_no_totals() {
        assert_eq!(
            Cart::new().totals(&Discount::None),
            Err(CoreError::EmptyCart)
        );
    }

    #[test]
    fn test_normalized_merges_deserialized_duplicates() {
        let cart: Cart = serde_json::from_value(serde_json::json!({
            "lines": [
                {"productId": "A", "productName": "A", "unitPrice": 1000, "quantity": 2},
                {"productId": "A", "productName": "A", "unitPrice": 1000, "quantity": 3},
            ]
        }))
        .unwrap();

        let merged = cart.normalized().unwrap();
        assert_eq!(merged.lines().len(), 1);
        assert_eq!(merged.total_quantity(), 5);

        let bad: Cart = serde_json::from_value(serde_json::json!({
            "lines": [{"productId": "A", "productName": "A", "unitPrice": 1000, "quantity": 0}]
        }))
        .unwrap();
        assert!(bad.normalized().is_err());
    }

    #[test]
    fn test_remaining_stock() {
        let b = product("B", 500, 1);
        let line = CartLine::from_product(&b, 1);
        assert_eq!(remaining_stock(&line, Some(&b)), Ok(0));

        let empty = product("B", 500, 0);
        assert_eq!(
            remaining_stock(&line, Some(&empty)),
            Err(CoreError::InsufficientStock {
                product: "Product B".to_string(),
                available: 0,
                requested: 1,
            })
        );

        assert_eq!(
            remaining_stock(&line, None),
            Err(CoreError::ProductGone {
                name: "Product B".to_string()
            })
        );
    }

    #[test]
    fn test_change_due() {
        let total = Money::from_cents(2400);
        assert_eq!(change_due(total, Money::from_cents(3000)).unwrap().cents(), 600);
        assert_eq!(change_due(total, total).unwrap(), Money::zero());
        assert!(change_due(total, Money::from_cents(2000)).is_err());
    }

    #[test]
    fn test_multi_item_entry_matches_totals() {
        let a = product("A", 1000, 5);
        let b = product("B", 500, 1);
        let cart = Cart::from_items([(&a, 2), (&b, 1)]).unwrap();
        let totals = cart.totals(&Discount::Fixed(Money::from_cents(100))).unwrap();

        let entry = multi_item_entry(
            &cart,
            &totals,
            SaleMeta {
                id: "t1".to_string(),
                owner_id: "owner".to_string(),
                created_at: Utc::now(),
                category_id: Some(String::new()),
                payment_method: PaymentMethod::Card,
            },
        );

        assert_eq!(entry.kind, EntryKind::Income);
        assert_eq!(entry.concept, "Venta de 2 productos diferentes");
        assert_eq!(entry.category_id, None);
        let items = entry.items.unwrap();
        let gross: Money = items.iter().map(LineItem::line_total).sum();
        assert_eq!(gross - entry.discount_amount.unwrap(), entry.amount);
    }
}
