//! # Domain Types
//!
//! Core domain types used throughout Mi Bolsita.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  LedgerEntry    │   │     Debt        │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  id             │       │
//! │  │  name           │   │  kind           │   │  direction      │       │
//! │  │  cost_price     │   │  amount         │   │  initial_amount │       │
//! │  │  sale_price     │   │  items?         │   │  current_balance│       │
//! │  │  stock          │   │  product_id?    │   │  due_date?      │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                       │ payments/      │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────▼────────┐       │
//! │  │    Category     │   │  UserProfile    │   │  DebtPayment    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Document Shape
//! Every entity is stored as one JSON document with camelCase field names.
//! Every entity is scoped to exactly one owner (`owner_id`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Owner
// =============================================================================

/// The authenticated user id that partitions every collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        OwnerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        OwnerId(value.to_string())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product kept in inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub owner_id: String,
    pub name: String,

    /// What the business paid per unit.
    pub cost_price: Money,

    /// What the customer pays per unit.
    pub sale_price: Money,

    /// Units on hand. Never negative.
    pub stock: i64,

    pub barcode: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Value of the units on hand at cost.
    pub fn stock_value(&self) -> Money {
        self.cost_price.multiply_quantity(self.stock)
    }

    /// Profit per unit sold at the current prices.
    pub fn unit_margin(&self) -> Money {
        self.sale_price - self.cost_price
    }
}

/// Fields supplied when creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub cost_price: Money,
    pub sale_price: Money,
    pub stock: i64,
    pub barcode: Option<String>,
}

/// Partial product update. `None` leaves a field untouched.
///
/// `barcode: Some(None)` clears the barcode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub cost_price: Option<Money>,
    pub sale_price: Option<Money>,
    pub stock: Option<i64>,
    pub barcode: Option<Option<String>>,
}

impl ProductPatch {
    pub fn apply(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.trim().to_string();
        }
        if let Some(cost) = self.cost_price {
            product.cost_price = cost;
        }
        if let Some(price) = self.sale_price {
            product.sale_price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(barcode) = &self.barcode {
            product.barcode = barcode.clone();
        }
    }
}

// =============================================================================
// Entry Kind
// =============================================================================

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Income => "Ingreso",
            EntryKind::Expense => "Gasto",
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was paid.
///
/// Stored with the labels the business sees on its receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentMethod {
    #[serde(rename = "Efectivo")]
    Cash,
    #[serde(rename = "Tarjeta")]
    Card,
    #[serde(rename = "Transferencia")]
    Transfer,
    #[serde(rename = "Otro")]
    Other,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Transfer,
        PaymentMethod::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Efectivo",
            PaymentMethod::Card => "Tarjeta",
            PaymentMethod::Transfer => "Transferencia",
            PaymentMethod::Other => "Otro",
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One line of a multi-item sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineItem {
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    pub quantity: i64,
    /// Unit price at time of sale (frozen).
    pub sale_price: Money,
}

impl LineItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.sale_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// A single income or expense record (a "transaction" in the ledger).
///
/// ## Sale Shapes
/// ```text
/// plain entry        : kind, amount, concept
/// single-item sale   : + product_id, quantity
/// multi-item sale    : + items[], payment_method, discount_amount
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub owner_id: String,
    pub kind: EntryKind,
    pub amount: Money,
    pub concept: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub category_id: Option<String>,
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub items: Option<Vec<LineItem>>,
    pub payment_method: Option<PaymentMethod>,
    pub discount_amount: Option<Money>,
}

impl LedgerEntry {
    pub fn is_income(&self) -> bool {
        self.kind == EntryKind::Income
    }

    pub fn is_expense(&self) -> bool {
        self.kind == EntryKind::Expense
    }

    /// True for entries written by a sale (either shape).
    pub fn is_sale(&self) -> bool {
        self.items.is_some() || self.product_id.is_some()
    }
}

/// Fields supplied when recording a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EntryDraft {
    pub kind: EntryKind,
    pub amount: Money,
    pub concept: String,
    pub category_id: Option<String>,
}

/// Partial ledger entry update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub kind: Option<EntryKind>,
    pub amount: Option<Money>,
    pub concept: Option<String>,
    pub category_id: Option<Option<String>>,
}

impl EntryPatch {
    /// Applies the patch in place.
    ///
    /// Sale entries (either shape) keep their kind and amount, which must
    /// stay equal to the sold lines net of discount; only concept and
    /// category may change. The entry is untouched on error.
    pub fn apply(&self, entry: &mut LedgerEntry) -> Result<(), ValidationError> {
        if entry.is_sale() {
            if self.amount.is_some_and(|amount| amount != entry.amount) {
                return Err(ValidationError::locked("amount"));
            }
            if self.kind.is_some_and(|kind| kind != entry.kind) {
                return Err(ValidationError::locked("kind"));
            }
        }

        if let Some(kind) = self.kind {
            entry.kind = kind;
        }
        if let Some(amount) = self.amount {
            entry.amount = amount;
        }
        if let Some(concept) = &self.concept {
            entry.concept = concept.trim().to_string();
        }
        if let Some(category) = &self.category_id {
            entry.category_id = category.clone();
        }
        Ok(())
    }
}

// =============================================================================
// Category
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub kind: EntryKind,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Debts
// =============================================================================

/// Who owes whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DebtDirection {
    /// Someone owes the business.
    Receivable,
    /// The business owes someone.
    Payable,
}

impl DebtDirection {
    pub fn label(&self) -> &'static str {
        match self {
            DebtDirection::Receivable => "Por Cobrar",
            DebtDirection::Payable => "Por Pagar",
        }
    }
}

/// An amount owed, reduced over time by payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Debt {
    pub id: String,
    pub owner_id: String,
    pub direction: DebtDirection,
    pub person_name: String,
    pub initial_amount: Money,
    /// Only decreases, and only through payments.
    pub current_balance: Money,
    pub concept: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,
}

impl Debt {
    pub fn is_settled(&self) -> bool {
        self.current_balance.is_zero()
    }

    pub fn paid_so_far(&self) -> Money {
        self.initial_amount - self.current_balance
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewDebt {
    pub direction: DebtDirection,
    pub person_name: String,
    pub initial_amount: Money,
    pub concept: String,
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,
}

/// A payment recorded against a debt (payments sub-collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DebtPayment {
    pub id: String,
    pub amount: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// User Profile
// =============================================================================

/// Business details printed on receipts and reports.
///
/// Also used as a merge patch: only `Some` fields overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    pub business_name: Option<String>,
    pub business_address: Option<String>,
    pub business_phone: Option<String>,
    pub receipt_counter: Option<i64>,
}

impl UserProfile {
    /// Merges `patch` into `self`; absent fields are kept.
    pub fn merge(&mut self, patch: &UserProfile) {
        if let Some(name) = &patch.business_name {
            self.business_name = Some(name.clone());
        }
        if let Some(address) = &patch.business_address {
            self.business_address = Some(address.clone());
        }
        if let Some(phone) = &patch.business_phone {
            self.business_phone = Some(phone.clone());
        }
        if let Some(counter) = patch.receipt_counter {
            self.receipt_counter = Some(counter);
        }
    }

    /// Name for receipt headers, falling back to a generic title.
    pub fn display_name(&self) -> &str {
        self.business_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Mi Negocio")
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
