//! # bolsita-core: Pure Business Logic for Mi Bolsita
//!
//! This crate holds the bookkeeping rules as pure functions with zero I/O
//! dependencies: money, entities, validation, sale pricing, reminders,
//! ledger summaries and the receipt's amount in words.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mi Bolsita Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          bolsita-report (xlsx import/export, PDF)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     bolsita-db (document store, transactions, repositories)    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bolsita-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   sale    │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │   Cart    │  │   rules   │  │   │
//! │  │   │  Debt     │  │           │  │ Discount  │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                 │   │
//! │  │   │ reminders │  │  summary  │  │   words   │                 │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORE • NO CLOCK READS • PURE FUNCTIONS          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (Product, LedgerEntry, Debt, Category, UserProfile)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Field rules checked before any store call
//! - [`sale`] - Cart, discounts, totals and the per-line stock rule
//! - [`reminders`] - Low stock and debts coming due
//! - [`summary`] - Balance, daily closing, sales by product, valuations
//! - [`words`] - Amount in words for receipts
//!
//! ## Example Usage
//!
//! ```rust
//! use bolsita_core::sale::{Cart, Discount};
//! use bolsita_core::words::amount_in_words;
//! use bolsita_core::{Money, Product};
//! # use chrono::Utc;
//!
//! let coffee = Product {
//!     id: "p1".to_string(),
//!     owner_id: "owner".to_string(),
//!     name: "Café".to_string(),
//!     cost_price: Money::from_cents(600),
//!     sale_price: Money::from_cents(1000),
//!     stock: 5,
//!     barcode: None,
//!     created_at: Utc::now(),
//! };
//!
//! let cart = Cart::from_items([(&coffee, 2)]).unwrap();
//! let totals = cart.totals(&Discount::Percentage(1000)).unwrap();
//! assert_eq!(totals.total.cents(), 1800);
//! assert_eq!(amount_in_words(totals.total), "DIECIOCHO CON 00/100 DÓLARES");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod reminders;
pub mod sale;
pub mod summary;
pub mod types;
pub mod validation;
pub mod words;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in a single sale.
///
/// ## Business Reason
/// Keeps one sale inside a single conditional commit of reasonable size.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Catches typos (1000 instead of 10) before they empty the inventory.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of names and concepts.
pub const MAX_NAME_LEN: usize = 200;

/// Maximum unit price or cost: $100,000,000.00.
///
/// A full cart at this price (100 lines × 999 units) still fits in an
/// `i64` of cents.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000;
