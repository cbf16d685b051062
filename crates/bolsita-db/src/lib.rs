//! # bolsita-db: Storage Layer for Mi Bolsita
//!
//! Every read and write of the bookkeeping data goes through this crate:
//! a versioned document store, optimistic transactions over it, live
//! subscriptions, and one repository per entity.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mi Bolsita Data Flow                             │
//! │                                                                         │
//! │  Caller (UI layer, seed binary, tests)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bolsita-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │     txn      │  │   │
//! │  │   │   (pool.rs)   │    │ product,debt  │    │ run_optimis- │  │   │
//! │  │   │               │───►│ ledger, sale  │───►│ tic + retry  │  │   │
//! │  │   │ owner(id)     │    │ profile, ...  │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────┬───────┘  │   │
//! │  │                                │                   │          │   │
//! │  │                        ┌───────▼───────────────────▼───────┐  │   │
//! │  │                        │    Arc<dyn DocumentStore>         │  │   │
//! │  │                        │  MemoryStore | SqliteStore        │  │   │
//! │  │                        └───────────────────────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - Document store trait, in-memory and SQLite backends
//! - [`txn`] - Optimistic read-modify-write with bounded retry
//! - [`subscription`] - Live snapshots of a collection or document
//! - [`repository`] - Per-owner repositories and the sale service
//! - [`pool`] - Store selection and the [`Database`] handle
//! - [`config`] - `bolsita.toml` + environment configuration
//! - [`migrations`] - Embedded SQLite migrations
//! - [`error`] - Storage error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bolsita_db::{Database, DbConfig};
//! use bolsita_core::OwnerId;
//!
//! let db = Database::new(DbConfig::sqlite("bolsita.db")).await?;
//! let shop = db.owner(OwnerId::new(uid));
//!
//! let cart = Cart::from_items([(&coffee, 2)])?;
//! let entry = shop
//!     .sales()
//!     .record_multi_item_sale(&cart, None, PaymentMethod::Cash, Discount::None)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod paths;
pub mod pool;
pub mod repository;
pub mod store;
pub mod subscription;
pub mod txn;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::AppConfig;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, OwnerDb, StorageBackend};
pub use store::{DocumentStore, MemoryStore, SqliteStore};
pub use subscription::Subscription;
pub use txn::{run_optimistic, RetryPolicy};

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::debt::DebtRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::product::ProductRepository;
pub use repository::profile::ProfileRepository;
pub use repository::sale::{SaleService, SingleSale};
