//! # Database Handle
//!
//! Store selection and per-owner repository access.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Handle                                    │
//! │                                                                         │
//! │  App Startup                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::sqlite(path) / DbConfig::in_memory()                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← open store (+ migrations)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │     Arc<dyn DocumentStore>              │                           │
//! │  │  MemoryStore  |  SqliteStore (pool)     │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       │ db.owner(owner_id)                                              │
//! │       ▼                                                                 │
//! │  OwnerDb ──► products() ledger() categories() debts() profile()        │
//! │              sales()                                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! The SQLite backend enables WAL (Write-Ahead Logging):
//! - Readers don't block writers
//! - Writers don't block readers
//! - Better crash recovery

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use bolsita_core::OwnerId;

use crate::error::DbResult;
use crate::paths::OwnerScope;
use crate::repository::category::CategoryRepository;
use crate::repository::debt::DebtRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::product::ProductRepository;
use crate::repository::profile::ProfileRepository;
use crate::repository::sale::SaleService;
use crate::repository::RepoContext;
use crate::store::{DocumentStore, MemoryStore, SqliteStore};
use crate::txn::RetryPolicy;

// =============================================================================
// Configuration
// =============================================================================

/// Which store backs the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-process maps; nothing survives the process.
    Memory,
    /// SQLite file at `path`.
    Sqlite { path: PathBuf },
    /// SQLite without a file (tests of the SQL path).
    SqliteInMemory,
}

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::sqlite("/path/to/bolsita.db")
///     .max_connections(5)
///     .retry_policy(RetryPolicy::default());
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub backend: StorageBackend,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Retry policy handed to every repository.
    pub retry: RetryPolicy,
}

impl DbConfig {
    fn with_backend(backend: StorageBackend) -> Self {
        DbConfig {
            backend,
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            retry: RetryPolicy::default(),
        }
    }

    /// SQLite file at `path`, created if it doesn't exist.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self::with_backend(StorageBackend::Sqlite { path: path.into() })
    }

    /// In-process store (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// // Database is isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        Self::with_backend(StorageBackend::Memory)
    }

    /// SQLite held in memory by a single connection.
    pub fn sqlite_in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            ..Self::with_backend(StorageBackend::SqliteInMemory)
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle.
///
/// Cheap to clone; every clone shares the same store.
#[derive(Debug, Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    sqlite: Option<SqliteStore>,
}

impl Database {
    /// Opens the store described by `config`.
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError)` - Connection or migration failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        match &config.backend {
            StorageBackend::Memory => {
                info!("Using in-memory document store");
                Ok(Database {
                    store: Arc::new(MemoryStore::new()),
                    retry: config.retry,
                    sqlite: None,
                })
            }
            StorageBackend::Sqlite { .. } | StorageBackend::SqliteInMemory => {
                let sqlite = SqliteStore::connect(&config).await?;
                Ok(Database {
                    store: Arc::new(sqlite.clone()),
                    retry: config.retry,
                    sqlite: Some(sqlite),
                })
            }
        }
    }

    /// Wraps an already built store (fakes, shared stores in tests).
    pub fn with_store(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Database {
            store,
            retry,
            sqlite: None,
        }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    /// Repositories scoped to one owner.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let products = db.owner(OwnerId::new(uid)).products().list().await?;
    /// ```
    pub fn owner(&self, owner: OwnerId) -> OwnerDb {
        OwnerDb {
            ctx: RepoContext::new(self.store.clone(), OwnerScope::new(owner), self.retry),
        }
    }

    /// Checks if the store is healthy.
    ///
    /// ## Returns
    /// * `true` - Store is responsive
    /// * `false` - Store is unavailable
    pub async fn health_check(&self) -> bool {
        match &self.sqlite {
            Some(sqlite) => sqlite.health_check().await,
            None => self.store.list("").await.is_ok(),
        }
    }

    /// Closes the SQLite pool, if any.
    ///
    /// ## Note
    /// After calling close, all repository operations on a SQLite store will fail.
    pub async fn close(&self) {
        if let Some(sqlite) = &self.sqlite {
            sqlite.close().await;
        }
    }
}

/// Every repository for one owner.
#[derive(Debug, Clone)]
pub struct OwnerDb {
    ctx: RepoContext,
}

impl OwnerDb {
    pub fn owner(&self) -> &OwnerId {
        self.ctx.scope.owner()
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.ctx.clone())
    }

    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.ctx.clone())
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.ctx.clone())
    }

    pub fn debts(&self) -> DebtRepository {
        DebtRepository::new(self.ctx.clone())
    }

    pub fn profile(&self) -> ProfileRepository {
        ProfileRepository::new(self.ctx.clone())
    }

    pub fn sales(&self) -> SaleService {
        SaleService::new(self.ctx.clone())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_sqlite_in_memory_database() {
        let db = Database::new(DbConfig::sqlite_in_memory()).await.unwrap();
        assert!(db.health_check().await);
        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::sqlite("/tmp/test.db")
            .max_connections(10)
            .min_connections(2);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(
            config.backend,
            StorageBackend::Sqlite {
                path: PathBuf::from("/tmp/test.db")
            }
        );
    }

    #[tokio::test]
    async fn test_owners_are_isolated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ana = db.owner(OwnerId::new("ana"));
        let luis = db.owner(OwnerId::new("luis"));

        ana.categories()
            .create("Renta", bolsita_core::EntryKind::Expense)
            .await
            .unwrap();

        assert_eq!(ana.categories().list().await.unwrap().len(), 1);
        assert!(luis.categories().list().await.unwrap().is_empty());
    }
}
