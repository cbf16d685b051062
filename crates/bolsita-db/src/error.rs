//! # Database Error Types
//!
//! Error types for store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)      Business rule (CoreError)             │
//! │       │                                 │                               │
//! │       ▼                                 ▼                               │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├── Conflict     → retried by txn::run_optimistic                │
//! │       ├── Contention   → retries exhausted                             │
//! │       └── Rule(..)     → never retried                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  user_message() ← what the caller shows                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bolsita_core::{CoreError, ValidationError};
use thiserror::Error;

/// Store operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found.
    ///
    /// ## When This Occurs
    /// - Updating or deleting a document that does not exist
    /// - The id belongs to another owner
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A commit precondition failed.
    ///
    /// ## When This Occurs
    /// - A document read in the snapshot changed before commit
    /// - A document expected to be absent was created meanwhile
    /// - SQLite reported the database busy or locked
    #[error("Write conflict on {path}")]
    Conflict { path: String },

    /// Optimistic retries exhausted while conflicts kept occurring.
    #[error("Too much contention: gave up after {attempts} attempts")]
    Contention { attempts: u32 },

    /// Store connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored body could not be (de)serialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A business rule rejected the operation.
    #[error(transparent)]
    Rule(#[from] CoreError),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(path: impl ToString) -> Self {
        DbError::Conflict {
            path: path.to_string(),
        }
    }

    /// Only commit conflicts are worth another optimistic attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Conflict { .. })
    }

    /// The sentence to show to the person using the app.
    pub fn user_message(&self) -> String {
        match self {
            DbError::Rule(CoreError::ProductGone { name }) => {
                format!("El producto {} ya no existe.", name)
            }
            DbError::Rule(CoreError::InsufficientStock { product, .. }) => {
                format!("Stock insuficiente para {}.", product)
            }
            DbError::Rule(CoreError::DebtNotFound(_)) => "La deuda no existe.".to_string(),
            DbError::Rule(CoreError::Overpayment { .. }) => {
                "El monto del abono no puede ser mayor que el saldo pendiente.".to_string()
            }
            DbError::Rule(CoreError::Validation(ValidationError::MustBePositive { field }))
                if field == "payment" =>
            {
                "El monto del abono debe ser positivo.".to_string()
            }
            DbError::Rule(CoreError::EmptyCart) => "El carrito está vacío.".to_string(),
            DbError::Rule(CoreError::DiscountExceedsSubtotal { .. }) => {
                "El descuento no puede ser mayor que el subtotal.".to_string()
            }
            DbError::Rule(CoreError::InsufficientCash { .. }) => {
                "El efectivo recibido no cubre el total.".to_string()
            }
            DbError::Rule(other) => other.to_string(),
            DbError::NotFound { entity, .. } => format!("{} no encontrado.", entity),
            DbError::Conflict { .. } | DbError::Contention { .. } => {
                "Los datos cambiaron mientras se guardaba. Intenta de nuevo.".to_string()
            }
            _ => "No se pudo acceder a los datos. Intenta de nuevo.".to_string(),
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Rule(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → DbError::QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::ConnectionFailed
/// Other                       → DbError::QueryFailed
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Document", "unknown"),
            // SQLITE_BUSY / SQLITE_LOCKED and their extended codes: another
            // writer got there first, retry like a version conflict.
            sqlx::Error::Database(db_err)
                if matches!(db_err.code().as_deref(), Some("5" | "6" | "261" | "262" | "517")) =>
            {
                DbError::Conflict {
                    path: format!("database busy: {}", db_err.message()),
                }
            }
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionFailed("Connection pool exhausted".to_string())
            }
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            _ => DbError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DbError {
    fn from(err: toml::ser::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

/// Result type for store operations.
pub type DbResult<T> = Result<T, DbError>;
