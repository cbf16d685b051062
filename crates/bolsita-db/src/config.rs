//! # Configuration
//!
//! Application settings loaded from `bolsita.toml` and `BOLSITA_*`
//! environment variables.
//!
//! ## Load Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AppConfig::load(path)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. Defaults                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. TOML file (explicit path, else the platform config dir)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. Environment overrides (BOLSITA_*)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. validate()                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example File
//! ```toml
//! [database]
//! backend = "sqlite"
//! path = "/var/lib/bolsita/bolsita.db"
//! max_connections = 5
//!
//! [transactions]
//! max_attempts = 5
//! initial_backoff_ms = 10
//! max_backoff_ms = 200
//!
//! [reminders]
//! low_stock_threshold = 5
//! due_window_days = 7
//! ```
//!
//! ## Environment Variables
//! | Variable | Setting |
//! |---|---|
//! | `BOLSITA_DB_BACKEND` | `database.backend` |
//! | `BOLSITA_DB_PATH` | `database.path` |
//! | `BOLSITA_DB_MAX_CONNECTIONS` | `database.max_connections` |
//! | `BOLSITA_TXN_MAX_ATTEMPTS` | `transactions.max_attempts` |
//! | `BOLSITA_LOW_STOCK_THRESHOLD` | `reminders.low_stock_threshold` |
//! | `BOLSITA_DUE_WINDOW_DAYS` | `reminders.due_window_days` |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use bolsita_core::reminders::{ReminderSettings, DEFAULT_DUE_WINDOW_DAYS, DEFAULT_LOW_STOCK_THRESHOLD};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;
use crate::txn::RetryPolicy;

// =============================================================================
// Backend Kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Nothing persisted; for demos and tests.
    Memory,
    #[default]
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(BackendKind::Memory),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(DbError::Config(format!(
                "Unknown backend: '{}'. Valid options: memory, sqlite",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: BackendKind,

    /// SQLite file. Ignored by the memory backend.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "mibolsita", "bolsita")
        .map(|dirs| dirs.data_dir().join("bolsita.db"))
        .unwrap_or_else(|| PathBuf::from("bolsita.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            backend: BackendKind::default(),
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Optimistic transaction retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    10
}

fn default_max_backoff_ms() -> u64 {
    200
}

impl Default for TransactionSettings {
    fn default() -> Self {
        TransactionSettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,

    #[serde(default = "default_due_window_days")]
    pub due_window_days: u32,
}

fn default_low_stock_threshold() -> i64 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

fn default_due_window_days() -> u32 {
    DEFAULT_DUE_WINDOW_DAYS
}

impl Default for ReminderConfig {
    fn default() -> Self {
        ReminderConfig {
            low_stock_threshold: default_low_stock_threshold(),
            due_window_days: default_due_window_days(),
        }
    }
}

// =============================================================================
// App Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub transactions: TransactionSettings,

    #[serde(default)]
    pub reminders: ReminderConfig,
}

impl AppConfig {
    /// Loads configuration: defaults, then file, then environment.
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Like [`load`](Self::load), falling back to defaults on any error.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> DbResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DbError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "mibolsita", "bolsita")
            .map(|dirs| dirs.config_dir().join("bolsita.toml"))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `BOLSITA_*` overrides read through `lookup`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("BOLSITA_DB_BACKEND") {
            match backend.parse() {
                Ok(parsed) => {
                    debug!(backend = %backend, "Overriding backend from environment");
                    self.database.backend = parsed;
                }
                Err(e) => warn!(error = %e, "Ignoring BOLSITA_DB_BACKEND"),
            }
        }

        if let Some(path) = lookup("BOLSITA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("BOLSITA_DB_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse::<u32>() {
                self.database.max_connections = max;
            }
        }

        if let Some(attempts) = lookup("BOLSITA_TXN_MAX_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse::<u32>() {
                self.transactions.max_attempts = attempts;
            }
        }

        if let Some(threshold) = lookup("BOLSITA_LOW_STOCK_THRESHOLD") {
            if let Ok(threshold) = threshold.parse::<i64>() {
                self.reminders.low_stock_threshold = threshold;
            }
        }

        if let Some(days) = lookup("BOLSITA_DUE_WINDOW_DAYS") {
            if let Ok(days) = days.parse::<u32>() {
                self.reminders.due_window_days = days;
            }
        }
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.transactions.max_attempts == 0 {
            return Err(DbError::Config("max_attempts must be at least 1".into()));
        }

        if self.transactions.initial_backoff_ms > self.transactions.max_backoff_ms {
            return Err(DbError::Config(
                "initial_backoff_ms must not exceed max_backoff_ms".into(),
            ));
        }

        if self.database.backend == BackendKind::Sqlite {
            if self.database.path.as_os_str().is_empty() {
                return Err(DbError::Config("database path must not be empty".into()));
            }
            if self.database.max_connections == 0 {
                return Err(DbError::Config(
                    "max_connections must be greater than 0".into(),
                ));
            }
        }

        if self.reminders.low_stock_threshold < 0 {
            return Err(DbError::Config(
                "low_stock_threshold must not be negative".into(),
            ));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.transactions.max_attempts,
            Duration::from_millis(self.transactions.initial_backoff_ms),
            Duration::from_millis(self.transactions.max_backoff_ms),
        )
    }

    pub fn reminder_settings(&self) -> ReminderSettings {
        ReminderSettings {
            low_stock_threshold: self.reminders.low_stock_threshold,
            due_window_days: self.reminders.due_window_days,
        }
    }

    pub fn to_db_config(&self) -> DbConfig {
        let config = match self.database.backend {
            BackendKind::Memory => DbConfig::in_memory(),
            BackendKind::Sqlite => DbConfig::sqlite(self.database.path.clone())
                .max_connections(self.database.max_connections),
        };
        config.retry_policy(self.retry_policy())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
