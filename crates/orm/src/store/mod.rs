//! Store Boundary
//!
//! The engine never talks to a database directly. It needs a place to keep
//! tracking records and a way to open transactions; everything else a
//! migration does goes through [`StoreTransaction::execute`].

pub mod memory;
pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;
use gantry_core::config::{is_plain_identifier, Settings, SqlType};
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::migrations::definitions::TrackingRecord;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

/// Default name of the tracking table
pub const DEFAULT_TRACKING_TABLE: &str = "migration_records";

/// Transactional store capability the runner depends on
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// Create the tracking table if it does not exist
    async fn ensure_tracking_schema(&self) -> StoreResult<()>;

    /// Number of tracking records with this id (0 or 1 in practice)
    async fn count_tracking_record(&self, id: &str) -> StoreResult<i64>;

    /// All tracking records, ascending by id
    async fn applied_records(&self) -> StoreResult<Vec<TrackingRecord>>;

    /// Open a transaction; dropping it without commit discards its writes
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// One open transaction against the store
#[async_trait]
pub trait StoreTransaction: Send {
    /// Execute a single statement, returning affected rows
    async fn execute(&mut self, sql: &str) -> StoreResult<u64>;

    async fn insert_tracking_record(&mut self, record: &TrackingRecord) -> StoreResult<()>;

    async fn delete_tracking_record(&mut self, id: &str) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Validated tracking table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingTable(String);

impl TrackingTable {
    pub fn new(name: impl Into<String>) -> StoreResult<Self> {
        let name = name.into();
        if !is_plain_identifier(&name) {
            return Err(StoreError::InvalidIdentifier(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TrackingTable {
    fn default() -> Self {
        Self(DEFAULT_TRACKING_TABLE.to_string())
    }
}

impl std::fmt::Display for TrackingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map `SQL_LOG_LEVEL` onto the level sqlx logs statements at; `None` disables statement logging
pub fn statement_log_level(level: &str) -> Option<log::LevelFilter> {
    match level.to_uppercase().as_str() {
        "INFO" => Some(log::LevelFilter::Info),
        "WARN" | "WARNING" => Some(log::LevelFilter::Warn),
        "ERROR" => Some(log::LevelFilter::Error),
        _ => None,
    }
}

/// Connect to the store selected by `SQL_TYPE` / `SQL_URI`
pub async fn connect(settings: &Settings) -> StoreResult<Arc<dyn MigrationStore>> {
    let table = TrackingTable::new(settings.migrations_table.clone())?;
    let log_level = statement_log_level(&settings.sql_log_level);

    tracing::info!(sql_type = %settings.sql_type, "Connecting to database");

    let store: Arc<dyn MigrationStore> = match settings.sql_type {
        SqlType::Postgres => {
            Arc::new(PostgresStore::connect(&settings.sql_uri, table, log_level).await?)
        }
        SqlType::Sqlite => {
            Arc::new(SqliteStore::connect(&settings.sql_uri, table, log_level).await?)
        }
        SqlType::Memory => Arc::new(MemoryStore::new()),
    };

    tracing::info!("Database connection established successfully");
    Ok(store)
}
