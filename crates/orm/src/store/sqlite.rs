//! SQLite store backed by a sqlx `SqlitePool`
//!
//! The pool holds a single connection so `sqlite::memory:` URLs keep one
//! database for the lifetime of the store.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, Executor, Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;

use super::{MigrationStore, StoreTransaction, TrackingTable};
use crate::error::StoreResult;
use crate::migrations::definitions::TrackingRecord;

pub struct SqliteStore {
    pool: SqlitePool,
    table: TrackingTable,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, table: TrackingTable) -> Self {
        Self { pool, table }
    }

    /// Connect from a `sqlite:` URL, creating the database file if needed
    pub async fn connect(
        database_url: &str,
        table: TrackingTable,
        statement_log_level: Option<log::LevelFilter>,
    ) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let options = match statement_log_level {
            Some(level) => options.log_statements(level),
            None => options.disable_statement_logging(),
        };

        let pool = Self::pool_options().connect_with(options).await?;

        Ok(Self::new(pool, table))
    }

    /// One connection that is never reaped; for `sqlite::memory:` it is the database
    fn pool_options() -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    }

    /// In-memory database, gone when the store is dropped
    pub async fn in_memory(table: TrackingTable) -> StoreResult<Self> {
        Self::connect("sqlite::memory:", table, None).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl MigrationStore for SqliteStore {
    async fn ensure_tracking_schema(&self) -> StoreResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id VARCHAR(255) PRIMARY KEY,\n    \
                description TEXT NOT NULL,\n    \
                applied_at DATETIME NOT NULL\n\
            )",
            self.table
        );
        self.pool.execute(sql.as_str()).await?;
        Ok(())
    }

    async fn count_tracking_record(&self, id: &str) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", self.table);
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn applied_records(&self) -> StoreResult<Vec<TrackingRecord>> {
        let sql = format!(
            "SELECT id, description, applied_at FROM {} ORDER BY id",
            self.table
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(TrackingRecord {
                id: row.try_get("id")?,
                description: row.try_get("description")?,
                applied_at: row.try_get("applied_at")?,
            });
        }
        Ok(records)
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let inner = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction {
            inner,
            table: self.table.clone(),
        }))
    }
}

pub struct SqliteTransaction {
    inner: Transaction<'static, Sqlite>,
    table: TrackingTable,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str) -> StoreResult<u64> {
        let result = (&mut *self.inner).execute(sql).await?;
        Ok(result.rows_affected())
    }

    async fn insert_tracking_record(&mut self, record: &TrackingRecord) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, description, applied_at) VALUES (?, ?, ?)",
            self.table
        );
        sqlx::query(&sql)
            .bind(&record.id)
            .bind(&record.description)
            .bind(record.applied_at)
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }

    async fn delete_tracking_record(&mut self, id: &str) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.table);
        sqlx::query(&sql).bind(id).execute(&mut *self.inner).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.inner.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.inner.rollback().await?;
        Ok(())
    }
}
