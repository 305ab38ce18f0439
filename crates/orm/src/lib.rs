//! # gantry-orm
//!
//! Applies an ordered set of named migrations against a transactional
//! store, tracks which have been applied, and on a mid-run failure rolls
//! back the migrations applied earlier in the same run.
//!
//! ```no_run
//! use gantry_orm::{MemoryStore, Migration, MigrationRegistry, MigrationRunner, SqlMigration};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = MigrationRegistry::new();
//! registry.register(Migration::new(
//!     "001_create_users",
//!     "Create users table",
//!     SqlMigration::new("CREATE TABLE users (id INT PRIMARY KEY)", "DROP TABLE users"),
//! ));
//!
//! let store = MemoryStore::new();
//! let result = MigrationRunner::new(&registry, &store).run().await?;
//! assert_eq!(result.applied, vec!["001_create_users"]);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod migrations;
pub mod store;

pub use error::*;
pub use migrations::*;
pub use store::{
    connect, MemoryStore, MigrationStore, PostgresStore, SqliteStore, StoreTransaction,
    TrackingTable,
};
