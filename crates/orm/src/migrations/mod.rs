//! Migration System
//!
//! Registry, runner, compensation and operator entry points, plus loading
//! SQL migrations from disk.

pub mod definitions;
pub mod manager;
pub mod registry;
pub mod rollback;
pub mod runner;
mod scope;
pub mod sql;

pub use definitions::*;
pub use manager::{MigrationConfig, MigrationManager};
pub use registry::MigrationRegistry;
pub use rollback::Compensator;
pub use runner::{apply_one, run_migrations, MigrationRunner};
pub use sql::{split_sql_statements, SqlMigration};
