//! Error types for the migration engine
//!
//! Store failures stay local to the transaction that produced them and are
//! then surfaced as one of the run, compensation or operator errors below.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a [`MigrationStore`](crate::store::MigrationStore) or one of its transactions
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Store rejected operation: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a migration's apply or compensate action, or of the tracking write that accompanies it
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Failed(String),
}

impl ActionError {
    pub fn failed(message: impl Into<String>) -> Self {
        ActionError::Failed(message.into())
    }
}

pub type ActionResult<T> = Result<T, ActionError>;

/// A compensating transaction failed; compensation stopped at `id`
#[derive(Debug, Error)]
#[error("failed to rollback migration {id}: {source}")]
pub struct CompensationError {
    pub id: String,
    #[source]
    pub source: ActionError,
}

/// Terminal outcome of a failed batch run
#[derive(Debug, Error)]
pub enum RunError {
    /// The tracking table could not be created; nothing was applied
    #[error("failed to create migrations table: {0}")]
    Setup(#[source] StoreError),

    /// Migration `id` failed and every migration applied earlier in the run was rolled back.
    ///
    /// Ids the registry no longer resolves are skipped during rollback and only logged.
    #[error("migration {id} failed (successfully rolled back): {source}")]
    Apply {
        id: String,
        #[source]
        source: ActionError,
    },

    /// Migration `id` failed and compensation itself failed part way
    #[error("migration {id} failed and rollback failed: {source} (rollback error: {compensation})")]
    Compensation {
        id: String,
        #[source]
        source: ActionError,
        compensation: CompensationError,
    },
}

impl RunError {
    /// Id of the migration whose apply step failed
    pub fn migration_id(&self) -> Option<&str> {
        match self {
            RunError::Setup(_) => None,
            RunError::Apply { id, .. } | RunError::Compensation { id, .. } => Some(id),
        }
    }

    /// True when the store may be left partially rolled back
    pub fn is_compensation_failure(&self) -> bool {
        matches!(self, RunError::Compensation { .. })
    }
}

/// Failure of a manual force-apply / force-revert
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("unknown migration id: {0}")]
    UnknownId(String),

    #[error("failed to create migrations table: {0}")]
    Setup(#[source] StoreError),

    #[error("manual migration {id} failed: {source}")]
    Apply {
        id: String,
        #[source]
        source: ActionError,
    },

    #[error("manual rollback {id} failed: {source}")]
    Revert {
        id: String,
        #[source]
        source: ActionError,
    },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("migration id '{0}' is already registered")]
    DuplicateId(String),
}

/// Problems loading or creating SQL migration files
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid migration file {path}: {message}")]
    InvalidFile { path: PathBuf, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
