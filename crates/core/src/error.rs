use crate::config::ConfigError;
use thiserror::Error;

/// Top-level error surfaced by the gantry binary
#[derive(Debug, Error)]
pub enum GantryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Logging setup error: {0}")]
    Logging(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

pub type GantryResult<T> = Result<T, GantryError>;
