//! # gantry-core
//!
//! Shared foundation for the gantry workspace: environment settings,
//! structured logging setup and the application-level error type.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ConfigError, Environment, LogFormat, Settings, SqlType};
pub use error::{GantryError, GantryResult};
pub use logging::{init_logging, init_logging_from_settings, LoggingConfig};
