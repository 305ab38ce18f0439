//! Environment-driven settings
//!
//! Every field has an environment variable and a default. Empty variables
//! count as unset.

use crate::config::{is_plain_identifier, ConfigError};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::invalid_value(
                "ENV",
                s,
                "development, testing, or production",
            )),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_str = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", env_str)
    }
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Which store backs the tracking table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Postgres,
    Sqlite,
    Memory,
}

impl FromStr for SqlType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(SqlType::Postgres),
            "sqlite" => Ok(SqlType::Sqlite),
            "memory" => Ok(SqlType::Memory),
            _ => Err(ConfigError::invalid_value(
                "SQL_TYPE",
                s,
                "postgres, sqlite or memory",
            )),
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlType::Postgres => write!(f, "postgres"),
            SqlType::Sqlite => write!(f, "sqlite"),
            SqlType::Memory => write!(f, "memory"),
        }
    }
}

impl SqlType {
    /// Infer the store from a connection URL scheme
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once(':').map(|(scheme, _)| scheme)?;
        match scheme.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(SqlType::Postgres),
            "sqlite" => Some(SqlType::Sqlite),
            _ => None,
        }
    }
}

/// Log line encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "plain" => Ok(LogFormat::Text),
            _ => Err(ConfigError::invalid_value("LOG_FORMAT", s, "json or text")),
        }
    }
}

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub environment: Environment,
    /// DEBUG, INFO, WARN or ERROR
    pub log_level: String,
    pub log_format: LogFormat,
    /// Level sqlx statement logging is emitted at (INFO, WARNING, ERROR, anything else silences it)
    pub sql_log_level: String,
    pub sql_type: SqlType,
    pub sql_uri: String,
    pub migrations_dir: PathBuf,
    pub migrations_table: String,
    pub app_version: String,
    pub git_sha: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "gantry".to_string(),
            environment: Environment::Development,
            log_level: "INFO".to_string(),
            log_format: LogFormat::Json,
            sql_log_level: "WARNING".to_string(),
            sql_type: SqlType::Sqlite,
            sql_uri: "sqlite://gantry.db".to_string(),
            migrations_dir: PathBuf::from("migrations"),
            migrations_table: "migration_records".to_string(),
            app_version: "local.0".to_string(),
            git_sha: "local".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load settings from a fixed map, mostly useful in tests
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_source(|key| values.get(key).cloned())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut settings = Self::default();

        if let Some(name) = get("APP_NAME") {
            settings.app_name = name;
        }
        if let Some(env_str) = get("ENV") {
            settings.environment = env_str.parse()?;
        }
        if let Some(level) = get("LOG_LEVEL") {
            settings.log_level = level.to_uppercase();
        }
        if let Some(format) = get("LOG_FORMAT") {
            settings.log_format = format.parse()?;
        }
        if let Some(level) = get("SQL_LOG_LEVEL") {
            settings.sql_log_level = level.to_uppercase();
        }
        if let Some(sql_type) = get("SQL_TYPE") {
            settings.sql_type = sql_type.parse()?;
        }
        if let Some(uri) = get("SQL_URI") {
            settings.sql_uri = uri;
        }
        if let Some(dir) = get("MIGRATIONS_DIR") {
            settings.migrations_dir = PathBuf::from(dir);
        }
        if let Some(table) = get("MIGRATIONS_TABLE") {
            settings.migrations_table = table;
        }
        if let Some(version) = get("VERSION") {
            settings.app_version = version;
        }
        if let Some(sha) = get("GIT_SHA") {
            settings.git_sha = sha;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_plain_identifier(&self.migrations_table) {
            return Err(ConfigError::invalid_value(
                "MIGRATIONS_TABLE",
                &self.migrations_table,
                "a plain SQL identifier (letters, digits, underscores)",
            ));
        }
        if self.sql_type != SqlType::Memory && self.sql_uri.trim().is_empty() {
            return Err(ConfigError::missing_required(
                "SQL_URI",
                "Set it to the database connection URL",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_map(&values)
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let settings = settings_with(&[]).unwrap();
        assert_eq!(settings.app_name, "gantry");
        assert_eq!(settings.environment, Environment::Development);
        assert_eq!(settings.log_level, "INFO");
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.sql_log_level, "WARNING");
        assert_eq!(settings.sql_type, SqlType::Sqlite);
        assert_eq!(settings.migrations_table, "migration_records");
        assert_eq!(settings.migrations_dir, PathBuf::from("migrations"));
    }

    #[test]
    fn test_overrides_from_source() {
        let settings = settings_with(&[
            ("APP_NAME", "billing"),
            ("ENV", "prod"),
            ("LOG_LEVEL", "debug"),
            ("SQL_TYPE", "PostgreSQL"),
            ("SQL_URI", "postgres://localhost/billing"),
            ("MIGRATIONS_TABLE", "schema_history"),
            ("MIGRATIONS_DIR", "db/migrations"),
        ])
        .unwrap();

        assert_eq!(settings.app_name, "billing");
        assert!(settings.environment.is_production());
        assert_eq!(settings.log_level, "DEBUG");
        assert_eq!(settings.sql_type, SqlType::Postgres);
        assert_eq!(settings.sql_uri, "postgres://localhost/billing");
        assert_eq!(settings.migrations_table, "schema_history");
        assert_eq!(settings.migrations_dir, PathBuf::from("db/migrations"));
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let settings = settings_with(&[("APP_NAME", ""), ("SQL_TYPE", "  ")]).unwrap();
        assert_eq!(settings.app_name, "gantry");
        assert_eq!(settings.sql_type, SqlType::Sqlite);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = settings_with(&[("SQL_TYPE", "oracle")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "SQL_TYPE"));

        let err = settings_with(&[("MIGRATIONS_TABLE", "records; drop table x")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "MIGRATIONS_TABLE"));

        let err = settings_with(&[("LOG_FORMAT", "xml")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_sql_type_from_url() {
        assert_eq!(SqlType::from_url("postgres://localhost/app"), Some(SqlType::Postgres));
        assert_eq!(SqlType::from_url("postgresql://localhost/app"), Some(SqlType::Postgres));
        assert_eq!(SqlType::from_url("sqlite::memory:"), Some(SqlType::Sqlite));
        assert_eq!(SqlType::from_url("sqlite://gantry.db"), Some(SqlType::Sqlite));
        assert_eq!(SqlType::from_url("mysql://localhost/app"), None);
        assert_eq!(SqlType::from_url("gantry.db"), None);
    }
}
