//! Migration Manager - SQL migration files on disk
//!
//! A migration file is `<id>.sql`:
//!
//! ```sql
//! -- Migration: Create users table
//! -- Up migration
//! CREATE TABLE users (id INT PRIMARY KEY);
//! -- Down migration
//! DROP TABLE users;
//! ```

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use super::definitions::Migration;
use super::registry::MigrationRegistry;
use super::sql::SqlMigration;
use crate::error::ManagerError;

/// Configuration for the migration file layout
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

/// Parsed contents of one migration file
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedFile {
    description: Option<String>,
    up_sql: String,
    down_sql: String,
}

/// Creates and loads migration files
pub struct MigrationManager {
    config: MigrationConfig,
}

impl MigrationManager {
    /// Create a new migration manager with default configuration
    pub fn new() -> Self {
        Self::with_config(MigrationConfig::default())
    }

    /// Create a new migration manager with custom configuration
    pub fn with_config(config: MigrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Write a new migration template and return its file name.
    ///
    /// The id prefix is a fixed-width UTC timestamp so lexicographic order
    /// matches creation order.
    pub fn create_migration(&self, name: &str) -> Result<String, ManagerError> {
        let dir = &self.config.migrations_dir;
        fs::create_dir_all(dir).map_err(|source| ManagerError::Io {
            path: dir.clone(),
            source,
        })?;

        let slug: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let migration_id = format!("{}_{}", timestamp, slug);
        let filename = format!("{}.sql", migration_id);
        let filepath = dir.join(&filename);

        fs::write(&filepath, Self::migration_template(name, &migration_id)).map_err(|source| {
            ManagerError::Io {
                path: filepath.clone(),
                source,
            }
        })?;

        Ok(filename)
    }

    /// Load every `.sql` file in the migrations directory, sorted by id
    pub fn load_migrations(&self) -> Result<Vec<Migration>, ManagerError> {
        let dir = &self.config.migrations_dir;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let io_err = |source| ManagerError::Io {
            path: dir.clone(),
            source,
        };

        let mut migrations = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().map_or(false, |ext| ext == "sql") {
                migrations.push(Self::parse_migration_file(&path)?);
            }
        }

        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(migrations)
    }

    /// Load the migrations directory into a fresh registry
    pub fn load_registry(&self) -> Result<MigrationRegistry, ManagerError> {
        let mut registry = MigrationRegistry::new();
        for migration in self.load_migrations()? {
            registry.try_register(migration)?;
        }
        Ok(registry)
    }

    fn parse_migration_file(path: &Path) -> Result<Migration, ManagerError> {
        let content = fs::read_to_string(path).map_err(|source| ManagerError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ManagerError::InvalidFile {
                path: path.to_path_buf(),
                message: "file name is not a valid migration id".to_string(),
            })?
            .to_string();

        let parsed = Self::parse_migration_content(&content).map_err(|message| {
            ManagerError::InvalidFile {
                path: path.to_path_buf(),
                message,
            }
        })?;

        let description = parsed
            .description
            .unwrap_or_else(|| Self::describe_from_id(&id));

        Ok(Migration::new(
            id,
            description,
            SqlMigration::new(parsed.up_sql, parsed.down_sql),
        ))
    }

    fn parse_migration_content(content: &str) -> Result<ParsedFile, String> {
        let mut description = None;
        let mut up_sql = Vec::new();
        let mut down_sql = Vec::new();
        let mut section = Section::Preamble;
        let mut saw_up = false;

        for line in content.lines() {
            let trimmed = line.trim();

            if let Some(comment) = trimmed.strip_prefix("--") {
                let comment = comment.trim();
                let lowered = comment.to_lowercase();
                if is_section_marker(&lowered, "up") {
                    section = Section::Up;
                    saw_up = true;
                } else if is_section_marker(&lowered, "down") {
                    section = Section::Down;
                } else if lowered.starts_with("migration:") && description.is_none() {
                    let text = comment.get("migration:".len()..).unwrap_or("").trim();
                    if !text.is_empty() {
                        description = Some(text.to_string());
                    }
                }
                continue;
            }

            if trimmed.is_empty() {
                continue;
            }

            match section {
                Section::Up => up_sql.push(line),
                Section::Down => down_sql.push(line),
                Section::Preamble => {}
            }
        }

        if !saw_up {
            return Err("missing '-- Up migration' section".to_string());
        }

        Ok(ParsedFile {
            description,
            up_sql: up_sql.join("\n").trim().to_string(),
            down_sql: down_sql.join("\n").trim().to_string(),
        })
    }

    /// "20240101120000_create_users" -> "create users"
    fn describe_from_id(id: &str) -> String {
        let name = match id.split_once('_') {
            Some((prefix, rest))
                if !rest.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) =>
            {
                rest
            }
            _ => id,
        };
        name.replace('_', " ")
    }

    fn migration_template(name: &str, migration_id: &str) -> String {
        format!(
            "-- Migration: {}\n\
             -- ID: {}\n\
             -- Created: {}\n\n\
             -- Up migration\n\n\n\
             -- Down migration\n\n",
            name,
            migration_id,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// "-- Up", "-- Up migration", "-- down migration  " and so on
fn is_section_marker(comment: &str, word: &str) -> bool {
    comment == word
        || comment
            .strip_prefix(word)
            .map_or(false, |rest| rest.trim() == "migration")
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}
