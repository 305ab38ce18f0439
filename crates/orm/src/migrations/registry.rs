//! Migration Registry
//!
//! Built once at start-up, then handed by reference to the runner and the
//! operator interface. Insertion order is kept; ordering for execution is a
//! stable lexicographic sort by id.

use std::collections::HashMap;

use super::definitions::Migration;
use crate::error::RegistryError;

#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    migrations: Vec<Migration>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a migration. Duplicate ids are accepted but logged; the first
    /// registration is the one the runner applies and compensation resolves to.
    pub fn register(&mut self, migration: Migration) {
        if self.contains(&migration.id) {
            tracing::warn!(
                migration_id = %migration.id,
                "Migration id registered more than once"
            );
        }
        self.migrations.push(migration);
    }

    /// Append a migration, rejecting ids that are already registered
    pub fn try_register(&mut self, migration: Migration) -> Result<(), RegistryError> {
        if self.contains(&migration.id) {
            return Err(RegistryError::DuplicateId(migration.id));
        }
        self.migrations.push(migration);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.migrations.iter().any(|m| m.id == id)
    }

    /// First registered migration with this id
    pub fn find(&self, id: &str) -> Option<&Migration> {
        self.migrations.iter().find(|m| m.id == id)
    }

    /// Migrations in insertion order
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Migrations in ascending lexicographic id order
    pub fn sorted(&self) -> Vec<&Migration> {
        let mut sorted: Vec<&Migration> = self.migrations.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        sorted
    }

    /// Fresh id -> migration map; the first registration of an id wins
    pub fn snapshot(&self) -> HashMap<&str, &Migration> {
        let mut map = HashMap::with_capacity(self.migrations.len());
        for migration in &self.migrations {
            map.entry(migration.id.as_str()).or_insert(migration);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

impl FromIterator<Migration> for MigrationRegistry {
    fn from_iter<I: IntoIterator<Item = Migration>>(iter: I) -> Self {
        let mut registry = Self::new();
        for migration in iter {
            registry.register(migration);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::sql::SqlMigration;

    fn migration(id: &str, description: &str) -> Migration {
        Migration::new(id, description, SqlMigration::new("", ""))
    }

    #[test]
    fn test_register_keeps_insertion_order() {
        let mut registry = MigrationRegistry::new();
        registry.register(migration("002_posts", "posts"));
        registry.register(migration("001_users", "users"));

        let ids: Vec<&str> = registry.migrations().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["002_posts", "001_users"]);
    }

    #[test]
    fn test_sorted_is_lexicographic_not_numeric() {
        let registry: MigrationRegistry = ["10", "9", "010", "002"]
            .into_iter()
            .map(|id| migration(id, id))
            .collect();

        let ids: Vec<&str> = registry.sorted().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["002", "010", "10", "9"]);
    }

    #[test]
    fn test_duplicates_accepted_by_register_rejected_by_try_register() {
        let mut registry = MigrationRegistry::new();
        registry.register(migration("001", "first"));
        registry.register(migration("001", "second"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find("001").unwrap().description, "first");
        assert_eq!(registry.snapshot()["001"].description, "first");

        let err = registry.try_register(migration("001", "third")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId(ref id) if id == "001"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_sorted_keeps_registration_order_among_duplicates() {
        let registry: MigrationRegistry = vec![
            migration("002", "b"),
            migration("001", "first"),
            migration("001", "second"),
        ]
        .into_iter()
        .collect();

        let descriptions: Vec<&str> = registry
            .sorted()
            .iter()
            .map(|m| m.description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["first", "second", "b"]);
    }
}
