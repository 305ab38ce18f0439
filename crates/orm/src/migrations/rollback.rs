//! Migration Rollback - compensates a failed run
//!
//! Only migrations applied during the failed run are rolled back, last
//! applied first, each in a fresh transaction. The first compensation
//! failure stops the loop; earlier migrations stay applied and the caller
//! is told so.

use super::registry::MigrationRegistry;
use super::scope::revert_in_transaction;
use crate::error::CompensationError;
use crate::store::MigrationStore;

pub struct Compensator<'a> {
    registry: &'a MigrationRegistry,
    store: &'a dyn MigrationStore,
}

impl<'a> Compensator<'a> {
    pub fn new(registry: &'a MigrationRegistry, store: &'a dyn MigrationStore) -> Self {
        Self { registry, store }
    }

    /// Roll back `applied` (given in application order) in reverse.
    ///
    /// Returns the ids actually rolled back. Ids missing from the registry are
    /// logged and skipped.
    pub async fn compensate(&self, applied: &[String]) -> Result<Vec<String>, CompensationError> {
        tracing::warn!(
            migration_ids_to_rollback = ?applied,
            "Rolling back migrations"
        );

        let migrations = self.registry.snapshot();
        let mut rolled_back = Vec::with_capacity(applied.len());

        for id in applied.iter().rev() {
            let Some(migration) = migrations.get(id.as_str()) else {
                tracing::error!(migration_id = %id, "Migration not found in registry for rollback");
                continue;
            };

            tracing::info!(
                migration_id = %migration.id,
                migration_description = %migration.description,
                "Rolling back migration"
            );

            if let Err(source) = revert_in_transaction(self.store, migration).await {
                tracing::error!(
                    migration_id = %migration.id,
                    error = %source,
                    "Failed to rollback migration"
                );
                return Err(CompensationError {
                    id: migration.id.clone(),
                    source,
                });
            }

            rolled_back.push(migration.id.clone());
        }

        tracing::info!(rolled_back = rolled_back.len(), "Migration rollback completed");
        Ok(rolled_back)
    }
}
