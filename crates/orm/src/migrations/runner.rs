//! Migration Runner - applies pending migrations in id order
//!
//! Each migration runs in its own transaction together with its tracking
//! record. The run as a whole is not one transaction: when a migration fails,
//! the migrations applied earlier in the same run are compensated in reverse
//! order and the run reports a single terminal error.
//!
//! Nothing here guards against two runs racing on the same store. Callers
//! that may start concurrent runs need an external lock.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::definitions::{
    Migration, MigrationDirection, MigrationRunResult, MigrationStatus, MigrationStatusEntry,
};
use super::registry::MigrationRegistry;
use super::rollback::Compensator;
use super::scope::{apply_in_transaction, revert_in_transaction};
use crate::error::{ActionError, ActionResult, OperatorError, RunError, StoreResult};
use crate::store::MigrationStore;

/// Ids applied during one invocation of [`MigrationRunner::run`]; bounds compensation
#[derive(Debug, Default)]
struct RunSession {
    applied_this_run: Vec<String>,
    skipped: Vec<String>,
}

/// Executes the registry against a store
pub struct MigrationRunner<'a> {
    registry: &'a MigrationRegistry,
    store: &'a dyn MigrationStore,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(registry: &'a MigrationRegistry, store: &'a dyn MigrationStore) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &MigrationRegistry {
        self.registry
    }

    /// Run all pending migrations
    pub async fn run(&self) -> Result<MigrationRunResult, RunError> {
        let start_time = Instant::now();

        self.store
            .ensure_tracking_schema()
            .await
            .map_err(RunError::Setup)?;

        let mut session = RunSession::default();

        for migration in self.registry.sorted() {
            match self.apply_if_pending(migration).await {
                Ok(true) => session.applied_this_run.push(migration.id.clone()),
                Ok(false) => session.skipped.push(migration.id.clone()),
                Err(source) => {
                    return Err(self.compensate_run(migration.id.clone(), source, session).await);
                }
            }
        }

        tracing::info!(
            applied = session.applied_this_run.len(),
            skipped = session.skipped.len(),
            "Migrations complete"
        );

        Ok(MigrationRunResult {
            applied: session.applied_this_run,
            skipped: session.skipped,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Returns false when the migration is already tracked
    async fn apply_if_pending(&self, migration: &Migration) -> ActionResult<bool> {
        if self.store.count_tracking_record(&migration.id).await? > 0 {
            tracing::debug!(migration_id = %migration.id, "Migration already applied, skipping");
            return Ok(false);
        }

        tracing::info!(
            migration_id = %migration.id,
            migration_description = %migration.description,
            "Running migration"
        );

        apply_in_transaction(self.store, migration).await?;
        Ok(true)
    }

    async fn compensate_run(&self, id: String, source: ActionError, session: RunSession) -> RunError {
        tracing::error!(
            migration_id = %id,
            error = %source,
            "Migration failed, rolling back"
        );

        let compensator = Compensator::new(self.registry, self.store);
        match compensator.compensate(&session.applied_this_run).await {
            Ok(rolled_back) => {
                if rolled_back.len() < session.applied_this_run.len() {
                    let skipped: Vec<&String> = session
                        .applied_this_run
                        .iter()
                        .filter(|applied| !rolled_back.contains(applied))
                        .collect();
                    tracing::warn!(
                        migration_id = %id,
                        skipped = ?skipped,
                        "Rollback skipped migrations missing from the registry"
                    );
                }
                RunError::Apply { id, source }
            }
            Err(compensation) => {
                tracing::error!(
                    error = %compensation,
                    "Failed to rollback migrations - database may be in inconsistent state"
                );
                RunError::Compensation {
                    id,
                    source,
                    compensation,
                }
            }
        }
    }

    /// Force-apply or force-revert exactly one migration, skipping the pending check.
    ///
    /// Has no batch or compensation semantics and does not coordinate with a
    /// concurrent [`run`](Self::run); ordering is the operator's responsibility.
    pub async fn apply_one(
        &self,
        id: &str,
        direction: MigrationDirection,
    ) -> Result<(), OperatorError> {
        let migration = self
            .registry
            .find(id)
            .ok_or_else(|| OperatorError::UnknownId(id.to_string()))?;

        self.store
            .ensure_tracking_schema()
            .await
            .map_err(OperatorError::Setup)?;

        match direction {
            MigrationDirection::Up => {
                tracing::info!(migration_id = %migration.id, "Running manual migration");
                apply_in_transaction(self.store, migration)
                    .await
                    .map_err(|source| OperatorError::Apply {
                        id: migration.id.clone(),
                        source,
                    })?;
            }
            MigrationDirection::Down => {
                tracing::info!(migration_id = %migration.id, "Running manual rollback");
                revert_in_transaction(self.store, migration)
                    .await
                    .map_err(|source| OperatorError::Revert {
                        id: migration.id.clone(),
                        source,
                    })?;
            }
        }

        tracing::info!(migration_id = %migration.id, %direction, "Manual management complete");
        Ok(())
    }

    /// Every registered migration in run order with its applied state
    pub async fn status(&self) -> StoreResult<Vec<MigrationStatusEntry>> {
        self.store.ensure_tracking_schema().await?;

        let applied: HashMap<String, _> = self
            .store
            .applied_records()
            .await?
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let mut seen = HashSet::new();
        let entries = self
            .registry
            .sorted()
            .into_iter()
            .filter(|migration| seen.insert(migration.id.as_str()))
            .map(|migration| MigrationStatusEntry {
                id: migration.id.clone(),
                description: migration.description.clone(),
                status: match applied.get(&migration.id) {
                    Some(record) => MigrationStatus::Applied {
                        applied_at: record.applied_at,
                    },
                    None => MigrationStatus::Pending,
                },
            })
            .collect();

        Ok(entries)
    }
}

/// Apply every pending migration in `registry` to `store`
pub async fn run_migrations(
    registry: &MigrationRegistry,
    store: &dyn MigrationStore,
) -> Result<MigrationRunResult, RunError> {
    MigrationRunner::new(registry, store).run().await
}

/// Force one migration up or down
pub async fn apply_one(
    registry: &MigrationRegistry,
    store: &dyn MigrationStore,
    id: &str,
    direction: MigrationDirection,
) -> Result<(), OperatorError> {
    MigrationRunner::new(registry, store)
        .apply_one(id, direction)
        .await
}
