//! Transaction scope for a single migration step
//!
//! The migration's action and its tracking write share one transaction:
//! commit iff both succeed, otherwise roll back and report the action's error.

use super::definitions::Migration;
use crate::error::ActionResult;
use crate::store::{MigrationStore, StoreTransaction};

/// Run `up` and insert the tracking record, atomically
pub(crate) async fn apply_in_transaction(
    store: &dyn MigrationStore,
    migration: &Migration,
) -> ActionResult<()> {
    let mut tx = store.begin().await?;

    let outcome: ActionResult<()> = async {
        migration.steps().apply(tx.as_mut()).await?;
        tx.insert_tracking_record(&migration.tracking_record()).await?;
        Ok(())
    }
    .await;

    finish(tx, outcome).await
}

/// Run `down` and delete the tracking record, atomically
pub(crate) async fn revert_in_transaction(
    store: &dyn MigrationStore,
    migration: &Migration,
) -> ActionResult<()> {
    let mut tx = store.begin().await?;

    let outcome: ActionResult<()> = async {
        migration.steps().compensate(tx.as_mut()).await?;
        tx.delete_tracking_record(&migration.id).await?;
        Ok(())
    }
    .await;

    finish(tx, outcome).await
}

async fn finish(tx: Box<dyn StoreTransaction>, outcome: ActionResult<()>) -> ActionResult<()> {
    match outcome {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(err)
        }
    }
}
