//! Shared fixtures for the migration engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use gantry_orm::{ActionError, ActionResult, Migration, MigrationSteps, StoreTransaction};
use std::sync::{Arc, Mutex};

/// Ordered record of every action invocation, e.g. "up:001", "down:001"
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    /// Entries with the given prefix ("up:" / "down:"), prefix stripped
    pub fn ids_for(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

/// Steps that log each call and execute a marker statement on the transaction
pub struct RecordingSteps {
    id: String,
    log: CallLog,
    fail_up: bool,
    fail_down: bool,
}

#[async_trait]
impl MigrationSteps for RecordingSteps {
    async fn apply(&self, tx: &mut dyn StoreTransaction) -> ActionResult<()> {
        self.log.push(format!("up:{}", self.id));
        tx.execute(&format!("APPLY {}", self.id)).await?;
        if self.fail_up {
            return Err(ActionError::failed(format!("up {} failed", self.id)));
        }
        Ok(())
    }

    async fn compensate(&self, tx: &mut dyn StoreTransaction) -> ActionResult<()> {
        self.log.push(format!("down:{}", self.id));
        tx.execute(&format!("REVERT {}", self.id)).await?;
        if self.fail_down {
            return Err(ActionError::failed(format!("down {} failed", self.id)));
        }
        Ok(())
    }
}

fn build(log: &CallLog, id: &str, fail_up: bool, fail_down: bool) -> Migration {
    Migration::new(
        id,
        format!("test migration {}", id),
        RecordingSteps {
            id: id.to_string(),
            log: log.clone(),
            fail_up,
            fail_down,
        },
    )
}

pub fn migration(log: &CallLog, id: &str) -> Migration {
    build(log, id, false, false)
}

pub fn failing_up(log: &CallLog, id: &str) -> Migration {
    build(log, id, true, false)
}

pub fn failing_down(log: &CallLog, id: &str) -> Migration {
    build(log, id, false, true)
}
