//! Migration Definitions - Core types shared by the registry, runner and stores

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ActionResult;
use crate::store::StoreTransaction;

/// The forward and backward actions of a migration.
///
/// Both run inside a transaction opened by the engine; returning an error
/// discards everything the action did.
#[async_trait]
pub trait MigrationSteps: Send + Sync {
    /// Apply the change
    async fn apply(&self, tx: &mut dyn StoreTransaction) -> ActionResult<()>;

    /// Undo the change
    async fn compensate(&self, tx: &mut dyn StoreTransaction) -> ActionResult<()>;
}

/// A named, immutable unit of schema or data change
#[derive(Clone)]
pub struct Migration {
    /// Sort key and tracking key. Ordering is lexicographic, so numeric
    /// prefixes must be zero-padded ("001", "002", ..., "010").
    pub id: String,
    pub description: String,
    steps: Arc<dyn MigrationSteps>,
}

impl Migration {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        steps: impl MigrationSteps + 'static,
    ) -> Self {
        Self::from_arc(id, description, Arc::new(steps))
    }

    pub fn from_arc(
        id: impl Into<String>,
        description: impl Into<String>,
        steps: Arc<dyn MigrationSteps>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            steps,
        }
    }

    pub fn steps(&self) -> &dyn MigrationSteps {
        self.steps.as_ref()
    }

    /// Build the tracking record written when this migration is applied
    pub fn tracking_record(&self) -> TrackingRecord {
        TrackingRecord {
            id: self.id.clone(),
            description: self.description.clone(),
            applied_at: Utc::now(),
        }
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Durable marker that a migration has been applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub id: String,
    /// Copy of the migration description, for audit
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

/// Migration direction for manual execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Apply the migration
    Up,
    /// Revert the migration
    Down,
}

impl FromStr for MigrationDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(MigrationDirection::Up),
            "down" => Ok(MigrationDirection::Down),
            _ => Err(format!("Unknown migration direction: {}", s)),
        }
    }
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// Result of a successful batch run
#[derive(Debug, Clone, Default)]
pub struct MigrationRunResult {
    /// IDs applied by this run, in application order
    pub applied: Vec<String>,
    /// IDs skipped because they were already tracked
    pub skipped: Vec<String>,
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Whether a registered migration has been applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationStatus {
    Pending,
    Applied { applied_at: DateTime<Utc> },
}

/// One line of a status report
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatusEntry {
    pub id: String,
    pub description: String,
    #[serde(flatten)]
    pub status: MigrationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parsing() {
        assert_eq!("up".parse::<MigrationDirection>(), Ok(MigrationDirection::Up));
        assert_eq!("DOWN".parse::<MigrationDirection>(), Ok(MigrationDirection::Down));
        assert!("sideways".parse::<MigrationDirection>().is_err());
        assert_eq!(MigrationDirection::Down.to_string(), "down");
    }

    #[test]
    fn test_status_entry_serialization() {
        let entry = MigrationStatusEntry {
            id: "001".to_string(),
            description: "create users".to_string(),
            status: MigrationStatus::Pending,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], "001");
        assert_eq!(json["state"], "pending");
    }
}
