//! In-process store
//!
//! Transactions read a private copy of the tracking records and buffer their
//! own inserts, deletes and statements; commit replays the buffer onto the
//! shared state, rollback or drop discards it. Overlapping transactions only
//! conflict when both insert the same id. Faults can be injected to exercise
//! every failure path of the engine.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{MigrationStore, StoreTransaction};
use crate::error::{StoreError, StoreResult};
use crate::migrations::definitions::TrackingRecord;

#[derive(Debug, Default, Clone)]
struct Faults {
    schema: bool,
    statements: Vec<String>,
    count_ids: HashSet<String>,
    insert_ids: HashSet<String>,
    delete_ids: HashSet<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    schema_ready: bool,
    records: BTreeMap<String, TrackingRecord>,
    statements: Vec<String>,
    transactions_begun: usize,
    commits: usize,
    rollbacks: usize,
    faults: Faults,
}

/// Store that keeps everything in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pre-populate a tracking record, creating the tracking table if needed
    pub fn seed_record(&self, id: impl Into<String>, description: impl Into<String>) {
        let id = id.into();
        let mut state = self.lock();
        state.schema_ready = true;
        state.records.insert(
            id.clone(),
            TrackingRecord {
                id,
                description: description.into(),
                applied_at: Utc::now(),
            },
        );
    }

    /// Make `ensure_tracking_schema` fail
    pub fn fail_schema_creation(&self) {
        self.lock().faults.schema = true;
    }

    /// Make any executed statement containing `pattern` fail
    pub fn fail_statement_containing(&self, pattern: impl Into<String>) {
        self.lock().faults.statements.push(pattern.into());
    }

    /// Make the pending check for `id` fail
    pub fn fail_tracking_lookup(&self, id: impl Into<String>) {
        self.lock().faults.count_ids.insert(id.into());
    }

    /// Make inserting the tracking record for `id` fail
    pub fn fail_tracking_insert(&self, id: impl Into<String>) {
        self.lock().faults.insert_ids.insert(id.into());
    }

    /// Make deleting the tracking record for `id` fail
    pub fn fail_tracking_delete(&self, id: impl Into<String>) {
        self.lock().faults.delete_ids.insert(id.into());
    }

    pub fn clear_faults(&self) {
        self.lock().faults = Faults::default();
    }

    /// Committed tracking records, ascending by id
    pub fn records(&self) -> Vec<TrackingRecord> {
        self.lock().records.values().cloned().collect()
    }

    pub fn record_ids(&self) -> Vec<String> {
        self.lock().records.keys().cloned().collect()
    }

    /// Committed statements in execution order
    pub fn executed_statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn transactions_begun(&self) -> usize {
        self.lock().transactions_begun
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    pub fn rollback_count(&self) -> usize {
        self.lock().rollbacks
    }

    pub fn has_tracking_schema(&self) -> bool {
        self.lock().schema_ready
    }
}

fn missing_table() -> StoreError {
    StoreError::Rejected("tracking table does not exist".to_string())
}

#[async_trait]
impl MigrationStore for MemoryStore {
    async fn ensure_tracking_schema(&self) -> StoreResult<()> {
        let mut state = self.lock();
        if state.faults.schema {
            return Err(StoreError::Rejected(
                "cannot create tracking table".to_string(),
            ));
        }
        state.schema_ready = true;
        Ok(())
    }

    async fn count_tracking_record(&self, id: &str) -> StoreResult<i64> {
        let state = self.lock();
        if !state.schema_ready {
            return Err(missing_table());
        }
        if state.faults.count_ids.contains(id) {
            return Err(StoreError::Rejected(format!(
                "lookup of tracking record {} failed",
                id
            )));
        }
        Ok(i64::from(state.records.contains_key(id)))
    }

    async fn applied_records(&self) -> StoreResult<Vec<TrackingRecord>> {
        let state = self.lock();
        if !state.schema_ready {
            return Err(missing_table());
        }
        Ok(state.records.values().cloned().collect())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let mut state = self.lock();
        state.transactions_begun += 1;
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.state),
            schema_ready: state.schema_ready,
            records: state.records.clone(),
            writes: Vec::new(),
            statements: Vec::new(),
            faults: state.faults.clone(),
        }))
    }
}

#[derive(Debug, Clone)]
enum RecordWrite {
    Insert(TrackingRecord),
    Delete(String),
}

pub struct MemoryTransaction {
    shared: Arc<Mutex<MemoryState>>,
    schema_ready: bool,
    /// Snapshot at `begin` with this transaction's own writes applied
    records: BTreeMap<String, TrackingRecord>,
    writes: Vec<RecordWrite>,
    statements: Vec<String>,
    faults: Faults,
}

fn duplicate_key(id: &str) -> StoreError {
    StoreError::Rejected(format!(
        "duplicate key value violates primary key: {}",
        id
    ))
}

impl MemoryTransaction {
    fn lock_shared(&self) -> MutexGuard<'_, MemoryState> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn execute(&mut self, sql: &str) -> StoreResult<u64> {
        if let Some(pattern) = self
            .faults
            .statements
            .iter()
            .find(|pattern| sql.contains(pattern.as_str()))
        {
            return Err(StoreError::Rejected(format!(
                "statement matching '{}' failed",
                pattern
            )));
        }
        self.statements.push(sql.to_string());
        Ok(0)
    }

    async fn insert_tracking_record(&mut self, record: &TrackingRecord) -> StoreResult<()> {
        if !self.schema_ready {
            return Err(missing_table());
        }
        if self.faults.insert_ids.contains(&record.id) {
            return Err(StoreError::Rejected(format!(
                "insert of tracking record {} failed",
                record.id
            )));
        }
        if self.records.contains_key(&record.id) {
            return Err(duplicate_key(&record.id));
        }
        self.records.insert(record.id.clone(), record.clone());
        self.writes.push(RecordWrite::Insert(record.clone()));
        Ok(())
    }

    async fn delete_tracking_record(&mut self, id: &str) -> StoreResult<()> {
        if !self.schema_ready {
            return Err(missing_table());
        }
        if self.faults.delete_ids.contains(id) {
            return Err(StoreError::Rejected(format!(
                "delete of tracking record {} failed",
                id
            )));
        }
        self.records.remove(id);
        self.writes.push(RecordWrite::Delete(id.to_string()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        let mut state = this.lock_shared();

        // Replay onto a copy so a conflicting insert publishes nothing
        let mut records = state.records.clone();
        for write in &this.writes {
            match write {
                RecordWrite::Insert(record) => {
                    if records.contains_key(&record.id) {
                        return Err(duplicate_key(&record.id));
                    }
                    records.insert(record.id.clone(), record.clone());
                }
                RecordWrite::Delete(id) => {
                    records.remove(id);
                }
            }
        }

        state.records = records;
        state.statements.extend(this.statements.iter().cloned());
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.lock_shared().rollbacks += 1;
        Ok(())
    }
}
