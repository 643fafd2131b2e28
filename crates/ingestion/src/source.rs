//! MemoryRecordSource - in-memory record store

use contracts::{ContractError, Record, RecordFilter, RecordSource};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Record store kept in insertion order.
///
/// Keys are unique: inserting an existing key replaces the record in place.
#[derive(Debug, Default)]
pub struct MemoryRecordSource {
    records: RwLock<Vec<Record>>,
}

impl MemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source pre-populated with `records`
    pub fn seeded(records: impl IntoIterator<Item = Record>) -> Self {
        let mut rows: Vec<Record> = Vec::new();
        for record in records {
            upsert(&mut rows, record);
        }
        Self {
            records: RwLock::new(rows),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn upsert(rows: &mut Vec<Record>, record: Record) -> bool {
    match rows.iter_mut().find(|r| r.key == record.key) {
        Some(existing) => {
            *existing = record;
            true
        }
        None => {
            rows.push(record);
            false
        }
    }
}

/// Shallow merge of `changes` into `payload`
fn merge_payload(payload: &mut Value, changes: Value) {
    match (payload, changes) {
        (Value::Object(fields), Value::Object(changes)) => fields.extend(changes),
        (payload, changes) => *payload = changes,
    }
}

impl RecordSource for MemoryRecordSource {
    #[instrument(name = "memory_source_insert", skip(self, record), fields(key = %record.key))]
    async fn insert(&self, record: Record) -> Result<(), ContractError> {
        if record.key.is_empty() {
            return Err(ContractError::source("record key must not be empty"));
        }
        let replaced = upsert(&mut *self.records.write().await, record);
        debug!(replaced, "Record stored");
        Ok(())
    }

    #[instrument(name = "memory_source_update", skip(self, changes))]
    async fn update(&self, key: &str, changes: Value) -> Result<bool, ContractError> {
        let mut rows = self.records.write().await;
        match rows.iter_mut().find(|r| r.key == key) {
            Some(record) => {
                merge_payload(&mut record.payload, changes);
                debug!("Record updated");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(name = "memory_source_delete", skip(self))]
    async fn delete(&self, key: &str) -> Result<bool, ContractError> {
        let mut rows = self.records.write().await;
        let before = rows.len();
        rows.retain(|r| r.key != key);
        Ok(rows.len() != before)
    }

    #[instrument(name = "memory_source_query", skip(self, filter), fields(limit = ?filter.limit))]
    async fn query(&self, filter: &RecordFilter) -> Result<Vec<Record>, ContractError> {
        let rows = self.records.read().await;
        let limit = filter.limit.unwrap_or(usize::MAX);
        let matched: Vec<Record> = rows
            .iter()
            .filter(|r| filter.matches(r))
            .take(limit)
            .cloned()
            .collect();
        debug!(matched = matched.len(), total = rows.len(), "Query complete");
        Ok(matched)
    }
}
