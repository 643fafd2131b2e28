//! RecordSource trait - the store feeding the accumulator
//!
//! The core owns no schema. `query` feeds the accumulator; `insert`/`update`/`delete`
//! are pass-through triggers for mutation events.

use serde_json::Value;

use crate::{ContractError, Record, RecordFilter};

/// Record store abstraction
#[trait_variant::make(RecordSource: Send)]
pub trait LocalRecordSource {
    /// Store a record
    async fn insert(&self, record: Record) -> Result<(), ContractError>;

    /// Merge `changes` into the payload of the record with `key`.
    ///
    /// Object fields in `changes` overwrite or extend the stored payload; any
    /// other value replaces it. Returns `false` when no record matched, in
    /// which case nothing is stored.
    async fn update(&self, key: &str, changes: Value) -> Result<bool, ContractError>;

    /// Delete by key
    ///
    /// Returns `false` when no record matched.
    async fn delete(&self, key: &str) -> Result<bool, ContractError>;

    /// Fetch records matching the filter, in storage order
    async fn query(&self, filter: &RecordFilter) -> Result<Vec<Record>, ContractError>;
}
