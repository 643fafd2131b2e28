//! Batch - sealed, ordered group of records
//!
//! Batches are only constructed sealed. There is no mutable access after
//! construction; the dispatcher consumes a batch by value exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Record;

/// Why a batch was sealed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    /// Open batch reached `max_batch_size`
    Size,
    /// `wait_ms` elapsed since the first append
    Timer,
    /// Input ended, remaining records sealed
    Drain,
}

impl FlushReason {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Size => "size",
            FlushReason::Timer => "timer",
            FlushReason::Drain => "drain",
        }
    }
}

/// Sealed batch of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    sequence: u64,
    created_at: DateTime<Utc>,
    reason: FlushReason,
    records: Vec<Record>,
}

impl Batch {
    /// Seal a batch. Callers enforce the size bound before sealing.
    pub fn sealed(
        sequence: u64,
        created_at: DateTime<Utc>,
        reason: FlushReason,
        records: Vec<Record>,
    ) -> Self {
        Self {
            sequence,
            created_at,
            reason,
            records,
        }
    }

    /// Batch sequence number (strictly increasing per accumulator)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the batch was opened
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Why it was sealed
    pub fn reason(&self) -> FlushReason {
        self.reason
    }

    /// Records in append order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the batch is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the batch, yielding its records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Result of processing one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBatch {
    /// Sequence of the batch that produced this result
    pub batch_sequence: u64,

    /// Processed records
    pub records: Vec<Record>,

    /// Completion time
    pub processed_at: DateTime<Utc>,
}

impl ProcessedBatch {
    /// Build a result for the given batch sequence
    pub fn new(batch_sequence: u64, records: Vec<Record>) -> Self {
        Self {
            batch_sequence,
            records,
            processed_at: Utc::now(),
        }
    }
}
