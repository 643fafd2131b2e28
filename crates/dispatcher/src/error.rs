//! Dispatcher error types

use contracts::Batch;
use thiserror::Error;

/// Submission errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Worker pool is gone; the batch is handed back to the caller
    #[error("dispatcher closed, batch {} not submitted", .batch.sequence())]
    Closed { batch: Box<Batch> },
}

impl DispatcherError {
    /// Recover the batch that could not be submitted
    pub fn into_batch(self) -> Batch {
        match self {
            DispatcherError::Closed { batch } => *batch,
        }
    }
}

/// Terminal failure of a single dispatch task
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Facility returned an error (or panicked) while processing the batch
    #[error("dispatch of batch {batch_seq} failed: {message}")]
    Failed { batch_seq: u64, message: String },

    /// Cancelled before a worker picked it up
    #[error("dispatch of batch {batch_seq} cancelled")]
    Cancelled { batch_seq: u64 },

    /// Worker vanished without reporting an outcome
    #[error("worker lost while dispatching batch {batch_seq}")]
    WorkerLost { batch_seq: u64 },
}

impl DispatchError {
    /// Sequence of the batch this failure belongs to
    pub fn batch_seq(&self) -> u64 {
        match self {
            DispatchError::Failed { batch_seq, .. }
            | DispatchError::Cancelled { batch_seq }
            | DispatchError::WorkerLost { batch_seq } => *batch_seq,
        }
    }
}
