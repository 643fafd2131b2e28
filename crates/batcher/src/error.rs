//! Batcher error types

use thiserror::Error;

/// Accumulator task errors
#[derive(Debug, Error)]
pub enum BatcherError {
    /// Invariant failure inside the accumulator
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),

    /// Downstream batch receiver dropped; the batch could not be handed off
    #[error("batch output closed, batch {batch_seq} ({len} records) not delivered")]
    OutputClosed { batch_seq: u64, len: usize },
}
