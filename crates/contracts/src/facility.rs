//! ProcessingFacility trait - where dispatched batches are executed
//!
//! The dispatcher is polymorphic over any facility: in-process workers,
//! remote RPC, or a managed batch-execution service.

use crate::{Batch, ContractError, ProcessedBatch};

/// Batch processing interface
///
/// Implementations must be safe to call from several workers at once.
#[trait_variant::make(ProcessingFacility: Send)]
pub trait LocalProcessingFacility {
    /// Facility name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Process one sealed batch
    ///
    /// # Errors
    /// Returns a processing error; the dispatcher records it as the task's
    /// terminal failure and never retries.
    async fn process(&self, batch: &Batch) -> Result<ProcessedBatch, ContractError>;
}
