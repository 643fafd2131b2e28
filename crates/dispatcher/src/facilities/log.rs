//! LogFacility - logs every record via tracing and echoes the batch

use contracts::{Batch, ContractError, ProcessedBatch, ProcessingFacility};
use tracing::{debug, info, instrument};

/// Facility that logs each record and returns the batch unchanged
pub struct LogFacility {
    name: String,
}

impl LogFacility {
    /// Create a new LogFacility with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ProcessingFacility for LogFacility {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_facility_process",
        skip(self, batch),
        fields(facility = %self.name, batch_seq = batch.sequence())
    )]
    async fn process(&self, batch: &Batch) -> Result<ProcessedBatch, ContractError> {
        for record in batch.records() {
            debug!(key = %record.key, payload = %record.payload, "Record");
        }

        info!(
            facility = %self.name,
            batch_seq = batch.sequence(),
            records = batch.len(),
            reason = batch.reason().as_str(),
            "Batch processed"
        );

        Ok(ProcessedBatch::new(batch.sequence(), batch.records().to_vec()))
    }
}
