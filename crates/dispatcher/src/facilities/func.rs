//! FnFacility - adapts a plain function into a facility

use contracts::{Batch, ContractError, ProcessedBatch, ProcessingFacility, Record};

/// Facility backed by a synchronous closure.
///
/// An `Err(message)` from the closure becomes a processing error for that batch.
pub struct FnFacility<F> {
    name: String,
    func: F,
}

impl<F> FnFacility<F>
where
    F: Fn(&Batch) -> Result<Vec<Record>, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> ProcessingFacility for FnFacility<F>
where
    F: Fn(&Batch) -> Result<Vec<Record>, String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, batch: &Batch) -> Result<ProcessedBatch, ContractError> {
        (self.func)(batch)
            .map(|records| ProcessedBatch::new(batch.sequence(), records))
            .map_err(|message| ContractError::processing(&self.name, batch.sequence(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FlushReason;

    #[tokio::test]
    async fn test_fn_facility_maps_error() {
        let facility = FnFacility::new("reject", |_: &Batch| Err("nope".to_string()));
        let batch = Batch::sealed(2, Default::default(), FlushReason::Drain, Vec::new());

        let err = facility.process(&batch).await.unwrap_err();
        assert!(matches!(
            err,
            ContractError::Processing { batch_seq: 2, ref facility, .. } if facility == "reject"
        ));
    }
}
