//! Publisher errors

use contracts::{BrokerError, ContractError};
use thiserror::Error;

/// Publish failure
#[derive(Debug, Error)]
pub enum PublishError {
    /// Broker refused the envelope permanently or retries ran out
    #[error("publish to '{topic}' failed after {attempts} attempt(s): {last_error}")]
    PublishFailed {
        topic: String,
        attempts: u32,
        last_error: BrokerError,
    },

    /// Payload could not be serialized
    #[error("envelope encoding failed: {0}")]
    Encoding(#[from] ContractError),
}

impl PublishError {
    /// Topic of a failed publish, if the failure reached the broker
    pub fn topic(&self) -> Option<&str> {
        match self {
            PublishError::PublishFailed { topic, .. } => Some(topic),
            PublishError::Encoding(_) => None,
        }
    }
}
