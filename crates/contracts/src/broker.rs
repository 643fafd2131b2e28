//! Broker trait - message delivery substrate
//!
//! Only the send primitive is abstracted here. Push delivery into the
//! subscriber is owned by each broker implementation.

use bytes::Bytes;
use thiserror::Error;

/// Broker send failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Temporary failure, worth retrying
    #[error("transient broker failure: {0}")]
    Transient(String),

    /// Failure that retrying cannot fix (unknown topic, closed broker)
    #[error("permanent broker failure: {0}")]
    Permanent(String),
}

impl BrokerError {
    /// Whether a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Transient(_))
    }
}

/// Outbound side of a broker
#[trait_variant::make(Broker: Send)]
pub trait LocalBroker {
    /// Broker name (used for logging)
    fn name(&self) -> &str;

    /// Hand an encoded envelope to the broker under `topic`
    async fn send(&self, topic: &str, envelope: Bytes) -> Result<(), BrokerError>;
}
