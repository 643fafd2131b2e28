//! Layered error definitions
//!
//! Categorized by source: config / batch / processing / source / messaging

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Batch Errors =====
    /// A sealed batch exceeded the configured size bound.
    ///
    /// This is an invariant failure inside the accumulator, never a data error.
    #[error("flush policy violation: batch {batch_seq} holds {len} records, max is {max}")]
    FlushPolicyViolation { batch_seq: u64, len: usize, max: usize },

    // ===== Processing Errors =====
    /// Processing facility failed on a batch
    #[error("facility '{facility}' failed on batch {batch_seq}: {message}")]
    Processing {
        facility: String,
        batch_seq: u64,
        message: String,
    },

    // ===== Record Source Errors =====
    /// Record source operation failed
    #[error("record source error: {message}")]
    Source { message: String },

    // ===== Messaging Errors =====
    /// Inbound envelope could not be parsed or is incomplete
    #[error("malformed message: {reason}")]
    MalformedMessage { reason: String },

    /// Registered handler failed
    #[error("handler for topic '{topic}' failed: {message}")]
    Handler { topic: String, message: String },

    /// Envelope encoding error
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create processing error
    pub fn processing(facility: impl Into<String>, batch_seq: u64, message: impl Into<String>) -> Self {
        Self::Processing {
            facility: facility.into(),
            batch_seq,
            message: message.into(),
        }
    }

    /// Create record source error
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Create malformed message error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Create handler error
    pub fn handler(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            topic: topic.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_policy_violation_message() {
        let err = ContractError::FlushPolicyViolation {
            batch_seq: 7,
            len: 3,
            max: 2,
        };
        assert_eq!(
            err.to_string(),
            "flush policy violation: batch 7 holds 3 records, max is 2"
        );
    }

    #[test]
    fn test_processing_error_carries_context() {
        let err = ContractError::processing("log", 4, "boom");
        assert!(err.to_string().contains("'log'"));
        assert!(err.to_string().contains("batch 4"));
    }
}
