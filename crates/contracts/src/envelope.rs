//! Event envelope and delivery types
//!
//! Wire format (JSON):
//! `{"topic":"create-user","data":"{\"message\":\"hello\"}","timestamp":"2026-01-01T00:00:00Z"}`
//!
//! `data` carries the payload as JSON text so brokers can forward it untouched.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Conventional topic names
pub mod topics {
    pub const CREATE_USER: &str = "create-user";
    pub const UPDATE_USER: &str = "update-user";
    pub const DELETE_USER: &str = "delete-user";
    pub const GET_USERS: &str = "get-users";
}

/// Outbound event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub data: String,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Serialize a payload and wrap it for `topic`
    pub fn wrap<T: Serialize + ?Sized>(topic: impl Into<String>, payload: &T) -> Result<Self, ContractError> {
        Ok(Self {
            topic: topic.into(),
            data: serde_json::to_string(payload)?,
            timestamp: Utc::now(),
        })
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Result<Bytes, ContractError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// Message extracted from a validated inbound envelope
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    /// Inner `message` field. Non-string values keep their JSON text.
    pub message: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Acknowledgment of a successful publish
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReceipt {
    pub topic: String,
    /// Per-publisher sequence number
    pub sequence: u64,
    /// Broker sends performed, including the successful one
    pub attempts: u32,
    pub published_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_wrap_stores_payload_as_json_text() {
        let env = Envelope::wrap(topics::CREATE_USER, &json!({ "message": "hello" })).unwrap();
        assert_eq!(env.topic, "create-user");
        assert_eq!(env.data, r#"{"message":"hello"}"#);
    }

    #[test]
    fn test_encode_shape() {
        let env = Envelope::wrap("delete-user", &json!({ "message": "User deleted" })).unwrap();
        let bytes = env.encode().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["topic"], "delete-user");
        assert!(value["data"].is_string());
        assert!(value["timestamp"].is_string());
    }
}
