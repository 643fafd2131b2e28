//! EventSubscriber - validates inbound envelopes and routes them by topic
//!
//! Every inbound message is acknowledged. Malformed envelopes, unknown topics
//! and failing handlers are logged and counted, never redelivered.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use contracts::{ContractError, InboundMessage};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

/// Handler invoked for every message on a subscribed topic
pub trait EventHandler: Send + Sync {
    fn handle(&self, message: &InboundMessage) -> Result<(), ContractError>;
}

impl<F> EventHandler for F
where
    F: Fn(&InboundMessage) -> Result<(), ContractError> + Send + Sync,
{
    fn handle(&self, message: &InboundMessage) -> Result<(), ContractError> {
        self(message)
    }
}

/// Discovery entry announced to the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub pubsubname: String,
    pub topic: String,
    pub route: String,
}

/// Topic → handlers table, built once before the subscriber starts
pub struct SubscriptionRegistry {
    pubsub_name: String,
    route: String,
    /// Topics in registration order
    topics: Vec<String>,
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl SubscriptionRegistry {
    pub fn new(pubsub_name: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            pubsub_name: pubsub_name.into(),
            route: route.into(),
            topics: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `topic`. Several handlers per topic run in
    /// registration order.
    pub fn route<H>(mut self, topic: impl Into<String>, handler: H) -> Self
    where
        H: EventHandler + 'static,
    {
        let topic = topic.into();
        if !self.handlers.contains_key(&topic) {
            self.topics.push(topic.clone());
        }
        self.handlers.entry(topic).or_default().push(Arc::new(handler));
        self
    }

    /// Number of handlers registered for `topic`
    pub fn handler_count(&self, topic: &str) -> usize {
        self.handlers.get(topic).map_or(0, Vec::len)
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.topics
            .iter()
            .map(|topic| Subscription {
                pubsubname: self.pubsub_name.clone(),
                topic: topic.clone(),
                route: self.route.clone(),
            })
            .collect()
    }
}

/// What happened to an acknowledged message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// All handlers succeeded
    Delivered { handlers: usize },
    /// Envelope failed validation and was dropped
    Rejected { reason: String },
    /// Valid envelope, nothing registered for its topic
    NoHandler,
    /// At least one handler returned an error or panicked
    HandlerFailed { handlers: usize, failures: usize },
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Delivered { .. } => "delivered",
            Disposition::Rejected { .. } => "rejected",
            Disposition::NoHandler => "no_handler",
            Disposition::HandlerFailed { .. } => "handler_failed",
        }
    }
}

/// Acknowledgment returned for every inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub topic: Option<String>,
    pub disposition: Disposition,
}

/// Per-disposition counters
#[derive(Debug, Default)]
pub struct SubscriberMetrics {
    received: AtomicU64,
    delivered: AtomicU64,
    rejected: AtomicU64,
    no_handler: AtomicU64,
    handler_failed: AtomicU64,
}

impl SubscriberMetrics {
    fn record(&self, disposition: &Disposition) {
        self.received.fetch_add(1, Ordering::Relaxed);
        let counter = match disposition {
            Disposition::Delivered { .. } => &self.delivered,
            Disposition::Rejected { .. } => &self.rejected,
            Disposition::NoHandler => &self.no_handler,
            Disposition::HandlerFailed { .. } => &self.handler_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SubscriberSnapshot {
        SubscriberSnapshot {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            no_handler: self.no_handler.load(Ordering::Relaxed),
            handler_failed: self.handler_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriberSnapshot {
    pub received: u64,
    pub delivered: u64,
    pub rejected: u64,
    pub no_handler: u64,
    pub handler_failed: u64,
}

/// Routes inbound envelopes to registered handlers
pub struct EventSubscriber {
    registry: SubscriptionRegistry,
    metrics: SubscriberMetrics,
}

impl EventSubscriber {
    pub fn new(registry: SubscriptionRegistry) -> Self {
        Self {
            registry,
            metrics: SubscriberMetrics::default(),
        }
    }

    /// Discovery list: one entry per registered topic
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.registry.subscriptions()
    }

    pub fn metrics(&self) -> SubscriberSnapshot {
        self.metrics.snapshot()
    }

    /// Validate and route one raw envelope. Always acknowledges.
    #[instrument(name = "subscriber_handle", skip(self, body), fields(len = body.len()))]
    pub fn handle(&self, body: &[u8]) -> Ack {
        let ack = match parse_envelope(body) {
            Ok(message) => self.route(message),
            Err(e) => {
                warn!(error = %e, "Dropping malformed message");
                Ack {
                    topic: None,
                    disposition: Disposition::Rejected {
                        reason: e.to_string(),
                    },
                }
            }
        };

        self.metrics.record(&ack.disposition);
        observability::record_message_acked(
            ack.topic.as_deref().unwrap_or("unknown"),
            ack.disposition.as_str(),
        );
        ack
    }

    fn route(&self, message: InboundMessage) -> Ack {
        let Some(handlers) = self.registry.handlers.get(&message.topic) else {
            warn!(topic = %message.topic, "No handler registered, acknowledging");
            return Ack {
                topic: Some(message.topic),
                disposition: Disposition::NoHandler,
            };
        };

        info!(topic = %message.topic, message = %message.message, "Received message");

        let mut failures = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(&message))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    error!(topic = %message.topic, error = %e, "Handler failed");
                }
                Err(panic) => {
                    failures += 1;
                    error!(
                        topic = %message.topic,
                        panic = panic_message(panic.as_ref()),
                        "Handler panicked"
                    );
                }
            }
        }

        let disposition = if failures == 0 {
            Disposition::Delivered {
                handlers: handlers.len(),
            }
        } else {
            Disposition::HandlerFailed {
                handlers: handlers.len(),
                failures,
            }
        };
        Ack {
            topic: Some(message.topic),
            disposition,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Extract topic and inner message from a raw envelope.
///
/// `data` is either JSON text of an object or an inline object. A non-string
/// `message` keeps its JSON text.
fn parse_envelope(body: &[u8]) -> Result<InboundMessage, ContractError> {
    let envelope: Value = serde_json::from_slice(body)
        .map_err(|e| ContractError::malformed(format!("invalid JSON: {e}")))?;

    let data = match envelope.get("data") {
        None | Some(Value::Null) => return Err(ContractError::malformed("missing data field")),
        Some(Value::String(text)) => serde_json::from_str::<Value>(text)
            .map_err(|e| ContractError::malformed(format!("data is not JSON: {e}")))?,
        Some(inline) => inline.clone(),
    };

    let topic = envelope
        .get("topic")
        .and_then(Value::as_str)
        .ok_or_else(|| ContractError::malformed("missing topic"))?;

    let message = match data.get("message") {
        None | Some(Value::Null) => return Err(ContractError::malformed("missing message")),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    };

    let published_at = envelope
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc));

    Ok(InboundMessage {
        topic: topic.to_string(),
        message,
        published_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<String>>>;

    fn recording(seen: &Seen) -> impl EventHandler + 'static {
        let seen = Arc::clone(seen);
        move |msg: &InboundMessage| -> Result<(), ContractError> {
            seen.lock().unwrap().push(msg.message.clone());
            Ok(())
        }
    }

    fn subscriber_with(seen: &Seen) -> EventSubscriber {
        EventSubscriber::new(
            SubscriptionRegistry::new("pubsub", "/subscribe/")
                .route("create-user", recording(seen))
                .route("get-users", recording(seen)),
        )
    }

    #[test]
    fn test_routes_message_to_topic_handler() {
        let seen = Seen::default();
        let subscriber = subscriber_with(&seen);

        let ack = subscriber.handle(br#"{"topic":"create-user","data":"{\"message\":\"hello\"}"}"#);

        assert_eq!(ack.topic.as_deref(), Some("create-user"));
        assert_eq!(ack.disposition, Disposition::Delivered { handlers: 1 });
        assert_eq!(*seen.lock().unwrap(), ["hello"]);
    }

    #[test]
    fn test_missing_data_is_dropped() {
        let seen = Seen::default();
        let subscriber = subscriber_with(&seen);

        let ack = subscriber.handle(br#"{"topic":"create-user"}"#);

        assert!(matches!(ack.disposition, Disposition::Rejected { ref reason } if reason.contains("data")));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_inputs_are_acked() {
        let seen = Seen::default();
        let subscriber = subscriber_with(&seen);

        let bodies: [&[u8]; 4] = [
            b"not json",
            br#"{"data":"{\"message\":\"x\"}"}"#,
            br#"{"topic":"create-user","data":"{\"other\":1}"}"#,
            br#"{"topic":"create-user","data":"{broken"}"#,
        ];
        for body in bodies {
            let ack = subscriber.handle(body);
            assert_eq!(ack.disposition.as_str(), "rejected");
        }

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(subscriber.metrics().rejected, 4);
    }

    #[test]
    fn test_inline_data_and_non_string_message() {
        let seen = Seen::default();
        let subscriber = subscriber_with(&seen);

        subscriber.handle(br#"{"topic":"get-users","data":{"message":"inline"}}"#);
        subscriber.handle(br#"{"topic":"get-users","data":"{\"message\":[1,2]}"}"#);

        assert_eq!(*seen.lock().unwrap(), ["inline", "[1,2]"]);
    }

    #[test]
    fn test_unknown_topic_acked_without_handler() {
        let seen = Seen::default();
        let subscriber = subscriber_with(&seen);

        let ack = subscriber.handle(br#"{"topic":"delete-user","data":"{\"message\":\"bye\"}"}"#);

        assert_eq!(ack.disposition, Disposition::NoHandler);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(subscriber.metrics().no_handler, 1);
    }

    #[test]
    fn test_handler_error_and_panic_still_ack() {
        let seen = Seen::default();
        let subscriber = EventSubscriber::new(
            SubscriptionRegistry::new("pubsub", "/subscribe/")
                .route("create-user", |msg: &InboundMessage| -> Result<(), ContractError> {
                    Err(ContractError::handler(&msg.topic, "db down"))
                })
                .route("create-user", |_: &InboundMessage| -> Result<(), ContractError> {
                    panic!("handler bug")
                })
                .route("create-user", recording(&seen)),
        );

        let ack = subscriber.handle(br#"{"topic":"create-user","data":"{\"message\":\"hi\"}"}"#);

        assert_eq!(
            ack.disposition,
            Disposition::HandlerFailed {
                handlers: 3,
                failures: 2
            }
        );
        // later handlers still run
        assert_eq!(*seen.lock().unwrap(), ["hi"]);
        assert_eq!(subscriber.metrics().handler_failed, 1);
    }

    #[test]
    fn test_subscriptions_discovery_list() {
        let subscriber = subscriber_with(&Seen::default());

        let subs = subscriber.subscriptions();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].topic, "create-user");
        assert_eq!(subs[1].topic, "get-users");
        assert!(subs.iter().all(|s| s.pubsubname == "pubsub" && s.route == "/subscribe/"));

        let json = serde_json::to_value(&subs[0]).unwrap();
        assert_eq!(json["pubsubname"], "pubsub");
    }
}
