//! EventPublisher - at-least-once envelope delivery to a broker

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use contracts::{Broker, BrokerError, DeliveryReceipt, Envelope};
use serde::Serialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::error::PublishError;
use crate::retry::RetryPolicy;

/// Publishes domain events through a broker.
///
/// Transient broker errors are retried with exponential backoff; a message
/// may therefore reach subscribers more than once. Nothing is buffered
/// locally: when retries run out the caller gets `PublishFailed`.
pub struct EventPublisher<B> {
    broker: B,
    policy: RetryPolicy,
    next_sequence: AtomicU64,
}

impl<B: Broker> EventPublisher<B> {
    pub fn new(broker: B, policy: RetryPolicy) -> Self {
        Self {
            broker,
            policy,
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Serialize `payload`, wrap it for `topic` and send it.
    #[instrument(name = "event_publish", skip(self, payload), fields(broker = %self.broker.name()))]
    pub async fn publish<T>(&self, topic: &str, payload: &T) -> Result<DeliveryReceipt, PublishError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let envelope = Envelope::wrap(topic, payload)?;
        let bytes = envelope.encode()?;
        let max_attempts = self.policy.max_attempts();

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.broker.send(topic, bytes.clone()).await {
                Ok(()) => {
                    let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
                    observability::record_publish(topic, attempts, true);
                    debug!(topic, sequence, attempts, "Event published");
                    return Ok(DeliveryReceipt {
                        topic: topic.to_string(),
                        sequence,
                        attempts,
                        published_at: Utc::now(),
                    });
                }
                Err(e) if e.is_transient() && attempts < max_attempts => {
                    let delay = self.policy.delay_for(attempts - 1);
                    warn!(
                        topic,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Broker send failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(self.give_up(topic, attempts, e)),
            }
        }
    }

    /// Publish `{"message": message}` under `topic`
    pub async fn publish_message(
        &self,
        topic: &str,
        message: &str,
    ) -> Result<DeliveryReceipt, PublishError> {
        self.publish(topic, &json!({ "message": message })).await
    }

    fn give_up(&self, topic: &str, attempts: u32, last_error: BrokerError) -> PublishError {
        observability::record_publish(topic, attempts, false);
        warn!(topic, attempts, error = %last_error, "Publish failed");
        PublishError::PublishFailed {
            topic: topic.to_string(),
            attempts,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::Value;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Broker that replays a scripted list of failures, then succeeds
    #[derive(Default)]
    struct ScriptedBroker {
        failures: Mutex<Vec<BrokerError>>,
        sent: Mutex<Vec<(String, Bytes)>>,
        calls: Mutex<u32>,
    }

    impl ScriptedBroker {
        fn failing_with(failures: Vec<BrokerError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                ..Default::default()
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }

        fn delivered(&self) -> Vec<(String, Bytes)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Broker for ScriptedBroker {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, topic: &str, envelope: Bytes) -> Result<(), BrokerError> {
            *self.calls.lock().unwrap() += 1;
            let next = {
                let mut failures = self.failures.lock().unwrap();
                if failures.is_empty() {
                    None
                } else {
                    Some(failures.remove(0))
                }
            };
            match next {
                Some(e) => Err(e),
                None => {
                    self.sent.lock().unwrap().push((topic.to_string(), envelope));
                    Ok(())
                }
            }
        }
    }

    fn transient() -> BrokerError {
        BrokerError::Transient("connection reset".into())
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success() {
        let broker = ScriptedBroker::failing_with(vec![transient(), transient()]);
        let publisher = EventPublisher::new(broker, RetryPolicy::default());

        let started = Instant::now();
        let receipt = publisher.publish_message("create-user", "hello").await.unwrap();

        assert_eq!(receipt.attempts, 3);
        assert_eq!(receipt.topic, "create-user");
        assert_eq!(publisher.broker().calls(), 3);
        assert_eq!(publisher.broker().delivered().len(), 1);
        // 100ms + 200ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let broker = ScriptedBroker::failing_with(vec![transient(); 10]);
        let publisher = EventPublisher::new(broker, RetryPolicy::default());

        let err = publisher.publish_message("delete-user", "bye").await.unwrap_err();
        match err {
            PublishError::PublishFailed {
                topic,
                attempts,
                last_error,
            } => {
                assert_eq!(topic, "delete-user");
                assert_eq!(attempts, 4);
                assert!(last_error.is_transient());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(publisher.broker().calls(), 4);
        assert!(publisher.broker().delivered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_not_retried() {
        let broker =
            ScriptedBroker::failing_with(vec![BrokerError::Permanent("unknown topic".into())]);
        let publisher = EventPublisher::new(broker, RetryPolicy::default());

        let err = publisher.publish_message("nope", "x").await.unwrap_err();
        assert!(matches!(err, PublishError::PublishFailed { attempts: 1, .. }));
        assert_eq!(publisher.broker().calls(), 1);
    }

    #[tokio::test]
    async fn test_envelope_on_the_wire() {
        let publisher = EventPublisher::new(ScriptedBroker::default(), RetryPolicy::no_retry());
        let first = publisher.publish_message("create-user", "hello").await.unwrap();
        let second = publisher.publish("get-users", &vec!["a", "b"]).await.unwrap();

        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);

        let sent = publisher.broker().delivered();
        let envelope: Value = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(sent[0].0, "create-user");
        assert_eq!(envelope["topic"], "create-user");
        assert_eq!(envelope["data"], r#"{"message":"hello"}"#);
        assert!(envelope["timestamp"].is_string());
    }
}
