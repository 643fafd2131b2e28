//! MemoryBroker - in-process broker pushing envelopes to a subscriber

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use contracts::{Broker, BrokerError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::subscriber::EventSubscriber;

/// Counts reported by the delivery loop when it stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
}

/// Bounded in-memory broker.
///
/// `send` enqueues the envelope; a delivery loop pushes each one into the
/// subscriber. The loop stops once every clone of the broker is dropped and
/// the queue is empty.
#[derive(Clone)]
pub struct MemoryBroker {
    tx: mpsc::Sender<(String, Bytes)>,
    /// Topics accepted by `send`; `None` accepts any topic
    known_topics: Option<Arc<HashSet<String>>>,
    /// Next `send` calls to fail with a transient error
    inject_failures: Arc<AtomicU32>,
    sends: Arc<AtomicU64>,
}

impl MemoryBroker {
    /// Start a broker delivering to `subscriber`. Must be called within a
    /// Tokio runtime.
    pub fn start(
        subscriber: Arc<EventSubscriber>,
        capacity: usize,
    ) -> (Self, JoinHandle<DeliveryStats>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(delivery_loop(subscriber, rx));
        let broker = Self {
            tx,
            known_topics: None,
            inject_failures: Arc::new(AtomicU32::new(0)),
            sends: Arc::new(AtomicU64::new(0)),
        };
        (broker, handle)
    }

    /// Reject topics outside `topics` as a permanent failure
    pub fn with_known_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_topics = Some(Arc::new(topics.into_iter().map(Into::into).collect()));
        self
    }

    /// Make the next `count` sends fail transiently
    pub fn fail_next(&self, count: u32) {
        self.inject_failures.store(count, Ordering::SeqCst);
    }

    /// Send calls seen so far, failed ones included
    pub fn sends(&self) -> u64 {
        self.sends.load(Ordering::SeqCst)
    }

    fn take_injected_failure(&self) -> bool {
        self.inject_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Broker for MemoryBroker {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(&self, topic: &str, envelope: Bytes) -> Result<(), BrokerError> {
        self.sends.fetch_add(1, Ordering::SeqCst);

        if let Some(known) = &self.known_topics {
            if !known.contains(topic) {
                return Err(BrokerError::Permanent(format!("unknown topic '{topic}'")));
            }
        }
        if self.take_injected_failure() {
            return Err(BrokerError::Transient("injected failure".to_string()));
        }

        self.tx
            .send((topic.to_string(), envelope))
            .await
            .map_err(|_| BrokerError::Permanent("delivery loop stopped".to_string()))
    }
}

#[instrument(name = "memory_broker_delivery", skip_all)]
async fn delivery_loop(
    subscriber: Arc<EventSubscriber>,
    mut rx: mpsc::Receiver<(String, Bytes)>,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();
    while let Some((topic, envelope)) = rx.recv().await {
        let ack = subscriber.handle(&envelope);
        stats.delivered += 1;
        debug!(topic = %topic, disposition = ack.disposition.as_str(), "Delivered");
    }
    info!(delivered = stats.delivered, "Memory broker delivery loop stopped");
    stats
}
