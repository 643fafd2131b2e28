//! # Eventing
//!
//! Publish/subscribe delivery for domain events.
//!
//! Responsibilities:
//! - `EventPublisher`: wrap a payload in an `Envelope`, send it through a
//!   `Broker`, retry transient failures with exponential backoff
//! - `EventSubscriber`: validate inbound envelopes and route them by topic to
//!   registered handlers; every message is acknowledged
//! - `MemoryBroker`: in-process broker with a push delivery loop
//!
//! ## Example
//!
//! ```ignore
//! let registry = SubscriptionRegistry::new("pubsub", "/subscribe/")
//!     .route("create-user", |msg: &InboundMessage| {
//!         tracing::info!(message = %msg.message, "user created");
//!         Ok(())
//!     });
//! let subscriber = Arc::new(EventSubscriber::new(registry));
//! let (broker, delivery) = MemoryBroker::start(Arc::clone(&subscriber), 64);
//! let publisher = EventPublisher::new(broker, RetryPolicy::default());
//!
//! let receipt = publisher.publish_message("create-user", "hello").await?;
//! ```

mod error;
mod memory;
mod publisher;
mod retry;
mod subscriber;

pub use contracts::{topics, DeliveryReceipt, Envelope, InboundMessage};
pub use error::PublishError;
pub use memory::{DeliveryStats, MemoryBroker};
pub use publisher::EventPublisher;
pub use retry::RetryPolicy;
pub use subscriber::{
    Ack, Disposition, EventHandler, EventSubscriber, SubscriberMetrics, SubscriberSnapshot,
    Subscription, SubscriptionRegistry,
};
