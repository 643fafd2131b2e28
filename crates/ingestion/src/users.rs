//! UserService - record mutations that announce themselves as events
//!
//! The store is written first; the event is published afterwards. A failed
//! publish is reported in the `MutationReport` and the mutation stays.

use std::sync::Arc;

use contracts::{
    topics, Broker, ContractError, DeliveryReceipt, Record, RecordFilter, RecordSource,
    UserMutation,
};
use eventing::{EventPublisher, PublishError};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::Result;

/// Outcome of a mutation and of the event announcing it
#[derive(Debug)]
pub struct MutationReport {
    pub key: String,
    /// Whether the store changed (an update or delete of a missing key does not)
    pub applied: bool,
    pub event: std::result::Result<DeliveryReceipt, PublishError>,
}

impl MutationReport {
    /// Mutation applied and event delivered
    pub fn is_complete(&self) -> bool {
        self.applied && self.event.is_ok()
    }
}

/// Result of a user listing
#[derive(Debug)]
pub struct Listing {
    pub users: Vec<Record>,
    pub event: std::result::Result<DeliveryReceipt, PublishError>,
}

/// Short summary sent with create events
#[derive(Debug, Serialize)]
struct UserSummary<'a> {
    key: &'a str,
    payload: &'a Value,
}

/// Summary sent with update events
#[derive(Debug, Serialize)]
struct UserChanges<'a> {
    key: &'a str,
    changes: &'a Value,
}

pub struct UserService<S, B> {
    source: Arc<S>,
    publisher: Arc<EventPublisher<B>>,
}

impl<S, B> UserService<S, B>
where
    S: RecordSource + Sync,
    B: Broker + Sync,
{
    pub fn new(source: Arc<S>, publisher: Arc<EventPublisher<B>>) -> Self {
        Self { source, publisher }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Insert `record` and publish `create-user`
    #[instrument(name = "user_create", skip(self, record), fields(key = %record.key))]
    pub async fn create_user(&self, record: Record) -> Result<MutationReport> {
        let key = record.key.clone();
        let summary = serde_json::to_string(&UserSummary {
            key: &record.key,
            payload: &record.payload,
        })
        .map_err(ContractError::from)?;

        self.source.insert(record).await?;
        info!(key = %key, "User inserted");

        let event = self
            .announce(topics::CREATE_USER, &format!("User added: {summary}"))
            .await;
        Ok(MutationReport {
            key,
            applied: true,
            event,
        })
    }

    /// Merge `changes` into an existing user and publish `update-user`.
    ///
    /// A missing key stores nothing (`applied = false`); the event is still
    /// published, like an `UPDATE ... WHERE` that affects no rows.
    #[instrument(name = "user_update", skip(self, changes))]
    pub async fn update_user(&self, key: &str, changes: Value) -> Result<MutationReport> {
        let summary = serde_json::to_string(&UserChanges {
            key,
            changes: &changes,
        })
        .map_err(ContractError::from)?;

        let applied = self.source.update(key, changes).await?;
        if applied {
            info!(key, "User updated");
        } else {
            warn!(key, "No user with this key");
        }

        let event = self
            .announce(topics::UPDATE_USER, &format!("User updated: {summary}"))
            .await;
        Ok(MutationReport {
            key: key.to_string(),
            applied,
            event,
        })
    }

    /// Delete by key and publish `delete-user`.
    ///
    /// The event is published even when nothing matched, matching a
    /// `DELETE ... WHERE` that affects no rows.
    #[instrument(name = "user_delete", skip(self))]
    pub async fn delete_user(&self, key: &str) -> Result<MutationReport> {
        let applied = self.source.delete(key).await?;
        if !applied {
            warn!(key, "No user with this key");
        }

        let event = self
            .announce(topics::DELETE_USER, &format!("User deleted: {key}"))
            .await;
        Ok(MutationReport {
            key: key.to_string(),
            applied,
            event,
        })
    }

    /// Query users and publish `get-users`
    #[instrument(name = "user_list", skip(self, filter))]
    pub async fn list_users(&self, filter: &RecordFilter) -> Result<Listing> {
        let users = self.source.query(filter).await?;
        let event = self
            .announce(
                topics::GET_USERS,
                &format!("Retrieved {} users", users.len()),
            )
            .await;
        Ok(Listing { users, event })
    }

    /// Apply a configured mutation
    pub async fn apply(&self, mutation: UserMutation) -> Result<MutationReport> {
        match mutation {
            UserMutation::Create { key, payload } => self.create_user(Record::new(key, payload)).await,
            UserMutation::Update { key, changes } => self.update_user(&key, changes).await,
            UserMutation::Delete { key } => self.delete_user(&key).await,
        }
    }

    async fn announce(
        &self,
        topic: &str,
        message: &str,
    ) -> std::result::Result<DeliveryReceipt, PublishError> {
        let result = self.publisher.publish_message(topic, message).await;
        if let Err(ref e) = result {
            warn!(topic, error = %e, "Event not published, mutation kept");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryRecordSource;
    use contracts::{ContractError, InboundMessage};
    use eventing::{EventSubscriber, MemoryBroker, RetryPolicy, SubscriptionRegistry};
    use serde_json::json;
    use std::sync::Mutex;

    type Inbox = Arc<Mutex<Vec<(String, String)>>>;

    fn inbox_subscriber(inbox: &Inbox) -> Arc<EventSubscriber> {
        let mut registry = SubscriptionRegistry::new("pubsub", "/subscribe/");
        for topic in [
            topics::CREATE_USER,
            topics::UPDATE_USER,
            topics::DELETE_USER,
            topics::GET_USERS,
        ] {
            let inbox = Arc::clone(inbox);
            registry = registry.route(
                topic,
                move |msg: &InboundMessage| -> std::result::Result<(), ContractError> {
                    inbox
                        .lock()
                        .unwrap()
                        .push((msg.topic.clone(), msg.message.clone()));
                    Ok(())
                },
            );
        }
        Arc::new(EventSubscriber::new(registry))
    }

    #[tokio::test]
    async fn test_create_and_delete_publish_events() {
        let inbox = Inbox::default();
        let (broker, delivery) = MemoryBroker::start(inbox_subscriber(&inbox), 8);
        let publisher = Arc::new(EventPublisher::new(broker, RetryPolicy::no_retry()));
        let source = Arc::new(MemoryRecordSource::new());
        let service = UserService::new(Arc::clone(&source), publisher);

        let created = service
            .create_user(Record::new("ann", json!({ "age": 30 })))
            .await
            .unwrap();
        assert!(created.is_complete());

        let deleted = service.delete_user("ann").await.unwrap();
        assert!(deleted.is_complete());
        let missing = service.delete_user("ann").await.unwrap();
        assert!(!missing.applied);
        assert!(missing.event.is_ok());

        drop(service);
        delivery.await.unwrap();

        let got = inbox.lock().unwrap().clone();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].0, "create-user");
        assert!(got[0].1.starts_with("User added:"));
        assert_eq!(
            got[0].1,
            r#"User added: {"key":"ann","payload":{"age":30}}"#
        );
        assert_eq!(got[1], ("delete-user".to_string(), "User deleted: ann".to_string()));
        assert!(source.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_existing_user_merges_and_publishes() {
        let inbox = Inbox::default();
        let (broker, delivery) = MemoryBroker::start(inbox_subscriber(&inbox), 8);
        let publisher = Arc::new(EventPublisher::new(broker, RetryPolicy::no_retry()));
        let source = Arc::new(MemoryRecordSource::seeded([Record::new(
            "jane",
            json!({ "name": "Jane Smith", "age": 30, "address": "456 Elm St" }),
        )]));
        let service = UserService::new(Arc::clone(&source), publisher);

        let report = service
            .update_user("jane", json!({ "age": 50, "address": "BTM Layout" }))
            .await
            .unwrap();
        assert!(report.is_complete());

        let stored = source.query(&RecordFilter::all()).await.unwrap();
        assert_eq!(
            stored[0].payload,
            json!({ "name": "Jane Smith", "age": 50, "address": "BTM Layout" })
        );

        drop(service);
        delivery.await.unwrap();
        let got = inbox.lock().unwrap().clone();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0, "update-user");
        assert!(got[0].1.starts_with("User updated:"));
        assert!(got[0].1.contains("BTM Layout"));
    }

    #[tokio::test]
    async fn test_update_missing_user_publishes_without_storing() {
        let inbox = Inbox::default();
        let (broker, delivery) = MemoryBroker::start(inbox_subscriber(&inbox), 8);
        let publisher = Arc::new(EventPublisher::new(broker, RetryPolicy::no_retry()));
        let source = Arc::new(MemoryRecordSource::new());
        let service = UserService::new(Arc::clone(&source), publisher);

        let report = service
            .apply(UserMutation::Update {
                key: "ghost".into(),
                changes: json!({ "age": 1 }),
            })
            .await
            .unwrap();
        assert!(!report.applied);
        assert!(report.event.is_ok());
        assert!(!report.is_complete());
        assert!(source.is_empty().await);

        drop(service);
        delivery.await.unwrap();
        assert_eq!(inbox.lock().unwrap()[0].0, "update-user");
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_publish_failure_keeps_write() {
        let inbox = Inbox::default();
        let (broker, _delivery) = MemoryBroker::start(inbox_subscriber(&inbox), 8);
        broker.fail_next(10);
        let publisher = Arc::new(EventPublisher::new(broker, RetryPolicy::default()));
        let source = Arc::new(MemoryRecordSource::seeded([Record::new("jane", json!({ "age": 30 }))]));
        let service = UserService::new(Arc::clone(&source), publisher);

        let report = service.update_user("jane", json!({ "age": 31 })).await.unwrap();
        assert!(report.applied);
        assert!(matches!(report.event, Err(PublishError::PublishFailed { attempts: 4, .. })));
        let stored = source.query(&RecordFilter::all()).await.unwrap();
        assert_eq!(stored[0].field("age"), Some(&json!(31)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_keeps_mutation() {
        let inbox = Inbox::default();
        let (broker, _delivery) = MemoryBroker::start(inbox_subscriber(&inbox), 8);
        broker.fail_next(10);
        let publisher = Arc::new(EventPublisher::new(broker, RetryPolicy::default()));
        let source = Arc::new(MemoryRecordSource::new());
        let service = UserService::new(Arc::clone(&source), publisher);

        let report = service
            .create_user(Record::new("bob", json!({ "age": 17 })))
            .await
            .unwrap();

        assert!(report.applied);
        assert!(matches!(
            report.event,
            Err(PublishError::PublishFailed { attempts: 4, .. })
        ));
        assert_eq!(source.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_users_and_apply() {
        let inbox = Inbox::default();
        let (broker, delivery) = MemoryBroker::start(inbox_subscriber(&inbox), 8);
        let publisher = Arc::new(EventPublisher::new(broker, RetryPolicy::no_retry()));
        let service = UserService::new(Arc::new(MemoryRecordSource::new()), publisher);

        service
            .apply(UserMutation::Create {
                key: "ann".into(),
                payload: json!({}),
            })
            .await
            .unwrap();
        service
            .apply(UserMutation::Create {
                key: "cid".into(),
                payload: json!({}),
            })
            .await
            .unwrap();

        let listing = service.list_users(&RecordFilter::all().with_limit(1)).await.unwrap();
        assert_eq!(listing.users.len(), 1);
        assert_eq!(listing.event.unwrap().topic, "get-users");

        drop(service);
        delivery.await.unwrap();
        let got = inbox.lock().unwrap().clone();
        assert_eq!(got.last().unwrap().1, "Retrieved 1 users");
    }
}
