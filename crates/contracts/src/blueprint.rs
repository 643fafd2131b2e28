//! PipelineBlueprint - Config Loader output
//!
//! Describes the full pipeline: accumulator policy, dispatcher pool,
//! publisher retry policy, subscriber routes and the seed record source.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use validator::Validate;

use crate::{topics, Record};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PipelineBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Batch accumulation policy
    #[serde(default)]
    #[validate(nested)]
    pub accumulator: AccumulatorConfig,

    /// Dispatcher worker pool
    #[serde(default)]
    #[validate(nested)]
    pub dispatcher: DispatchConfig,

    /// Event publisher
    #[serde(default)]
    #[validate(nested)]
    pub publisher: PublisherConfig,

    /// Event subscriber routes
    #[serde(default)]
    #[validate(nested)]
    pub subscriber: SubscriberConfig,

    /// Record source seeding and query
    #[serde(default)]
    pub source: SourceConfig,
}

/// Size-or-time flush policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AccumulatorConfig {
    /// Maximum records per batch, must be > 0
    #[serde(default = "default_max_batch_size")]
    #[validate(range(min = 1))]
    pub max_batch_size: usize,

    /// Time window after the first append, in milliseconds
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,

    /// Capacity of the record input channel feeding the accumulator task
    #[serde(default = "default_input_capacity")]
    #[validate(range(min = 1))]
    pub input_capacity: usize,
}

fn default_max_batch_size() -> usize {
    100
}

fn default_wait_ms() -> u64 {
    1000
}

fn default_input_capacity() -> usize {
    256
}

impl AccumulatorConfig {
    /// Build a policy with the given bounds
    pub fn new(max_batch_size: usize, wait_ms: u64) -> Self {
        Self {
            max_batch_size,
            wait_ms,
            input_capacity: default_input_capacity(),
        }
    }

    /// Time window as a `Duration`
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self::new(default_max_batch_size(), default_wait_ms())
    }
}

/// Which built-in facility processes batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityKind {
    /// Log every record and echo the batch back
    #[default]
    Log,
}

/// Dispatcher worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// Maximum simultaneously running tasks
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 1024))]
    pub concurrency: usize,

    /// Bounded queue in front of the workers; `submit` waits when full
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Facility used by the CLI pipeline
    #[serde(default)]
    pub facility: FacilityKind,
}

fn default_concurrency() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    16
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
            facility: FacilityKind::default(),
        }
    }
}

/// Publisher retry policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PublisherConfig {
    /// Pub/sub component name announced to subscribers
    #[serde(default = "default_pubsub_name")]
    #[validate(length(min = 1))]
    pub pubsub_name: String,

    /// Retries after the first failed send
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Growth factor between backoff delays
    #[serde(default = "default_backoff_multiplier")]
    #[validate(range(min = 1.0))]
    pub backoff_multiplier: f64,

    /// Upper bound for a single backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_pubsub_name() -> String {
    "pubsub".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            pubsub_name: default_pubsub_name(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Subscriber routing configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubscriberConfig {
    /// Delivery route announced in subscription discovery
    #[serde(default = "default_route")]
    #[validate(length(min = 1))]
    pub route: String,

    /// Topics the subscriber registers handlers for
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Capacity of the in-memory broker delivery queue
    #[serde(default = "default_delivery_capacity")]
    #[validate(range(min = 1))]
    pub delivery_capacity: usize,
}

fn default_route() -> String {
    "/subscribe/".to_string()
}

fn default_topics() -> Vec<String> {
    vec![
        topics::CREATE_USER.to_string(),
        topics::UPDATE_USER.to_string(),
        topics::DELETE_USER.to_string(),
        topics::GET_USERS.to_string(),
    ]
}

fn default_delivery_capacity() -> usize {
    64
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            route: default_route(),
            topics: default_topics(),
            delivery_capacity: default_delivery_capacity(),
        }
    }
}

/// Mutation applied through the user service before processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum UserMutation {
    /// Insert a record and publish `create-user`
    Create {
        key: String,
        #[serde(default)]
        payload: Value,
    },
    /// Merge fields into an existing record and publish `update-user`
    Update { key: String, changes: Value },
    /// Delete a record and publish `delete-user`
    Delete { key: String },
}

impl UserMutation {
    /// Key of the targeted record
    pub fn key(&self) -> &str {
        match self {
            UserMutation::Create { key, .. }
            | UserMutation::Update { key, .. }
            | UserMutation::Delete { key } => key,
        }
    }
}

/// Record source seeding and query configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Records loaded into the in-memory source at startup
    #[serde(default)]
    pub records: Vec<Record>,

    /// Mutations applied after seeding
    #[serde(default)]
    pub mutations: Vec<UserMutation>,

    /// Cap on records returned by the pipeline query
    #[serde(default)]
    pub query_limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_batching_decorator() {
        let bp = PipelineBlueprint::default();
        assert_eq!(bp.accumulator.max_batch_size, 100);
        assert_eq!(bp.accumulator.wait(), Duration::from_secs(1));
        assert_eq!(bp.publisher.max_retries, 3);
        assert_eq!(bp.publisher.initial_backoff_ms, 100);
        assert!(bp.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut bp = PipelineBlueprint::default();
        bp.accumulator.max_batch_size = 0;
        assert!(bp.validate().is_err());
    }

    #[test]
    fn test_mutation_tagging() {
        let content = r#"
[[mutations]]
op = "create"
key = "himanchal"
payload = { name = "Himanchal", age = 20, address = "Raipur" }

[[mutations]]
op = "update"
key = "jane"
changes = { age = 50, address = "BTM Layout" }

[[mutations]]
op = "delete"
key = "aditya"
"#;
        let source: SourceConfig = toml::from_str(content).unwrap();
        assert_eq!(source.mutations.len(), 3);
        assert!(matches!(
            source.mutations[1],
            UserMutation::Update { ref key, ref changes } if key == "jane" && changes["age"] == 50
        ));
        assert_eq!(source.mutations[2].key(), "aditya");
    }
}
