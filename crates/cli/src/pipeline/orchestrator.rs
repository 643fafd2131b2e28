//! Pipeline orchestrator - coordinates all components.
//!
//! Event side: user mutations → publisher → memory broker → subscriber.
//! Batch side: record feed → accumulator → dispatcher → await all tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{topics, ContractError, InboundMessage, PipelineBlueprint, RecordFilter};
use dispatcher::{facilities, Dispatcher, TaskOutcome};
use eventing::{
    EventPublisher, EventSubscriber, MemoryBroker, RetryPolicy, SubscriptionRegistry,
};
use ingestion::{MemoryRecordSource, RecordFeed, UserService};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded and validated blueprint
    pub blueprint: PipelineBlueprint,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline to completion
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let mut stats = PipelineStats::default();

        // Event side
        let handled = Arc::new(AtomicU64::new(0));
        let subscriber = Arc::new(build_subscriber(blueprint, Arc::clone(&handled)));
        for sub in subscriber.subscriptions() {
            info!(pubsub = %sub.pubsubname, topic = %sub.topic, route = %sub.route, "Subscribed");
        }

        let (broker, delivery) =
            MemoryBroker::start(Arc::clone(&subscriber), blueprint.subscriber.delivery_capacity);
        let publisher = Arc::new(EventPublisher::new(
            broker,
            RetryPolicy::from(&blueprint.publisher),
        ));

        // Record source
        let source = Arc::new(MemoryRecordSource::seeded(
            blueprint.source.records.iter().cloned(),
        ));
        stats.records_seeded = source.len().await;
        info!(records = stats.records_seeded, "Record source seeded");

        let users = UserService::new(Arc::clone(&source), Arc::clone(&publisher));
        for mutation in blueprint.source.mutations.iter().cloned() {
            let report = users
                .apply(mutation)
                .await
                .context("Failed to apply user mutation")?;
            stats.mutations_applied += u64::from(report.applied);
            match &report.event {
                Ok(receipt) => stats.run.record_publish(receipt.attempts, true),
                Err(e) => {
                    warn!(key = %report.key, error = %e, "Mutation event lost");
                    stats.run.record_publish(publisher.policy().max_attempts(), false);
                }
            }
        }
        drop(users);

        // Batch side
        let filter = match blueprint.source.query_limit {
            Some(limit) => RecordFilter::all().with_limit(limit),
            None => RecordFilter::all(),
        };

        let batch_side = run_batches(blueprint, Arc::clone(&source), filter, &mut stats);
        let outcomes = match self.config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, batch_side).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Pipeline timed out");
                    return Err(CliError::Timeout {
                        secs: timeout.as_secs(),
                    }
                    .into());
                }
            },
            None => batch_side.await?,
        };

        for outcome in &outcomes {
            stats.run.record_task(outcome.is_success(), None);
            if let Err(ref e) = outcome.result {
                warn!(batch_seq = outcome.batch_seq, error = %e, "Batch failed");
            }
        }

        // Announce the processed listing like a `get-users` call
        match publisher
            .publish_message(
                topics::GET_USERS,
                &format!("Processed {} users", stats.records_fed),
            )
            .await
        {
            Ok(receipt) => stats.run.record_publish(receipt.attempts, true),
            Err(e) => {
                warn!(error = %e, "Listing event lost");
                stats.run.record_publish(publisher.policy().max_attempts(), false);
            }
        }

        // Shutdown: dropping the last publisher closes the broker queue
        info!("Shutting down pipeline...");
        drop(publisher);
        let delivered = tokio::time::timeout(Duration::from_secs(5), delivery)
            .await
            .context("Event delivery did not drain")?
            .context("Event delivery loop panicked")?;

        stats.events_delivered = delivered.delivered;
        stats.events_handled = handled.load(Ordering::Relaxed);
        stats.subscriber = subscriber.metrics();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            batches = stats.run.batches,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Feed → accumulator → dispatcher, returning one outcome per batch
async fn run_batches(
    blueprint: &PipelineBlueprint,
    source: Arc<MemoryRecordSource>,
    filter: RecordFilter,
    stats: &mut PipelineStats,
) -> Result<Vec<TaskOutcome>> {
    let facility = facilities::from_config(&blueprint.dispatcher);
    let dispatcher = Dispatcher::new(blueprint.dispatcher.clone(), facility);

    let (batch_tx, batch_rx) = mpsc::channel(blueprint.dispatcher.queue_capacity.max(1));
    let (record_tx, accumulator) =
        batcher::spawn_accumulator(blueprint.accumulator.clone(), batch_tx);

    info!(
        max_batch_size = blueprint.accumulator.max_batch_size,
        wait_ms = blueprint.accumulator.wait_ms,
        concurrency = blueprint.dispatcher.concurrency,
        "Batch pipeline started"
    );

    // The feed task owns the record sender; its exit lets the accumulator drain
    let feed = RecordFeed::new(source);
    let feeder = tokio::spawn(async move { feed.feed(&filter, &record_tx).await });

    let tasks = dispatcher
        .dispatch_stream(batch_rx)
        .await
        .map_err(|e| CliError::pipeline_execution(e.to_string()))?;

    let fed = feeder
        .await
        .context("Record feed panicked")?
        .context("Record feed failed")?;
    stats.records_fed = fed as u64;

    stats.accumulator = accumulator
        .await
        .context("Accumulator task panicked")?
        .context("Accumulator stopped")?;

    for task in &tasks {
        stats.run.record_batch(task.batch_len(), task.batch_reason().as_str());
    }

    let outcomes = Dispatcher::await_all(tasks).await;
    stats.dispatcher = dispatcher.metrics();
    dispatcher.shutdown().await;

    Ok(outcomes)
}

/// One logging handler per configured topic
fn build_subscriber(blueprint: &PipelineBlueprint, handled: Arc<AtomicU64>) -> EventSubscriber {
    let mut registry = SubscriptionRegistry::new(
        blueprint.publisher.pubsub_name.clone(),
        blueprint.subscriber.route.clone(),
    );

    for topic in &blueprint.subscriber.topics {
        let handled = Arc::clone(&handled);
        registry = registry.route(
            topic.clone(),
            move |msg: &InboundMessage| -> Result<(), ContractError> {
                handled.fetch_add(1, Ordering::Relaxed);
                info!(topic = %msg.topic, message = %msg.message, "Processing message");
                Ok(())
            },
        );
    }

    EventSubscriber::new(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Record, UserMutation};
    use serde_json::json;

    fn blueprint(records: usize) -> PipelineBlueprint {
        let mut bp = PipelineBlueprint::default();
        bp.accumulator.max_batch_size = 4;
        bp.accumulator.wait_ms = 10;
        bp.dispatcher.concurrency = 2;
        bp.source.records = (0..records)
            .map(|i| Record::new(format!("user-{i}"), json!({ "age": 20 + i })))
            .collect();
        bp
    }

    #[tokio::test]
    async fn test_pipeline_processes_every_record() {
        let mut bp = blueprint(10);
        bp.source.mutations = vec![
            UserMutation::Create {
                key: "late".into(),
                payload: json!({ "age": 40 }),
            },
            UserMutation::Update {
                key: "user-1".into(),
                changes: json!({ "age": 99 }),
            },
            UserMutation::Delete {
                key: "user-0".into(),
            },
        ];

        let stats = Pipeline::new(PipelineConfig {
            blueprint: bp,
            timeout: Some(Duration::from_secs(10)),
            metrics_port: None,
        })
        .run()
        .await
        .unwrap();

        assert_eq!(stats.records_seeded, 10);
        assert_eq!(stats.mutations_applied, 3);
        assert_eq!(stats.records_fed, 10);
        assert_eq!(stats.run.records, 10);
        assert_eq!(stats.run.batches, 3);
        assert_eq!(stats.run.tasks_succeeded, 3);
        assert_eq!(stats.run.tasks_failed, 0);
        // create-user, update-user, delete-user, get-users
        assert_eq!(stats.run.events_published, 4);
        assert_eq!(stats.events_delivered, 4);
        assert_eq!(stats.events_handled, 4);
    }

    #[tokio::test]
    async fn test_query_limit_caps_records() {
        let mut bp = blueprint(20);
        bp.source.query_limit = Some(5);

        let stats = Pipeline::new(PipelineConfig {
            blueprint: bp,
            timeout: None,
            metrics_port: None,
        })
        .run()
        .await
        .unwrap();

        assert_eq!(stats.records_fed, 5);
        assert_eq!(stats.accumulator.records_sealed, 5);
        assert_eq!(stats.run.batches, 2);
    }
}
