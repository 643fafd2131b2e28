//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 → 组件装配
//! - 记录源 → 累加器 → 分发器 端到端
//! - 发布者 → 内存 broker → 订阅者 端到端

#[cfg(test)]
mod contract_tests {
    use contracts::{Envelope, PipelineBlueprint};

    #[test]
    fn test_default_blueprint_validates() {
        let bp = PipelineBlueprint::default();
        assert!(config_loader::ConfigLoader::validate(&bp).is_ok());
    }

    #[test]
    fn test_envelope_is_what_subscriber_expects() {
        let env = Envelope::wrap("create-user", &serde_json::json!({ "message": "hello" })).unwrap();
        let bytes = env.encode().unwrap();

        let subscriber = eventing::EventSubscriber::new(eventing::SubscriptionRegistry::new(
            "pubsub",
            "/subscribe/",
        ));
        let ack = subscriber.handle(&bytes);
        // valid shape, nothing registered
        assert_eq!(ack.disposition, eventing::Disposition::NoHandler);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{
        AccumulatorConfig, Batch, ContractError, DispatchConfig, FlushReason, InboundMessage,
        Record, RecordFilter, RecordSource,
    };
    use dispatcher::{Dispatcher, FnFacility, LogFacility, TaskOutcome};
    use eventing::{EventPublisher, EventSubscriber, MemoryBroker, RetryPolicy, SubscriptionRegistry};
    use ingestion::{MemoryRecordSource, RecordFeed, UserService};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn users(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(format!("user-{i}"), json!({ "name": format!("u{i}"), "age": 18 + i % 50 })))
            .collect()
    }

    /// End-to-end: MemoryRecordSource → RecordFeed → accumulator → Dispatcher
    ///
    /// 验证：
    /// 1. 每条记录恰好进入一个批次，顺序保持
    /// 2. 批次大小不超过 max_batch_size
    /// 3. 每个批次恰好一个结果
    #[tokio::test]
    async fn test_e2e_source_to_dispatcher() {
        let records = users(103);
        let source = Arc::new(MemoryRecordSource::seeded(records.clone()));

        let dispatcher = Dispatcher::new(
            DispatchConfig {
                concurrency: 3,
                queue_capacity: 2,
                ..Default::default()
            },
            LogFacility::new("e2e"),
        );

        let (batch_tx, batch_rx) = mpsc::channel(4);
        let (record_tx, accumulator) =
            batcher::spawn_accumulator(AccumulatorConfig::new(10, 20), batch_tx);

        let feed = RecordFeed::new(Arc::clone(&source));
        let feeder = tokio::spawn(async move { feed.feed(&RecordFilter::all(), &record_tx).await });

        let tasks = dispatcher.dispatch_stream(batch_rx).await.unwrap();
        assert_eq!(feeder.await.unwrap().unwrap(), 103);
        let acc_stats = accumulator.await.unwrap().unwrap();
        assert_eq!(acc_stats.records_sealed, 103);

        let mut run = observability::RunStatsAggregator::new();
        for task in &tasks {
            run.record_batch(task.batch_len(), task.batch_reason().as_str());
        }

        let outcomes = Dispatcher::await_all(tasks).await;
        assert_eq!(outcomes.len() as u64, acc_stats.batches_sealed);
        assert!(outcomes.iter().all(TaskOutcome::is_success));
        for outcome in &outcomes {
            run.record_task(outcome.is_success(), None);
        }

        let summary = run.summary();
        assert_eq!(summary.records, 103);
        assert_eq!(summary.batches, acc_stats.batches_sealed);
        assert_eq!(summary.tasks_failed, 0);
        assert!(summary.batch_size.max <= 10.0);

        let mut seqs: Vec<u64> = outcomes.iter().map(|o| o.batch_seq).collect();
        seqs.sort_unstable();
        let processed: Vec<Record> = seqs
            .iter()
            .flat_map(|seq| {
                let outcome = outcomes.iter().find(|o| o.batch_seq == *seq).unwrap();
                outcome.result.as_ref().unwrap().records.clone()
            })
            .collect();

        for outcome in &outcomes {
            assert!(outcome.result.as_ref().unwrap().records.len() <= 10);
        }
        assert_eq!(processed, records);

        dispatcher.shutdown().await;
    }

    /// Property: for random sizes and offer patterns no batch exceeds the max
    /// and the union of batches is the offered sequence.
    #[tokio::test(start_paused = true)]
    async fn test_randomized_batching_through_driver() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..20 {
            let max = rng.random_range(1..8);
            let wait_ms = rng.random_range(1..30);
            let n = rng.random_range(0..60);
            let records = users(n);

            let (batch_tx, mut batch_rx) = mpsc::channel(64);
            let (record_tx, handle) =
                batcher::spawn_accumulator(AccumulatorConfig::new(max, wait_ms), batch_tx);

            let gaps: Vec<u64> = (0..n).map(|_| rng.random_range(0..10)).collect();
            let to_send = records.clone();
            let producer = tokio::spawn(async move {
                for (record, gap) in to_send.into_iter().zip(gaps) {
                    tokio::time::sleep(Duration::from_millis(gap)).await;
                    record_tx.send(record).await.unwrap();
                }
            });

            let mut flushed: Vec<Batch> = Vec::new();
            while let Some(batch) = batch_rx.recv().await {
                flushed.push(batch);
            }
            producer.await.unwrap();
            handle.await.unwrap().unwrap();

            assert!(flushed.iter().all(|b| !b.is_empty() && b.len() <= max));
            assert!(flushed.windows(2).all(|w| w[0].sequence() < w[1].sequence()));
            let union: Vec<Record> = flushed.into_iter().flat_map(Batch::into_records).collect();
            assert_eq!(union, records);
        }
    }

    /// Failing batches are reported per task; the rest still succeed
    #[tokio::test]
    async fn test_partial_failure_does_not_fail_the_run() {
        let facility = FnFacility::new("picky", |batch: &Batch| {
            if batch.records().iter().any(|r| r.key == "user-7") {
                Err("user-7 rejected".to_string())
            } else {
                Ok(batch.records().to_vec())
            }
        });
        let dispatcher = Dispatcher::new(DispatchConfig::default(), facility);

        let mut tasks = Vec::new();
        for (seq, chunk) in users(20).chunks(5).enumerate() {
            let batch = Batch::sealed(seq as u64, Default::default(), FlushReason::Size, chunk.to_vec());
            tasks.push(dispatcher.submit(batch).await.unwrap());
        }

        let outcomes = Dispatcher::await_all(tasks).await;
        let failed: Vec<u64> = outcomes.iter().filter(|o| !o.is_success()).map(|o| o.batch_seq).collect();
        assert_eq!(failed, [1]);
        assert_eq!(dispatcher.metrics().failed, 1);
        assert_eq!(dispatcher.metrics().succeeded, 3);
        dispatcher.shutdown().await;
    }

    /// End-to-end: UserService → EventPublisher → MemoryBroker (flaky) → EventSubscriber
    #[tokio::test(start_paused = true)]
    async fn test_e2e_mutation_events_survive_transient_failures() {
        let received = Arc::new(Mutex::new(Vec::<(String, String)>::new()));
        let panics = Arc::new(AtomicUsize::new(0));

        let sink = Arc::clone(&received);
        let panic_count = Arc::clone(&panics);
        let registry = SubscriptionRegistry::new("pubsub", "/subscribe/")
            .route("create-user", move |msg: &InboundMessage| -> Result<(), ContractError> {
                sink.lock().unwrap().push((msg.topic.clone(), msg.message.clone()));
                Ok(())
            })
            .route("delete-user", move |_: &InboundMessage| -> Result<(), ContractError> {
                panic_count.fetch_add(1, Ordering::SeqCst);
                panic!("delete handler bug");
            });
        let subscriber = Arc::new(EventSubscriber::new(registry));

        let (broker, delivery) = MemoryBroker::start(Arc::clone(&subscriber), 16);
        broker.fail_next(2);
        let publisher = Arc::new(EventPublisher::new(broker, RetryPolicy::default()));
        let source = Arc::new(MemoryRecordSource::new());
        let service = UserService::new(Arc::clone(&source), Arc::clone(&publisher));

        let created = service
            .create_user(Record::new("ann", json!({ "age": 30 })))
            .await
            .unwrap();
        assert_eq!(created.event.as_ref().unwrap().attempts, 3);

        let deleted = service.delete_user("ann").await.unwrap();
        assert!(deleted.is_complete());

        assert_eq!(publisher.broker().sends(), 4);
        drop(service);
        drop(publisher);
        let stats = delivery.await.unwrap();

        assert_eq!(stats.delivered, 2);
        assert_eq!(received.lock().unwrap().len(), 1);
        assert_eq!(panics.load(Ordering::SeqCst), 1);

        let snapshot = subscriber.metrics();
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.handler_failed, 1);
        assert!(source.query(&RecordFilter::all()).await.unwrap().is_empty());
    }

    /// Pipeline wiring from a TOML blueprint
    #[tokio::test]
    async fn test_blueprint_drives_components() {
        let content = r#"
[accumulator]
max_batch_size = 2
wait_ms = 5

[dispatcher]
concurrency = 2
queue_capacity = 1

[source]
query_limit = 5

[[source.records]]
key = "a"
payload = { age = 1 }

[[source.records]]
key = "b"
payload = { age = 2 }

[[source.records]]
key = "c"
payload = { age = 3 }
"#;
        let bp = config_loader::ConfigLoader::load_from_str(content, config_loader::ConfigFormat::Toml)
            .unwrap();
        assert_eq!(bp.source.records.len(), 3);

        let source = Arc::new(MemoryRecordSource::seeded(bp.source.records.clone()));
        let dispatcher = Dispatcher::new(bp.dispatcher.clone(), dispatcher::facilities::from_config(&bp.dispatcher));
        let (batch_tx, batch_rx) = mpsc::channel(bp.dispatcher.queue_capacity);
        let (record_tx, acc) = batcher::spawn_accumulator(bp.accumulator.clone(), batch_tx);

        let filter = RecordFilter::all().with_limit(bp.source.query_limit.unwrap_or(usize::MAX));
        let feed = RecordFeed::new(source);
        let feeder = tokio::spawn(async move { feed.feed(&filter, &record_tx).await });

        let tasks = dispatcher.dispatch_stream(batch_rx).await.unwrap();
        feeder.await.unwrap().unwrap();
        acc.await.unwrap().unwrap();

        let lens: Vec<usize> = tasks.iter().map(|t| t.batch_len()).collect();
        assert_eq!(lens.iter().sum::<usize>(), 3);
        assert!(lens.iter().all(|&l| l <= 2));

        let outcomes = Dispatcher::await_all(tasks).await;
        assert!(outcomes.iter().all(TaskOutcome::is_success));
        dispatcher.shutdown().await;
    }
}
