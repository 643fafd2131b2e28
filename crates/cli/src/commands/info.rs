//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{PipelineBlueprint, UserMutation};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    accumulator: AccumulatorInfo,
    dispatcher: DispatcherInfo,
    publisher: PublisherInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    subscriptions: Vec<SubscriptionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<SourceInfo>,
}

#[derive(Serialize)]
struct AccumulatorInfo {
    max_batch_size: usize,
    wait_ms: u64,
    input_capacity: usize,
}

#[derive(Serialize)]
struct DispatcherInfo {
    concurrency: usize,
    queue_capacity: usize,
    facility: String,
}

#[derive(Serialize)]
struct PublisherInfo {
    pubsub_name: String,
    max_retries: u32,
    initial_backoff_ms: u64,
    backoff_multiplier: f64,
    max_backoff_ms: u64,
}

/// Same shape as the subscriber discovery list
#[derive(Serialize)]
struct SubscriptionInfo {
    pubsubname: String,
    topic: String,
    route: String,
}

#[derive(Serialize)]
struct SourceInfo {
    record_keys: Vec<String>,
    mutations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_limit: Option<usize>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    crate::error::ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn describe_mutation(mutation: &UserMutation) -> String {
    match mutation {
        UserMutation::Create { key, .. } => format!("create {key}"),
        UserMutation::Update { key, .. } => format!("update {key}"),
        UserMutation::Delete { key } => format!("delete {key}"),
    }
}

fn build_config_info(blueprint: &PipelineBlueprint, args: &InfoArgs) -> ConfigInfo {
    let subscriptions = if args.topics {
        blueprint
            .subscriber
            .topics
            .iter()
            .map(|topic| SubscriptionInfo {
                pubsubname: blueprint.publisher.pubsub_name.clone(),
                topic: topic.clone(),
                route: blueprint.subscriber.route.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let source = args.source.then(|| SourceInfo {
        record_keys: blueprint.source.records.iter().map(|r| r.key.clone()).collect(),
        mutations: blueprint.source.mutations.iter().map(describe_mutation).collect(),
        query_limit: blueprint.source.query_limit,
    });

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        accumulator: AccumulatorInfo {
            max_batch_size: blueprint.accumulator.max_batch_size,
            wait_ms: blueprint.accumulator.wait_ms,
            input_capacity: blueprint.accumulator.input_capacity,
        },
        dispatcher: DispatcherInfo {
            concurrency: blueprint.dispatcher.concurrency,
            queue_capacity: blueprint.dispatcher.queue_capacity,
            facility: format!("{:?}", blueprint.dispatcher.facility),
        },
        publisher: PublisherInfo {
            pubsub_name: blueprint.publisher.pubsub_name.clone(),
            max_retries: blueprint.publisher.max_retries,
            initial_backoff_ms: blueprint.publisher.initial_backoff_ms,
            backoff_multiplier: blueprint.publisher.backoff_multiplier,
            max_backoff_ms: blueprint.publisher.max_backoff_ms,
        },
        subscriptions,
        source,
    }
}

fn print_config_info(blueprint: &PipelineBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  batchflow Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let acc = &blueprint.accumulator;
    println!("📦 Accumulator");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Max batch size: {}", acc.max_batch_size);
    println!("   ├─ Wait: {} ms", acc.wait_ms);
    println!("   └─ Input capacity: {}", acc.input_capacity);

    let disp = &blueprint.dispatcher;
    println!("\n⚙️  Dispatcher");
    println!("   ├─ Concurrency: {}", disp.concurrency);
    println!("   ├─ Queue capacity: {}", disp.queue_capacity);
    println!("   └─ Facility: {:?}", disp.facility);

    let publisher = &blueprint.publisher;
    println!("\n📤 Publisher ({})", publisher.pubsub_name);
    println!("   ├─ Max retries: {}", publisher.max_retries);
    println!(
        "   └─ Backoff: {} ms x{} (max {} ms)",
        publisher.initial_backoff_ms, publisher.backoff_multiplier, publisher.max_backoff_ms
    );

    let topics = &blueprint.subscriber.topics;
    println!("\n📨 Subscriber ({})", blueprint.subscriber.route);
    if args.topics && !topics.is_empty() {
        for (i, topic) in topics.iter().enumerate() {
            let prefix = if i == topics.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {} → {} ({})",
                prefix, topic, blueprint.subscriber.route, publisher.pubsub_name
            );
        }
    } else {
        println!("   └─ {} topics", topics.len());
    }

    if args.source {
        let source = &blueprint.source;
        println!("\n🗂  Source");
        println!("   ├─ Records: {}", source.records.len());
        for mutation in &source.mutations {
            println!("   ├─ Mutation: {}", describe_mutation(mutation));
        }
        match source.query_limit {
            Some(limit) => println!("   └─ Query limit: {}", limit),
            None => println!("   └─ Query limit: none"),
        }
    }

    println!();
}
