//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use contracts::PipelineBlueprint;

use crate::cli::RunArgs;
use crate::error::ensure_config_exists;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    ensure_config_exists(&args.config)?;

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    // Overrides bypass the file validation, so check again
    config_loader::ConfigLoader::validate(&blueprint).context("Invalid CLI override")?;

    info!(
        max_batch_size = blueprint.accumulator.max_batch_size,
        wait_ms = blueprint.accumulator.wait_ms,
        concurrency = blueprint.dispatcher.concurrency,
        records = blueprint.source.records.len(),
        mutations = blueprint.source.mutations.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let pipeline = Pipeline::new(pipeline_config);
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    tokio::select! {
        result = pipeline.run() => {
            let stats = result.context("Pipeline execution failed")?;
            info!(
                batches = stats.run.batches,
                records = stats.run.records,
                failed = stats.run.tasks_failed,
                duration_secs = stats.duration.as_secs_f64(),
                "Pipeline completed"
            );
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping pipeline...");
        }
    }

    info!("batchflow finished");
    Ok(())
}

/// Apply CLI flags on top of the loaded blueprint
fn apply_overrides(blueprint: &mut PipelineBlueprint, args: &RunArgs) {
    if let Some(records) = args.records {
        info!(records, "Overriding source.query_limit from CLI");
        blueprint.source.query_limit = Some(records);
    }
    if let Some(size) = args.max_batch_size {
        info!(size, "Overriding accumulator.max_batch_size from CLI");
        blueprint.accumulator.max_batch_size = size;
    }
    if let Some(wait_ms) = args.wait_ms {
        info!(wait_ms, "Overriding accumulator.wait_ms from CLI");
        blueprint.accumulator.wait_ms = wait_ms;
    }
    if let Some(concurrency) = args.concurrency {
        info!(concurrency, "Overriding dispatcher.concurrency from CLI");
        blueprint.dispatcher.concurrency = concurrency;
    }
}

/// Resolve on Ctrl+C or SIGTERM. A handler that cannot be installed never fires.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Accumulator:");
    println!("  max_batch_size: {}", blueprint.accumulator.max_batch_size);
    println!("  wait_ms: {}", blueprint.accumulator.wait_ms);
    println!("\nDispatcher:");
    println!("  concurrency: {}", blueprint.dispatcher.concurrency);
    println!("  queue_capacity: {}", blueprint.dispatcher.queue_capacity);
    println!("  facility: {:?}", blueprint.dispatcher.facility);
    println!("\nPublisher ({}):", blueprint.publisher.pubsub_name);
    println!(
        "  retries: {} (backoff {}ms x{}, max {}ms)",
        blueprint.publisher.max_retries,
        blueprint.publisher.initial_backoff_ms,
        blueprint.publisher.backoff_multiplier,
        blueprint.publisher.max_backoff_ms
    );
    println!("\nSubscriber ({}):", blueprint.subscriber.route);
    for topic in &blueprint.subscriber.topics {
        println!("  - {}", topic);
    }
    println!(
        "\nSource: {} records, {} mutations, limit {:?}",
        blueprint.source.records.len(),
        blueprint.source.mutations.len(),
        blueprint.source.query_limit
    );
    println!();
}
