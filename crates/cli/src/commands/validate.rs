//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    max_batch_size: usize,
    wait_ms: u64,
    concurrency: usize,
    topic_count: usize,
    record_count: usize,
    mutation_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    max_batch_size: blueprint.accumulator.max_batch_size,
                    wait_ms: blueprint.accumulator.wait_ms,
                    concurrency: blueprint.dispatcher.concurrency,
                    topic_count: blueprint.subscriber.topics.len(),
                    record_count: blueprint.source.records.len(),
                    mutation_count: blueprint.source.mutations.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.source.records.is_empty() && blueprint.source.mutations.is_empty() {
        warnings.push("Source has no records or mutations - nothing will be batched".to_string());
    }

    if blueprint.subscriber.topics.is_empty() {
        warnings.push("No subscriber topics - every event will be acknowledged unhandled".to_string());
    }

    if blueprint.accumulator.wait_ms == 0 {
        warnings.push("accumulator.wait_ms is 0 - batches flush on every poll".to_string());
    }

    if blueprint.publisher.max_retries == 0 {
        warnings.push("publisher.max_retries is 0 - transient broker errors are not retried".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!(
                "  Batching: max {} records / {} ms",
                summary.max_batch_size, summary.wait_ms
            );
            println!("  Concurrency: {}", summary.concurrency);
            println!("  Topics: {}", summary.topic_count);
            println!(
                "  Source: {} records, {} mutations",
                summary.record_count, summary.mutation_count
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
