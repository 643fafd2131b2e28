//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// batchflow - size-or-time batching, bounded dispatch and event delivery
#[derive(Parser, Debug)]
#[command(
    name = "batchflow",
    author,
    version,
    about = "Batch assembly, dispatch and pub/sub event pipeline",
    long_about = "Seeds an in-memory record source, applies user mutations that publish \n\
                  events to subscribers, then streams the records through a size-or-time \n\
                  batch accumulator into a bounded-concurrency dispatcher."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BATCHFLOW_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BATCHFLOW_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline once over the configured records
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "batchflow.toml", env = "BATCHFLOW_CONFIG")]
    pub config: PathBuf,

    /// Maximum number of records to query (overrides source.query_limit)
    #[arg(long, env = "BATCHFLOW_RECORDS")]
    pub records: Option<usize>,

    /// Override accumulator.max_batch_size
    #[arg(long)]
    pub max_batch_size: Option<usize>,

    /// Override accumulator.wait_ms
    #[arg(long)]
    pub wait_ms: Option<u64>,

    /// Override dispatcher.concurrency
    #[arg(long, env = "BATCHFLOW_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "BATCHFLOW_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "BATCHFLOW_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "batchflow.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "batchflow.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the subscription discovery list
    #[arg(long)]
    pub topics: bool,

    /// Show seed records and mutations
    #[arg(long)]
    pub source: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
