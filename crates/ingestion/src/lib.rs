//! # Ingestion
//!
//! Record ingestion module.
//!
//! Responsibilities:
//! - In-memory record source (`MemoryRecordSource`)
//! - Stream query results into the accumulator input (`RecordFeed`)
//! - User mutations that publish `create-user` / `delete-user` / `get-users`
//!   events (`UserService`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{MemoryRecordSource, RecordFeed};
//!
//! let source = Arc::new(MemoryRecordSource::seeded(records));
//! let (record_tx, handle) = batcher::spawn_accumulator(config, batch_tx);
//! RecordFeed::new(source).feed(&RecordFilter::all(), &record_tx).await?;
//! ```

mod error;
mod feed;
mod source;
mod users;

// Re-exports
pub use error::{IngestionError, Result};
pub use feed::{FeedMetrics, FeedSnapshot, RecordFeed};
pub use source::MemoryRecordSource;
pub use users::{Listing, MutationReport, UserService};
