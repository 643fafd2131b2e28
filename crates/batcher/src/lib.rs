//! # Batcher
//!
//! Size-or-time batch accumulation.
//!
//! Responsibilities:
//! - Buffer records into an open batch
//! - Seal the batch when `max_batch_size` is reached or `wait_ms` has elapsed
//!   since its first append, whichever comes first
//! - Drive a single-writer accumulator task between a record channel and a
//!   batch channel
//!
//! ## Example
//!
//! ```ignore
//! use batcher::{AccumulatorConfig, BatchAccumulator};
//!
//! let mut acc = BatchAccumulator::new(AccumulatorConfig::new(2, 1000));
//! acc.offer(record_a)?;
//! acc.offer(record_b)?;
//! let batch = acc.poll_flush(tokio::time::Instant::now())?; // sealed on size
//! ```

mod accumulator;
mod driver;
mod error;

pub use accumulator::{AccumulatorStats, BatchAccumulator};
pub use driver::{spawn_accumulator, AccumulatorTask};
pub use error::BatcherError;

// Re-export contracts types
pub use contracts::{AccumulatorConfig, Batch, FlushReason, Record};
