//! # Dispatcher
//!
//! Bounded-concurrency batch dispatch.
//!
//! Responsibilities:
//! - Accept sealed batches and hand each to a `ProcessingFacility`
//! - Keep at most `concurrency` tasks running, queue the rest
//! - Apply backpressure to submitters once the queue is full
//! - Report every task outcome individually, including failures

pub mod dispatcher;
pub mod error;
pub mod facilities;
pub mod metrics;
pub mod task;

pub use contracts::{Batch, DispatchConfig, ProcessedBatch, ProcessingFacility};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatcherError};
pub use facilities::{FnFacility, LogFacility};
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
pub use task::{await_all, DispatchTask, TaskOutcome, TaskState};
