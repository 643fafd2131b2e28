//! Dispatcher - bounded worker pool executing sealed batches

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_channel::{bounded, Receiver, Sender};
use contracts::{Batch, DispatchConfig, ProcessingFacility};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{DispatchError, DispatcherError};
use crate::metrics::{DispatcherMetrics, MetricsSnapshot};
use crate::task::{await_all, DispatchTask, Job, TaskOutcome};

/// Submits batches to a processing facility through a fixed pool of workers.
///
/// The pool size is the concurrency limit: a worker runs one task at a time,
/// so at most `concurrency` tasks are RUNNING. The queue in front of the
/// workers is bounded and `submit` waits while it is full.
pub struct Dispatcher {
    config: DispatchConfig,
    facility_name: String,
    job_tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    metrics: Arc<DispatcherMetrics>,
    next_task_id: AtomicU64,
}

impl Dispatcher {
    /// Create the dispatcher and spawn its workers.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(
        name = "dispatcher_new",
        skip(config, facility),
        fields(facility = %facility.name(), concurrency = config.concurrency)
    )]
    pub fn new<F>(config: DispatchConfig, facility: F) -> Self
    where
        F: ProcessingFacility + Sync + 'static,
    {
        let concurrency = config.concurrency.max(1);
        let (job_tx, job_rx) = bounded(config.queue_capacity.max(1));
        let facility_name = facility.name().to_string();
        let facility = Arc::new(facility);
        let metrics = Arc::new(DispatcherMetrics::new());

        let workers = (0..concurrency)
            .map(|worker_id| {
                let facility = Arc::clone(&facility);
                let rx = job_rx.clone();
                let metrics = Arc::clone(&metrics);
                tokio::spawn(async move {
                    dispatch_worker(worker_id, facility, rx, metrics).await;
                })
            })
            .collect();

        info!(
            facility = %facility_name,
            concurrency,
            queue_capacity = config.queue_capacity,
            "Dispatcher started"
        );

        Self {
            config,
            facility_name,
            job_tx,
            workers,
            metrics,
            next_task_id: AtomicU64::new(0),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Name of the facility behind this dispatcher
    pub fn facility_name(&self) -> &str {
        &self.facility_name
    }

    /// Queue a sealed batch and return its task handle.
    ///
    /// Waits while the queue is full; this is the backpressure point between
    /// batch production and processing.
    ///
    /// # Errors
    /// `DispatcherError::Closed` hands the batch back if the pool is gone.
    #[instrument(
        name = "dispatcher_submit",
        skip(self, batch),
        fields(batch_seq = batch.sequence(), len = batch.len())
    )]
    pub async fn submit(&self, batch: Batch) -> Result<DispatchTask, DispatcherError> {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let (task, job) = DispatchTask::pair(task_id, batch);

        if let Err(async_channel::SendError(job)) = self.job_tx.send(job).await {
            error!(task_id, "Worker pool closed, submission refused");
            return Err(DispatcherError::Closed {
                batch: Box::new(job.batch),
            });
        }

        self.metrics.inc_submitted();
        self.metrics.set_queue_len(self.job_tx.len());
        debug!(task_id, "Batch queued");
        Ok(task)
    }

    /// Submit every batch arriving on `batches` until the channel closes.
    ///
    /// Returns the task handles in submission order.
    #[instrument(name = "dispatcher_dispatch_stream", skip(self, batches))]
    pub async fn dispatch_stream(
        &self,
        mut batches: mpsc::Receiver<Batch>,
    ) -> Result<Vec<DispatchTask>, DispatcherError> {
        let mut tasks = Vec::new();
        while let Some(batch) = batches.recv().await {
            tasks.push(self.submit(batch).await?);

            if tasks.len() % 100 == 0 {
                debug!(submitted = tasks.len(), "Dispatcher progress");
            }
        }
        Ok(tasks)
    }

    /// Wait for all given tasks; one outcome per task, in input order
    pub async fn await_all(tasks: Vec<DispatchTask>) -> Vec<TaskOutcome> {
        await_all(tasks).await
    }

    /// Get current metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Close the queue and wait for workers to finish what is queued
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) {
        self.job_tx.close();
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = ?e, "Dispatch worker panicked");
            }
        }
        info!(facility = %self.facility_name, "Dispatcher shutdown complete");
    }
}

/// Worker loop: one task at a time until the queue closes
#[instrument(name = "dispatch_worker_loop", skip(facility, rx, metrics))]
async fn dispatch_worker<F>(
    worker_id: usize,
    facility: Arc<F>,
    rx: Receiver<Job>,
    metrics: Arc<DispatcherMetrics>,
) where
    F: ProcessingFacility + Sync + 'static,
{
    debug!(worker_id, "Dispatch worker started");

    while let Ok(job) = rx.recv().await {
        metrics.set_queue_len(rx.len());
        observability::record_queue_depth(rx.len());

        let Job {
            task_id,
            batch,
            shared,
            outcome_tx,
        } = job;
        let batch_seq = batch.sequence();

        if !shared.try_start() {
            metrics.inc_cancelled();
            debug!(worker_id, task_id, batch_seq, "Skipping cancelled task");
            continue;
        }

        metrics.task_started();
        let started = Instant::now();

        // Run in its own task so a panicking facility fails this batch only
        let worker_facility = Arc::clone(&facility);
        let result = tokio::spawn(async move { worker_facility.process(&batch).await })
            .await
            .map_err(|e| DispatchError::Failed {
                batch_seq,
                message: format!("facility panicked: {e}"),
            })
            .and_then(|r| {
                r.map_err(|e| DispatchError::Failed {
                    batch_seq,
                    message: e.to_string(),
                })
            });

        let success = result.is_ok();
        shared.finish(success);
        metrics.task_finished(success);
        observability::record_task_finished(
            facility.name(),
            success,
            started.elapsed().as_secs_f64() * 1000.0,
        );

        if let Err(ref e) = result {
            warn!(worker_id, task_id, batch_seq, error = %e, "Dispatch failed");
        }

        // Receiver gone means the caller no longer needs the result
        if outcome_tx.send(result).is_err() {
            debug!(worker_id, task_id, "Outcome discarded by caller");
        }
    }

    debug!(worker_id, "Dispatch worker stopped");
}
