//! AccumulatorTask - single-writer loop between a record channel and a batch channel

use std::time::Duration;

use contracts::{AccumulatorConfig, Batch, Record};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, instrument};

use crate::accumulator::{AccumulatorStats, BatchAccumulator};
use crate::error::BatcherError;

/// Far-away deadline used while the open batch is empty
const IDLE_PARK: Duration = Duration::from_secs(3600);

/// Owns one accumulator and feeds sealed batches downstream
pub struct AccumulatorTask {
    accumulator: BatchAccumulator,
    input_rx: mpsc::Receiver<Record>,
    output_tx: mpsc::Sender<Batch>,
}

impl AccumulatorTask {
    /// Create a task over existing channels
    pub fn new(
        config: AccumulatorConfig,
        input_rx: mpsc::Receiver<Record>,
        output_tx: mpsc::Sender<Batch>,
    ) -> Self {
        Self {
            accumulator: BatchAccumulator::new(config),
            input_rx,
            output_tx,
        }
    }

    /// Run until the input closes, then drain.
    ///
    /// A flush policy violation or a closed output stops the task. The error
    /// names the batch sequence and its record count.
    #[instrument(
        name = "accumulator_run",
        skip(self),
        fields(
            max_batch_size = self.accumulator.config().max_batch_size,
            wait_ms = self.accumulator.config().wait_ms
        )
    )]
    pub async fn run(mut self) -> Result<AccumulatorStats, BatcherError> {
        info!("Accumulator started");

        loop {
            self.flush_due().await?;

            let deadline = self.accumulator.next_deadline();
            let park = deadline.unwrap_or_else(|| Instant::now() + IDLE_PARK);

            tokio::select! {
                maybe_record = self.input_rx.recv() => match maybe_record {
                    Some(record) => self.accumulator.offer(record)?,
                    None => break,
                },
                _ = sleep_until(park), if deadline.is_some() => {}
            }
        }

        for batch in self.accumulator.drain()? {
            Self::forward(&self.output_tx, batch).await?;
        }

        let stats = self.accumulator.stats();
        info!(
            offered = stats.offered,
            batches = stats.batches_sealed,
            "Accumulator input closed, drained"
        );
        Ok(stats)
    }

    /// Spawn the task on the runtime
    pub fn spawn(self) -> JoinHandle<Result<AccumulatorStats, BatcherError>> {
        tokio::spawn(async move {
            let result = self.run().await;
            if let Err(ref e) = result {
                error!(error = %e, "Accumulator stopped");
            }
            result
        })
    }

    async fn flush_due(&mut self) -> Result<(), BatcherError> {
        while let Some(batch) = self.accumulator.poll_flush(Instant::now())? {
            Self::forward(&self.output_tx, batch).await?;
        }
        Ok(())
    }

    async fn forward(output_tx: &mpsc::Sender<Batch>, batch: Batch) -> Result<(), BatcherError> {
        let (batch_seq, len, reason) = (batch.sequence(), batch.len(), batch.reason());
        observability::record_batch_flushed(len, reason.as_str());

        output_tx
            .send(batch)
            .await
            .map_err(|_| BatcherError::OutputClosed { batch_seq, len })?;

        debug!(batch_seq, len, reason = reason.as_str(), "Batch flushed");
        Ok(())
    }
}

/// Create the record channel and spawn an accumulator writing to `output_tx`.
///
/// Each producer that needs its own ordering should call this separately and
/// share the same `output_tx`.
pub fn spawn_accumulator(
    config: AccumulatorConfig,
    output_tx: mpsc::Sender<Batch>,
) -> (
    mpsc::Sender<Record>,
    JoinHandle<Result<AccumulatorStats, BatcherError>>,
) {
    let (input_tx, input_rx) = mpsc::channel(config.input_capacity.max(1));
    let handle = AccumulatorTask::new(config, input_rx, output_tx).spawn();
    (input_tx, handle)
}
