//! Size-or-time batch accumulator.
//!
//! Single-writer by construction: every mutating method takes `&mut self`,
//! so one producer owns an instance. Several producers each own their own
//! accumulator and merge at the dispatcher.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use contracts::{AccumulatorConfig, Batch, ContractError, FlushReason, Record};
use tokio::time::Instant;
use tracing::{instrument, trace};

/// Batch currently receiving appends
#[derive(Debug, Default)]
struct OpenBatch {
    records: Vec<Record>,
    first_append: Option<Instant>,
    created_at: Option<DateTime<Utc>>,
}

impl OpenBatch {
    fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Running counters for one accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatorStats {
    /// Records accepted by `offer`
    pub offered: u64,
    /// Batches sealed so far
    pub batches_sealed: u64,
    /// Records contained in sealed batches
    pub records_sealed: u64,
    /// Batches sealed because they filled up
    pub sealed_on_size: u64,
    /// Batches sealed by the time window
    pub sealed_on_timer: u64,
    /// Batches sealed at drain
    pub sealed_on_drain: u64,
}

/// Buffers records and seals them into bounded batches
pub struct BatchAccumulator {
    config: AccumulatorConfig,
    open: OpenBatch,
    /// Sealed on size, waiting for `poll_flush`
    ready: VecDeque<Batch>,
    next_sequence: u64,
    stats: AccumulatorStats,
}

impl fmt::Debug for BatchAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchAccumulator")
            .field("open_len", &self.open.len())
            .field("ready", &self.ready.len())
            .field("max_batch_size", &self.config.max_batch_size)
            .field("wait_ms", &self.config.wait_ms)
            .finish()
    }
}

impl BatchAccumulator {
    /// Create an accumulator with the given policy.
    ///
    /// A `max_batch_size` of 0 is treated as 1; the config loader rejects it
    /// before it gets here.
    pub fn new(mut config: AccumulatorConfig) -> Self {
        config.max_batch_size = config.max_batch_size.max(1);
        Self {
            config,
            open: OpenBatch::default(),
            ready: VecDeque::new(),
            next_sequence: 0,
            stats: AccumulatorStats::default(),
        }
    }

    /// Policy in use
    pub fn config(&self) -> &AccumulatorConfig {
        &self.config
    }

    /// Append a record to the open batch, stamped with the current time
    pub fn offer(&mut self, record: Record) -> Result<(), ContractError> {
        self.offer_at(record, Instant::now())
    }

    /// Append a record to the open batch at `now`.
    ///
    /// Reaching `max_batch_size` seals the batch immediately; it is returned by
    /// the next `poll_flush`.
    #[instrument(level = "trace", name = "accumulator_offer", skip(self, record), fields(key = %record.key))]
    pub fn offer_at(&mut self, record: Record, now: Instant) -> Result<(), ContractError> {
        if self.open.is_empty() {
            self.open.first_append = Some(now);
            self.open.created_at = Some(Utc::now());
        }
        self.open.records.push(record);
        self.stats.offered += 1;

        if self.open.len() >= self.config.max_batch_size {
            let batch = self.seal(FlushReason::Size)?;
            self.ready.push_back(batch);
        }
        Ok(())
    }

    /// Return a sealed batch if one is due at `now`.
    ///
    /// Batches sealed on size come first, in sequence order. Otherwise the open
    /// batch is sealed once `wait_ms` has elapsed since its first append. An
    /// empty open batch never flushes.
    pub fn poll_flush(&mut self, now: Instant) -> Result<Option<Batch>, ContractError> {
        if let Some(batch) = self.ready.pop_front() {
            return Ok(Some(batch));
        }

        match self.open.first_append {
            Some(first) if now.saturating_duration_since(first) >= self.config.wait() => {
                self.seal(FlushReason::Timer).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Instant at which the open batch's window expires
    pub fn next_deadline(&self) -> Option<Instant> {
        self.open.first_append.map(|first| first + self.config.wait())
    }

    /// Whether a size-sealed batch is waiting
    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Records in the open batch
    pub fn pending_len(&self) -> usize {
        self.open.len()
    }

    /// Seal everything left: waiting batches first, then the open batch.
    pub fn drain(&mut self) -> Result<Vec<Batch>, ContractError> {
        let tail = if self.open.is_empty() {
            None
        } else {
            Some(self.seal(FlushReason::Drain)?)
        };
        let mut batches: Vec<Batch> = self.ready.drain(..).collect();
        batches.extend(tail);
        Ok(batches)
    }

    /// Counters snapshot
    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }

    /// Replace the open batch with a fresh one and seal the old contents.
    ///
    /// On a policy violation the open batch is left untouched.
    fn seal(&mut self, reason: FlushReason) -> Result<Batch, ContractError> {
        let sequence = self.next_sequence;
        if self.open.len() > self.config.max_batch_size {
            return Err(ContractError::FlushPolicyViolation {
                batch_seq: sequence,
                len: self.open.len(),
                max: self.config.max_batch_size,
            });
        }

        let open = std::mem::take(&mut self.open);

        self.next_sequence += 1;
        self.stats.batches_sealed += 1;
        self.stats.records_sealed += open.len() as u64;
        match reason {
            FlushReason::Size => self.stats.sealed_on_size += 1,
            FlushReason::Timer => self.stats.sealed_on_timer += 1,
            FlushReason::Drain => self.stats.sealed_on_drain += 1,
        }

        trace!(
            batch_seq = sequence,
            len = open.len(),
            reason = reason.as_str(),
            "Batch sealed"
        );

        Ok(Batch::sealed(
            sequence,
            open.created_at.unwrap_or_else(Utc::now),
            reason,
            open.records,
        ))
    }
}
