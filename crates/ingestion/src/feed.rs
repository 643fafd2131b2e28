//! RecordFeed - streams query results into the accumulator input

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{Record, RecordFilter, RecordSource};
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::error::{IngestionError, Result};

/// Feed metrics
#[derive(Debug, Default)]
pub struct FeedMetrics {
    /// Records returned by queries
    pub records_queried: AtomicU64,

    /// Records handed to the accumulator
    pub records_fed: AtomicU64,
}

impl FeedMetrics {
    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            records_queried: self.records_queried.load(Ordering::Relaxed),
            records_fed: self.records_fed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub records_queried: u64,
    pub records_fed: u64,
}

/// Queries a record source and pushes the rows, in order, into a channel.
///
/// `send` waits while the channel is full, so a slow accumulator slows the
/// feed down instead of growing a buffer.
pub struct RecordFeed<S> {
    source: Arc<S>,
    metrics: Arc<FeedMetrics>,
}

impl<S: RecordSource + Sync> RecordFeed<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            metrics: Arc::new(FeedMetrics::default()),
        }
    }

    pub fn metrics(&self) -> FeedSnapshot {
        self.metrics.snapshot()
    }

    /// Run one query and forward every row. Returns the number of records fed.
    ///
    /// # Errors
    /// `ChannelClosed` if the receiver goes away mid-feed.
    #[instrument(name = "record_feed_run", skip(self, filter, tx), fields(limit = ?filter.limit))]
    pub async fn feed(&self, filter: &RecordFilter, tx: &mpsc::Sender<Record>) -> Result<usize> {
        let rows = self.source.query(filter).await?;
        self.metrics
            .records_queried
            .fetch_add(rows.len() as u64, Ordering::Relaxed);

        let mut fed = 0;
        for record in rows {
            if tx.send(record).await.is_err() {
                return Err(IngestionError::ChannelClosed { fed });
            }
            fed += 1;
            self.metrics.records_fed.fetch_add(1, Ordering::Relaxed);
        }

        counter!("batchflow_records_fed_total").increment(fed as u64);
        info!(fed, "Feed complete");
        Ok(fed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryRecordSource;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use serde_json::json;

    #[tokio::test]
    async fn test_feed_preserves_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let records: Vec<Record> = (0..50)
            .map(|i| Record::new(format!("k{i}"), json!({ "v": rng.random_range(0..1000) })))
            .collect();
        let source = Arc::new(MemoryRecordSource::seeded(records.clone()));
        let feed = RecordFeed::new(source);

        let (tx, mut rx) = mpsc::channel(4);
        let consumer = tokio::spawn(async move {
            let mut got = Vec::new();
            while let Some(r) = rx.recv().await {
                got.push(r);
            }
            got
        });

        let fed = feed.feed(&RecordFilter::all(), &tx).await.unwrap();
        drop(tx);

        assert_eq!(fed, 50);
        assert_eq!(consumer.await.unwrap(), records);
        assert_eq!(feed.metrics().records_fed, 50);
    }

    #[tokio::test]
    async fn test_feed_reports_closed_channel() {
        let source = Arc::new(MemoryRecordSource::seeded([
            Record::new("a", json!(1)),
            Record::new("b", json!(2)),
        ]));
        let feed = RecordFeed::new(source);

        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = feed.feed(&RecordFilter::all(), &tx).await.unwrap_err();
        assert!(matches!(err, IngestionError::ChannelClosed { fed: 0 }));
    }
}
