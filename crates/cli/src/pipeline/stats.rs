//! Pipeline statistics and metrics.

use std::time::Duration;

use batcher::AccumulatorStats;
use dispatcher::MetricsSnapshot;
use eventing::SubscriberSnapshot;
use observability::RunStatsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Records loaded into the source before mutations
    pub records_seeded: usize,

    /// Mutations that changed the store
    pub mutations_applied: u64,

    /// Records handed to the accumulator
    pub records_fed: u64,

    /// Envelopes pushed into the subscriber by the broker
    pub events_delivered: u64,

    /// Handler invocations that completed
    pub events_handled: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Accumulator counters
    pub accumulator: AccumulatorStats,

    /// Dispatcher counters at the end of the run
    pub dispatcher: MetricsSnapshot,

    /// Subscriber per-disposition counters
    pub subscriber: SubscriberSnapshot,

    /// Batch/task/publish aggregates
    pub run: RunStatsAggregator,
}

impl PipelineStats {
    /// Records processed per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.run.records as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Records seeded: {}", self.records_seeded);
        println!("   ├─ Mutations applied: {}", self.mutations_applied);
        println!("   ├─ Records fed: {}", self.records_fed);
        println!("   └─ Throughput: {:.2} records/s", self.throughput());

        println!("\n📦 Accumulator");
        println!("   ├─ Sealed on size: {}", self.accumulator.sealed_on_size);
        println!("   ├─ Sealed on timer: {}", self.accumulator.sealed_on_timer);
        println!("   └─ Sealed on drain: {}", self.accumulator.sealed_on_drain);

        println!("\n⚙️  Dispatcher");
        println!("   ├─ Submitted: {}", self.dispatcher.submitted);
        println!("   ├─ Peak running: {}", self.dispatcher.peak_running);
        println!("   ├─ Succeeded: {}", self.dispatcher.succeeded);
        println!("   ├─ Failed: {}", self.dispatcher.failed);
        println!("   └─ Cancelled: {}", self.dispatcher.cancelled);

        println!("\n📨 Events");
        println!("   ├─ Delivered: {}", self.events_delivered);
        println!("   ├─ Handled: {}", self.events_handled);
        println!("   ├─ Rejected: {}", self.subscriber.rejected);
        println!("   └─ No handler: {}", self.subscriber.no_handler);

        println!("\n{}", self.run.summary());
    }
}
