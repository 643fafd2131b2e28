//! 流水线指标收集模块
//!
//! 通过 `metrics` facade 记录批处理、分发、事件发布与订阅的运行指标，
//! 并提供内存中的运行统计聚合器。

use std::collections::BTreeMap;

use metrics::{counter, gauge, histogram};

/// 记录一次批次封存
///
/// `reason` 取值：`size` / `timer` / `drain`
pub fn record_batch_flushed(len: usize, reason: &str) {
    counter!(
        "batchflow_batches_flushed_total",
        "reason" => reason.to_string()
    )
    .increment(1);
    histogram!("batchflow_batch_size").record(len as f64);
}

/// 记录分发任务结束
pub fn record_task_finished(facility: &str, success: bool, duration_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "batchflow_tasks_finished_total",
        "facility" => facility.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "batchflow_task_duration_ms",
        "facility" => facility.to_string()
    )
    .record(duration_ms);
}

/// 记录一次事件发布（含重试次数）
pub fn record_publish(topic: &str, attempts: u32, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "batchflow_events_published_total",
        "topic" => topic.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "batchflow_publish_attempts",
        "topic" => topic.to_string()
    )
    .record(attempts as f64);
}

/// 记录订阅端确认的消息
pub fn record_message_acked(topic: &str, disposition: &str) {
    counter!(
        "batchflow_messages_acked_total",
        "topic" => topic.to_string(),
        "disposition" => disposition.to_string()
    )
    .increment(1);
}

/// 记录分发队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("batchflow_dispatch_queue_depth").set(depth as f64);
}

/// 运行统计聚合器
///
/// 在内存中聚合一次运行的指标，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct RunStatsAggregator {
    /// 封存批次数
    pub batches: u64,

    /// 封存记录数
    pub records: u64,

    /// 各封存原因的批次数
    pub flush_reasons: BTreeMap<String, u64>,

    /// 成功任务数
    pub tasks_succeeded: u64,

    /// 失败任务数（含取消）
    pub tasks_failed: u64,

    /// 成功发布事件数
    pub events_published: u64,

    /// 发布失败事件数
    pub events_failed: u64,

    /// 批次大小统计
    pub batch_size_stats: RunningStats,

    /// 任务耗时统计 (ms)
    pub task_duration_stats: RunningStats,

    /// 发布尝试次数统计
    pub publish_attempt_stats: RunningStats,
}

impl RunStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 批次封存
    pub fn record_batch(&mut self, len: usize, reason: &str) {
        self.batches += 1;
        self.records += len as u64;
        *self.flush_reasons.entry(reason.to_string()).or_insert(0) += 1;
        self.batch_size_stats.push(len as f64);
    }

    /// 任务结束
    pub fn record_task(&mut self, success: bool, duration_ms: Option<f64>) {
        if success {
            self.tasks_succeeded += 1;
        } else {
            self.tasks_failed += 1;
        }
        if let Some(ms) = duration_ms {
            self.task_duration_stats.push(ms);
        }
    }

    /// 事件发布结束
    pub fn record_publish(&mut self, attempts: u32, success: bool) {
        if success {
            self.events_published += 1;
        } else {
            self.events_failed += 1;
        }
        self.publish_attempt_stats.push(attempts as f64);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> RunSummary {
        let tasks = self.tasks_succeeded + self.tasks_failed;
        RunSummary {
            batches: self.batches,
            records: self.records,
            flush_reasons: self.flush_reasons.clone(),
            tasks_succeeded: self.tasks_succeeded,
            tasks_failed: self.tasks_failed,
            failure_rate: if tasks > 0 {
                self.tasks_failed as f64 / tasks as f64 * 100.0
            } else {
                0.0
            },
            events_published: self.events_published,
            events_failed: self.events_failed,
            batch_size: StatsSummary::from(&self.batch_size_stats),
            task_duration_ms: StatsSummary::from(&self.task_duration_stats),
            publish_attempts: StatsSummary::from(&self.publish_attempt_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub batches: u64,
    pub records: u64,
    pub flush_reasons: BTreeMap<String, u64>,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub failure_rate: f64,
    pub events_published: u64,
    pub events_failed: u64,
    pub batch_size: StatsSummary,
    pub task_duration_ms: StatsSummary,
    pub publish_attempts: StatsSummary,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Run Summary ===")?;
        writeln!(f, "Batches: {} ({} records)", self.batches, self.records)?;
        if !self.flush_reasons.is_empty() {
            let reasons: Vec<String> = self
                .flush_reasons
                .iter()
                .map(|(reason, count)| format!("{reason}={count}"))
                .collect();
            writeln!(f, "Flush reasons: {}", reasons.join(", "))?;
        }
        writeln!(
            f,
            "Tasks: {} succeeded, {} failed ({:.2}%)",
            self.tasks_succeeded, self.tasks_failed, self.failure_rate
        )?;
        writeln!(
            f,
            "Events: {} published, {} failed",
            self.events_published, self.events_failed
        )?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        writeln!(f, "Task duration (ms): {}", self.task_duration_ms)?;
        writeln!(f, "Publish attempts: {}", self.publish_attempts)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
