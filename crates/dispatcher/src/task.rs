//! DispatchTask - handle to one in-flight batch submission

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use contracts::{Batch, FlushReason, ProcessedBatch};
use tokio::sync::oneshot;

use crate::error::DispatchError;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const SUCCEEDED: u8 = 2;
const FAILED: u8 = 3;
/// Terminal, reported as `Failed`
const CANCELLED: u8 = 4;

/// Lifecycle of a dispatch task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Queued, no worker yet
    Pending,
    /// A worker is processing the batch
    Running,
    /// Facility returned a result
    Succeeded,
    /// Facility failed, or the task was cancelled
    Failed,
}

impl TaskState {
    fn from_code(code: u8) -> Self {
        match code {
            PENDING => TaskState::Pending,
            RUNNING => TaskState::Running,
            SUCCEEDED => TaskState::Succeeded,
            _ => TaskState::Failed,
        }
    }

    /// Whether the state is final
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

/// State shared between the handle and the worker
#[derive(Debug)]
pub(crate) struct TaskShared {
    state: AtomicU8,
}

impl TaskShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(PENDING),
        }
    }

    /// PENDING → RUNNING. Fails if the task was cancelled first.
    pub(crate) fn try_start(&self) -> bool {
        self.state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// RUNNING → SUCCEEDED | FAILED
    pub(crate) fn finish(&self, success: bool) {
        let code = if success { SUCCEEDED } else { FAILED };
        self.state.store(code, Ordering::Release);
    }

    /// PENDING → FAILED(cancelled)
    fn try_cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn code(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }
}

/// Unit of work travelling from `submit` to a worker
pub(crate) struct Job {
    pub(crate) task_id: u64,
    pub(crate) batch: Batch,
    pub(crate) shared: Arc<TaskShared>,
    pub(crate) outcome_tx: oneshot::Sender<Result<ProcessedBatch, DispatchError>>,
}

/// Handle returned by `Dispatcher::submit`
#[derive(Debug)]
pub struct DispatchTask {
    id: u64,
    batch_seq: u64,
    batch_len: usize,
    batch_reason: FlushReason,
    shared: Arc<TaskShared>,
    outcome_rx: oneshot::Receiver<Result<ProcessedBatch, DispatchError>>,
}

impl DispatchTask {
    /// Create the handle and the job sent to the worker pool
    pub(crate) fn pair(task_id: u64, batch: Batch) -> (Self, Job) {
        let shared = Arc::new(TaskShared::new());
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let task = Self {
            id: task_id,
            batch_seq: batch.sequence(),
            batch_len: batch.len(),
            batch_reason: batch.reason(),
            shared: Arc::clone(&shared),
            outcome_rx,
        };
        let job = Job {
            task_id,
            batch,
            shared,
            outcome_tx,
        };
        (task, job)
    }

    /// Dispatcher-assigned task id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Sequence of the submitted batch
    pub fn batch_seq(&self) -> u64 {
        self.batch_seq
    }

    /// Records in the submitted batch
    pub fn batch_len(&self) -> usize {
        self.batch_len
    }

    /// Why the accumulator sealed the batch
    pub fn batch_reason(&self) -> FlushReason {
        self.batch_reason
    }

    /// Current state
    pub fn state(&self) -> TaskState {
        TaskState::from_code(self.shared.code())
    }

    /// Cancel the task if no worker has started it.
    ///
    /// Returns `false` once the task is running or finished; a running task is
    /// left to complete.
    pub fn cancel(&self) -> bool {
        self.shared.try_cancel()
    }

    /// Wait for the terminal outcome
    pub async fn wait(self) -> TaskOutcome {
        let result = if self.shared.code() == CANCELLED {
            Err(DispatchError::Cancelled {
                batch_seq: self.batch_seq,
            })
        } else {
            match self.outcome_rx.await {
                Ok(result) => result,
                Err(_) if self.shared.code() == CANCELLED => Err(DispatchError::Cancelled {
                    batch_seq: self.batch_seq,
                }),
                Err(_) => Err(DispatchError::WorkerLost {
                    batch_seq: self.batch_seq,
                }),
            }
        };

        TaskOutcome {
            task_id: self.id,
            batch_seq: self.batch_seq,
            result,
        }
    }
}

/// Terminal outcome of one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub task_id: u64,
    pub batch_seq: u64,
    pub result: Result<ProcessedBatch, DispatchError>,
}

impl TaskOutcome {
    /// Whether the facility produced a result
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Wait for every task and return one outcome per task, in input order.
///
/// Never fails as a whole: partial failures are reported per task.
pub async fn await_all(tasks: Vec<DispatchTask>) -> Vec<TaskOutcome> {
    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        outcomes.push(task.wait().await);
    }
    outcomes
}
