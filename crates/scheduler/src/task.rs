//! Deferred-task queue: eligibility, one-task drain, best-effort processing.

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    tracing::{info, warn},
};

use crate::{
    Error, Result,
    calls::CallRegistry,
    store::JobStore,
    types::DeferredTask,
};

/// Pessimistic error message persisted before any work happens.
const INCOMPLETE_MESSAGE: &str = "task did not complete";

/// Outcome of one drain attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DrainReport {
    /// Nothing eligible; carries the number of unprocessed future tasks.
    NoTask { pending: u64 },
    /// One task was processed.
    Processed {
        task_id: String,
        failed: bool,
        error_message: String,
    },
}

/// Persisted queue of one-off deferred tasks. One task is drained per
/// invocation to bound per-call latency.
pub struct DeferredQueue {
    store: Arc<dyn JobStore>,
    calls: CallRegistry,
}

impl DeferredQueue {
    #[must_use]
    pub fn new(store: Arc<dyn JobStore>, calls: CallRegistry) -> Self {
        Self { store, calls }
    }

    /// Persist a new task. Every call entry must resolve against the call
    /// registry so unknown operations are rejected before they are stored.
    pub async fn enqueue(&self, task: &DeferredTask) -> Result<()> {
        self.calls.validate(task)?;
        self.store.insert_task(task).await
    }

    /// Earliest eligible task (`run_date <= now`, not yet processed).
    pub async fn pop_next(&self, now: DateTime<Utc>) -> Result<Option<DeferredTask>> {
        self.store.next_due_task(now).await
    }

    /// Drain at most one eligible task.
    pub async fn drain_one(&self, now: DateTime<Utc>) -> Result<DrainReport> {
        match self.pop_next(now).await? {
            Some(mut task) => {
                let failed = self.process(&mut task).await?;
                Ok(DrainReport::Processed {
                    task_id: task.id,
                    failed,
                    error_message: task.error_message,
                })
            },
            None => Ok(DrainReport::NoTask {
                pending: self.store.pending_task_count().await?,
            }),
        }
    }

    /// Process a popped task and return its terminal failed flag.
    ///
    /// The task is immediately persisted as processed-and-failed, so a crash
    /// mid-processing leaves it terminally failed instead of eligible for
    /// silent re-pickup. There is no automatic retry.
    pub async fn process(&self, task: &mut DeferredTask) -> Result<bool> {
        if task.processed {
            return Err(Error::already_processed(&task.id));
        }

        task.processed = true;
        task.failed = true;
        task.error_message = INCOMPLETE_MESSAGE.to_string();
        self.store.update_task(task).await?;

        // Timed from here, not from the trigger instant the task was
        // popped with.
        let started = Utc::now();
        let mut success = 0usize;
        let mut errors = 0usize;
        let mut raised: Option<Error> = None;

        // Stop on the first raised failure; remaining entries are abandoned
        // without being marked.
        for call in &task.calls {
            match self.calls.invoke(call) {
                Ok(true) => success += 1,
                Ok(false) => errors += 1,
                Err(e) => {
                    raised = Some(e);
                    break;
                },
            }
        }

        match raised {
            None => {
                task.failed = false;
                task.error_message.clear();
                task.success_calls = Some(success);
                task.error_calls = Some(errors);
            },
            Some(e) => {
                warn!(task_id = %task.id, error = %e, "deferred task aborted");
                task.failed = true;
                task.error_message = e.to_string();
                task.success_calls = Some(success);
                task.error_calls = None;
            },
        }

        let finished = Utc::now();
        task.elapsed_secs = (finished - started).num_seconds().max(0);
        self.store.update_task(task).await?;

        info!(task_id = %task.id, failed = task.failed, "deferred task processed");
        Ok(task.failed)
    }
}
