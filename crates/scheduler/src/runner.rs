//! Execution of a single recurring job: due check, write-ahead status,
//! failure boundary, result persistence.

use std::{sync::Arc, time::Duration};

use {
    chrono::{DateTime, Utc},
    tracing::{info, warn},
};

use crate::{
    Result,
    due::is_due,
    registry::{RecurringJob, RunContext},
    schedule::next_after,
    store::JobStore,
    types::{DueStatus, ExecutionResult, JobOutcome},
};

/// What one run attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    /// Not due and not forced. Carries the next scheduled instant, when the
    /// schedule has one.
    Skipped {
        job_id: String,
        next_run: Option<DateTime<Utc>>,
    },
    /// The job body executed.
    Ran {
        job_id: String,
        failed: bool,
        forced: bool,
        /// Persisted payload text, or the failure message.
        message: String,
    },
}

/// Runs one job at a time against the store.
pub struct ExecutionRunner {
    store: Arc<dyn JobStore>,
    /// Persist non-silent outcomes as result rows.
    store_results: bool,
    /// Wall-clock budget for a single job body, unlimited when `None`.
    time_limit: Option<Duration>,
}

impl ExecutionRunner {
    #[must_use]
    pub fn new(store: Arc<dyn JobStore>, store_results: bool, time_limit: Option<Duration>) -> Self {
        Self {
            store,
            store_results,
            time_limit,
        }
    }

    /// Evaluate and, when due or forced, execute `job` at `now`.
    ///
    /// Status is written before the body runs: `last_checked` on every
    /// evaluation, `last_run` only when the job will run. A crash inside the
    /// body therefore cannot cause a double execution on the next trigger.
    pub async fn run(
        &self,
        job: &Arc<dyn RecurringJob>,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        let job_id = job.id().to_string();
        let previous = self.store.get_status(&job_id).await?;
        let due = is_due(job.schedule(), previous.as_ref(), now)?;
        let will_run = due || force;

        let status = DueStatus {
            job_id: job_id.clone(),
            last_checked: now,
            last_run: if will_run {
                Some(now)
            } else {
                previous.and_then(|s| s.last_run)
            },
        };
        self.store.set_status(&status).await?;

        if !will_run {
            return Ok(RunReport::Skipped {
                next_run: next_after(job.schedule(), now)?,
                job_id,
            });
        }

        let ctx = RunContext {
            job_id: job_id.clone(),
            forced: force,
            now,
        };
        info!(job_id = %job_id, forced = force, "running job");

        // Timed from the instant this body starts, not from the trigger
        // instant: earlier jobs in the same cycle must not count against it.
        let started_at = Utc::now();
        let outcome = self.run_bounded(job, &ctx).await;
        let finished_at = Utc::now();

        let (failed, message, persist) = match outcome {
            Ok(JobOutcome::Silent) => (false, String::new(), false),
            Ok(JobOutcome::Text { text }) => (false, text, true),
            Ok(JobOutcome::Data { value }) => (false, serde_json::to_string(&value)?, true),
            Ok(JobOutcome::Failed) => (true, String::new(), true),
            Err(e) => (true, e.to_string(), true),
        };

        if failed {
            warn!(job_id = %job_id, message = %message, "job failed");
        }

        if self.store_results && persist {
            let result = ExecutionResult {
                job_id: job_id.clone(),
                result: message.clone(),
                failed,
                forced: force,
                started_at,
                finished_at,
                elapsed_secs: (finished_at - started_at).num_seconds().max(0),
                created_at: finished_at,
            };
            self.store.append_result(&result).await?;
        }

        Ok(RunReport::Ran {
            job_id,
            failed,
            forced: force,
            message,
        })
    }

    async fn run_bounded(
        &self,
        job: &Arc<dyn RecurringJob>,
        ctx: &RunContext,
    ) -> Result<JobOutcome> {
        match self.time_limit {
            Some(limit) => match tokio::time::timeout(limit, job.run(ctx)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(crate::Error::message(format!(
                    "job exceeded time limit of {}s",
                    limit.as_secs()
                ))),
            },
            None => job.run(ctx).await,
        }
    }
}
