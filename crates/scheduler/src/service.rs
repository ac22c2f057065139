//! Trigger orchestration: the cron cycle, the one-task drain, retention
//! cleaning, all behind the concurrency gate.

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    jobtick_config::SchedulerConfig,
    tracing::{error, info},
};

use crate::{
    Error, Result,
    calls::CallRegistry,
    gate::ConcurrencyGate,
    registry::{JobRegistry, RecurringJob},
    runner::{ExecutionRunner, RunReport},
    store::JobStore,
    task::{DeferredQueue, DrainReport},
    types::{ExecutionResult, TriggerKind},
};

/// The externally-triggered scheduler. Holds the registered jobs, the
/// deferred queue and the store; every operation returns user-readable
/// output lines suitable for a plain-text HTTP response.
pub struct TriggerService {
    store: Arc<dyn JobStore>,
    registry: JobRegistry,
    queue: DeferredQueue,
    runner: ExecutionRunner,
    gate: ConcurrencyGate,
    config: SchedulerConfig,
}

impl TriggerService {
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: JobRegistry,
        calls: CallRegistry,
        config: SchedulerConfig,
    ) -> Self {
        let runner = ExecutionRunner::new(
            Arc::clone(&store),
            config.store_results,
            config.time_limit(),
        );
        let queue = DeferredQueue::new(Arc::clone(&store), calls);
        let gate = ConcurrencyGate::new(config.lock_dir(), config.lock_warn_early);
        Self {
            store,
            registry,
            queue,
            runner,
            gate,
            config,
        }
    }

    /// The deferred-task queue, for hosts that enqueue work directly.
    #[must_use]
    pub fn queue(&self) -> &DeferredQueue {
        &self.queue
    }

    /// Run one full trigger invocation: cron cycle and/or task drain
    /// depending on `kind` (both when `None`), then retention cleaning.
    ///
    /// The whole invocation runs under the concurrency gate; a rejection
    /// aborts it without side effects.
    pub async fn trigger(
        &self,
        kind: Option<TriggerKind>,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        if !self.gate.acquire(kind, now).await? {
            info!(scope = kind.map_or("all", TriggerKind::as_str), "trigger rejected, already running");
            return Ok(vec![
                "Another trigger is already running, try again later".into(),
            ]);
        }

        let outcome = self.run_cycles(kind, now).await;
        self.gate.release(kind).await?;
        outcome
    }

    async fn run_cycles(
        &self,
        kind: Option<TriggerKind>,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut lines = Vec::new();

        if kind.is_none_or(|k| k == TriggerKind::Cron) {
            self.cron_cycle(&mut lines, now).await?;
        }
        if kind.is_none_or(|k| k == TriggerKind::Task) {
            let line = self.drain_line(now).await?;
            lines.push(line);
        }
        if self.config.auto_clean {
            self.clean(&mut lines, now).await?;
        }

        Ok(lines)
    }

    /// Evaluate every registered job, in registration order. A failure in
    /// one job never aborts the others.
    async fn cron_cycle(&self, lines: &mut Vec<String>, now: DateTime<Utc>) -> Result<()> {
        for job in self.registry.iter() {
            let job_id = job.id();
            if self.is_disabled(job).await? {
                lines.push(format!("Job {job_id} is disabled"));
                continue;
            }
            match self.runner.run(job, false, now).await {
                Ok(report) => lines.push(report_line(&report)),
                Err(e) => {
                    error!(job_id, error = %e, "job evaluation failed");
                    lines.push(format!("Job {job_id} could not be evaluated: {e}"));
                },
            }
        }
        Ok(())
    }

    /// A job is disabled when its own capability, the config list, or the
    /// persisted descriptor flag says so.
    async fn is_disabled(&self, job: &Arc<dyn RecurringJob>) -> Result<bool> {
        if job.disabled() || self.config.is_job_disabled(job.id()) {
            return Ok(true);
        }
        Ok(self
            .store
            .get_descriptor(job.id())
            .await?
            .is_some_and(|d| d.disabled))
    }

    /// Run a single job by id, outside the normal cycle. Disabled jobs are
    /// refused unless `force` is set; a forced run also ignores the
    /// schedule.
    pub async fn trigger_manual(
        &self,
        job_id: &str,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let job = self
            .registry
            .get(job_id)
            .ok_or_else(|| Error::job_not_found(job_id))?
            .clone();

        if !force && self.is_disabled(&job).await? {
            return Err(Error::message(format!(
                "job '{job_id}' is disabled, pass force to run it anyway"
            )));
        }

        let report = self.runner.run(&job, force, now).await?;
        Ok(vec![report_line(&report)])
    }

    /// Drain at most one deferred task, without touching the cron cycle.
    pub async fn trigger_next_task(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let line = self.drain_line(now).await?;
        Ok(vec![line])
    }

    async fn drain_line(&self, now: DateTime<Utc>) -> Result<String> {
        Ok(match self.queue.drain_one(now).await? {
            DrainReport::NoTask { pending } => format!(
                "No task ({pending} future tasks, current time is {})",
                now.to_rfc3339()
            ),
            DrainReport::Processed {
                task_id,
                failed: false,
                ..
            } => format!("Task {task_id} processed"),
            DrainReport::Processed {
                task_id,
                error_message,
                ..
            } => format!("Task {task_id} failed: {error_message}"),
        })
    }

    async fn clean(&self, lines: &mut Vec<String>, now: DateTime<Utc>) -> Result<()> {
        let cutoff = now - chrono::Duration::days(i64::from(self.config.auto_clean_days));
        let results = self.store.prune_results(cutoff).await?;
        let tasks = self.store.prune_tasks(cutoff).await?;
        if results + tasks > 0 {
            info!(results, tasks, "pruned old rows");
            lines.push(format!("Cleaned {results} results and {tasks} tasks"));
        }
        Ok(())
    }

    /// Recent execution results, newest first.
    pub async fn recent_results(&self, limit: usize) -> Result<Vec<ExecutionResult>> {
        self.store.recent_results(limit).await
    }

    /// Sync descriptor rows from the registry. Missing rows are created;
    /// existing rows are rewritten only when `update` is set, and the
    /// administrative `disabled` flag always survives. Returns the number
    /// of rows created.
    pub async fn regenerate_descriptors(&self, update: bool) -> Result<usize> {
        let mut created = 0;
        for job in self.registry.iter() {
            match self.store.get_descriptor(job.id()).await? {
                None => {
                    self.store
                        .upsert_descriptor(&JobRegistry::describe(job))
                        .await?;
                    created += 1;
                },
                Some(existing) if update => {
                    let mut descriptor = JobRegistry::describe(job);
                    descriptor.disabled = existing.disabled;
                    self.store.upsert_descriptor(&descriptor).await?;
                },
                Some(_) => {},
            }
        }
        if created > 0 {
            info!(created, "registered new job descriptors");
        }
        Ok(created)
    }
}

fn report_line(report: &RunReport) -> String {
    match report {
        RunReport::Skipped {
            job_id,
            next_run: Some(next),
        } => format!("Job {job_id} will run at {}", next.to_rfc3339()),
        RunReport::Skipped {
            job_id,
            next_run: None,
        } => format!("Job {job_id} has no scheduled run"),
        RunReport::Ran {
            job_id,
            failed: false,
            forced,
            ..
        } => {
            let mut line = format!("Job {job_id} ran successfully");
            if *forced {
                line.push_str(" (forced run)");
            }
            line
        },
        RunReport::Ran {
            job_id, message, ..
        } => {
            if message.is_empty() {
                format!("Job {job_id} failed to run")
            } else {
                format!("Job {job_id} failed to run: {message}")
            }
        },
    }
}
