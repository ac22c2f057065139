//! The recurring-job capability and the in-process job registry.

use std::sync::Arc;

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

use crate::{Result, types::JobDescriptor, types::JobOutcome};

/// Context handed to a job body for one execution.
///
/// Replaces process-wide "current task" tracking: anything a job wants to
/// report about itself goes through this value.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub job_id: String,
    pub forced: bool,
    pub now: DateTime<Utc>,
}

/// A registered unit of recurring work with a cron-style schedule.
#[async_trait]
pub trait RecurringJob: Send + Sync {
    /// Unique identifier, also used as the descriptor row key.
    fn id(&self) -> &str;

    /// Cron schedule expression (5-field standard).
    fn schedule(&self) -> &str;

    fn title(&self) -> String {
        self.id().to_string()
    }

    fn category(&self) -> String {
        "general".to_string()
    }

    fn description(&self) -> String {
        String::new()
    }

    /// A job can declare itself disabled regardless of admin configuration.
    fn disabled(&self) -> bool {
        false
    }

    /// Execute the job. Returning `Err` or [`JobOutcome::Failed`] marks the
    /// run failed; [`JobOutcome::Silent`] runs without persisting a result.
    async fn run(&self, ctx: &RunContext) -> Result<JobOutcome>;
}

/// Ordered collection of registered jobs. Jobs are evaluated and run in
/// registration order.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Vec<Arc<dyn RecurringJob>>,
}

impl JobRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn register(&mut self, job: Arc<dyn RecurringJob>) {
        self.jobs.push(job);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<dyn RecurringJob>> {
        self.jobs.iter().find(|j| j.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn RecurringJob>> {
        self.jobs.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Build the descriptor row for a registered job.
    #[must_use]
    pub fn describe(job: &Arc<dyn RecurringJob>) -> JobDescriptor {
        JobDescriptor {
            id: job.id().to_string(),
            schedule: job.schedule().to_string(),
            title: job.title(),
            category: job.category(),
            description: job.description(),
            disabled: false,
        }
    }
}
