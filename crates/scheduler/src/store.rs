//! Persistence trait for job metadata, due status, results, and tasks.

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

use crate::{
    Result,
    types::{DeferredTask, DueStatus, ExecutionResult, JobDescriptor},
};

/// Persistence backend for the scheduling engine.
///
/// Writes are last-write-wins per key; the engine provides its own
/// cross-invocation exclusion via the concurrency gate.
#[async_trait]
pub trait JobStore: Send + Sync {
    // ── Job descriptors ─────────────────────────────────────────────────
    async fn upsert_descriptor(&self, descriptor: &JobDescriptor) -> Result<()>;
    async fn get_descriptor(&self, id: &str) -> Result<Option<JobDescriptor>>;
    async fn list_descriptors(&self) -> Result<Vec<JobDescriptor>>;

    // ── Due status ──────────────────────────────────────────────────────
    async fn get_status(&self, job_id: &str) -> Result<Option<DueStatus>>;
    async fn set_status(&self, status: &DueStatus) -> Result<()>;

    // ── Execution results (append-only) ─────────────────────────────────
    async fn append_result(&self, result: &ExecutionResult) -> Result<()>;
    /// Most recent results first.
    async fn recent_results(&self, limit: usize) -> Result<Vec<ExecutionResult>>;

    // ── Deferred tasks ──────────────────────────────────────────────────
    async fn insert_task(&self, task: &DeferredTask) -> Result<()>;
    async fn update_task(&self, task: &DeferredTask) -> Result<()>;
    /// Earliest-due unprocessed task with `run_date <= now`, if any.
    async fn next_due_task(&self, now: DateTime<Utc>) -> Result<Option<DeferredTask>>;
    async fn pending_task_count(&self) -> Result<u64>;

    // ── Retention ───────────────────────────────────────────────────────
    /// Delete result rows created before `cutoff`. Returns rows removed.
    async fn prune_results(&self, cutoff: DateTime<Utc>) -> Result<u64>;
    /// Delete task rows created before `cutoff`. Returns rows removed.
    async fn prune_tasks(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
