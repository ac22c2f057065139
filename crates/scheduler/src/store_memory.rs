//! In-memory store for testing.

use std::{collections::HashMap, sync::Mutex};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

use crate::{
    Result,
    store::JobStore,
    types::{DeferredTask, DueStatus, ExecutionResult, JobDescriptor},
};

/// In-memory store backed by `HashMap`. No persistence, for tests only.
#[derive(Default)]
pub struct InMemoryStore {
    descriptors: Mutex<HashMap<String, JobDescriptor>>,
    statuses: Mutex<HashMap<String, DueStatus>>,
    results: Mutex<Vec<ExecutionResult>>,
    tasks: Mutex<HashMap<String, DeferredTask>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn upsert_descriptor(&self, descriptor: &JobDescriptor) -> Result<()> {
        let mut map = self.descriptors.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(descriptor.id.clone(), descriptor.clone());
        Ok(())
    }

    async fn get_descriptor(&self, id: &str) -> Result<Option<JobDescriptor>> {
        let map = self.descriptors.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(id).cloned())
    }

    async fn list_descriptors(&self) -> Result<Vec<JobDescriptor>> {
        let map = self.descriptors.lock().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<_> = map.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn get_status(&self, job_id: &str) -> Result<Option<DueStatus>> {
        let map = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(job_id).cloned())
    }

    async fn set_status(&self, status: &DueStatus) -> Result<()> {
        let mut map = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(status.job_id.clone(), status.clone());
        Ok(())
    }

    async fn append_result(&self, result: &ExecutionResult) -> Result<()> {
        let mut rows = self.results.lock().unwrap_or_else(|e| e.into_inner());
        rows.push(result.clone());
        Ok(())
    }

    async fn recent_results(&self, limit: usize) -> Result<Vec<ExecutionResult>> {
        let rows = self.results.lock().unwrap_or_else(|e| e.into_inner());
        let mut recent: Vec<_> = rows.iter().rev().take(limit).cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(recent)
    }

    async fn insert_task(&self, task: &DeferredTask) -> Result<()> {
        let mut map = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn update_task(&self, task: &DeferredTask) -> Result<()> {
        let mut map = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if !map.contains_key(&task.id) {
            return Err(crate::Error::message(format!(
                "task not found: {}",
                task.id
            )));
        }
        map.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn next_due_task(&self, now: DateTime<Utc>) -> Result<Option<DeferredTask>> {
        let map = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map
            .values()
            .filter(|t| !t.processed && t.run_date <= now)
            .min_by_key(|t| t.run_date)
            .cloned())
    }

    async fn pending_task_count(&self) -> Result<u64> {
        let map = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.values().filter(|t| !t.processed).count() as u64)
    }

    async fn prune_results(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut rows = self.results.lock().unwrap_or_else(|e| e.into_inner());
        let before = rows.len();
        rows.retain(|r| r.created_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    async fn prune_tasks(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut map = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let before = map.len();
        map.retain(|_, t| t.created_at >= cutoff);
        Ok((before - map.len()) as u64)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, chrono::Duration};

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn make_task(id: &str, run_date: DateTime<Utc>) -> DeferredTask {
        let mut t = DeferredTask::new(run_date);
        t.id = id.into();
        t
    }

    #[tokio::test]
    async fn test_status_roundtrip() {
        let store = InMemoryStore::new();
        assert!(store.get_status("j").await.unwrap().is_none());

        let status = DueStatus {
            job_id: "j".into(),
            last_checked: at("2026-03-01T10:00:00Z"),
            last_run: None,
        };
        store.set_status(&status).await.unwrap();
        assert_eq!(store.get_status("j").await.unwrap(), Some(status));
    }

    #[tokio::test]
    async fn test_next_due_task_picks_earliest() {
        let store = InMemoryStore::new();
        let now = at("2026-03-01T10:00:00Z");
        store
            .insert_task(&make_task("late", now - Duration::minutes(1)))
            .await
            .unwrap();
        store
            .insert_task(&make_task("early", now - Duration::minutes(10)))
            .await
            .unwrap();
        store
            .insert_task(&make_task("future", now + Duration::minutes(5)))
            .await
            .unwrap();

        let next = store.next_due_task(now).await.unwrap().unwrap();
        assert_eq!(next.id, "early");
    }

    #[tokio::test]
    async fn test_processed_tasks_not_eligible() {
        let store = InMemoryStore::new();
        let now = at("2026-03-01T10:00:00Z");
        let mut task = make_task("t", now - Duration::minutes(1));
        task.processed = true;
        store.insert_task(&task).await.unwrap();
        assert!(store.next_due_task(now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_results() {
        let store = InMemoryStore::new();
        let old = at("2025-01-01T00:00:00Z");
        let fresh = at("2026-03-01T00:00:00Z");
        for created_at in [old, fresh] {
            store
                .append_result(&ExecutionResult {
                    job_id: "j".into(),
                    result: String::new(),
                    failed: false,
                    forced: false,
                    started_at: created_at,
                    finished_at: created_at,
                    elapsed_secs: 0,
                    created_at,
                })
                .await
                .unwrap();
        }
        let removed = store.prune_results(at("2026-01-01T00:00:00Z")).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.recent_results(10).await.unwrap().len(), 1);
    }
}
