//! SQLite-backed store using sqlx.

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions, sqlite::SqliteRow},
};

use crate::{
    Error, Result,
    store::JobStore,
    types::{DeferredTask, DueStatus, ExecutionResult, JobDescriptor, TaskCall},
};

/// SQLite-backed persistence for descriptors, due status, results, and
/// deferred tasks.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new store with its own connection pool and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a store using an existing pool. Call [`crate::run_migrations`]
    /// first.
    #[must_use]
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_instant(text: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}

fn task_from_row(row: &SqliteRow) -> Result<DeferredTask> {
    let calls_json: String = row.get("calls");
    let calls: Vec<TaskCall> = serde_json::from_str(&calls_json)?;
    let run_date: String = row.get("run_date");
    let created_at: String = row.get("created_at");
    Ok(DeferredTask {
        id: row.get("id"),
        name: row.get("name"),
        calls,
        run_date: parse_instant(&run_date)?,
        processed: row.get::<i64, _>("processed") != 0,
        failed: row.get::<i64, _>("failed") != 0,
        error_message: row.get("error_message"),
        calls_count: row.get::<i64, _>("calls_count") as usize,
        success_calls: row
            .get::<Option<i64>, _>("success_calls")
            .map(|v| v as usize),
        error_calls: row.get::<Option<i64>, _>("error_calls").map(|v| v as usize),
        elapsed_secs: row.get("elapsed_secs"),
        owner: row.get("owner"),
        created_at: parse_instant(&created_at)?,
    })
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn upsert_descriptor(&self, descriptor: &JobDescriptor) -> Result<()> {
        let data = serde_json::to_string(descriptor)?;
        sqlx::query(
            "INSERT INTO job_descriptors (id, data) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
        )
        .bind(&descriptor.id)
        .bind(&data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_descriptor(&self, id: &str) -> Result<Option<JobDescriptor>> {
        let row = sqlx::query("SELECT data FROM job_descriptors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let data: String = row.get("data");
                Ok(Some(serde_json::from_str(&data)?))
            },
            None => Ok(None),
        }
    }

    async fn list_descriptors(&self) -> Result<Vec<JobDescriptor>> {
        let rows = sqlx::query("SELECT data FROM job_descriptors ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let mut all = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row.get("data");
            all.push(serde_json::from_str(&data)?);
        }
        Ok(all)
    }

    async fn get_status(&self, job_id: &str) -> Result<Option<DueStatus>> {
        let row =
            sqlx::query("SELECT job_id, last_checked, last_run FROM due_status WHERE job_id = ?")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some(row) => {
                let last_checked: String = row.get("last_checked");
                let last_run: Option<String> = row.get("last_run");
                Ok(Some(DueStatus {
                    job_id: row.get("job_id"),
                    last_checked: parse_instant(&last_checked)?,
                    last_run: last_run.as_deref().map(parse_instant).transpose()?,
                }))
            },
            None => Ok(None),
        }
    }

    async fn set_status(&self, status: &DueStatus) -> Result<()> {
        sqlx::query(
            "INSERT INTO due_status (job_id, last_checked, last_run) VALUES (?, ?, ?)
             ON CONFLICT(job_id) DO UPDATE SET
                 last_checked = excluded.last_checked,
                 last_run = excluded.last_run",
        )
        .bind(&status.job_id)
        .bind(status.last_checked.to_rfc3339())
        .bind(status.last_run.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_result(&self, result: &ExecutionResult) -> Result<()> {
        sqlx::query(
            "INSERT INTO execution_results
                 (job_id, result, failed, forced, started_at, finished_at, elapsed_secs, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&result.job_id)
        .bind(&result.result)
        .bind(result.failed as i64)
        .bind(result.forced as i64)
        .bind(result.started_at.to_rfc3339())
        .bind(result.finished_at.to_rfc3339())
        .bind(result.elapsed_secs)
        .bind(result.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_results(&self, limit: usize) -> Result<Vec<ExecutionResult>> {
        let rows = sqlx::query(
            "SELECT job_id, result, failed, forced, started_at, finished_at, elapsed_secs, created_at
             FROM execution_results
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let started_at: String = row.get("started_at");
            let finished_at: String = row.get("finished_at");
            let created_at: String = row.get("created_at");
            results.push(ExecutionResult {
                job_id: row.get("job_id"),
                result: row.get("result"),
                failed: row.get::<i64, _>("failed") != 0,
                forced: row.get::<i64, _>("forced") != 0,
                started_at: parse_instant(&started_at)?,
                finished_at: parse_instant(&finished_at)?,
                elapsed_secs: row.get("elapsed_secs"),
                created_at: parse_instant(&created_at)?,
            });
        }
        Ok(results)
    }

    async fn insert_task(&self, task: &DeferredTask) -> Result<()> {
        let calls = serde_json::to_string(&task.calls)?;
        sqlx::query(
            "INSERT INTO deferred_tasks
                 (id, name, calls, run_date, processed, failed, error_message,
                  calls_count, success_calls, error_calls, elapsed_secs, owner, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&task.name)
        .bind(&calls)
        .bind(task.run_date.to_rfc3339())
        .bind(task.processed as i64)
        .bind(task.failed as i64)
        .bind(&task.error_message)
        .bind(task.calls_count as i64)
        .bind(task.success_calls.map(|v| v as i64))
        .bind(task.error_calls.map(|v| v as i64))
        .bind(task.elapsed_secs)
        .bind(&task.owner)
        .bind(task.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_task(&self, task: &DeferredTask) -> Result<()> {
        let calls = serde_json::to_string(&task.calls)?;
        let updated = sqlx::query(
            "UPDATE deferred_tasks SET
                 name = ?, calls = ?, run_date = ?, processed = ?, failed = ?,
                 error_message = ?, calls_count = ?, success_calls = ?,
                 error_calls = ?, elapsed_secs = ?, owner = ?
             WHERE id = ?",
        )
        .bind(&task.name)
        .bind(&calls)
        .bind(task.run_date.to_rfc3339())
        .bind(task.processed as i64)
        .bind(task.failed as i64)
        .bind(&task.error_message)
        .bind(task.calls_count as i64)
        .bind(task.success_calls.map(|v| v as i64))
        .bind(task.error_calls.map(|v| v as i64))
        .bind(task.elapsed_secs)
        .bind(&task.owner)
        .bind(&task.id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::message(format!("task not found: {}", task.id)));
        }
        Ok(())
    }

    async fn next_due_task(&self, now: DateTime<Utc>) -> Result<Option<DeferredTask>> {
        let row = sqlx::query(
            "SELECT * FROM deferred_tasks
             WHERE processed = 0 AND run_date <= ?
             ORDER BY run_date ASC
             LIMIT 1",
        )
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn pending_task_count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM deferred_tasks WHERE processed = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn prune_results(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM execution_results WHERE created_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected())
    }

    async fn prune_tasks(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM deferred_tasks WHERE created_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected())
    }
}
