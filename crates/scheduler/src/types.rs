//! Core data types for the job scheduling system.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Persisted registry row describing one recurring job implementation.
///
/// Rows are derived from the in-process [`crate::registry::JobRegistry`] and
/// regenerated idempotently at startup; they carry the administrative
/// `disabled` flag and display metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    /// Unique job identifier (implementation name).
    pub id: String,
    /// Cron schedule expression (5-field standard).
    pub schedule: String,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub disabled: bool,
}

/// Per-job due-check bookkeeping.
///
/// `last_checked` advances on every evaluation; `last_run` only when the job
/// actually executed (due or forced). Both are written before the job body
/// runs so a crash mid-execution still advances state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DueStatus {
    pub job_id: String,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
}

/// What a job body hands back when it finishes normally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum JobOutcome {
    /// Nothing to persist; the run still counts as having happened.
    Silent,
    /// Free-form text payload.
    Text { text: String },
    /// Structured payload, serialized to JSON in the result row.
    Data { value: serde_json::Value },
    /// The job reports failure without raising an error.
    Failed,
}

/// One row of the append-only execution log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub job_id: String,
    /// Serialized result payload (JSON text for structured outcomes,
    /// the error message for failures).
    pub result: String,
    pub failed: bool,
    pub forced: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_secs: i64,
    pub created_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// One-line human summary, used by the log listing endpoint.
    #[must_use]
    pub fn status_line(&self) -> String {
        let mut line = format!("Job {}", self.job_id);
        if self.failed {
            line.push_str(" failed to run");
        } else {
            line.push_str(" ran successfully");
        }
        line.push_str(&format!(" at {}", self.created_at.to_rfc3339()));
        if self.forced {
            line.push_str(" (forced run)");
        }
        line
    }
}

/// One entry of a deferred task's call list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskCall {
    pub target_type: String,
    pub target_id: String,
    pub operation: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// A persisted one-off unit of deferred work.
///
/// Becomes eligible once `run_date <= now && !processed`; `processed` is set
/// exactly once at the start of processing and never reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeferredTask {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub calls: Vec<TaskCall>,
    pub run_date: DateTime<Utc>,
    #[serde(default)]
    pub processed: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub error_message: String,
    /// Number of entries in `calls` at the last write.
    #[serde(default)]
    pub calls_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_calls: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_calls: Option<usize>,
    #[serde(default)]
    pub elapsed_secs: i64,
    /// Owning principal, when the task was enqueued on behalf of a member.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DeferredTask {
    /// Create an empty task scheduled to run as soon as possible.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: String::new(),
            calls: Vec::new(),
            run_date: now,
            processed: false,
            failed: false,
            error_message: String::new(),
            calls_count: 0,
            success_calls: None,
            error_calls: None,
            elapsed_secs: 0,
            owner: None,
            created_at: now,
        }
    }

    /// Append one call entry.
    ///
    /// The first appended operation names the task when it has no name yet,
    /// and a member-typed target becomes the owner when none is set.
    pub fn add_to_task(
        &mut self,
        target_type: impl Into<String>,
        target_id: impl Into<String>,
        operation: impl Into<String>,
        arguments: serde_json::Value,
    ) {
        let target_type = target_type.into();
        let target_id = target_id.into();
        let operation = operation.into();

        if self.name.is_empty() {
            self.name = operation.clone();
        }
        if self.owner.is_none() && target_type == "member" {
            self.owner = Some(target_id.clone());
        }

        self.calls.push(TaskCall {
            target_type,
            target_id,
            operation,
            arguments,
        });
        self.calls_count = self.calls.len();
    }
}

/// Which sub-cycle a trigger invocation covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Cron,
    Task,
}

impl TriggerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cron => "cron",
            Self::Task => "task",
        }
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cron" => Ok(Self::Cron),
            "task" => Ok(Self::Task),
            other => Err(crate::Error::message(format!(
                "only 'cron' and 'task' are valid trigger kinds, got '{other}'"
            ))),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-03-01T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_descriptor_roundtrip() {
        let d = JobDescriptor {
            id: "daily-cleanup".into(),
            schedule: "0 4 * * *".into(),
            title: "Daily cleanup".into(),
            category: "system".into(),
            description: String::new(),
            disabled: false,
        };
        let json = serde_json::to_string(&d).unwrap();
        let back: JobDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn test_add_to_task_sets_name_from_first_call() {
        let mut task = DeferredTask::new(now());
        task.add_to_task("member", "42", "regenerate_token", serde_json::json!([]));
        task.add_to_task("order", "7", "cancel", serde_json::json!([]));
        assert_eq!(task.name, "regenerate_token");
        assert_eq!(task.calls_count, 2);
        assert_eq!(task.calls.len(), 2);
    }

    #[test]
    fn test_add_to_task_sets_owner_from_member_target() {
        let mut task = DeferredTask::new(now());
        task.add_to_task("order", "7", "cancel", serde_json::json!([]));
        assert_eq!(task.owner, None);
        task.add_to_task("member", "42", "notify", serde_json::json!([]));
        assert_eq!(task.owner.as_deref(), Some("42"));
    }

    #[test]
    fn test_new_task_runs_asap() {
        let task = DeferredTask::new(now());
        assert_eq!(task.run_date, now());
        assert!(!task.processed);
    }

    #[test]
    fn test_outcome_roundtrip() {
        let o = JobOutcome::Data {
            value: serde_json::json!({"cleaned": 12}),
        };
        let json = serde_json::to_string(&o).unwrap();
        let back: JobOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(o, back);
    }

    #[test]
    fn test_status_line() {
        let r = ExecutionResult {
            job_id: "daily-cleanup".into(),
            result: "done".into(),
            failed: false,
            forced: true,
            started_at: now(),
            finished_at: now(),
            elapsed_secs: 0,
            created_at: now(),
        };
        let line = r.status_line();
        assert!(line.contains("ran successfully"));
        assert!(line.contains("(forced run)"));
    }

    #[test]
    fn test_trigger_kind_parse() {
        assert_eq!("cron".parse::<TriggerKind>().unwrap(), TriggerKind::Cron);
        assert_eq!("task".parse::<TriggerKind>().unwrap(), TriggerKind::Task);
        assert!("both".parse::<TriggerKind>().is_err());
    }
}
