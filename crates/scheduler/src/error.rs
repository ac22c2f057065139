use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    ChronoParse(#[from] chrono::ParseError),

    #[error("invalid schedule '{expression}': {detail}")]
    Schedule { expression: String, detail: String },

    #[error("job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error("task already processed: {task_id}")]
    AlreadyProcessed { task_id: String },

    #[error("no handler registered for {target_type}.{operation}")]
    UnknownOperation {
        target_type: String,
        operation: String,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn schedule(expression: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Schedule {
            expression: expression.into(),
            detail: detail.to_string(),
        }
    }

    #[must_use]
    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        Self::JobNotFound {
            job_id: job_id.into(),
        }
    }

    #[must_use]
    pub fn already_processed(task_id: impl Into<String>) -> Self {
        Self::AlreadyProcessed {
            task_id: task_id.into(),
        }
    }

    #[must_use]
    pub fn unknown_operation(
        target_type: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self::UnknownOperation {
            target_type: target_type.into(),
            operation: operation.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
