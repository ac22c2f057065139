//! Trigger-driven job scheduling: cron due detection, a one-at-a-time
//! deferred task queue, and an append-only execution log, all driven by
//! external trigger invocations instead of a resident timer.

pub mod calls;
pub mod due;
pub mod error;
pub mod gate;
pub mod registry;
pub mod runner;
pub mod schedule;
pub mod service;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod task;
pub mod types;

pub use error::{Error, Result};

/// Run database migrations for the scheduler crate.
///
/// Creates the descriptor, status, result and task tables. Call at
/// application startup when using [`store_sqlite::SqliteStore`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
