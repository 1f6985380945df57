//! Persistent recurring jobs.
//!
//! Each registered [`CronJob`] gets one active record in the store and its
//! own loop that sleeps until the persisted next run time, runs the job,
//! records the outcome and reschedules. Schedules survive restarts because
//! the next run time only ever lives in the store.

pub mod error;
pub mod job;
pub mod manager;
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod types;

#[cfg(test)]
mod testing;

pub use {
    error::{Error, Result},
    job::{CronJob, JobFailure, JobResult},
    manager::Manager,
    runner::{RunOutcome, RunSummary, execute_once},
    scheduler::{LoopState, StopReason, run_job_loop},
    store::RecordStore,
    store_memory::InMemoryStore,
    store_sqlite::SqliteStore,
    types::{JobRecord, NewJobRecord, NewRunRecord, RunRecord},
};

/// Run database migrations for the cron crate.
///
/// This creates the `cron_jobs` and `cron_runs` tables. [`SqliteStore::new`]
/// calls it; embedders sharing a pool call it themselves at startup.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
