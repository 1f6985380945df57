//! Per-job control loop.
//!
//! A loop alternates between waiting for the persisted `next_run_at` and
//! running the job once. It stops when the schedule is exhausted (no next
//! run), when the shared cancellation token fires while waiting, or when the
//! store fails. Cancellation never interrupts a run in progress.

use std::time::Duration;

use {
    chrono::Utc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::{
    Result,
    job::CronJob,
    runner::execute_once,
    store::RecordStore,
    types::{JobRecord, NewJobRecord},
};

/// Where a loop is in its cycle. Reported in log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Waiting,
    Running,
    Stopped,
}

/// Why a loop returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shared token was cancelled while waiting.
    Cancelled,
    /// The job record has no next run time.
    ScheduleExhausted,
}

/// Drive `job` until it stops. Only store failures are returned as errors.
pub async fn run_job_loop(
    store: &dyn RecordStore,
    job: &dyn CronJob,
    cancel: &CancellationToken,
) -> Result<StopReason> {
    let job_type = job.job_type();
    let mut record = load_or_create(store, job).await?;

    loop {
        let Some(next_run_at) = record.next_run_at else {
            info!(job_type, job_id = record.id, state = ?LoopState::Stopped, "cron job schedule exhausted");
            return Ok(StopReason::ScheduleExhausted);
        };

        let wait = (next_run_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        debug!(
            job_type,
            state = ?LoopState::Waiting,
            %next_run_at,
            wait_ms = wait.as_millis() as u64,
            "waiting for next run"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(job_type, state = ?LoopState::Stopped, "cron loop cancelled");
                return Ok(StopReason::Cancelled);
            },
            () = tokio::time::sleep(wait) => {},
        }

        debug!(job_type, state = ?LoopState::Running, "cron job due");
        execute_once(store, job, &mut record).await?;
    }
}

/// The active record for the job's type, created on first encounter.
async fn load_or_create(store: &dyn RecordStore, job: &dyn CronJob) -> Result<JobRecord> {
    let job_type = job.job_type();
    if let Some(record) = store.find_active_job(job_type).await? {
        debug!(job_type, job_id = record.id, next_run_at = ?record.next_run_at, "resuming cron job");
        return Ok(record);
    }

    let first_run = job.schedule_first_run();
    let record = store
        .insert_job(&NewJobRecord {
            job_type: job_type.to_string(),
            created_at: Utc::now(),
            next_run_at: Some(first_run),
        })
        .await?;
    info!(job_type, job_id = record.id, %first_run, "registered new cron job");
    Ok(record)
}
