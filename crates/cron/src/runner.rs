//! One execution attempt: record the start, run the job, record the outcome,
//! persist the next run time.

use std::time::Duration;

use {
    chrono::{DateTime, TimeDelta, Utc},
    tracing::{info, warn},
};

#[cfg(feature = "metrics")]
use cronkeeper_metrics::{counter, cron as cron_metrics, histogram, labels};

use crate::{
    Result,
    job::{CronJob, JobFailure, JobResult},
    store::RecordStore,
    types::{JobRecord, NewRunRecord, RunRecord},
};

/// How the job itself fared. Storage failures never show up here; they are
/// returned as errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
    TimedOut,
}

/// The finalized run record plus how it went.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run: RunRecord,
    pub outcome: RunOutcome,
}

/// Run `job` once against its persisted `record`.
///
/// On success `record.next_run_at` mirrors what was written to the store. A
/// job error is stored on the run and does not fail the call; any store
/// error does.
pub async fn execute_once(
    store: &dyn RecordStore,
    job: &dyn CronJob,
    record: &mut JobRecord,
) -> Result<RunSummary> {
    let job_type = job.job_type();
    let mut run = store
        .insert_run(&NewRunRecord {
            job_id: record.id,
            started_at: Utc::now(),
        })
        .await?;

    info!(job_type, job_id = record.id, run_id = run.id, "executing cron job");

    #[cfg(feature = "metrics")]
    {
        counter!(cron_metrics::EXECUTIONS_TOTAL, labels::JOB_TYPE => job_type.to_string())
            .increment(1);
        if let Some(due) = record.next_run_at {
            let late = (run.started_at - due).to_std().unwrap_or_default();
            histogram!(cron_metrics::START_LATENCY_SECONDS, labels::JOB_TYPE => job_type.to_string())
                .record(late.as_secs_f64());
        }
    }

    let (result, error, outcome) = invoke(job).await;
    let ended_at = Utc::now();

    run.ended_at = Some(ended_at);
    run.succeeded = Some(error.is_none());
    if let Some(message) = &error {
        warn!(job_type, run_id = run.id, error = %message, "cron job failed");
        #[cfg(feature = "metrics")]
        counter!(cron_metrics::ERRORS_TOTAL, labels::JOB_TYPE => job_type.to_string())
            .increment(1);
    }
    run.error = error;

    if let Some(payload) = result
        .as_ref()
        .filter(|r| r.has_payload())
        .and_then(|r| r.result.as_ref())
    {
        match serde_json::to_string(payload) {
            Ok(json) => run.result = Some(json),
            Err(e) => {
                warn!(job_type, run_id = run.id, error = %e, "failed to serialize cron job result");
            },
        }
    }

    run.next_run_at = next_run_at(result.as_ref(), ended_at, job.default_run_interval());

    store.update_run(&run).await?;

    let mut updated = record.clone();
    updated.next_run_at = run.next_run_at;
    store.update_job(&updated).await?;
    *record = updated;

    #[cfg(feature = "metrics")]
    {
        if let Some(duration) = run.duration().and_then(|d| d.to_std().ok()) {
            histogram!(cron_metrics::EXECUTION_DURATION_SECONDS, labels::JOB_TYPE => job_type.to_string())
                .record(duration.as_secs_f64());
        }
    }

    info!(
        job_type,
        run_id = run.id,
        outcome = ?outcome,
        duration_ms = run.duration().map(|d| d.num_milliseconds()),
        next_run_at = ?run.next_run_at,
        "cron job finished"
    );

    Ok(RunSummary { run, outcome })
}

/// Call the job, honoring its opt-in timeout, and split the result into the
/// descriptor and the error message to record.
async fn invoke(job: &dyn CronJob) -> (Option<JobResult>, Option<String>, RunOutcome) {
    let returned = match job.run_timeout() {
        Some(limit) => match tokio::time::timeout(limit, job.run()).await {
            Ok(returned) => returned,
            Err(_) => {
                #[cfg(feature = "metrics")]
                counter!(cron_metrics::TIMEOUTS_TOTAL, labels::JOB_TYPE => job.job_type().to_string())
                    .increment(1);
                return (
                    None,
                    Some(format!("timed out after {}", format_limit(limit))),
                    RunOutcome::TimedOut,
                );
            },
        },
        None => job.run().await,
    };

    match returned {
        Ok(result) => (result, None, RunOutcome::Succeeded),
        Err(err) => match err.downcast::<JobFailure>() {
            Ok(failure) => {
                let (err, result) = failure.into_parts();
                (Some(result), Some(format!("{err:#}")), RunOutcome::Failed)
            },
            Err(err) => (None, Some(format!("{err:#}")), RunOutcome::Failed),
        },
    }
}

/// Never-run-again wins, then an explicit time, then the default interval
/// counted from the end of this run.
pub(crate) fn next_run_at(
    result: Option<&JobResult>,
    now: DateTime<Utc>,
    interval: Duration,
) -> Option<DateTime<Utc>> {
    match result {
        Some(r) if r.never_run_again => None,
        Some(JobResult {
            next_run: Some(at), ..
        }) => Some(*at),
        _ => Some(advance(now, interval)),
    }
}

/// `from + interval`, saturating at the latest representable time.
pub(crate) fn advance(from: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(interval)
        .ok()
        .and_then(|delta| from.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn format_limit(limit: Duration) -> String {
    if limit.subsec_nanos() == 0 {
        format!("{}s", limit.as_secs())
    } else {
        format!("{}ms", limit.as_millis())
    }
}
