//! Job registry and lifecycle: one independent loop per registered job type.

use std::{collections::HashMap, sync::Arc};

use {
    tokio::task::JoinSet,
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

#[cfg(feature = "metrics")]
use cronkeeper_metrics::{counter, cron as cron_metrics, gauge, labels};

use crate::{
    Result,
    job::CronJob,
    scheduler::{StopReason, run_job_loop},
    store::RecordStore,
    types::{JobRecord, RunRecord},
};

/// Owns the store handle and the registered jobs.
///
/// Registration needs `&mut self` while [`Manager::run`] borrows `&self`, so
/// jobs cannot be added once the loops are running.
pub struct Manager {
    store: Arc<dyn RecordStore>,
    jobs: Vec<Arc<dyn CronJob>>,
}

impl Manager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            jobs: Vec::new(),
        }
    }

    /// Add jobs in order. A job whose type is already registered is skipped
    /// with a warning.
    pub fn register<I>(&mut self, jobs: I)
    where
        I: IntoIterator<Item = Arc<dyn CronJob>>,
    {
        for job in jobs {
            self.register_job(job);
        }
    }

    /// Add a single job. Returns `false` if its type was already taken.
    pub fn register_job(&mut self, job: Arc<dyn CronJob>) -> bool {
        let job_type = job.job_type();
        if self.jobs.iter().any(|j| j.job_type() == job_type) {
            warn!(job_type, "cron job type already registered, ignoring");
            return false;
        }
        info!(job_type, "registered cron job");
        self.jobs.push(job);
        true
    }

    /// Registered job types in registration order.
    pub fn job_types(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.job_type()).collect()
    }

    /// Run every registered job until `cancel` fires or every loop has
    /// stopped on its own. A failing loop is logged and does not affect the
    /// others.
    pub async fn run(&self, cancel: CancellationToken) {
        if self.jobs.is_empty() {
            info!("no cron jobs registered");
            return;
        }

        #[cfg(feature = "metrics")]
        gauge!(cron_metrics::JOBS_REGISTERED).set(self.jobs.len() as f64);

        // Dropping the set aborts every loop, so none outlive this future.
        let mut loops = JoinSet::new();
        let mut job_types = HashMap::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let store = Arc::clone(&self.store);
            let job = Arc::clone(job);
            let cancel = cancel.clone();
            let job_type = job.job_type().to_string();
            let handle = loops.spawn(async move {
                #[cfg(feature = "metrics")]
                let _active = ActiveLoop::enter();
                run_job_loop(store.as_ref(), job.as_ref(), &cancel).await
            });
            job_types.insert(handle.id(), job_type);
        }
        info!(count = self.jobs.len(), "cron manager started");

        while let Some(joined) = loops.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, Ok(outcome)),
                Err(e) => (e.id(), Err(e)),
            };
            let job_type = job_types.remove(&id).unwrap_or_default();
            match outcome {
                Ok(Ok(StopReason::Cancelled)) => info!(job_type, "cron loop stopped"),
                Ok(Ok(StopReason::ScheduleExhausted)) => {
                    info!(job_type, "cron loop finished, no further runs scheduled")
                },
                Ok(Err(e)) => {
                    error!(job_type, error = %e, "cron job manager error");
                    #[cfg(feature = "metrics")]
                    counter!(cron_metrics::STORE_ERRORS_TOTAL, labels::JOB_TYPE => job_type)
                        .increment(1);
                },
                Err(e) => error!(job_type, error = %e, "cron loop panicked"),
            }
        }
        info!("cron manager stopped");
    }

    /// Up to `limit` most recent runs of the active record for `job_type`,
    /// oldest first. Empty when the type has no active record.
    pub async fn recent_runs(&self, job_type: &str, limit: usize) -> Result<Vec<RunRecord>> {
        match self.store.find_active_job(job_type).await? {
            Some(job) => self.store.recent_runs(job.id, limit).await,
            None => Ok(Vec::new()),
        }
    }

    /// Active job records, sorted by type.
    pub async fn jobs(&self) -> Result<Vec<JobRecord>> {
        self.store.list_jobs().await
    }
}

/// Keeps the active-loop gauge right however the loop task ends.
#[cfg(feature = "metrics")]
struct ActiveLoop;

#[cfg(feature = "metrics")]
impl ActiveLoop {
    fn enter() -> Self {
        gauge!(cron_metrics::LOOPS_ACTIVE).increment(1.0);
        Self
    }
}

#[cfg(feature = "metrics")]
impl Drop for ActiveLoop {
    fn drop(&mut self) {
        gauge!(cron_metrics::LOOPS_ACTIVE).decrement(1.0);
    }
}
