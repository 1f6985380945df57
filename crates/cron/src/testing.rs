//! Scripted jobs and a failure-injecting store for scheduler tests.

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    tokio::sync::Notify,
};

use crate::{
    Error, Result,
    job::{CronJob, JobResult},
    store::RecordStore,
    store_memory::InMemoryStore,
    types::{JobRecord, NewJobRecord, NewRunRecord, RunRecord},
};

pub(crate) type Step = anyhow::Result<Option<JobResult>>;

/// Replays `steps` in order, then reports never-run-again unless `forever`.
pub(crate) struct ScriptedJob {
    job_type: String,
    first_run: DateTime<Utc>,
    interval: Duration,
    steps: Mutex<VecDeque<Step>>,
    delay: Duration,
    forever: bool,
    calls: AtomicUsize,
    /// Notified each time `run` is entered.
    pub(crate) started: Notify,
}

impl ScriptedJob {
    pub(crate) fn new(job_type: &str, first_run: DateTime<Utc>) -> Self {
        Self {
            job_type: job_type.into(),
            first_run,
            interval: Duration::from_secs(3600),
            steps: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            forever: false,
            calls: AtomicUsize::new(0),
            started: Notify::new(),
        }
    }

    pub(crate) fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Once the script is exhausted, keep succeeding on the default interval.
    pub(crate) fn forever(mut self) -> Self {
        self.forever = true;
        self
    }

    pub(crate) fn then(self, step: Step) -> Self {
        self.steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(step);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CronJob for ScriptedJob {
    fn job_type(&self) -> &str {
        &self.job_type
    }

    fn schedule_first_run(&self) -> DateTime<Utc> {
        self.first_run
    }

    fn default_run_interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> anyhow::Result<Option<JobResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let step = self
            .steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        step.unwrap_or_else(|| {
            if self.forever {
                Ok(None)
            } else {
                Ok(Some(JobResult::never_again()))
            }
        })
    }
}

/// Wraps [`InMemoryStore`] and fails selected operations.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: InMemoryStore,
    /// `insert_job` fails for this type.
    pub(crate) reject_job_type: Option<String>,
    pub(crate) fail_update_run: AtomicBool,
}

fn injected() -> Error {
    Error::message("injected storage failure")
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn find_active_job(&self, job_type: &str) -> Result<Option<JobRecord>> {
        self.inner.find_active_job(job_type).await
    }

    async fn insert_job(&self, job: &NewJobRecord) -> Result<JobRecord> {
        if self.reject_job_type.as_deref() == Some(job.job_type.as_str()) {
            return Err(injected());
        }
        self.inner.insert_job(job).await
    }

    async fn update_job(&self, job: &JobRecord) -> Result<()> {
        self.inner.update_job(job).await
    }

    async fn insert_run(&self, run: &NewRunRecord) -> Result<RunRecord> {
        self.inner.insert_run(run).await
    }

    async fn update_run(&self, run: &RunRecord) -> Result<()> {
        if self.fail_update_run.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.update_run(run).await
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        self.inner.list_jobs().await
    }

    async fn soft_delete_job(&self, job_id: i64, at: DateTime<Utc>) -> Result<()> {
        self.inner.soft_delete_job(job_id, at).await
    }

    async fn recent_runs(&self, job_id: i64, limit: usize) -> Result<Vec<RunRecord>> {
        self.inner.recent_runs(job_id, limit).await
    }
}
