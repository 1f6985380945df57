//! The contract every scheduled job implements.

use std::{fmt, time::Duration};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    serde_json::{Map, Value},
};

/// A job definition supplied by the embedding application.
///
/// The scheduler only ever talks to jobs through this trait; it never looks
/// at concrete job types.
#[async_trait]
pub trait CronJob: Send + Sync {
    /// Unique, stable type name. Used as the key of the persisted job record,
    /// so renaming a job starts a fresh schedule.
    fn job_type(&self) -> &str;

    /// When to run for the very first time, i.e. when no record exists yet.
    fn schedule_first_run(&self) -> DateTime<Utc>;

    /// Spacing applied after a run that did not pick its own next run time.
    fn default_run_interval(&self) -> Duration;

    /// Do the work.
    ///
    /// `Ok(None)` means "succeeded, nothing to report". An error is recorded
    /// on the run and the schedule carries on. To fail and still steer the
    /// schedule, return a [`JobFailure`].
    async fn run(&self) -> anyhow::Result<Option<JobResult>>;

    /// Upper bound for a single run. `None` (the default) lets a run take as
    /// long as it needs, which also blocks this job's schedule meanwhile.
    fn run_timeout(&self) -> Option<Duration> {
        None
    }
}

/// What a run reports back besides success or failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobResult {
    /// Free-form data stored as JSON on the run record when non-empty.
    pub result: Option<Map<String, Value>>,
    /// Overrides the default interval for the next run.
    pub next_run: Option<DateTime<Utc>>,
    /// Terminates the schedule; takes precedence over `next_run`.
    pub never_run_again: bool,
}

impl JobResult {
    #[must_use]
    pub fn payload(result: Map<String, Value>) -> Self {
        Self {
            result: Some(result),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn next_run_at(at: DateTime<Utc>) -> Self {
        Self {
            next_run: Some(at),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn never_again() -> Self {
        Self {
            never_run_again: true,
            ..Self::default()
        }
    }

    /// Add one entry to the payload, creating it if needed.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.result
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_next_run(mut self, at: DateTime<Utc>) -> Self {
        self.next_run = Some(at);
        self
    }

    pub(crate) fn has_payload(&self) -> bool {
        self.result.as_ref().is_some_and(|m| !m.is_empty())
    }
}

/// A job error that still carries a [`JobResult`], e.g. to back off with an
/// explicit next run time after a failure.
///
/// Return it through `anyhow`; the runner downcasts to recover the result.
///
/// ```ignore
/// return Err(JobFailure::new(err, JobResult::next_run_at(retry_at)).into());
/// ```
#[derive(Debug)]
pub struct JobFailure {
    error: anyhow::Error,
    result: JobResult,
}

impl JobFailure {
    pub fn new(error: impl Into<anyhow::Error>, result: JobResult) -> Self {
        Self {
            error: error.into(),
            result,
        }
    }

    #[must_use]
    pub fn result(&self) -> &JobResult {
        &self.result
    }

    pub(crate) fn into_parts(self) -> (anyhow::Error, JobResult) {
        (self.error, self.result)
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

impl std::error::Error for JobFailure {}
