//! Persistence trait for job and run records.

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

use crate::{
    Result,
    types::{JobRecord, NewJobRecord, NewRunRecord, RunRecord},
};

/// Durable storage shared by every scheduler loop.
///
/// Each loop only touches rows of its own job type, but implementations must
/// still accept concurrent writers to different rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The non-deleted record for `job_type`, if any.
    async fn find_active_job(&self, job_type: &str) -> Result<Option<JobRecord>>;
    async fn insert_job(&self, job: &NewJobRecord) -> Result<JobRecord>;
    async fn update_job(&self, job: &JobRecord) -> Result<()>;
    async fn insert_run(&self, run: &NewRunRecord) -> Result<RunRecord>;
    async fn update_run(&self, run: &RunRecord) -> Result<()>;

    /// Active job records ordered by type.
    async fn list_jobs(&self) -> Result<Vec<JobRecord>>;
    /// Hide a job record from lookups without dropping its history.
    async fn soft_delete_job(&self, job_id: i64, at: DateTime<Utc>) -> Result<()>;
    /// The `limit` most recent runs of a job, oldest first.
    async fn recent_runs(&self, job_id: i64, limit: usize) -> Result<Vec<RunRecord>>;
}
