//! SQLite-backed record store using sqlx.

use std::{str::FromStr, time::Duration};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    sqlx::{
        Row, SqlitePool,
        sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    },
    tracing::debug,
};

use crate::{
    Error, Result,
    error::Context,
    store::RecordStore,
    types::{JobRecord, NewJobRecord, NewRunRecord, RunRecord, from_millis, to_millis},
};

const JOB_COLUMNS: &str = "id, job_type, created_at_ms, next_run_at_ms, deleted_at_ms";
const RUN_COLUMNS: &str =
    "id, job_id, started_at_ms, ended_at_ms, succeeded, result, error, next_run_at_ms";

/// SQLite-backed persistence for job records and run history.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url` and run
    /// migrations.
    ///
    /// For shared pools use [`SqliteStore::with_pool`] after calling
    /// [`crate::run_migrations`].
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url '{database_url}'"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        crate::run_migrations(&pool).await?;
        debug!(url = database_url, "sqlite record store ready");

        Ok(Self { pool })
    }

    /// Create a store using an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn optional_time(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    row.try_get::<Option<i64>, _>(column)?
        .map(from_millis)
        .transpose()
}

fn job_from_row(row: &SqliteRow) -> Result<JobRecord> {
    Ok(JobRecord {
        id: row.try_get("id")?,
        job_type: row.try_get("job_type")?,
        created_at: from_millis(row.try_get("created_at_ms")?)?,
        next_run_at: optional_time(row, "next_run_at_ms")?,
        deleted_at: optional_time(row, "deleted_at_ms")?,
    })
}

fn run_from_row(row: &SqliteRow) -> Result<RunRecord> {
    Ok(RunRecord {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        started_at: from_millis(row.try_get("started_at_ms")?)?,
        ended_at: optional_time(row, "ended_at_ms")?,
        succeeded: row.try_get("succeeded")?,
        result: row.try_get("result")?,
        error: row.try_get("error")?,
        next_run_at: optional_time(row, "next_run_at_ms")?,
    })
}

/// Map a unique-index violation on `job_type` to the typed error.
fn insert_job_error(err: sqlx::Error, job_type: &str) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::duplicate_job_type(job_type),
        _ => err.into(),
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn find_active_job(&self, job_type: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM cron_jobs
             WHERE deleted_at_ms IS NULL AND job_type = ?
             ORDER BY id
             LIMIT 1"
        ))
        .bind(job_type)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn insert_job(&self, job: &NewJobRecord) -> Result<JobRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO cron_jobs (job_type, created_at_ms, next_run_at_ms)
             VALUES (?, ?, ?)
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(&job.job_type)
        .bind(to_millis(job.created_at))
        .bind(job.next_run_at.map(to_millis))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| insert_job_error(e, &job.job_type))?;

        job_from_row(&row)
    }

    async fn update_job(&self, job: &JobRecord) -> Result<()> {
        let result =
            sqlx::query("UPDATE cron_jobs SET next_run_at_ms = ?, deleted_at_ms = ? WHERE id = ?")
                .bind(job.next_run_at.map(to_millis))
                .bind(job.deleted_at.map(to_millis))
                .bind(job.id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(Error::job_not_found(job.id));
        }
        Ok(())
    }

    async fn insert_run(&self, run: &NewRunRecord) -> Result<RunRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO cron_runs (job_id, started_at_ms)
             VALUES (?, ?)
             RETURNING {RUN_COLUMNS}"
        ))
        .bind(run.job_id)
        .bind(to_millis(run.started_at))
        .fetch_one(&self.pool)
        .await?;

        run_from_row(&row)
    }

    async fn update_run(&self, run: &RunRecord) -> Result<()> {
        let result = sqlx::query(
            "UPDATE cron_runs
             SET ended_at_ms = ?, succeeded = ?, result = ?, error = ?, next_run_at_ms = ?
             WHERE id = ?",
        )
        .bind(run.ended_at.map(to_millis))
        .bind(run.succeeded)
        .bind(&run.result)
        .bind(&run.error)
        .bind(run.next_run_at.map(to_millis))
        .bind(run.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::run_not_found(run.id));
        }
        Ok(())
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM cron_jobs
             WHERE deleted_at_ms IS NULL
             ORDER BY job_type"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn soft_delete_job(&self, job_id: i64, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE cron_jobs SET deleted_at_ms = COALESCE(deleted_at_ms, ?) WHERE id = ?",
        )
        .bind(to_millis(at))
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::job_not_found(job_id));
        }
        Ok(())
    }

    async fn recent_runs(&self, job_id: i64, limit: usize) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM cron_runs
             WHERE job_id = ?
             ORDER BY started_at_ms DESC, id DESC
             LIMIT ?"
        ))
        .bind(job_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut runs = rows.iter().map(run_from_row).collect::<Result<Vec<_>>>()?;
        // Reverse so oldest first (consistent with the in-memory store).
        runs.reverse();
        Ok(runs)
    }
}
