//! In-memory store for tests and embedders that do not need durability.

use std::{collections::BTreeMap, sync::Mutex};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

use crate::{
    Error, Result,
    store::RecordStore,
    types::{JobRecord, NewJobRecord, NewRunRecord, RunRecord},
};

#[derive(Default)]
struct Tables {
    jobs: BTreeMap<i64, JobRecord>,
    runs: BTreeMap<i64, RunRecord>,
    next_job_id: i64,
    next_run_id: i64,
}

/// `BTreeMap`-backed store. Ids are assigned sequentially from 1.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every job record, soft-deleted ones included.
    pub fn all_jobs(&self) -> Vec<JobRecord> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.jobs.values().cloned().collect()
    }

    /// Every run record in insertion order.
    pub fn all_runs(&self) -> Vec<RunRecord> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.runs.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn find_active_job(&self, job_type: &str) -> Result<Option<JobRecord>> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tables
            .jobs
            .values()
            .find(|j| j.is_active() && j.job_type == job_type)
            .cloned())
    }

    async fn insert_job(&self, job: &NewJobRecord) -> Result<JobRecord> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        if tables
            .jobs
            .values()
            .any(|j| j.is_active() && j.job_type == job.job_type)
        {
            return Err(Error::duplicate_job_type(&job.job_type));
        }

        tables.next_job_id += 1;
        let record = JobRecord {
            id: tables.next_job_id,
            job_type: job.job_type.clone(),
            created_at: job.created_at,
            next_run_at: job.next_run_at,
            deleted_at: None,
        };
        tables.jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_job(&self, job: &JobRecord) -> Result<()> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let stored = tables
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| Error::job_not_found(job.id))?;
        // Only the schedule is mutable; type and creation time stay fixed.
        stored.next_run_at = job.next_run_at;
        stored.deleted_at = job.deleted_at;
        Ok(())
    }

    async fn insert_run(&self, run: &NewRunRecord) -> Result<RunRecord> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        if !tables.jobs.contains_key(&run.job_id) {
            return Err(Error::job_not_found(run.job_id));
        }

        tables.next_run_id += 1;
        let record = RunRecord {
            id: tables.next_run_id,
            job_id: run.job_id,
            started_at: run.started_at,
            ended_at: None,
            succeeded: None,
            result: None,
            error: None,
            next_run_at: None,
        };
        tables.runs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_run(&self, run: &RunRecord) -> Result<()> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let stored = tables
            .runs
            .get_mut(&run.id)
            .ok_or_else(|| Error::run_not_found(run.id))?;
        *stored = RunRecord {
            job_id: stored.job_id,
            started_at: stored.started_at,
            ..run.clone()
        };
        Ok(())
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let mut jobs: Vec<_> = tables
            .jobs
            .values()
            .filter(|j| j.is_active())
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.job_type.cmp(&b.job_type));
        Ok(jobs)
    }

    async fn soft_delete_job(&self, job_id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let stored = tables
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::job_not_found(job_id))?;
        stored.deleted_at.get_or_insert(at);
        Ok(())
    }

    async fn recent_runs(&self, job_id: i64, limit: usize) -> Result<Vec<RunRecord>> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let runs: Vec<_> = tables
            .runs
            .values()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect();
        // Return the most recent `limit` entries.
        let start = runs.len().saturating_sub(limit);
        Ok(runs[start..].to_vec())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeDelta};

    fn new_job(job_type: &str) -> NewJobRecord {
        NewJobRecord {
            job_type: job_type.into(),
            created_at: Utc::now(),
            next_run_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let store = InMemoryStore::new();
        assert!(store.find_active_job("cleanup").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let store = InMemoryStore::new();
        let inserted = store.insert_job(&new_job("cleanup")).await.unwrap();
        assert_eq!(inserted.id, 1);

        let found = store.find_active_job("cleanup").await.unwrap().unwrap();
        assert_eq!(found, inserted);
    }

    #[tokio::test]
    async fn test_duplicate_active_type_rejected() {
        let store = InMemoryStore::new();
        store.insert_job(&new_job("cleanup")).await.unwrap();
        let err = store.insert_job(&new_job("cleanup")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateJobType { .. }));
    }

    #[tokio::test]
    async fn test_soft_deleted_hidden_and_replaceable() {
        let store = InMemoryStore::new();
        let old = store.insert_job(&new_job("cleanup")).await.unwrap();
        store.soft_delete_job(old.id, Utc::now()).await.unwrap();

        assert!(store.find_active_job("cleanup").await.unwrap().is_none());
        assert!(store.list_jobs().await.unwrap().is_empty());

        let fresh = store.insert_job(&new_job("cleanup")).await.unwrap();
        assert_ne!(fresh.id, old.id);
        assert_eq!(store.all_jobs().len(), 2);
    }

    #[tokio::test]
    async fn test_update_job_keeps_identity() {
        let store = InMemoryStore::new();
        let mut job = store.insert_job(&new_job("cleanup")).await.unwrap();
        let created_at = job.created_at;

        job.job_type = "renamed".into();
        job.next_run_at = None;
        store.update_job(&job).await.unwrap();

        let stored = store.find_active_job("cleanup").await.unwrap().unwrap();
        assert_eq!(stored.next_run_at, None);
        assert_eq!(stored.created_at, created_at);
    }

    #[tokio::test]
    async fn test_update_unknown_rows() {
        let store = InMemoryStore::new();
        let mut job = store.insert_job(&new_job("cleanup")).await.unwrap();
        job.id = 99;
        assert!(matches!(
            store.update_job(&job).await,
            Err(Error::JobNotFound { job_id: 99 })
        ));

        let run = RunRecord {
            id: 5,
            job_id: 1,
            started_at: Utc::now(),
            ended_at: None,
            succeeded: None,
            result: None,
            error: None,
            next_run_at: None,
        };
        assert!(matches!(
            store.update_run(&run).await,
            Err(Error::RunNotFound { run_id: 5 })
        ));
    }

    #[tokio::test]
    async fn test_recent_runs_window() {
        let store = InMemoryStore::new();
        let job = store.insert_job(&new_job("cleanup")).await.unwrap();
        let other = store.insert_job(&new_job("report")).await.unwrap();
        let base = Utc::now();

        for i in 0..5 {
            let started_at = base + TimeDelta::seconds(i);
            store
                .insert_run(&NewRunRecord {
                    job_id: job.id,
                    started_at,
                })
                .await
                .unwrap();
        }
        store
            .insert_run(&NewRunRecord {
                job_id: other.id,
                started_at: base,
            })
            .await
            .unwrap();

        let runs = store.recent_runs(job.id, 3).await.unwrap();
        assert_eq!(runs.len(), 3);
        // Should be the last 3, oldest first
        assert_eq!(runs[0].started_at, base + TimeDelta::seconds(2));
        assert_eq!(runs[2].started_at, base + TimeDelta::seconds(4));
    }

    #[tokio::test]
    async fn test_insert_run_requires_job() {
        let store = InMemoryStore::new();
        let err = store
            .insert_run(&NewRunRecord {
                job_id: 1,
                started_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::JobNotFound { job_id: 1 }));
    }
}
