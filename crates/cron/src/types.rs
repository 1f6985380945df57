//! Persisted records: one [`JobRecord`] per job type, one [`RunRecord`] per
//! execution attempt.

use {
    chrono::{DateTime, TimeDelta, Utc},
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

/// Persistent identity and schedule state for one job type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: i64,
    pub job_type: String,
    pub created_at: DateTime<Utc>,
    /// `None` means the schedule has terminated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Insert payload for a job type seen for the first time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJobRecord {
    pub job_type: String,
    pub created_at: DateTime<Utc>,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Audit entry for one execution attempt.
///
/// Inserted before the job runs with every outcome field empty, then
/// finalized by exactly one update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: i64,
    pub job_id: i64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<bool>,
    /// JSON-encoded result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Wall-clock time the attempt took, once finished.
    #[must_use]
    pub fn duration(&self) -> Option<TimeDelta> {
        self.ended_at.map(|end| end - self.started_at)
    }

    /// Decode the stored result payload.
    pub fn result_json(&self) -> Result<Option<serde_json::Value>> {
        self.result
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(Error::from)
    }
}

/// Insert payload for a run that is about to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewRunRecord {
    pub job_id: i64,
    pub started_at: DateTime<Utc>,
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or(Error::InvalidTimestamp { millis })
}
