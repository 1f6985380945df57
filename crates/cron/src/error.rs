use std::fmt::Display;

use thiserror::Error;

/// Storage-side failures. These are the only errors that stop a scheduler
/// loop; job failures are recorded on the run instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("job not found: {job_id}")]
    JobNotFound { job_id: i64 },

    #[error("run not found: {run_id}")]
    RunNotFound { run_id: i64 },

    #[error("job type already has an active record: {job_type}")]
    DuplicateJobType { job_type: String },

    #[error("timestamp out of range: {millis}ms")]
    InvalidTimestamp { millis: i64 },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn job_not_found(job_id: i64) -> Self {
        Self::JobNotFound { job_id }
    }

    #[must_use]
    pub fn run_not_found(run_id: i64) -> Self {
        Self::RunNotFound { run_id }
    }

    #[must_use]
    pub fn duplicate_job_type(job_type: impl Into<String>) -> Self {
        Self::DuplicateJobType {
            job_type: job_type.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Prefix a foreign error with what was being attempted, turning it into
/// [`Error::Message`].
pub trait Context<T> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display,
        F: FnOnce() -> C;
}

impl<T, E: Display> Context<T> for std::result::Result<T, E> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display,
        F: FnOnce() -> C,
    {
        self.map_err(|source| Error::message(format!("{}: {source}", f())))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_context_prefixes_source() {
        let err = "nope"
            .parse::<u32>()
            .with_context(|| "parsing interval")
            .unwrap_err();
        assert!(matches!(&err, Error::Message { message } if message.starts_with("parsing interval: ")));
    }

    #[test]
    fn test_with_context_is_lazy_on_success() {
        let value = "7"
            .parse::<u32>()
            .with_context(|| -> String { panic!("context built for an Ok value") })
            .unwrap();
        assert_eq!(value, 7);
    }
}
