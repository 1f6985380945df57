//! Built-in job that records a run on a fixed interval.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    cronkeeper_config::HeartbeatJobConfig,
    cronkeeper_cron::{CronJob, JobResult},
    tracing::debug,
};

pub const JOB_TYPE: &str = "heartbeat";

pub struct HeartbeatJob {
    interval: Duration,
    started: Instant,
    beats: AtomicU64,
}

impl HeartbeatJob {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            started: Instant::now(),
            beats: AtomicU64::new(0),
        }
    }

    /// `None` when the heartbeat is disabled.
    pub fn from_config(config: &HeartbeatJobConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(Duration::from_secs(config.interval_secs.max(1))))
    }
}

#[async_trait]
impl CronJob for HeartbeatJob {
    fn job_type(&self) -> &str {
        JOB_TYPE
    }

    fn schedule_first_run(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn default_run_interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> anyhow::Result<Option<JobResult>> {
        let beat = self.beats.fetch_add(1, Ordering::Relaxed) + 1;
        let uptime_secs = self.started.elapsed().as_secs();
        debug!(beat, uptime_secs, "heartbeat");
        Ok(Some(
            JobResult::default()
                .with_entry("beat", beat)
                .with_entry("uptime_secs", uptime_secs)
                .with_entry("version", env!("CARGO_PKG_VERSION")),
        ))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_yields_no_job() {
        let config = HeartbeatJobConfig {
            enabled: false,
            interval_secs: 60,
        };
        assert!(HeartbeatJob::from_config(&config).is_none());
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = HeartbeatJobConfig {
            enabled: true,
            interval_secs: 0,
        };
        let job = HeartbeatJob::from_config(&config).unwrap();
        assert_eq!(job.default_run_interval(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_beats_are_counted() {
        let job = HeartbeatJob::new(Duration::from_secs(60));
        job.run().await.unwrap();
        let second = job.run().await.unwrap().unwrap();

        let payload = second.result.unwrap();
        assert_eq!(payload["beat"], 2);
        assert!(payload.contains_key("uptime_secs"));
        assert!(second.next_run.is_none());
        assert!(!second.never_run_again);
    }
}
