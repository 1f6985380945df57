//! Metric name and label definitions.
//!
//! Centralizing these keeps the names consistent between the scheduler core
//! and whatever exporter the binary installs.

/// Scheduler metrics
pub mod cron {
    /// Number of job definitions registered with the manager
    pub const JOBS_REGISTERED: &str = "cronkeeper_cron_jobs_registered";
    /// Number of scheduler loops currently alive
    pub const LOOPS_ACTIVE: &str = "cronkeeper_cron_loops_active";
    /// Total job executions
    pub const EXECUTIONS_TOTAL: &str = "cronkeeper_cron_executions_total";
    /// Job execution duration in seconds
    pub const EXECUTION_DURATION_SECONDS: &str = "cronkeeper_cron_execution_duration_seconds";
    /// Executions whose job returned an error (recorded, not fatal)
    pub const ERRORS_TOTAL: &str = "cronkeeper_cron_errors_total";
    /// Executions cut short by an opt-in run timeout
    pub const TIMEOUTS_TOTAL: &str = "cronkeeper_cron_timeouts_total";
    /// Storage failures that stopped a scheduler loop
    pub const STORE_ERRORS_TOTAL: &str = "cronkeeper_cron_store_errors_total";
    /// Delay between the scheduled time and the actual start, in seconds
    pub const START_LATENCY_SECONDS: &str = "cronkeeper_cron_start_latency_seconds";
}

/// Common label keys
pub mod labels {
    pub const JOB_TYPE: &str = "job_type";
}

/// Standard histogram buckets
pub mod buckets {
    /// Job duration buckets (in seconds), 10ms to 1 hour
    pub const JOB_DURATION: &[f64] = &[
        0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0,
    ];

    /// Start latency buckets (in seconds), 1ms to 1 minute
    pub const START_LATENCY: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0];
}
