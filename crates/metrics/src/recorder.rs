//! Metrics recorder initialization and configuration.

use std::net::SocketAddr;

use {anyhow::Result, tracing::info};

/// Handle to the metrics system, providing access to exported metrics.
#[derive(Clone, Default)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    /// Render metrics in Prometheus text format.
    ///
    /// Empty when metrics are disabled, or when an HTTP listener owns the
    /// exporter and serves `/metrics` itself.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle
                .as_ref()
                .map(|handle| handle.render())
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
    /// Serve `/metrics` on this address instead of only keeping a handle
    pub listen: Option<SocketAddr>,
    /// Global labels to add to all metrics
    pub global_labels: Vec<(String, String)>,
}

/// Initialize the metrics system.
///
/// Call once at startup. Without the `prometheus` feature every metric is
/// discarded by the facade's no-op recorder.
///
/// # Errors
///
/// Returns an error if the recorder or HTTP listener fails to install.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(MetricsHandle::default());
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = init_prometheus(config)?;
        info!("prometheus metrics exporter initialized");
        Ok(MetricsHandle {
            prometheus_handle: handle,
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = config;
        info!("metrics feature not enabled at compile time");
        Ok(MetricsHandle::default())
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus(
    config: MetricsRecorderConfig,
) -> Result<Option<metrics_exporter_prometheus::PrometheusHandle>> {
    use {
        crate::{buckets, cron},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let mut builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(cron::EXECUTION_DURATION_SECONDS.to_string()),
            buckets::JOB_DURATION,
        )?
        .set_buckets_for_metric(
            Matcher::Full(cron::START_LATENCY_SECONDS.to_string()),
            buckets::START_LATENCY,
        )?;

    for (key, value) in config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    match config.listen {
        Some(addr) => {
            // The listener task is spawned on the current tokio runtime.
            builder.with_http_listener(addr).install()?;
            info!(%addr, "serving prometheus metrics");
            Ok(None)
        },
        None => Ok(Some(builder.install_recorder()?)),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_disabled() {
        let config = MetricsRecorderConfig {
            enabled: false,
            ..Default::default()
        };
        let handle = init_metrics(config).unwrap();
        assert!(handle.render().is_empty());
    }

    #[test]
    fn test_bucket_bounds_are_sorted() {
        for bounds in [crate::buckets::JOB_DURATION, crate::buckets::START_LATENCY] {
            assert!(bounds.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }
}
