//! Metrics collection and export for cronkeeper.
//!
//! Metric names live in [`definitions`] so every crate records against the
//! same identifiers. Recording goes through the `metrics` crate facade; when
//! no recorder is installed the macros are no-ops.
//!
//! # Features
//!
//! - `prometheus`: install a Prometheus recorder, optionally serving
//!   `/metrics` over HTTP.

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
