//! Prometheus metrics for the clickstream pipeline
//!
//! Metric names are prefixed with `retail_pipeline_` and follow Prometheus
//! naming conventions; counters carry the `_total` suffix when encoded.

mod labels;
mod pipeline;
mod registry;

pub use labels::{
    DestinationLabels, ErrorLabels, KindLabels, ResultLabel, WriteLabels,
};
pub use pipeline::PipelineMetrics;
pub use registry::{MetricsRegistry, METRICS_PREFIX, METRICS_REGISTRY};

use thiserror::Error;

/// Errors that can occur in the metrics subsystem
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("metric encoding error: {0}")]
    EncodingError(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
