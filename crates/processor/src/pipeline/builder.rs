//! Stream pipeline builder for fluent configuration
//!
//! [`StreamPipelineBuilder`] collects the configuration, the table sink and
//! the metrics handle, validates them, and yields a [`StreamPipeline`].
//! Starting the pipeline's tasks is a separate step,
//! [`StreamPipeline::create_executor`], which must run inside a tokio runtime.

use crate::config::{AccumulationMode, ProcessorConfig, SinkConfig};
use crate::error::{ProcessorError, Result};
use crate::metrics::{MetricsRegistry, PipelineMetrics};
use crate::pipeline::executor::StreamExecutor;
use crate::sink::{InMemoryTableSink, TableSink};
use std::sync::Arc;

/// Builder for constructing the clickstream pipeline
///
/// # Example
///
/// ```rust
/// use retail_processor::config::AccumulationMode;
/// use retail_processor::pipeline::StreamPipelineBuilder;
///
/// # fn example() -> retail_processor::error::Result<()> {
/// let pipeline = StreamPipelineBuilder::new()
///     .with_name("clickstream")
///     .with_trigger_count(10)
///     .with_accumulation_mode(AccumulationMode::Accumulating)
///     .with_parallelism(4)
///     .build()?;
///
/// assert_eq!(pipeline.name(), "clickstream");
/// # Ok(())
/// # }
/// ```
pub struct StreamPipelineBuilder {
    name: String,
    config: ProcessorConfig,
    sink: Option<Arc<dyn TableSink>>,
    metrics: Option<PipelineMetrics>,
}

impl Default for StreamPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamPipelineBuilder {
    pub fn new() -> Self {
        Self {
            name: "retail-pipeline".to_string(),
            config: ProcessorConfig::default(),
            sink: None,
            metrics: None,
        }
    }

    /// Set the pipeline name, used in logs
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the whole processor configuration
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Fire the aggregation every `count` purchases
    pub fn with_trigger_count(mut self, count: u64) -> Self {
        self.config.trigger_count = Some(count);
        self
    }

    pub fn with_accumulation_mode(mut self, mode: AccumulationMode) -> Self {
        self.config.accumulation_mode = mode;
        self
    }

    /// Set the number of payloads processed concurrently
    ///
    /// A parallelism of 1 keeps rows in upstream order per destination.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.config.parallelism = parallelism;
        self
    }

    /// Set the capacity of the aggregation queue
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.buffer_size = buffer_size;
        self
    }

    pub fn with_sink_config(mut self, sink: SinkConfig) -> Self {
        self.config.sink = sink;
        self
    }

    /// Set the table sink rows are appended to
    ///
    /// Defaults to an [`InMemoryTableSink`].
    pub fn with_sink(mut self, sink: Arc<dyn TableSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use an existing metrics handle
    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register fresh metrics in the global registry
    pub fn with_global_metrics(mut self) -> Self {
        self.metrics = Some(PipelineMetrics::registered(&MetricsRegistry::global()));
        self
    }

    /// Validate the configuration and build the pipeline
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty name, an invalid trigger
    /// count, or an invalid destination or sink setting.
    pub fn build(self) -> Result<StreamPipeline> {
        if self.name.is_empty() {
            return Err(ProcessorError::configuration("pipeline name cannot be empty"));
        }
        self.config.validate()?;

        Ok(StreamPipeline {
            name: self.name,
            config: Arc::new(self.config),
            sink: self
                .sink
                .unwrap_or_else(|| Arc::new(InMemoryTableSink::new())),
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}

/// A validated pipeline, ready to start
#[derive(Clone)]
pub struct StreamPipeline {
    name: String,
    config: Arc<ProcessorConfig>,
    sink: Arc<dyn TableSink>,
    metrics: PipelineMetrics,
}

impl StreamPipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn sink(&self) -> Arc<dyn TableSink> {
        self.sink.clone()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Start the writers and the aggregation worker
    ///
    /// Each executor owns its own aggregation state; the metrics handle is
    /// shared.
    pub fn create_executor(&self) -> Result<StreamExecutor> {
        tracing::info!(pipeline = %self.name, "Creating stream executor");
        StreamExecutor::new(&self.config, self.sink.clone(), self.metrics.clone())
    }
}

impl std::fmt::Debug for StreamPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPipeline")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("sink", &self.sink)
            .finish()
    }
}
