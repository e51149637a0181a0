//! Stream executor running payloads through the pipeline
//!
//! Each payload is decoded, classified and routed:
//!
//! - `view_item` / `add_to_cart` are projected and queued on their
//!   destination writer;
//! - `purchase` values are queued on the aggregation worker;
//! - everything else is counted and dropped.
//!
//! Per-event failures never stop the stream. Decode, classify and project run
//! on up to `parallelism` payloads at once; with a parallelism of 1, rows
//! reach each destination in upstream order.

use super::stats::PipelineStats;
use super::worker::{AggregationHandle, AggregationState, AggregationSummary, AggregationWorker};
use super::engine::TriggeredAggregation;
use crate::classify::classify;
use crate::config::ProcessorConfig;
use crate::decode::decode;
use crate::error::{ProcessorError, ProjectionError, Result, SinkError};
use crate::metrics::PipelineMetrics;
use crate::projection::RecordProjector;
use crate::sink::{Destination, DestinationHandle, DestinationWriter, TableSink, TableTarget, WriterSummary};
use retail_types::EventKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// What happened to a successfully handled payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Projected record queued on a destination writer
    Projected(Destination),
    /// Purchase value queued on the aggregation worker
    Aggregated,
}

/// Final report returned by [`StreamExecutor::shutdown`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownReport {
    pub stats: PipelineStats,
    pub aggregation: AggregationSummary,
    pub item_views: WriterSummary,
    pub add_to_carts: WriterSummary,
    pub aggregates: WriterSummary,
}

/// State shared by the tasks processing payloads
struct Shared {
    projector: RecordProjector,
    aggregation: AggregationHandle,
    item_views: DestinationHandle,
    add_to_carts: DestinationHandle,
    metrics: PipelineMetrics,
}

impl Shared {
    fn writer(&self, destination: Destination) -> Option<&DestinationHandle> {
        match destination {
            Destination::ItemViews => Some(&self.item_views),
            Destination::AddToCarts => Some(&self.add_to_carts),
            Destination::Aggregates => None,
        }
    }

    async fn process(&self, payload: &[u8]) -> Result<Outcome> {
        self.metrics.record_received();

        let event = decode(payload).map_err(|e| {
            self.metrics.record_decode_failure();
            warn!(error = %e, bytes = payload.len(), "Dropping malformed payload");
            e
        })?;

        let kind = classify(&event);
        self.metrics.record_classified(kind);
        trace!(kind = %kind, "Event classified");

        match kind {
            EventKind::View | EventKind::CartAdd => {
                let record = self
                    .projector
                    .project(&event)
                    .map_err(|e| self.projection_failed(kind, e))?;

                let Some((destination, writer)) = Destination::for_kind(kind)
                    .and_then(|d| self.writer(d).map(|w| (d, w)))
                else {
                    return Err(ProcessorError::Unexpected(format!(
                        "no destination for {} events",
                        kind
                    )));
                };

                writer
                    .write(record.to_row())
                    .await
                    .map_err(|e| self.write_refused(destination, e))?;
                Ok(Outcome::Projected(destination))
            }
            EventKind::Purchase => {
                let purchase = self
                    .projector
                    .extract_purchase(&event)
                    .map_err(|e| self.projection_failed(kind, e))?;

                self.aggregation.submit(purchase).await?;
                Ok(Outcome::Aggregated)
            }
            EventKind::Other => {
                self.metrics.record_unclassified();
                let event_type = event.get("event").map(|v| match v.as_str() {
                    Some(name) => name.to_string(),
                    None => v.to_string(),
                });
                debug!(event_type = ?event_type, "Dropping unclassified event");
                Err(ProcessorError::UnclassifiedEvent { event_type })
            }
        }
    }

    fn write_refused(&self, destination: Destination, error: SinkError) -> ProcessorError {
        if error.is_halted() {
            let dropped = self.metrics.record_halted_drop(destination);
            if dropped == 1 {
                warn!(destination = %destination, "Destination halted, dropping its rows from now on");
            } else {
                debug!(destination = %destination, dropped, "Row dropped for halted destination");
            }
        } else {
            error!(destination = %destination, error = %error, "Row not queued");
        }
        error.into()
    }

    fn projection_failed(&self, kind: EventKind, error: ProjectionError) -> ProcessorError {
        self.metrics.record_projection_failure(error.error_type());
        warn!(kind = %kind, error = %error, "Dropping event that failed projection");
        error.into()
    }
}

/// Stream executor for the clickstream pipeline
///
/// Owns the destination writers and the aggregation worker. Must be created
/// inside a tokio runtime.
///
/// # Example
///
/// ```rust,no_run
/// use retail_processor::config::ProcessorConfig;
/// use retail_processor::metrics::PipelineMetrics;
/// use retail_processor::pipeline::StreamExecutor;
/// use retail_processor::sink::InMemoryTableSink;
/// use std::sync::Arc;
///
/// # async fn example() -> retail_processor::error::Result<()> {
/// let sink = InMemoryTableSink::new();
/// let executor = StreamExecutor::new(
///     &ProcessorConfig::default(),
///     Arc::new(sink.clone()),
///     PipelineMetrics::new(),
/// )?;
///
/// executor.process(br#"{"event": "purchase", "user_id": "A",
///     "ecommerce": {"purchase": {"value": 10}}}"#).await?;
///
/// let report = executor.shutdown().await?;
/// println!("{:?}", report.stats);
/// # Ok(())
/// # }
/// ```
pub struct StreamExecutor {
    shared: Arc<Shared>,
    parallelism: usize,
    aggregation_task: JoinHandle<AggregationSummary>,
    writer_tasks: [JoinHandle<WriterSummary>; 3],
}

impl StreamExecutor {
    /// Validate the configuration and start the writers and the worker
    pub fn new(
        config: &ProcessorConfig,
        sink: Arc<dyn TableSink>,
        metrics: PipelineMetrics,
    ) -> Result<Self> {
        config.validate()?;

        let threshold = config.trigger_threshold()?;
        let engine = TriggeredAggregation::new(threshold, config.accumulation_mode)?;
        let [(_, views), (_, carts), (_, aggregates)] = TableTarget::all_from_config(config)?;

        let spawn_writer = |destination, target| {
            DestinationWriter::spawn(
                destination,
                target,
                sink.clone(),
                config.sink.clone(),
                metrics.clone(),
            )
        };
        let (item_views, views_task) = spawn_writer(Destination::ItemViews, views);
        let (add_to_carts, carts_task) = spawn_writer(Destination::AddToCarts, carts);
        let (aggregates, aggregates_task) = spawn_writer(Destination::Aggregates, aggregates);

        let (aggregation, aggregation_task) =
            AggregationWorker::spawn(engine, config.buffer_size, aggregates, metrics.clone());

        info!(
            trigger_count = threshold,
            accumulation_mode = ?config.accumulation_mode,
            parallelism = config.parallelism,
            "Stream executor started"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                projector: RecordProjector::new(),
                aggregation,
                item_views,
                add_to_carts,
                metrics,
            }),
            parallelism: config.parallelism.max(1),
            aggregation_task,
            writer_tasks: [views_task, carts_task, aggregates_task],
        })
    }

    /// Handle one payload end to end
    ///
    /// Returns once the record or purchase value has been queued. Per-event
    /// failures are counted and logged before they are returned.
    pub async fn process(&self, payload: &[u8]) -> Result<Outcome> {
        self.shared.process(payload).await
    }

    /// Process payloads from `rx` until the channel closes
    ///
    /// Waits for every in-flight payload before returning.
    pub async fn run(&self, mut rx: mpsc::Receiver<Vec<u8>>) -> Result<()> {
        info!(parallelism = self.parallelism, "Stream executor running");

        let permits = Arc::new(Semaphore::new(self.parallelism));

        while let Some(payload) = rx.recv().await {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ProcessorError::Execution {
                    source: Box::new(e),
                })?;

            let shared = self.shared.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = shared.process(&payload).await {
                    if !e.is_per_event() {
                        error!(error = %e, error_type = e.error_type(), "Failed to process payload");
                    }
                }
            });
        }

        debug!("Input channel closed, waiting for in-flight payloads");
        let all = u32::try_from(self.parallelism).map_err(|_| {
            ProcessorError::configuration(format!(
                "parallelism {} exceeds {}",
                self.parallelism,
                u32::MAX
            ))
        })?;
        let _drained = permits
            .acquire_many(all)
            .await
            .map_err(|e| ProcessorError::Execution {
                source: Box::new(e),
            })?;

        info!("Stream executor input drained");
        Ok(())
    }

    /// Current aggregation state, after every purchase queued so far
    pub async fn aggregation_state(&self) -> Result<AggregationState> {
        Ok(self.shared.aggregation.state().await?)
    }

    /// Whether the writer of `destination` halted
    pub fn is_halted(&self, destination: Destination) -> bool {
        match self.shared.writer(destination) {
            Some(writer) => writer.is_halted(),
            None => false,
        }
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.shared.metrics
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats::from_metrics(&self.shared.metrics)
    }

    /// Drain the aggregation queue and the writers, then stop
    pub async fn shutdown(self) -> Result<ShutdownReport> {
        info!("Shutting down stream executor");

        let metrics = self.shared.metrics.clone();
        drop(self.shared);

        let aggregation = join("aggregation worker", self.aggregation_task).await?;

        let [views_task, carts_task, aggregates_task] = self.writer_tasks;
        let (item_views, add_to_carts, aggregates) = futures::future::try_join3(
            join("item_views writer", views_task),
            join("add_to_carts writer", carts_task),
            join("aggregates writer", aggregates_task),
        )
        .await?;

        let report = ShutdownReport {
            stats: PipelineStats::from_metrics(&metrics),
            aggregation,
            item_views,
            add_to_carts,
            aggregates,
        };

        info!(
            events_received = report.stats.events_received,
            events_dropped = report.stats.events_dropped(),
            purchases_merged = report.stats.purchases_merged,
            trigger_firings = report.stats.trigger_firings,
            rows_written = report.stats.rows_written,
            "Stream executor stopped"
        );

        Ok(report)
    }
}

async fn join<T>(task: &'static str, handle: JoinHandle<T>) -> Result<T> {
    handle.await.map_err(|e| ProcessorError::Execution {
        source: format!("{} failed: {}", task, e).into(),
    })
}

impl std::fmt::Debug for StreamExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamExecutor")
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::InMemoryTableSink;

    fn executor(trigger_count: u64) -> (StreamExecutor, InMemoryTableSink) {
        let config = ProcessorConfig {
            trigger_count: Some(trigger_count),
            parallelism: 1,
            ..ProcessorConfig::default()
        };
        let sink = InMemoryTableSink::new();
        let executor =
            StreamExecutor::new(&config, Arc::new(sink.clone()), PipelineMetrics::new()).unwrap();
        (executor, sink)
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let (executor, _) = executor(10);

        let err = executor.process(b"not json").await.unwrap_err();
        assert!(matches!(err, ProcessorError::Decode(_)));
        assert_eq!(executor.stats().decode_failures, 1);
    }

    #[tokio::test]
    async fn test_unclassified_event_is_counted() {
        let (executor, sink) = executor(10);

        let err = executor
            .process(br#"{"event": "page_view", "user_id": "A"}"#)
            .await
            .unwrap_err();
        match err {
            ProcessorError::UnclassifiedEvent { event_type } => {
                assert_eq!(event_type.as_deref(), Some("page_view"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let report = executor.shutdown().await.unwrap();
        assert_eq!(report.stats.unclassified, 1);
        assert!(sink.tables().is_empty());
    }

    #[tokio::test]
    async fn test_purchase_is_aggregated() {
        let (executor, _) = executor(10);

        let outcome = executor
            .process(br#"{"event": "purchase", "user_id": "A", "ecommerce": {"purchase": {"value": 12.5}}}"#)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Aggregated);

        let state = executor.aggregation_state().await.unwrap();
        assert_eq!(state.element_count, 1);
        assert_eq!(state.firings, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = ProcessorConfig {
            trigger_count: None,
            ..ProcessorConfig::default()
        };
        let result = StreamExecutor::new(
            &config,
            Arc::new(InMemoryTableSink::new()),
            PipelineMetrics::new(),
        );
        assert!(matches!(result, Err(ProcessorError::Configuration { .. })));
    }
}
