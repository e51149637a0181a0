//! Kafka-to-Kafka clickstream pipeline
//!
//! Consumes the upstream clickstream topic, runs the pipeline and publishes
//! each destination's rows to its own topic. Ctrl+C stops intake, drains the
//! pipeline and prints the final metrics.
//!
//! Run with:
//!   cargo run --example kafka_pipeline -- config/pipeline.yaml
//!
//! Every setting can be overridden from the environment, for example
//! `RETAIL_PIPELINE_SOURCE__BROKERS=kafka:9092` or
//! `RETAIL_PIPELINE_TRIGGER_COUNT=25`.

use retail_processor::config::ProcessorConfig;
use retail_processor::kafka::{KafkaSinkConfig, KafkaSource, KafkaTableSink};
use retail_processor::metrics::{MetricsRegistry, PipelineMetrics};
use retail_processor::pipeline::StreamPipelineBuilder;
use retail_processor::telemetry::init_logging;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = ProcessorConfig::load(path.as_deref())?;
    init_logging(&config.logging)?;

    info!(
        topic = %config.source.topic,
        brokers = %config.source.brokers,
        trigger_count = ?config.trigger_count,
        "Starting clickstream pipeline"
    );

    let sink = KafkaTableSink::new(KafkaSinkConfig::new(config.source.brokers.clone()))?;
    let metrics = PipelineMetrics::registered(&MetricsRegistry::global());

    let pipeline = StreamPipelineBuilder::new()
        .with_config(config.clone())
        .with_sink(Arc::new(sink))
        .with_metrics(metrics)
        .build()?;
    let executor = pipeline.create_executor()?;

    let source = Arc::new(KafkaSource::new(config.source.clone())?);
    let (tx, rx) = mpsc::channel(config.buffer_size);

    let consumer = {
        let source = source.clone();
        tokio::spawn(async move {
            if let Err(e) = source.start(tx).await {
                error!(error = %e, "Kafka source failed");
            }
        })
    };

    {
        let source = source.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received, stopping intake");
                source.stop();
            }
        });
    }

    // Returns once the source drops its sender and in-flight payloads finish
    executor.run(rx).await?;
    consumer.await?;

    let report = executor.shutdown().await?;
    info!(
        events_received = report.stats.events_received,
        events_dropped = report.stats.events_dropped(),
        trigger_firings = report.stats.trigger_firings,
        rows_written = report.stats.rows_written,
        "Pipeline stopped"
    );

    println!("{}", MetricsRegistry::global().encode()?);
    Ok(())
}
