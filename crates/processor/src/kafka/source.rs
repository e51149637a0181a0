//! Kafka consumer feeding raw payloads into the pipeline
//!
//! Offsets are stored only after a payload has been handed to the pipeline
//! channel and committed periodically, so every payload is delivered at
//! least once. Redelivered payloads are processed again.

use crate::config::SourceConfig;
use crate::error::{ProcessorError, Result};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::BorrowedMessage;
use rdkafka::Message;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time;
use tracing::{debug, error, info, warn};

/// Backoff after a consumer error
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Counters of a running source
#[derive(Debug, Default)]
pub struct SourceCounters {
    pub messages_consumed: AtomicU64,
    pub empty_messages: AtomicU64,
    pub consumer_errors: AtomicU64,
    pub commits: AtomicU64,
}

/// Kafka source of clickstream payloads
pub struct KafkaSource {
    consumer: StreamConsumer,
    config: SourceConfig,
    shutdown: AtomicBool,
    stop: Notify,
    counters: Arc<SourceCounters>,
}

impl KafkaSource {
    /// Create a consumer for the configured topic
    pub fn new(config: SourceConfig) -> Result<Self> {
        config.validate()?;
        let consumer = Self::create_consumer(&config)?;

        Ok(Self {
            consumer,
            config,
            shutdown: AtomicBool::new(false),
            stop: Notify::new(),
            counters: Arc::new(SourceCounters::default()),
        })
    }

    fn create_consumer(config: &SourceConfig) -> Result<StreamConsumer> {
        let mut client_config = ClientConfig::new();

        client_config
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest");

        client_config
            .create()
            .map_err(|e| ProcessorError::Configuration {
                source: Box::new(e),
            })
    }

    pub fn counters(&self) -> Arc<SourceCounters> {
        self.counters.clone()
    }

    /// Subscribe to the configured topic
    pub fn subscribe(&self) -> Result<()> {
        self.consumer.subscribe(&[self.config.topic.as_str()])?;
        info!(topic = %self.config.topic, group_id = %self.config.group_id, "Subscribed to topic");
        Ok(())
    }

    /// Wait for the next message
    pub async fn poll(&self) -> Result<Option<BorrowedMessage<'_>>> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Ok(None);
        }

        match self.consumer.recv().await {
            Ok(msg) => {
                self.counters.messages_consumed.fetch_add(1, Ordering::Relaxed);
                Ok(Some(msg))
            }
            Err(KafkaError::PartitionEOF(partition)) => {
                debug!(partition, "Reached end of partition");
                Ok(None)
            }
            Err(e) => {
                self.counters.consumer_errors.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    /// Commit stored offsets
    pub fn commit(&self) -> Result<()> {
        match self.consumer.commit_consumer_state(CommitMode::Async) {
            Ok(()) => {
                self.counters.commits.fetch_add(1, Ordering::Relaxed);
                debug!("Committed offsets");
                Ok(())
            }
            // Nothing stored since the last commit
            Err(KafkaError::ConsumerCommit(rdkafka::types::RDKafkaErrorCode::NoOffset)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Consume payloads into `tx` until stopped or the channel closes
    pub async fn start(&self, tx: mpsc::Sender<Vec<u8>>) -> Result<()> {
        self.subscribe()?;

        let mut commit_interval =
            time::interval(Duration::from_millis(self.config.commit_interval_ms.max(1)));

        loop {
            tokio::select! {
                _ = self.stop.notified() => {
                    info!("Shutdown signal received");
                    break;
                }

                _ = commit_interval.tick() => {
                    if let Err(e) = self.commit() {
                        warn!(error = %e, "Failed to commit offsets");
                    }
                }

                result = self.poll() => {
                    match result {
                        Ok(Some(msg)) => {
                            let Some(payload) = msg.payload() else {
                                self.counters.empty_messages.fetch_add(1, Ordering::Relaxed);
                                debug!(partition = msg.partition(), offset = msg.offset(), "Skipping message without payload");
                                self.store_offset(&msg);
                                continue;
                            };

                            if tx.send(payload.to_vec()).await.is_err() {
                                warn!("Pipeline channel closed, stopping consumer");
                                break;
                            }
                            self.store_offset(&msg);
                        }
                        Ok(None) => {
                            if self.shutdown.load(Ordering::Relaxed) {
                                break;
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Error consuming message");
                            time::sleep(ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        if let Err(e) = self.commit() {
            warn!(error = %e, "Failed to commit offsets on shutdown");
        }

        info!(
            consumed = self.counters.messages_consumed.load(Ordering::Relaxed),
            "Kafka source stopped"
        );
        Ok(())
    }

    fn store_offset(&self, msg: &BorrowedMessage<'_>) {
        if let Err(e) = self.consumer.store_offset_from_message(msg) {
            warn!(
                partition = msg.partition(),
                offset = msg.offset(),
                error = %e,
                "Failed to store offset"
            );
        }
    }

    /// Ask a running [`KafkaSource::start`] loop to stop
    pub fn stop(&self) {
        info!("Stopping Kafka source");
        self.shutdown.store(true, Ordering::Relaxed);
        self.stop.notify_one();
    }
}

impl std::fmt::Debug for KafkaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaSource")
            .field("topic", &self.config.topic)
            .field("group_id", &self.config.group_id)
            .finish_non_exhaustive()
    }
}
