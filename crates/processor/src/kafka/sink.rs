//! Kafka-backed table storage
//!
//! Each table is a topic named `<topic_prefix><table>`; each row is one JSON
//! message whose keys follow the column order. Topics are expected to be
//! auto-created or provisioned, so creating a table only records its schema.

use crate::error::{ProcessorError, Result, SinkError, SinkResult};
use crate::sink::{TableSink, TableTarget};
use async_trait::async_trait;
use dashmap::DashMap;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use retail_types::{TableRow, TableSchema};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for the Kafka table sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSinkConfig {
    /// Kafka bootstrap servers
    pub brokers: String,

    /// Prefix prepended to table names to form topic names
    #[serde(default)]
    pub topic_prefix: String,

    /// Client ID for this producer
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Delivery timeout of a single message (milliseconds)
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
}

fn default_client_id() -> String {
    "retail-pipeline-sink".to_string()
}

fn default_send_timeout() -> u64 {
    10_000
}

impl KafkaSinkConfig {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            topic_prefix: String::new(),
            client_id: default_client_id(),
            send_timeout_ms: default_send_timeout(),
        }
    }
}

/// Table storage publishing rows to Kafka topics
pub struct KafkaTableSink {
    producer: FutureProducer,
    config: KafkaSinkConfig,
    schemas: DashMap<String, TableSchema>,
}

impl KafkaTableSink {
    /// Create a new Kafka table sink
    pub fn new(config: KafkaSinkConfig) -> Result<Self> {
        if config.brokers.trim().is_empty() {
            return Err(ProcessorError::configuration(
                "kafka sink brokers must not be empty",
            ));
        }

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.client_id)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("message.timeout.ms", config.send_timeout_ms.to_string())
            .create()
            .map_err(|e| ProcessorError::Configuration {
                source: Box::new(e),
            })?;

        info!(brokers = %config.brokers, prefix = %config.topic_prefix, "Kafka table sink created");

        Ok(Self {
            producer,
            config,
            schemas: DashMap::new(),
        })
    }

    /// Topic receiving the rows of `table`
    pub fn topic_for(&self, table: &str) -> String {
        format!("{}{}", self.config.topic_prefix, table)
    }

    fn send_error(&self, table: &str, err: KafkaError) -> SinkError {
        match err {
            KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge)
            | KafkaError::MessageProduction(RDKafkaErrorCode::InvalidRecord) => {
                SinkError::schema_mismatch(table, err.to_string())
            }
            KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut) => {
                SinkError::Timeout {
                    destination: table.to_string(),
                    timeout_ms: self.config.send_timeout_ms,
                }
            }
            other => SinkError::transient(table, other.to_string()),
        }
    }
}

#[async_trait]
impl TableSink for KafkaTableSink {
    async fn ensure_table(&self, target: &TableTarget) -> SinkResult<()> {
        let existing = self
            .schemas
            .entry(target.table.clone())
            .or_insert_with(|| target.schema.clone());

        if *existing != target.schema {
            return Err(SinkError::schema_mismatch(
                &target.table,
                format!(
                    "table registered with schema '{}', writer expects '{}'",
                    *existing, target.schema
                ),
            ));
        }
        Ok(())
    }

    async fn append(&self, target: &TableTarget, row: &TableRow) -> SinkResult<()> {
        target
            .schema
            .validate_row(row)
            .map_err(|e| SinkError::schema_mismatch(&target.table, e.to_string()))?;

        let payload = serde_json::to_vec(row)
            .map_err(|e| SinkError::schema_mismatch(&target.table, e.to_string()))?;
        let topic = self.topic_for(&target.table);

        let record: FutureRecord<'_, (), Vec<u8>> = FutureRecord::to(&topic).payload(&payload);
        let result = self
            .producer
            .send(
                record,
                Timeout::After(Duration::from_millis(self.config.send_timeout_ms)),
            )
            .await;

        match result {
            Ok((partition, offset)) => {
                debug!(topic = %topic, partition, offset, "Row published");
                Ok(())
            }
            Err((err, _)) => Err(self.send_error(&target.table, err)),
        }
    }

    async fn flush(&self) -> SinkResult<()> {
        self.producer
            .flush(Timeout::After(Duration::from_millis(self.config.send_timeout_ms)))
            .map_err(|e| SinkError::transient("kafka", e.to_string()))
    }
}

impl std::fmt::Debug for KafkaTableSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaTableSink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
