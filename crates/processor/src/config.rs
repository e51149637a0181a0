//! Configuration types for the stream processor
//!
//! The processor is configured from a YAML file overlaid with
//! `RETAIL_PIPELINE_`-prefixed environment variables (nested keys are
//! separated with `__`, e.g. `RETAIL_PIPELINE_SINK__MAX_RETRIES=5`).

use crate::error::{ProcessorError, Result};
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use retail_types::{AggregateRecord, ProjectedRecord, TableRow, TableSchema};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "RETAIL_PIPELINE_";

/// Upper bound of `parallelism`
pub const MAX_PARALLELISM: usize = 1 << 16;

/// Main processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Purchases between aggregate emissions
    ///
    /// An absent key falls back to the default; an explicit `null` is kept
    /// as `None` and rejected by [`ProcessorConfig::validate`].
    #[serde(default = "default_trigger_count")]
    pub trigger_count: Option<u64>,

    /// Whether sums survive a firing
    #[serde(default)]
    pub accumulation_mode: AccumulationMode,

    /// Destination tables
    #[serde(default)]
    pub destinations: DestinationsConfig,

    /// Destination writer behavior
    #[serde(default)]
    pub sink: SinkConfig,

    /// Upstream topic
    #[serde(default)]
    pub source: SourceConfig,

    /// Maximum events processed concurrently
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Capacity of the aggregation queue
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Logging setup
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            trigger_count: default_trigger_count(),
            accumulation_mode: AccumulationMode::default(),
            destinations: DestinationsConfig::default(),
            sink: SinkConfig::default(),
            source: SourceConfig::default(),
            parallelism: default_parallelism(),
            buffer_size: default_buffer_size(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ProcessorConfig {
    /// Load configuration from an optional YAML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ProcessorError::configuration(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| ProcessorError::Configuration {
                source: Box::new(e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string, without environment overrides
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Yaml::string(yaml))
            .extract()
            .map_err(|e| ProcessorError::Configuration {
                source: Box::new(e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validated trigger threshold
    pub fn trigger_threshold(&self) -> Result<u64> {
        match self.trigger_count {
            None => Err(ProcessorError::configuration(
                "trigger_count must not be null",
            )),
            Some(0) => Err(ProcessorError::configuration(
                "trigger_count must be greater than 0",
            )),
            Some(count) => Ok(count),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.trigger_threshold()?;
        self.destinations.validate()?;
        self.sink.validate()?;
        self.source.validate()?;

        if self.parallelism == 0 {
            return Err(ProcessorError::configuration(
                "parallelism must be greater than 0",
            ));
        }

        if self.parallelism > MAX_PARALLELISM {
            return Err(ProcessorError::configuration(format!(
                "parallelism must not exceed {}",
                MAX_PARALLELISM
            )));
        }

        if self.buffer_size == 0 {
            return Err(ProcessorError::configuration(
                "buffer_size must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// What happens to the running sums after a firing
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccumulationMode {
    /// Sums keep growing across firings
    #[default]
    Accumulating,
    /// Sums are cleared after each firing
    Discarding,
}

/// The three destination tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationsConfig {
    #[serde(default = "DestinationConfig::item_views")]
    pub item_views: DestinationConfig,

    #[serde(default = "DestinationConfig::add_to_carts")]
    pub add_to_carts: DestinationConfig,

    #[serde(default = "DestinationConfig::aggregates")]
    pub aggregates: DestinationConfig,
}

impl Default for DestinationsConfig {
    fn default() -> Self {
        Self {
            item_views: DestinationConfig::item_views(),
            add_to_carts: DestinationConfig::add_to_carts(),
            aggregates: DestinationConfig::aggregates(),
        }
    }
}

impl DestinationsConfig {
    /// Parse every schema and check it fits the rows sent to it
    pub fn validate(&self) -> Result<()> {
        let projected_sample = projected_sample_row();
        let aggregate_sample = AggregateRecord::new("", 0.0).to_row();

        self.item_views.validate_against(&projected_sample)?;
        self.add_to_carts.validate_against(&projected_sample)?;
        self.aggregates.validate_against(&aggregate_sample)?;
        Ok(())
    }
}

/// A single destination table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Fully qualified table name
    pub table: String,

    /// Schema in `name:TYPE, name:TYPE` notation
    pub schema: String,
}

impl DestinationConfig {
    pub fn new(table: impl Into<String>, schema: &TableSchema) -> Self {
        Self {
            table: table.into(),
            schema: schema.to_string(),
        }
    }

    pub fn item_views() -> Self {
        Self::new(
            "ecommerce_sink.beam_item_views",
            &TableSchema::projected_event(),
        )
    }

    pub fn add_to_carts() -> Self {
        Self::new(
            "ecommerce_sink.beam_add_to_carts",
            &TableSchema::projected_event(),
        )
    }

    pub fn aggregates() -> Self {
        Self::new("ecommerce_sink.beam_aggregated", &TableSchema::aggregate())
    }

    /// Parsed table schema
    pub fn table_schema(&self) -> Result<TableSchema> {
        TableSchema::parse(&self.schema).map_err(|e| ProcessorError::Configuration {
            source: format!("invalid schema for table '{}': {}", self.table, e).into(),
        })
    }

    fn validate_against(&self, sample: &TableRow) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(ProcessorError::configuration(
                "destination table name must not be empty",
            ));
        }

        let schema = self.table_schema()?;
        schema
            .validate_row(sample)
            .map_err(|e| ProcessorError::Configuration {
                source: format!(
                    "schema for table '{}' does not match its records: {}",
                    self.table, e
                )
                .into(),
            })
    }
}

fn projected_sample_row() -> TableRow {
    ProjectedRecord::COLUMNS
        .iter()
        .fold(TableRow::new(), |row, column| row.with(*column, ""))
}

/// Destination writer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Retries after the first failed append
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry backoff in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound of the retry backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Timeout of a single append in milliseconds
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Rows buffered per destination before producers wait
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl SinkConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.write_timeout_ms == 0 {
            return Err(ProcessorError::configuration(
                "sink write_timeout_ms must be greater than 0",
            ));
        }

        if self.max_backoff_ms < self.retry_backoff_ms {
            return Err(ProcessorError::configuration(
                "sink max_backoff_ms must not be less than retry_backoff_ms",
            ));
        }

        if self.queue_capacity == 0 {
            return Err(ProcessorError::configuration(
                "sink queue_capacity must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Upstream Kafka topic configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Comma-separated broker list
    #[serde(default = "default_brokers")]
    pub brokers: String,

    /// Consumer group id
    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Topic carrying the clickstream payloads
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Interval between offset commits in milliseconds
    #[serde(default = "default_commit_interval_ms")]
    pub commit_interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            group_id: default_group_id(),
            topic: default_topic(),
            commit_interval_ms: default_commit_interval_ms(),
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.brokers.trim().is_empty() {
            return Err(ProcessorError::configuration("source brokers must not be empty"));
        }
        if self.group_id.trim().is_empty() {
            return Err(ProcessorError::configuration("source group_id must not be empty"));
        }
        if self.topic.trim().is_empty() {
            return Err(ProcessorError::configuration("source topic must not be empty"));
        }
        Ok(())
    }
}

/// Logging output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_trigger_count() -> Option<u64> {
    Some(10)
}

fn default_parallelism() -> usize {
    num_workers()
}

fn default_buffer_size() -> usize {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_write_timeout_ms() -> u64 {
    30_000
}

fn default_queue_capacity() -> usize {
    1_000
}

fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_group_id() -> String {
    "retail-pipeline".to_string()
}

fn default_topic() -> String {
    "retail-clickstream".to_string()
}

fn default_commit_interval_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn num_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
