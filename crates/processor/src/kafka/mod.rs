//! Kafka integration
//!
//! [`KafkaSource`] consumes the upstream clickstream topic and feeds raw
//! payloads to the executor. [`KafkaTableSink`] publishes destination rows as
//! JSON messages, one topic per table.
//!
//! # Example
//!
//! ```rust,no_run
//! use retail_processor::config::SourceConfig;
//! use retail_processor::kafka::KafkaSource;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> retail_processor::error::Result<()> {
//! let source = KafkaSource::new(SourceConfig::default())?;
//! let (tx, mut rx) = mpsc::channel::<Vec<u8>>(1_000);
//!
//! tokio::spawn(async move {
//!     while let Some(payload) = rx.recv().await {
//!         println!("{} bytes", payload.len());
//!     }
//! });
//!
//! source.start(tx).await?;
//! # Ok(())
//! # }
//! ```

pub mod sink;
pub mod source;

pub use sink::{KafkaSinkConfig, KafkaTableSink};
pub use source::{KafkaSource, SourceCounters};
