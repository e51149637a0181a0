//! Stream processor for the retail clickstream pipeline
//!
//! This crate classifies e-commerce interaction events and routes them to
//! three warehouse destinations:
//!
//! - product views are flattened into `item_views` rows;
//! - add-to-cart events are flattened into `add_to_carts` rows;
//! - purchase values are summed per user in a global window and the running
//!   totals are emitted to `aggregates` every N purchases.
//!
//! Malformed, unknown and incomplete events are counted and dropped without
//! stopping the stream.

pub mod aggregation;
pub mod classify;
pub mod config;
pub mod decode;
pub mod error;
pub mod format;
pub mod kafka;
pub mod metrics;
pub mod pipeline;
pub mod projection;
pub mod sink;
pub mod telemetry;
pub mod window;

// Re-export commonly used types
pub use classify::{classify, route, Classified};
pub use decode::decode;
pub use projection::RecordProjector;

pub use window::{
    CountTrigger, GlobalWindowAssigner, TriggerContext, TriggerResult, Window, WindowAssigner,
    WindowTrigger,
};

pub use aggregation::{KeyedCombiner, SumAggregator};

pub use error::{
    AggregationError, DecodeError, ProcessorError, ProjectionError, Result as ProcessorResult,
    SinkError, WindowError,
};

pub use config::{
    AccumulationMode, DestinationConfig, DestinationsConfig, LogFormat, LoggingConfig,
    ProcessorConfig, SinkConfig, SourceConfig,
};

pub use pipeline::{
    AggregationState, Outcome, PipelineStats, ShutdownReport, StreamExecutor, StreamPipeline,
    StreamPipelineBuilder,
};

pub use sink::{Destination, InMemoryTableSink, TableSink, TableTarget};

pub use kafka::{KafkaSinkConfig, KafkaSource, KafkaTableSink};

pub use metrics::{MetricsRegistry, PipelineMetrics};

pub use retail_types::{
    AggregateRecord, EventKind, ProjectedRecord, PurchaseValue, RawEvent, TableRow, TableSchema,
};
