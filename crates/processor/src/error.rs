//! Error types for the stream processor
//!
//! Every stage of the pipeline has its own error enum; [`ProcessorError`]
//! wraps them so callers can propagate with `?`. Per-event failures (decode,
//! classification, projection) are counted and dropped by the executor and
//! never stop the stream. Configuration errors are fatal at startup.

use thiserror::Error;

/// Main processor error type
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Payload could not be decoded into an event
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Event matched none of the routed event types
    #[error("unclassified event: event type {event_type:?} matches no route")]
    UnclassifiedEvent { event_type: Option<String> },

    /// Event could not be reshaped into a record
    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Window and trigger errors
    #[error("window error: {0}")]
    Window(#[from] WindowError),

    /// Aggregation-related errors
    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    /// Destination write errors
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Configuration errors
    #[error("configuration error: {source}")]
    Configuration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Execution errors
    #[error("execution error: {source}")]
    Execution {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Kafka-related errors
    #[error("kafka error: {source}")]
    Kafka {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generic error for unexpected conditions
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ProcessorError {
    /// Create a configuration error from a message
    pub fn configuration(message: impl Into<String>) -> Self {
        ProcessorError::Configuration {
            source: message.into().into(),
        }
    }

    /// Stable label for logs and metrics
    pub fn error_type(&self) -> &'static str {
        match self {
            ProcessorError::Decode(e) => e.error_type(),
            ProcessorError::UnclassifiedEvent { .. } => "unclassified_event",
            ProcessorError::Projection(e) => e.error_type(),
            ProcessorError::Window(_) => "window",
            ProcessorError::Aggregation(_) => "aggregation",
            ProcessorError::Sink(e) => e.error_type(),
            ProcessorError::Configuration { .. } => "configuration",
            ProcessorError::Execution { .. } => "execution",
            ProcessorError::Kafka { .. } => "kafka",
            ProcessorError::Unexpected(_) => "unexpected",
        }
    }

    /// Whether the error only affects the event that caused it
    pub fn is_per_event(&self) -> bool {
        matches!(
            self,
            ProcessorError::Decode(_)
                | ProcessorError::UnclassifiedEvent { .. }
                | ProcessorError::Projection(_)
                | ProcessorError::Sink(SinkError::Halted { .. })
        )
    }
}

/// Payload decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not a JSON object
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        reason: String,
        /// Leading bytes of the payload, lossily decoded
        payload_sample: Option<String>,
    },
}

impl DecodeError {
    const SAMPLE_LEN: usize = 64;

    pub fn malformed(reason: impl Into<String>, payload: &[u8]) -> Self {
        let sample = (!payload.is_empty()).then(|| {
            let end = payload.len().min(Self::SAMPLE_LEN);
            String::from_utf8_lossy(&payload[..end]).into_owned()
        });
        DecodeError::MalformedPayload {
            reason: reason.into(),
            payload_sample: sample,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            DecodeError::MalformedPayload { .. } => "malformed_payload",
        }
    }
}

/// Record projection errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// A required field is absent or null
    #[error("missing field: {field}")]
    MissingField { field: String },

    /// `ecommerce.items` has no entries
    #[error("items list is empty")]
    EmptyItemsList,

    /// A field is present but holds the wrong kind of value
    #[error("invalid field type for {field}: expected {expected}")]
    InvalidFieldType { field: String, expected: &'static str },
}

impl ProjectionError {
    pub fn missing(field: impl Into<String>) -> Self {
        ProjectionError::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, expected: &'static str) -> Self {
        ProjectionError::InvalidFieldType {
            field: field.into(),
            expected,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ProjectionError::MissingField { .. } => "missing_field",
            ProjectionError::EmptyItemsList => "empty_items_list",
            ProjectionError::InvalidFieldType { .. } => "invalid_field_type",
        }
    }
}

/// Window assignment and trigger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// Count trigger threshold is zero
    #[error("invalid trigger count: {count}, must be greater than 0")]
    InvalidTriggerCount { count: u64 },
}

/// Aggregation errors
#[derive(Error, Debug)]
pub enum AggregationError {
    /// Value cannot be added to a running sum
    #[error("invalid value {value} for key '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: f64,
        reason: String,
    },

    /// The aggregation owner has stopped and no longer accepts merges
    #[error("aggregation worker is closed")]
    WorkerClosed,
}

/// Destination write errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Temporary failure; the append may be retried
    #[error("transient write failure on {destination}: {message}")]
    Transient {
        destination: String,
        message: String,
    },

    /// Write did not complete in time; the append may be retried
    #[error("write to {destination} timed out after {timeout_ms}ms")]
    Timeout { destination: String, timeout_ms: u64 },

    /// Row does not fit the destination table; retrying cannot help
    #[error("schema mismatch on {destination}: {details}")]
    SchemaMismatch {
        destination: String,
        details: String,
    },

    /// Writer stopped after a permanent failure
    #[error("writer for {destination} is halted")]
    Halted { destination: String },

    /// Writer has been shut down
    #[error("writer for {destination} is closed")]
    Closed { destination: String },
}

impl SinkError {
    pub fn transient(destination: impl Into<String>, message: impl Into<String>) -> Self {
        SinkError::Transient {
            destination: destination.into(),
            message: message.into(),
        }
    }

    pub fn schema_mismatch(destination: impl Into<String>, details: impl Into<String>) -> Self {
        SinkError::SchemaMismatch {
            destination: destination.into(),
            details: details.into(),
        }
    }

    /// Whether re-appending the same row may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, SinkError::Transient { .. } | SinkError::Timeout { .. })
    }

    /// Whether the destination writer must stop
    pub fn is_permanent(&self) -> bool {
        matches!(self, SinkError::SchemaMismatch { .. })
    }

    /// Whether the row was refused because its writer already halted
    pub fn is_halted(&self) -> bool {
        matches!(self, SinkError::Halted { .. })
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            SinkError::Transient { .. } => "sink_transient",
            SinkError::Timeout { .. } => "sink_timeout",
            SinkError::SchemaMismatch { .. } => "sink_schema_mismatch",
            SinkError::Halted { .. } => "sink_halted",
            SinkError::Closed { .. } => "sink_closed",
        }
    }
}

/// Result type alias for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Result type alias for decode operations
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Result type alias for projection operations
pub type ProjectionResult<T> = std::result::Result<T, ProjectionError>;

/// Result type alias for aggregation operations
pub type AggregationResult<T> = std::result::Result<T, AggregationError>;

/// Result type alias for sink operations
pub type SinkResult<T> = std::result::Result<T, SinkError>;

impl From<rdkafka::error::KafkaError> for ProcessorError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        ProcessorError::Kafka {
            source: Box::new(err),
        }
    }
}
