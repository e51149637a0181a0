//! Label management for Prometheus metrics
//!
//! Label values are kept to small closed sets (event kinds, destinations,
//! error types) so metric cardinality stays bounded.

use prometheus_client::encoding::EncodeLabelSet;
use std::fmt;

/// Label value for write results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultLabel {
    Success,
    Error,
}

impl fmt::Display for ResultLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultLabel::Success => write!(f, "success"),
            ResultLabel::Error => write!(f, "error"),
        }
    }
}

/// Labels for per-kind event counters
#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct KindLabels {
    pub kind: String,
}

impl KindLabels {
    pub fn new(kind: impl fmt::Display) -> Self {
        Self {
            kind: kind.to_string(),
        }
    }
}

/// Labels for per-error-type counters
#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct ErrorLabels {
    pub error_type: String,
}

impl ErrorLabels {
    pub fn new(error_type: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
        }
    }
}

/// Labels for per-destination counters
#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct DestinationLabels {
    pub destination: String,
}

impl DestinationLabels {
    pub fn new(destination: impl fmt::Display) -> Self {
        Self {
            destination: destination.to_string(),
        }
    }
}

/// Labels for destination write outcomes
#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct WriteLabels {
    pub destination: String,
    pub result: String,
}

impl WriteLabels {
    pub fn new(destination: impl fmt::Display, result: ResultLabel) -> Self {
        Self {
            destination: destination.to_string(),
            result: result.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_label_display() {
        assert_eq!(ResultLabel::Success.to_string(), "success");
        assert_eq!(ResultLabel::Error.to_string(), "error");
    }

    #[test]
    fn test_write_labels() {
        let labels = WriteLabels::new("item_views", ResultLabel::Error);
        assert_eq!(labels.destination, "item_views");
        assert_eq!(labels.result, "error");
    }
}
