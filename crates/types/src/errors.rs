//! Error types for schema handling

use thiserror::Error;

/// Result type alias for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Errors raised while parsing schemas or checking rows against them
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid column definition '{definition}': expected name:TYPE")]
    InvalidColumn { definition: String },

    #[error("unknown column type '{type_name}' for column '{column}'")]
    UnknownType { column: String, type_name: String },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("schema has no columns")]
    Empty,

    #[error("row does not match schema: {details}")]
    RowMismatch { details: String },
}

impl SchemaError {
    /// Create a row mismatch error
    pub fn row_mismatch(details: impl Into<String>) -> Self {
        Self::RowMismatch {
            details: details.into(),
        }
    }
}
